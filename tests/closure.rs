#[macro_use]
mod common;

#[cfg(test)]
mod closure {
    tests! {
        counter in closure is OK
        "11"
        "12"
    }

    tests! {
        captured_scope in closure is OK
        "global"
        "global"
    }
}
