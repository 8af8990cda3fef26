#[macro_use]
mod common;

#[cfg(test)]
mod _if {
    tests! {
        condition in if is OK
        "yes"
    }

    tests! {
        dangling_else in if is OK
        "inner else"
    }
}
