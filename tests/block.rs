#[macro_use]
mod common;

#[cfg(test)]
mod block {
    tests! {
        scope in block is OK
        "block a"
        "global a"
    }
}
