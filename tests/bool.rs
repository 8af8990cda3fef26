#[macro_use]
mod common;

#[cfg(test)]
mod bool {
    tests! {
        truthiness in bool is OK
        "zero is truthy"
        "empty string is truthy"
        "nil is falsy"
    }

    tests! {
        not in bool is OK
        "false"
        "true"
        "false"
    }
}
