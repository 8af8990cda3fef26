#[macro_use]
mod common;

#[cfg(test)]
mod logical_operator {
    tests! {
        or in logical_operator is OK
        "hi"
        "yes"
    }

    tests! {
        and in logical_operator is OK
        "nil"
        "2"
    }

    tests! {
        short_circuit in logical_operator is OK
        "unchanged"
    }
}
