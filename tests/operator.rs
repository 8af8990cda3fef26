#[macro_use]
mod common;

#[cfg(test)]
mod operator {
    tests! {
        arithmetic in operator is OK
        "7"
    }

    tests! {
        grouping in operator is OK
        "9"
    }

    tests! {
        unary_minus in operator is OK
        "-2"
    }

    tests! {
        equality in operator is OK
        "true"
        "false"
        "false"
        "true"
    }

    tests! {
        divide_by_zero in operator is ERR
        "[line 1] Runtime Error: Division by zero"
    }

    tests! {
        add_mixed_types in operator is ERR
        "[line 1] Runtime Error: Operands must be two numbers or two strings"
    }

    tests! {
        compare_strings in operator is ERR
        "[line 1] Runtime Error: Operands must be numbers"
    }
}
