#[macro_use]
mod common;

#[cfg(test)]
mod constructor {
    tests! {
        init_field in constructor is OK
        "7"
    }

    tests! {
        init_returns_this in constructor is OK
        "true"
    }

    tests! {
        early_return in constructor is OK
        "-1"
        "6"
    }

    tests! {
        return_value in constructor is ERR
        "[line 1] Error at 'return': Can't return a value from an initializer"
    }

    tests! {
        arity in constructor is ERR
        "[line 1] Runtime Error: Expected 1 arguments but got 0"
    }
}
