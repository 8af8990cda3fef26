#[macro_use]
mod common;

#[cfg(test)]
mod function {
    tests! {
        declare_and_call in function is OK
        "3"
    }

    tests! {
        print_function in function is OK
        "<fn sum>"
    }

    tests! {
        recursion in function is OK
        "55"
    }

    tests! {
        nil_return in function is OK
        "nil"
    }

    tests! {
        arity in function is ERR
        "[line 2] Runtime Error: Expected 2 arguments but got 1"
    }

    tests! {
        not_callable in function is ERR
        "[line 1] Runtime Error: Can only call functions and classes"
    }
}
