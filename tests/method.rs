#[macro_use]
mod common;

#[cfg(test)]
mod method {
    tests! {
        call in method is OK
        "hi"
    }

    tests! {
        this in method is OK
        "me"
    }

    tests! {
        bound_method in method is OK
        "maria"
    }

    tests! {
        this_outside in method is ERR
        "[line 1] Error at 'this': Can't use 'this' outside of a class"
    }
}
