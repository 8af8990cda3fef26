#[macro_use]
mod common;

#[cfg(test)]
mod string {
    tests! {
        concat in string is OK
        "hi!"
    }

    tests! {
        multiline in string is OK
        "one"
        "two"
    }

    tests! {
        unterminated in string is ERR
        "[line 1] Error: Unterminated string"
    }
}
