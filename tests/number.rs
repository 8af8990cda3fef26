#[macro_use]
mod common;

#[cfg(test)]
mod number {
    tests! {
        integral in number is OK
        "7"
    }

    tests! {
        fraction in number is OK
        "0.5"
    }
}
