#[macro_use]
mod common;

#[cfg(test)]
mod _for {
    tests! {
        count in for is OK
        "0"
        "1"
        "2"
    }

    tests! {
        fibonacci in for is OK
        "0"
        "1"
        "1"
        "2"
        "3"
        "5"
        "8"
        "13"
        "21"
        "34"
        "55"
        "89"
    }
}
