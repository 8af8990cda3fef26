#[macro_use]
mod common;

#[cfg(test)]
mod class {
    tests! {
        print_class in class is OK
        "A"
    }

    tests! {
        print_instance in class is OK
        "A instance"
    }

    tests! {
        fields in class is OK
        "3"
    }

    tests! {
        self_reference in class is OK
        "Node instance"
    }

    tests! {
        undefined_property in class is ERR
        "[line 2] Runtime Error: Undefined property 'x'"
    }

    tests! {
        property_on_number in class is ERR
        "[line 2] Runtime Error: Only instances have properties"
    }

    tests! {
        set_on_non_instance in class is ERR
        "[line 2] Runtime Error: Only instances have fields"
    }
}
