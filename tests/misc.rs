#[macro_use]
mod common;

#[cfg(test)]
mod misc {
    use assert_cmd::Command;

    tests! {
        clock in misc is OK
        "true"
    }

    #[test]
    fn clean_run_exits_with_zero() {
        Command::cargo_bin("klox").unwrap()
            .arg("run")
            .arg("tests/target/operator/arithmetic.lx")
            .assert()
            .stdout("7\n")
            .code(0);
    }

    #[test]
    fn static_error_exits_with_65() {
        Command::cargo_bin("klox").unwrap()
            .arg("run")
            .arg("tests/target/variable/missing_initializer.lx")
            .assert()
            .code(65);
    }

    #[test]
    fn runtime_error_exits_with_70() {
        Command::cargo_bin("klox").unwrap()
            .arg("run")
            .arg("tests/target/operator/divide_by_zero.lx")
            .assert()
            .code(70);
    }

    #[test]
    fn lone_script_argument_implies_run() {
        Command::cargo_bin("klox").unwrap()
            .arg("tests/target/operator/arithmetic.lx")
            .assert()
            .stdout("7\n")
            .code(0);
    }

    #[test]
    fn unknown_subcommand_exits_with_64() {
        Command::cargo_bin("klox").unwrap()
            .arg("frobnicate")
            .assert()
            .code(64);
    }

    #[test]
    fn print_ast_renders_the_program() {
        Command::cargo_bin("klox").unwrap()
            .arg("run")
            .arg("tests/target/operator/arithmetic.lx")
            .arg("--print-ast")
            .assert()
            .stdout("(print (+ 1 (* 2 3)))\n7\n")
            .code(0);
    }
}
