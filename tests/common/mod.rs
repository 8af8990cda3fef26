#[macro_export]
macro_rules! tests {
    ($file:ident in $scope:ident is OK $($expected:expr)*) => {
        #[test]
        fn $file() {
            use klox_lang::klox;

            let mut expected = vec![$($expected),*];

            // if exists, concat expected lines with new lines
            let expected = match expected.len() {
                0 => "".to_string(),
                _ => {
                    // add empty string to end to add new line to end of output
                    expected.push("");
                    expected.join("\n")
                }
            };

            let mut output = Vec::new();
            let mut klox = klox::new(&mut output);

            klox.run_file(&format!("tests/target/{}/{}.lx", stringify!($scope), stringify!($file)));

            // drop klox here to release the borrow before reading the output
            drop(klox);
            assert_eq!(expected, std::str::from_utf8(&output).unwrap());
        }
    };

    ($file:ident in $scope:ident is ERR $($expected:expr)+) => {
        #[test]
        fn $file() {
            use assert_cmd::Command;

            // output concats expected with new line
            let output = vec![$($expected),+].join("\n");
            let file = format!("tests/target/{}/{}.lx", stringify!($scope), stringify!($file));

            Command::cargo_bin("klox").unwrap()
                .arg("run")
                .arg(file)
                .assert()
                .stderr(format!("{output}\n"))
                .failure();
        }
    };
}
