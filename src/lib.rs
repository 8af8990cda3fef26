#![allow(clippy::needless_return)]

//! KloX is a dynamically typed scripting language with lexical scoping,
//! first-class functions and classes with single inheritance. The crate
//! contains one front end and two back ends: a tree-walk interpreter and a
//! compiler that emits a C++ translation unit against a small runtime
//! header.
//!
//! ## Scanning
//! The first step is scanning. The [`scanner`](scanner) turns the source
//! string into a flat list of tokens; for example `1 + 2` becomes
//! ```text
//! [Number(1), Plus, Number(2)]
//! ```
//! Lexical problems like an unterminated string are reported immediately and
//! scanning continues, so a single run surfaces as many errors as possible.
//!
//! ## Parsing
//! The [`parser`](parser) is a hand-written recursive descent parser that
//! turns the token list into expressions and statements. On a syntax error
//! it reports, then synchronizes at the next statement boundary and keeps
//! parsing the rest of the file.
//!
//! ## Resolving
//! The [`resolver`](resolver) statically walks the tree and records, for
//! every local variable use, how many scopes lie between the use and its
//! declaration. It also rejects semantically invalid programs that are
//! syntactically fine, like `return` at the top level or a class inheriting
//! from itself. Both back ends require this pass.
//!
//! ## Interpreting
//! The [`interpreter`](interpreter) evaluates the resolved tree against a
//! chain of [`environment`](environment) frames. Runtime errors carry the
//! offending token and unwind to the driver, which reports them and exits
//! with code 70 in file mode.
//!
//! ## Compiling
//! The [`emitter`](emitter) walks the same resolved tree and writes a C++
//! program that links against `klox_runtime.hpp`, a header providing the
//! tagged value type, the class machinery and the arithmetic helpers. The
//! driver writes both files next to each other; building the result with a
//! C++ compiler is left to the user.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

pub mod error;
pub mod token;
pub mod scanner;
pub mod expr;
pub mod stmt;
pub mod environment;
pub mod parser;
pub mod ast;
pub mod interpreter;
pub mod literal;
pub mod object;
pub mod function;
pub mod resolver;
pub mod class;
pub mod emitter;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use ast::ASTPrinter;
use emitter::Emitter;
use error::Diagnostics;
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;
use stmt::Stmt;

/// The driver owns one interpreter and one diagnostics sink for the whole
/// session, so REPL inputs share globals and the file modes can inspect the
/// error tally for their exit codes. `print` output goes to the writer the
/// driver is constructed with.
#[allow(non_camel_case_types)]
pub struct klox<'a> {
    interpreter: Interpreter<'a>,
    diagnostics: Diagnostics,
    pub print_ast: bool,
}

impl<'a> klox<'a> {
    pub fn new(output: &'a mut dyn Write) -> Self {
        klox {
            interpreter: Interpreter::new(output),
            diagnostics: Diagnostics::new(),
            print_ast: false,
        }
    }

    /// Runs a script to completion.
    /// Exits with 65 on a static error and 70 on a runtime error.
    pub fn run_file(&mut self, path: &str) {
        let source = read_source(path);

        self.run(&source);

        if self.diagnostics.had_error() {
            process::exit(65);
        }
        if self.diagnostics.had_runtime_error() {
            process::exit(70);
        }
    }

    /// Runs an interactive prompt against one shared global environment.
    pub fn run_prompt(&mut self) {
        let mut editor = DefaultEditor::new().expect("line editor");

        let history = home::home_dir().map(|dir| dir.join(".klox_history"));
        if let Some(history) = &history {
            let _ = editor.load_history(history);
        }

        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    let _ = editor.add_history_entry(line.as_str());
                    self.run(&line);
                    self.diagnostics.reset();
                },
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(error) => {
                    eprintln!("Error reading input: {error}");
                    break;
                },
            }
        }

        if let Some(history) = &history {
            let _ = editor.save_history(history);
        }
    }

    /// Compiles a script to a C++ translation unit and writes it, together
    /// with the runtime header, next to the requested output path.
    /// Exits with 65 on a static error.
    pub fn compile_file(&mut self, path: &str, cpp_file: Option<PathBuf>) {
        let source = read_source(path);

        let Some((statements, _)) = self.front_end(&source) else {
            process::exit(65);
        };

        let translation_unit = Emitter::new().emit(&statements);

        let cpp_path = cpp_file.unwrap_or_else(|| Path::new(path).with_extension("cpp"));
        fs::write(&cpp_path, translation_unit).expect("write generated source");

        let runtime_path = cpp_path.with_file_name(emitter::RUNTIME_HEADER_NAME);
        fs::write(&runtime_path, emitter::RUNTIME_HEADER).expect("write runtime header");

        println!("Wrote {} and {}", cpp_path.display(), runtime_path.display());
    }

    /// Scans, parses and resolves the source.
    /// Returns the statements and the resolver's side table, or `None` when
    /// any phase reported an error.
    fn front_end(&mut self, source: &str) -> Option<(Vec<Stmt>, HashMap<usize, usize>)> {
        let tokens = Scanner::new(source, &mut self.diagnostics).scan_tokens();
        if self.diagnostics.had_error() {
            return None;
        }

        let statements = Parser::new(tokens, &mut self.diagnostics).parse();
        if self.diagnostics.had_error() {
            return None;
        }

        let mut resolver = Resolver::new(&mut self.diagnostics);
        resolver.resolve(&statements);
        let locals = resolver.into_locals();
        if self.diagnostics.had_error() {
            return None;
        }

        if self.print_ast {
            println!("{}", ASTPrinter.print(&statements));
        }

        Some((statements, locals))
    }

    fn run(&mut self, source: &str) {
        let Some((statements, locals)) = self.front_end(source) else {
            return;
        };

        self.interpreter.resolve(locals);

        if let Err(error) = self.interpreter.interpret(&statements) {
            self.diagnostics.runtime_error(&error);
        }
    }
}

/// Compiles a source string straight to C++, reporting any static errors to
/// stderr. Used by the compile pipeline's tests.
pub fn compile_source(source: &str) -> Option<String> {
    let mut diagnostics = Diagnostics::new();

    let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
    if diagnostics.had_error() {
        return None;
    }

    let statements = Parser::new(tokens, &mut diagnostics).parse();
    if diagnostics.had_error() {
        return None;
    }

    let mut resolver = Resolver::new(&mut diagnostics);
    resolver.resolve(&statements);
    if diagnostics.had_error() {
        return None;
    }

    Some(Emitter::new().emit(&statements))
}

/// Reads a script as UTF-8, dropping a leading byte order mark.
fn read_source(path: &str) -> String {
    let contents = fs::read_to_string(path)
        .expect("Should have been able to read the file");

    match contents.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => contents,
    }
}
