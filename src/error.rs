use crate::object::Object;
use crate::token::{Token, Type};

/// Collects diagnostics for a single run of the pipeline.
///
/// The sink is threaded through the scanner, the parser and the resolver by
/// mutable borrow; the driver inspects the tally to decide whether to run the
/// next phase and which exit code to use. Runtime errors surface as values
/// through the interpreter's result channel and are reported by the driver.
#[derive(Debug, Default)]
pub struct Diagnostics {
    had_error: bool,
    had_runtime_error: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Returns if a static (lexical, syntactic or resolution) error occurred.
    pub fn had_error(&self) -> bool {
        self.had_error
    }

    /// Returns if a runtime error occurred.
    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Clears the tally between REPL inputs.
    pub fn reset(&mut self) {
        self.had_error = false;
        self.had_runtime_error = false;
    }

    /// Reports a lexical error at a line.
    pub fn error(&mut self, line: usize, message: &str) {
        eprintln!("[line {line}] Error: {message}");
        self.had_error = true;
    }

    /// Reports a parse or resolution error at a token.
    pub fn error_at(&mut self, token: &Token, message: &str) {
        if token.r#type == Type::EOF {
            eprintln!("[line {line}] Error at end: {message}", line = token.line);
        } else {
            eprintln!(
                "[line {line}] Error at '{lexeme}': {message}",
                line = token.line,
                lexeme = token.lexeme,
            );
        }
        self.had_error = true;
    }

    /// Reports a runtime error that unwound out of the interpreter.
    pub fn runtime_error(&mut self, error: &RuntimeError) {
        eprintln!(
            "[line {line}] Runtime Error: {message}",
            line = error.token.line,
            message = error.message,
        );
        self.had_runtime_error = true;
    }
}

/// Represents an error that occurs during parsing.
/// Thrown at the offending token and caught at the declaration boundary,
/// where the parser reports it and synchronizes.
#[derive(Debug)]
pub struct ParseError {
    pub token: Token,
    pub message: String,
}

/// Represents an error that occurs during runtime.
/// Carries the offending token so the diagnostic can name the line.
#[derive(Debug)]
pub struct RuntimeError {
    pub token: Token,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        RuntimeError { token: token.clone(), message: message.into() }
    }
}

/// The statement-level unwinding channel.
///
/// `Return` is not an error: it is the control-flow signal that carries a
/// return value up to the innermost user-function call frame, which absorbs
/// it. Only `Error` may cross that boundary.
#[derive(Debug)]
pub enum Unwind {
    Error(RuntimeError),
    Return(Object),
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Error(error)
    }
}
