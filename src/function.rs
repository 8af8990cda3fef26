use std::cell::RefCell;
use std::fmt::{Debug, Display};
use std::rc::Rc;

use crate::environment::Environment;
use crate::error::{RuntimeError, Unwind};
use crate::interpreter::Interpreter;
use crate::literal::Literal;
use crate::object::{Callable, Object};
use crate::stmt::Stmt;
use crate::token::Token;

/// A user-defined function together with the environment it closed over.
///
/// Bound methods are plain functions whose closure chain starts with a frame
/// that binds `this` to the receiver.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl Function {
    /// Returns a copy of this function whose closure pre-binds `this` to the
    /// given instance.
    pub fn bind(&self, instance: Object) -> Function {
        let mut environment = Environment::new(Some(Rc::clone(&self.closure)));
        environment.define("this", instance);

        Function {
            closure: Rc::new(RefCell::new(environment)),
            ..self.clone()
        }
    }

    /// Fetches the `this` binding out of the closure chain.
    /// Only valid for bound methods.
    fn bound_this(&self) -> Result<Object, RuntimeError> {
        self.closure.borrow().get_at(0, &Token::from("this"))
    }
}

impl Callable for Function {
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Object>) -> Result<Object, RuntimeError> {
        let mut environment = Environment::new(Some(Rc::clone(&self.closure)));

        for (param, argument) in self.params.iter().zip(arguments) {
            environment.define(&param.lexeme, argument);
        }

        let result = interpreter.execute_block(&self.body, Rc::new(RefCell::new(environment)));

        // A return unwinds exactly to this call frame. Initializers always
        // produce the bound instance, whatever the body did.
        match result {
            Ok(()) if self.is_initializer => self.bound_this(),
            Ok(()) => Ok(Object::Literal(Literal::Nil)),
            Err(Unwind::Return(_)) if self.is_initializer => self.bound_this(),
            Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Error(error)) => Err(error),
        }
    }

    fn arity(&self) -> usize {
        self.params.len()
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<fn {}>", self.name.lexeme)
    }
}

/// A builtin implemented in Rust.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub function: fn(&mut Interpreter, Vec<Object>) -> Result<Object, RuntimeError>,
}

impl Callable for NativeFunction {
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Object>) -> Result<Object, RuntimeError> {
        (self.function)(interpreter, arguments)
    }

    fn arity(&self) -> usize {
        self.arity
    }
}

impl NativeFunction {
    /// The builtins every interpreter starts with.
    pub fn globals() -> Vec<NativeFunction> {
        vec![
            NativeFunction {
                name: "clock".to_owned(),
                arity: 0,
                function: |_, _| {
                    let now = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap()
                        .as_secs_f64();
                    Ok(Object::from(now))
                },
            },
        ]
    }
}

impl Display for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<native fn>")
    }
}

impl Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}
