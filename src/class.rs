use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::function::Function;
use crate::interpreter::Interpreter;
use crate::object::{Callable, Object};
use crate::token::Token;

/// A user-defined class: a name, an optional superclass and a method table.
#[derive(Clone)]
pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<RefCell<Class>>>,
    pub methods: HashMap<String, Function>,
}

impl Class {
    pub fn new(
        name: String,
        superclass: Option<Rc<RefCell<Class>>>,
        methods: HashMap<String, Function>,
    ) -> Self {
        Class { name, superclass, methods }
    }

    /// Looks a method up on this class, then along the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Function> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }

        if let Some(superclass) = &self.superclass {
            return superclass.borrow().find_method(name);
        }

        None
    }
}

impl Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Calling a class constructs an instance. The implementation lives on the
/// shared handle so every instance keeps the identity of the class it was
/// built from.
impl Callable for Rc<RefCell<Class>> {
    fn arity(&self) -> usize {
        match self.borrow().find_method("init") {
            Some(initializer) => initializer.arity(),
            None => 0,
        }
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Object>) -> Result<Object, RuntimeError> {
        let instance = Object::from(Instance::new(Rc::clone(self)));

        if let Some(initializer) = self.borrow().find_method("init") {
            initializer.bind(instance.clone()).call(interpreter, arguments)?;
        }

        Ok(instance)
    }
}

/// An instance of a class with its own field table.
#[derive(Clone)]
pub struct Instance {
    pub class: Rc<RefCell<Class>>,
    fields: HashMap<String, Object>,
}

impl Instance {
    pub fn new(class: Rc<RefCell<Class>>) -> Self {
        Instance { class, fields: HashMap::new() }
    }

    /// Property lookup: a field if present, otherwise a method bound to the
    /// given instance handle.
    pub fn get(&self, name: &Token, instance: &Object) -> Result<Object, RuntimeError> {
        if let Some(field) = self.fields.get(&name.lexeme) {
            return Ok(field.clone());
        }

        if let Some(method) = self.class.borrow().find_method(&name.lexeme) {
            return Ok(Object::from(method.bind(instance.clone())));
        }

        Err(RuntimeError::new(name, format!("Undefined property '{}'", name.lexeme)))
    }

    /// Property assignment creates or overwrites a field.
    pub fn set(&mut self, name: &Token, value: Object) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<instance {}>", self.class.borrow().name)
    }
}

impl Display for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} instance", self.class.borrow().name)
    }
}
