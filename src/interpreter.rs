use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Write;
use std::mem;
use std::rc::Rc;

use crate::class::Class;
use crate::environment::Environment;
use crate::error::{RuntimeError, Unwind};
use crate::expr::{Expr, ExprVisitor};
use crate::function::{Function, NativeFunction};
use crate::literal::Literal;
use crate::object::Object;
use crate::stmt::{Stmt, StmtVisitor};
use crate::token::{Token, Type};

type EvalResult = Result<Object, RuntimeError>;
type ExecResult = Result<(), Unwind>;

/// Executes a resolved program against the environment chain.
///
/// Expressions evaluate to an `Object` or fail with a `RuntimeError`.
/// Statements may additionally unwind with a return value; the unwinding
/// stops at the innermost user-function call frame (see [`Function`]).
/// `print` writes to the injected output so callers can capture it.
pub struct Interpreter<'a> {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<usize, usize>,
    output: &'a mut dyn Write,
}

impl<'a> Interpreter<'a> {
    pub fn new(output: &'a mut dyn Write) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new(None)));

        for native in NativeFunction::globals() {
            let name = native.name.clone();
            globals.borrow_mut().define(&name, Object::from(native));
        }

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Merges the resolver's side table into the interpreter.
    /// Expression ids are process-wide so entries never collide, even when
    /// the REPL resolves one input at a time.
    pub fn resolve(&mut self, locals: HashMap<usize, usize>) {
        self.locals.extend(locals);
    }

    /// Runs the program to completion or to the first runtime error.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for statement in statements {
            match self.execute(statement) {
                Ok(()) => (),
                Err(Unwind::Error(error)) => return Err(error),
                Err(Unwind::Return(_)) => unreachable!("return outside of a function"),
            }
        }

        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> ExecResult {
        stmt.accept(self)
    }

    fn evaluate(&mut self, expr: &Expr) -> EvalResult {
        expr.accept(self)
    }

    /// Executes the statements in the given environment, restoring the
    /// caller's environment on every path out, including unwinding ones.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: Rc<RefCell<Environment>>) -> ExecResult {
        let previous = mem::replace(&mut self.environment, environment);

        let mut result = Ok(());
        for statement in statements {
            result = self.execute(statement);
            if result.is_err() {
                break;
            }
        }

        self.environment = previous;
        result
    }

    /// Reads a variable at the depth the resolver recorded, or from the
    /// globals when there is no entry.
    fn look_up_variable(&self, name: &Token, id: usize) -> EvalResult {
        match self.locals.get(&id) {
            Some(distance) => self.environment.borrow().get_at(*distance, name),
            None => self.globals.borrow().get(name),
        }
    }
}

impl<'a> ExprVisitor<EvalResult> for Interpreter<'a> {
    fn visit_literal_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Literal(literal) = expr else { unreachable!() };

        Ok(Object::Literal(literal.clone()))
    }

    fn visit_grouping_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Grouping(grouping) = expr else { unreachable!() };

        self.evaluate(&grouping.expr)
    }

    fn visit_unary_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Unary(unary) = expr else { unreachable!() };

        let right = self.evaluate(&unary.expr)?;

        match unary.operator.r#type {
            Type::Minus => (-right)
                .ok_or_else(|| RuntimeError::new(&unary.operator, "Operand must be a number")),
            Type::Bang => Ok(!right),
            _ => unreachable!(),
        }
    }

    fn visit_binary_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Binary(binary) = expr else { unreachable!() };

        let left = self.evaluate(&binary.left)?;
        let right = self.evaluate(&binary.right)?;
        let operator = &binary.operator;

        match operator.r#type {
            Type::Greater | Type::GreaterEqual | Type::Less | Type::LessEqual => {
                let ordering = left.partial_cmp(&right)
                    .ok_or_else(|| RuntimeError::new(operator, "Operands must be numbers"))?;

                Ok(Object::from(match operator.r#type {
                    Type::Greater => ordering == Ordering::Greater,
                    Type::GreaterEqual => ordering != Ordering::Less,
                    Type::Less => ordering == Ordering::Less,
                    Type::LessEqual => ordering != Ordering::Greater,
                    _ => unreachable!(),
                }))
            },
            Type::EqualEqual => Ok(Object::from(left == right)),
            Type::BangEqual => Ok(Object::from(left != right)),
            Type::Plus => (left + right)
                .ok_or_else(|| RuntimeError::new(operator, "Operands must be two numbers or two strings")),
            Type::Minus => (left - right)
                .ok_or_else(|| RuntimeError::new(operator, "Operands must be numbers")),
            Type::Star => (left * right)
                .ok_or_else(|| RuntimeError::new(operator, "Operands must be numbers")),
            Type::Slash => {
                if let Object::Literal(Literal::Number(divisor)) = &right {
                    if *divisor == 0.0 {
                        return Err(RuntimeError::new(operator, "Division by zero"));
                    }
                }

                (left / right).ok_or_else(|| RuntimeError::new(operator, "Operands must be numbers"))
            },
            _ => unreachable!(),
        }
    }

    fn visit_logical_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Logical(logical) = expr else { unreachable!() };

        let left = self.evaluate(&logical.left)?;

        // Short-circuit: the result is whichever operand decided it.
        match logical.operator.r#type {
            Type::Or if left.is_truthy() => Ok(left),
            Type::And if !left.is_truthy() => Ok(left),
            _ => self.evaluate(&logical.right),
        }
    }

    fn visit_variable_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Variable(variable) = expr else { unreachable!() };

        self.look_up_variable(&variable.name, variable.id)
    }

    fn visit_assign_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Assign(assign) = expr else { unreachable!() };

        let value = self.evaluate(&assign.value)?;

        match self.locals.get(&assign.id) {
            Some(distance) => {
                self.environment.borrow_mut().assign_at(*distance, &assign.name, value.clone());
            },
            None => self.globals.borrow_mut().assign(&assign.name, value.clone())?,
        }

        Ok(value)
    }

    fn visit_call_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Call(call) = expr else { unreachable!() };

        let callee = self.evaluate(&call.callee)?;

        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            arguments.push(self.evaluate(argument)?);
        }

        let Some(callable) = callee.as_callable() else {
            return Err(RuntimeError::new(&call.paren, "Can only call functions and classes"));
        };

        if arguments.len() != callable.arity() {
            return Err(RuntimeError::new(
                &call.paren,
                format!("Expected {} arguments but got {}", callable.arity(), arguments.len()),
            ));
        }

        callable.call(self, arguments)
    }

    fn visit_get_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Get(get) = expr else { unreachable!() };

        let object = self.evaluate(&get.object)?;

        match &object {
            Object::Instance(instance) => instance.borrow().get(&get.name, &object),
            _ => Err(RuntimeError::new(&get.name, "Only instances have properties")),
        }
    }

    fn visit_set_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Set(set) = expr else { unreachable!() };

        let object = self.evaluate(&set.object)?;

        let Object::Instance(instance) = object else {
            return Err(RuntimeError::new(&set.name, "Only instances have fields"));
        };

        let value = self.evaluate(&set.value)?;
        instance.borrow_mut().set(&set.name, value.clone());

        Ok(value)
    }

    fn visit_this_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::This(this) = expr else { unreachable!() };

        self.look_up_variable(&this.keyword, this.id)
    }

    fn visit_super_expr(&mut self, expr: &Expr) -> EvalResult {
        let Expr::Super(super_expr) = expr else { unreachable!() };

        // The resolver recorded the depth of the `super` frame; `this` lives
        // one frame closer to the method body.
        let distance = *self.locals.get(&super_expr.id)
            .expect("resolver to have recorded 'super'");

        let superclass = self.environment.borrow().get_at(distance, &Token::from("super"))?;
        let object = self.environment.borrow().get_at(distance - 1, &Token::from("this"))?;

        let Object::Class(superclass) = superclass else { unreachable!() };

        let method = superclass.borrow().find_method(&super_expr.method.lexeme);
        match method {
            Some(method) => Ok(Object::from(method.bind(object))),
            None => Err(RuntimeError::new(
                &super_expr.method,
                format!("Undefined property '{}'", super_expr.method.lexeme),
            )),
        }
    }
}

impl<'a> StmtVisitor<ExecResult> for Interpreter<'a> {
    fn visit_expression_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Expression(data) = stmt else { unreachable!() };

        self.evaluate(&data.expr)?;
        Ok(())
    }

    fn visit_print_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Print(data) = stmt else { unreachable!() };

        let value = self.evaluate(&data.expr)?;
        writeln!(self.output, "{value}").expect("write program output");

        Ok(())
    }

    fn visit_var_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Var(data) = stmt else { unreachable!() };

        let value = match &data.initializer {
            Some(initializer) => self.evaluate(initializer)?,
            None => Object::Literal(Literal::Nil),
        };

        self.environment.borrow_mut().define(&data.name.lexeme, value);
        Ok(())
    }

    fn visit_block_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Block(data) = stmt else { unreachable!() };

        let environment = Environment::new(Some(Rc::clone(&self.environment)));
        self.execute_block(&data.statements, Rc::new(RefCell::new(environment)))
    }

    fn visit_if_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::If(data) = stmt else { unreachable!() };

        if self.evaluate(&data.condition)?.is_truthy() {
            self.execute(&data.then_branch)?;
        } else if let Some(else_branch) = &data.else_branch {
            self.execute(else_branch)?;
        }

        Ok(())
    }

    fn visit_while_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::While(data) = stmt else { unreachable!() };

        while self.evaluate(&data.condition)?.is_truthy() {
            self.execute(&data.body)?;
        }

        Ok(())
    }

    fn visit_function_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Function(data) = stmt else { unreachable!() };

        let function = Function {
            name: data.name.clone(),
            params: data.params.clone(),
            body: data.body.clone(),
            closure: Rc::clone(&self.environment),
            is_initializer: false,
        };

        self.environment.borrow_mut().define(&data.name.lexeme, Object::from(function));
        Ok(())
    }

    fn visit_return_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Return(data) = stmt else { unreachable!() };

        let value = match &data.value {
            Some(expr) => self.evaluate(expr)?,
            None => Object::Literal(Literal::Nil),
        };

        Err(Unwind::Return(value))
    }

    fn visit_class_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        let Stmt::Class(data) = stmt else { unreachable!() };

        let superclass = match &data.superclass {
            Some(expr) => {
                let object = self.evaluate(expr)?;
                match object {
                    Object::Class(class) => Some(class),
                    _ => {
                        let Expr::Variable(variable) = expr else { unreachable!() };
                        return Err(RuntimeError::new(&variable.name, "Superclass must be a class").into());
                    }
                }
            },
            None => None,
        };

        self.environment.borrow_mut().define(&data.name.lexeme, Object::Literal(Literal::Nil));

        // Methods of a subclass close over an extra frame that binds `super`.
        let enclosing = if let Some(superclass) = &superclass {
            let previous = Rc::clone(&self.environment);
            let mut environment = Environment::new(Some(Rc::clone(&previous)));
            environment.define("super", Object::Class(Rc::clone(superclass)));
            self.environment = Rc::new(RefCell::new(environment));
            Some(previous)
        } else {
            None
        };

        let mut methods = HashMap::new();
        for method in &data.methods {
            let Stmt::Function(function) = method else { unreachable!() };

            let function = Function {
                name: function.name.clone(),
                params: function.params.clone(),
                body: function.body.clone(),
                closure: Rc::clone(&self.environment),
                is_initializer: function.name.lexeme == "init",
            };
            methods.insert(function.name.lexeme.clone(), function);
        }

        let class = Rc::new(RefCell::new(Class::new(data.name.lexeme.clone(), superclass, methods)));

        if let Some(previous) = enclosing {
            self.environment = previous;
        }

        self.environment.borrow_mut().assign(&data.name, Object::Class(class))?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expr::{BinaryData, GroupingData, UnaryData};

    fn token(r#type: Type, lexeme: &str) -> Token {
        Token::new(r#type, lexeme.to_string(), None, 1)
    }

    fn number(n: f64) -> Expr {
        Expr::Literal(Literal::Number(n))
    }

    fn string(s: &str) -> Expr {
        Expr::Literal(Literal::String(s.to_string()))
    }

    fn binary(left: Expr, operator: Token, right: Expr) -> Expr {
        Expr::Binary(BinaryData {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    #[test]
    fn evaluate_literal() {
        let mut output = Vec::new();
        let mut interpreter = Interpreter::new(&mut output);

        assert_eq!(interpreter.evaluate(&number(12.0)).unwrap(), Object::from(12.0));
    }

    #[test]
    fn evaluate_unary() {
        let mut output = Vec::new();
        let mut interpreter = Interpreter::new(&mut output);

        let expr = Expr::Unary(UnaryData {
            operator: token(Type::Minus, "-"),
            expr: Box::new(number(12.0)),
        });
        assert_eq!(interpreter.evaluate(&expr).unwrap(), Object::from(-12.0));
    }

    #[test]
    fn evaluate_unary_not_applies_truthiness() {
        let mut output = Vec::new();
        let mut interpreter = Interpreter::new(&mut output);

        let expr = Expr::Unary(UnaryData {
            operator: token(Type::Bang, "!"),
            expr: Box::new(Expr::Literal(Literal::Nil)),
        });
        assert_eq!(interpreter.evaluate(&expr).unwrap(), Object::from(true));
    }

    #[test]
    fn evaluate_grouping() {
        let mut output = Vec::new();
        let mut interpreter = Interpreter::new(&mut output);

        let expr = Expr::Grouping(GroupingData { expr: Box::new(number(12.0)) });
        assert_eq!(interpreter.evaluate(&expr).unwrap(), Object::from(12.0));
    }

    #[test]
    fn evaluate_arithmetic() {
        let mut output = Vec::new();
        let mut interpreter = Interpreter::new(&mut output);

        let expr = binary(
            number(6.0),
            token(Type::Minus, "-"),
            binary(number(12.0), token(Type::Minus, "-"), number(24.0)),
        );
        assert_eq!(interpreter.evaluate(&expr).unwrap(), Object::from(18.0));
    }

    #[test]
    fn evaluate_string_concatenation() {
        let mut output = Vec::new();
        let mut interpreter = Interpreter::new(&mut output);

        let expr = binary(string("Hello"), token(Type::Plus, "+"), string("World"));
        assert_eq!(interpreter.evaluate(&expr).unwrap(), Object::from("HelloWorld"));
    }

    #[test]
    fn adding_string_and_number_fails() {
        let mut output = Vec::new();
        let mut interpreter = Interpreter::new(&mut output);

        let expr = binary(string("Hello"), token(Type::Plus, "+"), number(12.0));
        let error = interpreter.evaluate(&expr).unwrap_err();
        assert_eq!(error.message, "Operands must be two numbers or two strings");
    }

    #[test]
    fn comparing_strings_fails() {
        let mut output = Vec::new();
        let mut interpreter = Interpreter::new(&mut output);

        let expr = binary(string("a"), token(Type::Less, "<"), string("b"));
        let error = interpreter.evaluate(&expr).unwrap_err();
        assert_eq!(error.message, "Operands must be numbers");
    }

    #[test]
    fn division_by_zero_fails() {
        let mut output = Vec::new();
        let mut interpreter = Interpreter::new(&mut output);

        let expr = binary(number(1.0), token(Type::Slash, "/"), number(0.0));
        let error = interpreter.evaluate(&expr).unwrap_err();
        assert_eq!(error.message, "Division by zero");
    }

    #[test]
    fn evaluate_comparisons() {
        let mut output = Vec::new();
        let mut interpreter = Interpreter::new(&mut output);

        let cases = [
            (Type::Greater, ">", false),
            (Type::GreaterEqual, ">=", true),
            (Type::Less, "<", false),
            (Type::LessEqual, "<=", true),
        ];

        for (r#type, lexeme, expected) in cases {
            let expr = binary(number(12.0), token(r#type, lexeme), number(12.0));
            assert_eq!(interpreter.evaluate(&expr).unwrap(), Object::from(expected));
        }
    }

    #[test]
    fn equality_of_mixed_types_is_false() {
        let mut output = Vec::new();
        let mut interpreter = Interpreter::new(&mut output);

        let expr = binary(number(1.0), token(Type::EqualEqual, "=="), string("1"));
        assert_eq!(interpreter.evaluate(&expr).unwrap(), Object::from(false));

        let expr = binary(
            Expr::Literal(Literal::Nil),
            token(Type::EqualEqual, "=="),
            Expr::Literal(Literal::Nil),
        );
        assert_eq!(interpreter.evaluate(&expr).unwrap(), Object::from(true));
    }
}
