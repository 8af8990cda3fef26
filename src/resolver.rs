use std::collections::HashMap;
use std::mem;

use crate::error::Diagnostics;
use crate::expr::{Expr, ExprVisitor};
use crate::stmt::{Stmt, StmtVisitor};
use crate::token::Token;

enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

enum ClassType {
    None,
    Class,
    Subclass,
}

/// Walks the parsed program once and records, for every local variable use,
/// how many scopes lie between the use and the declaration. Both back ends
/// run after this pass: the interpreter consumes the side table, the emitter
/// relies on the scope rules having been enforced.
pub struct Resolver<'d> {
    diagnostics: &'d mut Diagnostics,
    scopes: Vec<HashMap<String, bool>>,
    locals: HashMap<usize, usize>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'d> Resolver<'d> {
    pub fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Resolver {
            diagnostics,
            scopes: vec![],
            locals: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    pub fn resolve(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement);
        }
    }

    /// Hands the finished side table to the consumer.
    pub fn into_locals(self) -> HashMap<usize, usize> {
        self.locals
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        stmt.accept(self);
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        expr.accept(self);
    }

    fn resolve_function(&mut self, function: &Stmt, r#type: FunctionType) {
        let Stmt::Function(function) = function else { unreachable!() };

        let enclosing_function = mem::replace(&mut self.current_function, r#type);

        self.begin_scope();
        for param in &function.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve(&function.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else { return };

        if scope.contains_key(&name.lexeme) {
            self.diagnostics.error_at(name, "Already a variable with this name in this scope");
        }
        scope.insert(name.lexeme.to_owned(), false);
    }

    fn define(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else { return };

        scope.insert(name.lexeme.to_owned(), true);
    }

    /// Records the depth of the innermost scope that declares the name.
    /// Names no scope declares are left to the globals at runtime.
    fn resolve_local(&mut self, id: usize, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.locals.insert(id, depth);
                return;
            }
        }
    }
}

impl<'d> ExprVisitor<()> for Resolver<'d> {
    fn visit_variable_expr(&mut self, expr: &Expr) {
        let Expr::Variable(variable) = expr else { unreachable!() };

        if let Some(scope) = self.scopes.last() {
            if scope.get(&variable.name.lexeme) == Some(&false) {
                self.diagnostics.error_at(
                    &variable.name,
                    "Can't read local variable in its own initializer",
                );
            }
        }

        self.resolve_local(variable.id, &variable.name);
    }

    fn visit_assign_expr(&mut self, expr: &Expr) {
        let Expr::Assign(assign) = expr else { unreachable!() };

        self.resolve_expr(&assign.value);
        self.resolve_local(assign.id, &assign.name);
    }

    fn visit_literal_expr(&mut self, expr: &Expr) {
        let Expr::Literal(_) = expr else { unreachable!() };
    }

    fn visit_logical_expr(&mut self, expr: &Expr) {
        let Expr::Logical(logical) = expr else { unreachable!() };

        self.resolve_expr(&logical.left);
        self.resolve_expr(&logical.right);
    }

    fn visit_unary_expr(&mut self, expr: &Expr) {
        let Expr::Unary(unary) = expr else { unreachable!() };

        self.resolve_expr(&unary.expr);
    }

    fn visit_binary_expr(&mut self, expr: &Expr) {
        let Expr::Binary(binary) = expr else { unreachable!() };

        self.resolve_expr(&binary.left);
        self.resolve_expr(&binary.right);
    }

    fn visit_grouping_expr(&mut self, expr: &Expr) {
        let Expr::Grouping(grouping) = expr else { unreachable!() };

        self.resolve_expr(&grouping.expr);
    }

    fn visit_call_expr(&mut self, expr: &Expr) {
        let Expr::Call(call) = expr else { unreachable!() };

        self.resolve_expr(&call.callee);

        for argument in &call.arguments {
            self.resolve_expr(argument);
        }
    }

    fn visit_get_expr(&mut self, expr: &Expr) {
        let Expr::Get(get) = expr else { unreachable!() };

        self.resolve_expr(&get.object);
    }

    fn visit_set_expr(&mut self, expr: &Expr) {
        let Expr::Set(set) = expr else { unreachable!() };

        self.resolve_expr(&set.value);
        self.resolve_expr(&set.object);
    }

    fn visit_this_expr(&mut self, expr: &Expr) {
        let Expr::This(this) = expr else { unreachable!() };

        if let ClassType::None = self.current_class {
            self.diagnostics.error_at(&this.keyword, "Can't use 'this' outside of a class");
            return;
        }

        self.resolve_local(this.id, &this.keyword);
    }

    fn visit_super_expr(&mut self, expr: &Expr) {
        let Expr::Super(super_expr) = expr else { unreachable!() };

        match self.current_class {
            ClassType::Subclass => (),
            ClassType::None => self.diagnostics.error_at(
                &super_expr.keyword,
                "Can't use 'super' outside of a class",
            ),
            ClassType::Class => self.diagnostics.error_at(
                &super_expr.keyword,
                "Can't use 'super' in a class with no superclass",
            ),
        }

        self.resolve_local(super_expr.id, &super_expr.keyword);
    }
}

impl<'d> StmtVisitor<()> for Resolver<'d> {
    fn visit_block_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Block(block) = stmt else { unreachable!() };

        self.begin_scope();
        self.resolve(&block.statements);
        self.end_scope();
    }

    fn visit_var_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Var(var) = stmt else { unreachable!() };

        self.declare(&var.name);
        if let Some(initializer) = &var.initializer {
            self.resolve_expr(initializer);
        }
        self.define(&var.name);
    }

    fn visit_function_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Function(function) = stmt else { unreachable!() };

        // The name is defined eagerly so the body can recurse.
        self.declare(&function.name);
        self.define(&function.name);

        self.resolve_function(stmt, FunctionType::Function);
    }

    fn visit_expression_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Expression(expression) = stmt else { unreachable!() };

        self.resolve_expr(&expression.expr);
    }

    fn visit_if_stmt(&mut self, stmt: &Stmt) {
        let Stmt::If(if_stmt) = stmt else { unreachable!() };

        self.resolve_expr(&if_stmt.condition);
        self.resolve_stmt(&if_stmt.then_branch);
        if let Some(else_branch) = &if_stmt.else_branch {
            self.resolve_stmt(else_branch);
        }
    }

    fn visit_print_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Print(print) = stmt else { unreachable!() };

        self.resolve_expr(&print.expr);
    }

    fn visit_return_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Return(return_stmt) = stmt else { unreachable!() };

        if let FunctionType::None = self.current_function {
            self.diagnostics.error_at(&return_stmt.keyword, "Can't return from top-level code");
        }

        if let Some(value) = &return_stmt.value {
            if let FunctionType::Initializer = self.current_function {
                self.diagnostics.error_at(
                    &return_stmt.keyword,
                    "Can't return a value from an initializer",
                );
                return;
            }

            self.resolve_expr(value);
        }
    }

    fn visit_while_stmt(&mut self, stmt: &Stmt) {
        let Stmt::While(while_stmt) = stmt else { unreachable!() };

        self.resolve_expr(&while_stmt.condition);
        self.resolve_stmt(&while_stmt.body);
    }

    fn visit_class_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Class(class_stmt) = stmt else { unreachable!() };

        let enclosing_class = mem::replace(&mut self.current_class, ClassType::Class);

        self.declare(&class_stmt.name);
        self.define(&class_stmt.name);

        if let Some(superclass) = &class_stmt.superclass {
            let Expr::Variable(variable) = superclass else { unreachable!() };

            if class_stmt.name.lexeme == variable.name.lexeme {
                self.diagnostics.error_at(&variable.name, "A class can't inherit from itself");
            }

            self.current_class = ClassType::Subclass;

            self.resolve_expr(superclass);

            self.begin_scope();
            self.scopes
                .last_mut()
                .expect("scope stack to be non-empty")
                .insert("super".to_string(), true);
        }

        self.begin_scope();
        self.scopes
            .last_mut()
            .expect("scope stack to be non-empty")
            .insert("this".to_string(), true);

        for method in &class_stmt.methods {
            let Stmt::Function(function) = method else { unreachable!() };

            let declaration = if function.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, declaration);
        }

        self.end_scope();

        if class_stmt.superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }
}
