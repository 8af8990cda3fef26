use crate::expr::{Expr, ExprVisitor};
use crate::stmt::{Stmt, StmtVisitor};

/// Returns a string representation of the expression in parentheses.
macro_rules! parenthesize {
    ( $self:ident, $name:expr, $( $x:expr ),+ ) => {
        {
            let mut string = String::new();
            string += "(";
            string += $name;
            $(
                string += " ";
                string += &$x.accept($self);
            )*
            string += ")";

            string
        }
    };
}

/// Pretty-prints the AST as s-expressions, one top-level statement per line.
pub struct ASTPrinter;

impl ASTPrinter {
    pub fn print(&mut self, statements: &[Stmt]) -> String {
        statements
            .iter()
            .map(|stmt| stmt.accept(self))
            .collect::<Vec<String>>()
            .join("\n")
    }
}

impl ExprVisitor<String> for ASTPrinter {
    fn visit_literal_expr(&mut self, expr: &Expr) -> String {
        let Expr::Literal(literal) = expr else { unreachable!() };

        literal.to_string()
    }

    fn visit_logical_expr(&mut self, expr: &Expr) -> String {
        let Expr::Logical(logical) = expr else { unreachable!() };

        parenthesize!(self, &logical.operator.lexeme, &logical.left, &logical.right)
    }

    fn visit_unary_expr(&mut self, expr: &Expr) -> String {
        let Expr::Unary(unary) = expr else { unreachable!() };

        parenthesize!(self, &unary.operator.lexeme, &unary.expr)
    }

    fn visit_binary_expr(&mut self, expr: &Expr) -> String {
        let Expr::Binary(binary) = expr else { unreachable!() };

        parenthesize!(self, &binary.operator.lexeme, &binary.left, &binary.right)
    }

    fn visit_grouping_expr(&mut self, expr: &Expr) -> String {
        let Expr::Grouping(grouping) = expr else { unreachable!() };

        parenthesize!(self, "group", grouping.expr)
    }

    fn visit_variable_expr(&mut self, expr: &Expr) -> String {
        let Expr::Variable(variable) = expr else { unreachable!() };

        variable.name.lexeme.clone()
    }

    fn visit_assign_expr(&mut self, expr: &Expr) -> String {
        let Expr::Assign(assign) = expr else { unreachable!() };

        parenthesize!(self, format!("= {}", &assign.name.lexeme).as_str(), assign.value)
    }

    fn visit_call_expr(&mut self, expr: &Expr) -> String {
        let Expr::Call(call) = expr else { unreachable!() };

        let mut string = String::new();
        string += &call.callee.accept(self);
        string += "(";
        for argument in &call.arguments {
            string += &argument.accept(self);
            string += " ";
        }
        string = string.trim_end().to_string();
        string += ")";
        string
    }

    fn visit_get_expr(&mut self, expr: &Expr) -> String {
        let Expr::Get(get) = expr else { unreachable!() };

        format!("(. {} {})", get.object.accept(self), get.name.lexeme)
    }

    fn visit_set_expr(&mut self, expr: &Expr) -> String {
        let Expr::Set(set) = expr else { unreachable!() };

        format!(
            "(.= {} {} {})",
            set.object.accept(self),
            set.name.lexeme,
            set.value.accept(self),
        )
    }

    fn visit_this_expr(&mut self, expr: &Expr) -> String {
        let Expr::This(_) = expr else { unreachable!() };

        "this".to_string()
    }

    fn visit_super_expr(&mut self, expr: &Expr) -> String {
        let Expr::Super(super_expr) = expr else { unreachable!() };

        format!("(super {})", super_expr.method.lexeme)
    }
}

impl StmtVisitor<String> for ASTPrinter {
    fn visit_expression_stmt(&mut self, stmt: &Stmt) -> String {
        let Stmt::Expression(data) = stmt else { unreachable!() };

        parenthesize!(self, "expr", data.expr)
    }

    fn visit_function_stmt(&mut self, stmt: &Stmt) -> String {
        let Stmt::Function(data) = stmt else { unreachable!() };

        let mut string = String::new();
        string += "(fun ";
        string += &data.name.lexeme;
        string += "(";
        for param in &data.params {
            string += &param.lexeme;
            string += " ";
        }
        string = string.trim_end().to_string();
        string += ") { ";
        string += &data.body.iter().map(|stmt| stmt.accept(self)).collect::<Vec<String>>().join(" ");
        string += " })";

        string
    }

    fn visit_if_stmt(&mut self, stmt: &Stmt) -> String {
        let Stmt::If(data) = stmt else { unreachable!() };

        let mut string = String::new();
        string += "(if ";
        string += &data.condition.accept(self);
        string += " ";
        string += &data.then_branch.accept(self);
        if let Some(else_branch) = &data.else_branch {
            string += " else ";
            string += &else_branch.accept(self);
        }
        string += ")";

        string
    }

    fn visit_print_stmt(&mut self, stmt: &Stmt) -> String {
        let Stmt::Print(data) = stmt else { unreachable!() };

        parenthesize!(self, "print", data.expr)
    }

    fn visit_return_stmt(&mut self, stmt: &Stmt) -> String {
        let Stmt::Return(data) = stmt else { unreachable!() };

        match &data.value {
            Some(value) => parenthesize!(self, "return", value),
            None => "(return)".to_string(),
        }
    }

    fn visit_var_stmt(&mut self, stmt: &Stmt) -> String {
        let Stmt::Var(data) = stmt else { unreachable!() };

        let mut string = String::new();
        string += "(var ";
        string += &data.name.lexeme;
        if let Some(initializer) = &data.initializer {
            string += " = ";
            string += &initializer.accept(self);
        }
        string += ")";

        string
    }

    fn visit_while_stmt(&mut self, stmt: &Stmt) -> String {
        let Stmt::While(data) = stmt else { unreachable!() };

        parenthesize!(self, "while", data.condition, data.body)
    }

    fn visit_block_stmt(&mut self, stmt: &Stmt) -> String {
        let Stmt::Block(data) = stmt else { unreachable!() };

        let mut string = String::new();
        string += "{";
        for stmt in &data.statements {
            string += " ";
            string += &stmt.accept(self);
        }
        string += " }";

        string
    }

    fn visit_class_stmt(&mut self, stmt: &Stmt) -> String {
        let Stmt::Class(data) = stmt else { unreachable!() };

        let mut string = String::new();
        string += "(class ";
        string += &data.name.lexeme;
        if let Some(superclass) = &data.superclass {
            string += " < ";
            string += &superclass.accept(self);
        }
        string += " { ";
        string += &data.methods.iter().map(|stmt| stmt.accept(self)).collect::<Vec<String>>().join(" ");
        string += " })";

        string
    }
}
