use std::collections::{HashMap, HashSet};
use std::mem;

use crate::expr::{Expr, ExprVisitor};
use crate::literal::Literal;
use crate::stmt::{FunctionData, Stmt, StmtVisitor};
use crate::token::Type;

/// The C++ runtime header emitted programs are compiled against.
/// The compile driver writes it next to the generated translation unit.
pub const RUNTIME_HEADER: &str = include_str!("runtime/klox_runtime.hpp");

pub const RUNTIME_HEADER_NAME: &str = "klox_runtime.hpp";

#[derive(Clone, Copy, PartialEq)]
enum ClassContext {
    None,
    Class,
    Subclass,
}

#[derive(Clone, Copy, PartialEq)]
enum FunctionKind {
    Function,
    Method,
    Initializer,
}

/// Translates a resolved program into a C++ translation unit.
///
/// Statements write indented lines into the output buffer; expressions
/// produce C++ expression strings over the runtime helpers. Every source
/// binding gets a fresh target identifier from a per-name counter that is
/// never reset, so shadowing and sibling scopes can't collide.
pub struct Emitter {
    output: String,
    indent: usize,
    scopes: Vec<HashMap<String, String>>,
    name_counts: HashMap<String, usize>,
    temp_count: usize,
    aliases: HashMap<String, String>,
    classes: HashSet<String>,
    current_class: ClassContext,
    current_superclass: Option<String>,
    current_function: FunctionKind,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter {
            output: String::new(),
            indent: 0,
            scopes: vec![],
            name_counts: HashMap::new(),
            temp_count: 0,
            aliases: HashMap::new(),
            classes: HashSet::new(),
            current_class: ClassContext::None,
            current_superclass: None,
            current_function: FunctionKind::Function,
        }
    }

    /// Emits the whole program as the body of `main`.
    pub fn emit(&mut self, statements: &[Stmt]) -> String {
        self.line("#include \"klox_runtime.hpp\"");
        self.blank();
        self.line("using namespace klox;");
        self.blank();
        self.line("int main() {");
        self.indent += 1;
        self.begin_scope();

        // The single builtin, bound like any other global.
        let clock = self.declare("clock");
        self.line(&format!(
            "Value {clock} = make_function(0, [](std::vector<Value>& args) -> Value {{ (void)args; return clock_native(); }});"
        ));
        self.blank();

        for statement in statements {
            self.emit_stmt(statement);
        }

        self.blank();
        self.line("return 0;");
        self.end_scope();
        self.indent -= 1;
        self.line("}");

        mem::take(&mut self.output)
    }

    fn emit_stmt(&mut self, stmt: &Stmt) {
        stmt.accept(self)
    }

    fn emit_expr(&mut self, expr: &Expr) -> String {
        expr.accept(self)
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn blank(&mut self) {
        self.output.push('\n');
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Mints a fresh target identifier for a source name and binds it in the
    /// current scope.
    fn declare(&mut self, name: &str) -> String {
        let count = self.name_counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        let id = format!("{name}_{count}");

        self.scopes
            .last_mut()
            .expect("scope stack to be non-empty")
            .insert(name.to_string(), id.clone());

        id
    }

    /// Resolves a source name to its target identifier, innermost scope
    /// first. Names never declared fall through untranslated; the C++
    /// compiler rejects them just like the evaluator would at runtime.
    fn lookup(&self, name: &str) -> String {
        for scope in self.scopes.iter().rev() {
            if let Some(id) = scope.get(name) {
                return id.clone();
            }
        }

        name.to_string()
    }

    fn temp(&mut self) -> String {
        self.temp_count += 1;
        format!("t{}", self.temp_count)
    }

    /// Produces an instance-pointer expression for a property target,
    /// reusing the alias a constructor-initialized variable carries. The
    /// caller picks the lift helper, since gets and sets fail with
    /// different messages.
    fn instance_expr(&mut self, object: &Expr, lift: &str) -> String {
        if let Expr::Variable(variable) = object {
            let id = self.lookup(&variable.name.lexeme);
            if let Some(alias) = self.aliases.get(&id) {
                return alias.clone();
            }
            return format!("{lift}({id})");
        }

        let text = self.emit_expr(object);
        format!("{lift}({text})")
    }

    /// Emits a function or method body as a runtime closure. The `open` line
    /// carries the binding; the body is indented between the braces.
    fn emit_callable(&mut self, data: &FunctionData, kind: FunctionKind, open: &str) {
        self.line(open);
        self.indent += 1;
        self.begin_scope();

        let enclosing = mem::replace(&mut self.current_function, kind);

        // Methods receive the instance in slot 0; parameters follow.
        let offset = match kind {
            FunctionKind::Function => 0,
            FunctionKind::Method | FunctionKind::Initializer => {
                let this = self.declare("this");
                self.line(&format!("Value {this} = args[0];"));
                1
            }
        };

        for (slot, param) in data.params.iter().enumerate() {
            let id = self.declare(&param.lexeme);
            self.line(&format!("Value {id} = args[{}];", slot + offset));
        }

        for statement in &data.body {
            self.emit_stmt(statement);
        }

        match kind {
            FunctionKind::Initializer => {
                let this = self.lookup("this");
                self.line(&format!("return {this};"));
            }
            _ => self.line("return Value();"),
        }

        self.current_function = enclosing;

        self.end_scope();
        self.indent -= 1;
        self.line("});");
    }

    fn format_number(value: f64) -> String {
        if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
            format!("{}", value as i64)
        } else {
            format!("{value}")
        }
    }

    fn format_string(value: &str) -> String {
        let mut escaped = String::with_capacity(value.len() + 2);
        escaped.push('"');
        for c in value.chars() {
            match c {
                '\\' => escaped.push_str("\\\\"),
                '"' => escaped.push_str("\\\""),
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                '\t' => escaped.push_str("\\t"),
                _ => escaped.push(c),
            }
        }
        escaped.push('"');
        escaped
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns if evaluating the expression can have no observable effect, in
/// which case the statement around it is dropped.
fn is_pure(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(_) | Expr::Variable(_) | Expr::This(_) => true,
        Expr::Grouping(grouping) => is_pure(&grouping.expr),
        Expr::Unary(unary) => is_pure(&unary.expr),
        Expr::Binary(binary) => is_pure(&binary.left) && is_pure(&binary.right),
        Expr::Logical(logical) => is_pure(&logical.left) && is_pure(&logical.right),
        _ => false,
    }
}

impl ExprVisitor<String> for Emitter {
    fn visit_literal_expr(&mut self, expr: &Expr) -> String {
        let Expr::Literal(literal) = expr else { unreachable!() };

        match literal {
            Literal::Number(n) => format!("Value({})", Emitter::format_number(*n)),
            Literal::String(s) => format!("Value({})", Emitter::format_string(s)),
            Literal::Bool(true) => "Value(true)".to_string(),
            Literal::Bool(false) => "Value(false)".to_string(),
            Literal::Nil => "Value()".to_string(),
        }
    }

    fn visit_grouping_expr(&mut self, expr: &Expr) -> String {
        let Expr::Grouping(grouping) = expr else { unreachable!() };

        let inner = self.emit_expr(&grouping.expr);
        format!("({inner})")
    }

    fn visit_unary_expr(&mut self, expr: &Expr) -> String {
        let Expr::Unary(unary) = expr else { unreachable!() };

        let operand = self.emit_expr(&unary.expr);
        match unary.operator.r#type {
            Type::Minus => format!("negate({operand})"),
            Type::Bang => format!("notOp({operand})"),
            _ => unreachable!(),
        }
    }

    fn visit_binary_expr(&mut self, expr: &Expr) -> String {
        let Expr::Binary(binary) = expr else { unreachable!() };

        let left = self.emit_expr(&binary.left);
        let right = self.emit_expr(&binary.right);

        let helper = match binary.operator.r#type {
            Type::Plus => "add",
            Type::Minus => "subtract",
            Type::Star => "multiply",
            Type::Slash => "divide",
            Type::Greater => "greater",
            Type::GreaterEqual => "greater_equal",
            Type::Less => "less",
            Type::LessEqual => "less_equal",
            Type::EqualEqual => "equal",
            Type::BangEqual => "not_equal",
            _ => unreachable!(),
        };

        format!("{helper}({left}, {right})")
    }

    fn visit_logical_expr(&mut self, expr: &Expr) -> String {
        let Expr::Logical(logical) = expr else { unreachable!() };

        let temp = self.temp();
        let left = self.emit_expr(&logical.left);
        let right = self.emit_expr(&logical.right);

        // Short-circuit as an immediately invoked closure so the right side
        // only evaluates when the left did not decide the result.
        let test = match logical.operator.r#type {
            Type::Or => format!("isTruthy({temp})"),
            Type::And => format!("!isTruthy({temp})"),
            _ => unreachable!(),
        };

        format!("[&]() -> Value {{ Value {temp} = {left}; if ({test}) return {temp}; return {right}; }}()")
    }

    fn visit_variable_expr(&mut self, expr: &Expr) -> String {
        let Expr::Variable(variable) = expr else { unreachable!() };

        self.lookup(&variable.name.lexeme)
    }

    fn visit_assign_expr(&mut self, expr: &Expr) -> String {
        let Expr::Assign(assign) = expr else { unreachable!() };

        let value = self.emit_expr(&assign.value);
        let id = self.lookup(&assign.name.lexeme);
        format!("({id} = {value})")
    }

    fn visit_call_expr(&mut self, expr: &Expr) -> String {
        let Expr::Call(call) = expr else { unreachable!() };

        let arguments = call.arguments
            .iter()
            .map(|argument| argument.accept(self))
            .collect::<Vec<String>>()
            .join(", ");

        match call.callee.as_ref() {
            // A property callee dispatches through the instance so fields
            // holding callables and methods both work.
            Expr::Get(get) => {
                let instance = self.instance_expr(&get.object, "instance_of");
                format!("call_method({instance}, \"{}\", {{{arguments}}})", get.name.lexeme)
            }
            // A super callee binds the method freshly and invokes it.
            Expr::Super(super_expr) => {
                let superclass = self.current_superclass.clone()
                    .expect("super to only appear inside a subclass");
                let this = self.lookup("this");
                format!(
                    "bind_super({superclass}, {this}, \"{}\")->call({{{arguments}}})",
                    super_expr.method.lexeme,
                )
            }
            _ => {
                let callee = self.emit_expr(&call.callee);
                format!("as_callable({callee})->call({{{arguments}}})")
            }
        }
    }

    fn visit_get_expr(&mut self, expr: &Expr) -> String {
        let Expr::Get(get) = expr else { unreachable!() };

        if let Expr::Variable(variable) = get.object.as_ref() {
            let id = self.lookup(&variable.name.lexeme);
            if let Some(alias) = self.aliases.get(&id) {
                return format!("{alias}->get(\"{}\")", get.name.lexeme);
            }
        }

        let object = self.emit_expr(&get.object);
        format!("get_field({object}, \"{}\")", get.name.lexeme)
    }

    fn visit_set_expr(&mut self, expr: &Expr) -> String {
        let Expr::Set(set) = expr else { unreachable!() };

        let instance = self.instance_expr(&set.object, "fields_of");
        let value = self.emit_expr(&set.value);
        format!("set_field({instance}, \"{}\", {value})", set.name.lexeme)
    }

    fn visit_this_expr(&mut self, expr: &Expr) -> String {
        let Expr::This(_) = expr else { unreachable!() };

        self.lookup("this")
    }

    fn visit_super_expr(&mut self, expr: &Expr) -> String {
        let Expr::Super(super_expr) = expr else { unreachable!() };

        let superclass = self.current_superclass.clone()
            .expect("super to only appear inside a subclass");
        let this = self.lookup("this");
        format!("Value(bind_super({superclass}, {this}, \"{}\"))", super_expr.method.lexeme)
    }
}

impl StmtVisitor<()> for Emitter {
    fn visit_expression_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Expression(data) = stmt else { unreachable!() };

        if is_pure(&data.expr) {
            return;
        }

        let text = self.emit_expr(&data.expr);
        self.line(&format!("{text};"));
    }

    fn visit_print_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Print(data) = stmt else { unreachable!() };

        let text = self.emit_expr(&data.expr);
        self.line(&format!("PRINT({text});"));
    }

    fn visit_var_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Var(data) = stmt else { unreachable!() };

        // A constructor call gets the INSTANCE pattern: the tagged value and
        // an instance-pointer alias for later property traffic.
        if let Some(Expr::Call(call)) = &data.initializer {
            if let Expr::Variable(callee) = call.callee.as_ref() {
                if self.classes.contains(&callee.name.lexeme) {
                    let initializer = self.emit_expr(data.initializer.as_ref().unwrap());
                    let id = self.declare(&data.name.lexeme);
                    self.line(&format!("INSTANCE({id}, {initializer});"));
                    self.aliases.insert(id.clone(), format!("{id}_obj"));
                    return;
                }
            }
        }

        let initializer = match &data.initializer {
            Some(expr) => self.emit_expr(expr),
            None => "Value()".to_string(),
        };
        let id = self.declare(&data.name.lexeme);
        self.line(&format!("Value {id} = {initializer};"));
    }

    fn visit_block_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Block(data) = stmt else { unreachable!() };

        self.line("{");
        self.indent += 1;
        self.begin_scope();

        for statement in &data.statements {
            self.emit_stmt(statement);
        }

        self.end_scope();
        self.indent -= 1;
        self.line("}");
    }

    fn visit_if_stmt(&mut self, stmt: &Stmt) {
        let Stmt::If(data) = stmt else { unreachable!() };

        let condition = self.emit_expr(&data.condition);
        self.line(&format!("if (isTruthy({condition})) {{"));
        self.indent += 1;
        self.begin_scope();
        self.emit_stmt(&data.then_branch);
        self.end_scope();
        self.indent -= 1;

        if let Some(else_branch) = &data.else_branch {
            self.line("} else {");
            self.indent += 1;
            self.begin_scope();
            self.emit_stmt(else_branch);
            self.end_scope();
            self.indent -= 1;
        }

        self.line("}");
    }

    fn visit_while_stmt(&mut self, stmt: &Stmt) {
        let Stmt::While(data) = stmt else { unreachable!() };

        let condition = self.emit_expr(&data.condition);
        self.line(&format!("while (isTruthy({condition})) {{"));
        self.indent += 1;
        self.begin_scope();
        self.emit_stmt(&data.body);
        self.end_scope();
        self.indent -= 1;
        self.line("}");
    }

    fn visit_function_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Function(data) = stmt else { unreachable!() };

        // Declared before the body so the function can call itself.
        let id = self.declare(&data.name.lexeme);
        let open = format!(
            "Value {id} = make_function({}, [&](std::vector<Value>& args) -> Value {{",
            data.params.len(),
        );
        self.emit_callable(data, FunctionKind::Function, &open);
    }

    fn visit_return_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Return(data) = stmt else { unreachable!() };

        // Initializers yield the bound instance on every path.
        if self.current_function == FunctionKind::Initializer {
            let this = self.lookup("this");
            self.line(&format!("return {this};"));
            return;
        }

        match &data.value {
            Some(value) => {
                let text = self.emit_expr(value);
                self.line(&format!("return Value({text});"));
            }
            None => self.line("return nullptr;"),
        }
    }

    fn visit_class_stmt(&mut self, stmt: &Stmt) {
        let Stmt::Class(data) = stmt else { unreachable!() };

        // The superclass resolves in the enclosing scope, before the class
        // name shadows anything.
        let superclass = data.superclass.as_ref().map(|superclass| self.emit_expr(superclass));

        let id = self.declare(&data.name.lexeme);
        self.classes.insert(data.name.lexeme.clone());

        // Declared nil-first and assigned after the methods, so method
        // bodies can name their own class.
        self.line(&format!("Value {id};"));

        let map = format!("{id}_methods");
        self.line(&format!("MethodMap {map};"));

        let enclosing_class = mem::replace(
            &mut self.current_class,
            if superclass.is_some() { ClassContext::Subclass } else { ClassContext::Class },
        );
        let enclosing_superclass = mem::replace(&mut self.current_superclass, superclass.clone());

        for method in &data.methods {
            let Stmt::Function(function) = method else { unreachable!() };

            let kind = if function.name.lexeme == "init" {
                FunctionKind::Initializer
            } else {
                FunctionKind::Method
            };
            let open = format!(
                "{map}[\"{}\"] = make_method({}, [&](std::vector<Value>& args) -> Value {{",
                function.name.lexeme,
                function.params.len(),
            );
            self.emit_callable(function, kind, &open);
        }

        self.current_class = enclosing_class;
        self.current_superclass = enclosing_superclass;

        let superclass_arg = match &superclass {
            Some(superclass) => format!("class_of({superclass})"),
            None => "nullptr".to_string(),
        };
        self.line(&format!(
            "{id} = make_class(\"{}\", {superclass_arg}, {map});",
            data.name.lexeme,
        ));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Diagnostics;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn emit(source: &str) -> String {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
        let statements = Parser::new(tokens, &mut diagnostics).parse();
        assert!(!diagnostics.had_error());

        Emitter::new().emit(&statements)
    }

    #[test]
    fn emit_arithmetic_print() {
        let output = emit("print 1 + 2 * 3;");
        assert!(output.contains("PRINT(add(Value(1), multiply(Value(2), Value(3))));"));
    }

    #[test]
    fn emit_program_frame() {
        let output = emit("print 1;");
        assert!(output.contains("#include \"klox_runtime.hpp\""));
        assert!(output.contains("using namespace klox;"));
        assert!(output.contains("int main() {"));
        assert!(output.contains("return 0;"));
    }

    #[test]
    fn emit_var_declaration() {
        let output = emit("var a = \"hi\";");
        assert!(output.contains("Value a_1 = Value(\"hi\");"));
    }

    #[test]
    fn effect_free_statements_are_dropped() {
        let output = emit("1 + 2;");
        assert!(!output.contains("add("));
    }

    #[test]
    fn sibling_scopes_get_distinct_identifiers() {
        let output = emit("{ var a = 1; print a; } { var a = 2; print a; }");
        assert!(output.contains("Value a_1 = Value(1);"));
        assert!(output.contains("PRINT(a_1);"));
        assert!(output.contains("Value a_2 = Value(2);"));
        assert!(output.contains("PRINT(a_2);"));
    }

    #[test]
    fn emit_function_with_parameters() {
        let output = emit("fun sum(a, b) { return a + b; } print sum(1, 2);");
        assert!(output.contains("Value sum_1 = make_function(2, [&](std::vector<Value>& args) -> Value {"));
        assert!(output.contains("Value a_1 = args[0];"));
        assert!(output.contains("Value b_1 = args[1];"));
        assert!(output.contains("return Value(add(a_1, b_1));"));
        assert!(output.contains("PRINT(as_callable(sum_1)->call({Value(1), Value(2)}));"));
    }

    #[test]
    fn functions_fall_through_to_nil() {
        let output = emit("fun noop() {}");
        assert!(output.contains("return Value();"));
    }

    #[test]
    fn bare_return_emits_nullptr() {
        let output = emit("fun f() { return; }");
        assert!(output.contains("return nullptr;"));
    }

    #[test]
    fn emit_while_with_truthiness_test() {
        let output = emit("var i = 0; while (i < 3) { i = i + 1; }");
        assert!(output.contains("while (isTruthy(less(i_1, Value(3)))) {"));
        assert!(output.contains("(i_1 = add(i_1, Value(1)));"));
    }

    #[test]
    fn logical_operators_short_circuit() {
        let output = emit("print 1 or 2;");
        assert!(output.contains("Value t1 = Value(1); if (isTruthy(t1)) return t1; return Value(2);"));

        let output = emit("print 1 and 2;");
        assert!(output.contains("if (!isTruthy(t1)) return t1;"));
    }

    #[test]
    fn emit_class_with_method_and_instance_alias() {
        let output = emit("class A { hi() { print this; } } var a = A(); a.hi();");
        assert!(output.contains("MethodMap A_1_methods;"));
        assert!(output.contains("A_1_methods[\"hi\"] = make_method(0, [&](std::vector<Value>& args) -> Value {"));
        assert!(output.contains("Value this_1 = args[0];"));
        assert!(output.contains("PRINT(this_1);"));
        assert!(output.contains("Value A_1;"));
        assert!(output.contains("A_1 = make_class(\"A\", nullptr, A_1_methods);"));
        assert!(output.contains("INSTANCE(a_1, as_callable(A_1)->call({}));"));
        assert!(output.contains("call_method(a_1_obj, \"hi\", {});"));
    }

    #[test]
    fn initializer_returns_the_bound_instance() {
        let output = emit("class P { init(x) { this.x = x; } }");
        assert!(output.contains("P_1_methods[\"init\"] = make_method(1, [&](std::vector<Value>& args) -> Value {"));
        assert!(output.contains("Value this_1 = args[0];"));
        assert!(output.contains("Value x_1 = args[1];"));
        assert!(output.contains("set_field(fields_of(this_1), \"x\", x_1);"));
        assert!(output.contains("return this_1;"));
    }

    #[test]
    fn super_calls_bind_the_superclass_method() {
        let output = emit(
            "class A { greet() { print \"hi\"; } } \
             class B < A { greet() { super.greet(); } }",
        );
        assert!(output.contains("B_1 = make_class(\"B\", class_of(A_1), B_1_methods);"));
        assert!(output.contains("bind_super(A_1, this_2, \"greet\")->call({});"));
    }

    #[test]
    fn methods_can_construct_their_own_class() {
        let output = emit("class Node { make() { return Node(); } }");

        // The class value is declared before the method lambdas that
        // capture it and assigned after them.
        let declaration = output.find("Value Node_1;").unwrap();
        let method = output.find("Node_1_methods[\"make\"]").unwrap();
        let assignment = output.find("Node_1 = make_class(\"Node\", nullptr, Node_1_methods);").unwrap();
        assert!(declaration < method);
        assert!(method < assignment);
        assert!(output.contains("return Value(as_callable(Node_1)->call({}));"));
    }

    #[test]
    fn property_access_on_arbitrary_expressions_lifts_the_value() {
        let output = emit("class A {} print A().x;");
        assert!(output.contains("PRINT(get_field(as_callable(A_1)->call({}), \"x\"));"));
    }

    #[test]
    fn clock_is_bound_in_the_prelude() {
        let output = emit("print clock();");
        assert!(output.contains("Value clock_1 = make_function(0,"));
        assert!(output.contains("PRINT(as_callable(clock_1)->call({}));"));
    }
}
