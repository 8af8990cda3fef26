use crate::error::{Diagnostics, ParseError};
use crate::expr::{self, *};
use crate::literal::Literal;
use crate::stmt::*;
use crate::token::{Token, Type};

type ParseResult<T> = Result<T, ParseError>;

/// Returns if the next token is any of the given types and consumes it.
macro_rules! matches {
    ( $self:ident, $( $type:expr ),+ ) => {
        {
            if $( $self.check($type) ) ||* {
                $self.advance();
                true
            } else {
                false
            }
        }
    }
}

/// Parses the tokens and returns the resulting statements.
///
/// - Program     -> Declaration* EOF ;
/// - Block       -> "{" Declaration* "}" ;
/// - Declaration -> ClassDecl | FunDecl | VarDecl | Statement ;
/// - ClassDecl   -> "class" IDENTIFIER ( "<" IDENTIFIER )? "{" Function* "}" ;
/// - FunDecl     -> "fun" Function ;
/// - VarDecl     -> "var" IDENTIFIER "=" Expression ";" ;
/// - Function    -> IDENTIFIER "(" Parameters? ")" Block ;
/// - Parameters  -> IDENTIFIER ( "," IDENTIFIER )* ;
/// - Statement   -> ExprStmt | ForStmt | IfStmt | PrintStmt | ReturnStmt | WhileStmt | Block ;
/// - ExprStmt    -> Expression ";" ;
/// - ForStmt     -> "for" "(" ( VarDecl | ExprStmt | ";" ) Expression? ";" Expression? ")" Statement ;
/// - IfStmt      -> "if" "(" Expression ")" Statement ( "else" Statement )? ;
/// - PrintStmt   -> "print" Expression ";" ;
/// - ReturnStmt  -> "return" Expression? ";" ;
/// - WhileStmt   -> "while" "(" Expression ")" Statement ;
/// - Expression  -> Assignment ;
/// - Assignment  -> ( Call "." )? IDENTIFIER "=" Assignment | LogicOr ;
/// - LogicOr     -> LogicAnd ( "or" LogicAnd )* ;
/// - LogicAnd    -> Equality ( "and" Equality )* ;
/// - Equality    -> Comparison ( ( "!=" | "==" ) Comparison )* ;
/// - Comparison  -> Term ( ( ">" | ">=" | "<" | "<=" ) Term )* ;
/// - Term        -> Factor ( ( "+" | "-" ) Factor )* ;
/// - Factor      -> Unary ( ( "*" | "/" ) Unary )* ;
/// - Unary       -> ( "!" | "-" ) Unary | Call ;
/// - Arguments   -> Expression ( "," Expression )* ;
/// - Call        -> Primary ( "(" Arguments? ")" | "." IDENTIFIER )* ;
/// - Primary     -> NUMBER | STRING | "false" | "true" | "nil" | "this" | "(" Expression ")" | IDENTIFIER | "super" "." IDENTIFIER ;
pub struct Parser<'d> {
    tokens: Vec<Token>,
    current: usize,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Parser<'d> {
    pub fn new(tokens: Vec<Token>, diagnostics: &'d mut Diagnostics) -> Self {
        Parser {
            tokens,
            current: 0,
            diagnostics,
        }
    }

    /// Parses the tokens and returns the statements that parsed cleanly.
    /// Parse errors are reported to the sink and the offending declaration
    /// is skipped after synchronization.
    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        statements
    }

    /// Returns the next token without consuming it.
    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    /// Returns the previous token without consuming it.
    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    /// Returns if the parser has reached the end of the file.
    fn is_at_end(&self) -> bool {
        self.peek().r#type == Type::EOF
    }

    /// Returns if the next token is of the given type.
    fn check(&self, r#type: Type) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().r#type == r#type
    }

    /// Consumes the next token and returns it.
    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    /// Consumes the next token if it is of the given type.
    fn consume(&mut self, r#type: Type, message: &str) -> ParseResult<&Token> {
        if self.check(r#type) {
            return Ok(self.advance());
        }

        Err(ParseError {
            token: self.peek().clone(),
            message: message.to_string(),
        })
    }

    /// Parses a declaration.
    fn declaration(&mut self) -> Option<Stmt> {
        let statement = if matches!(self, Type::Class) {
            self.class_declaration()
        } else if matches!(self, Type::Fun) {
            self.function("function")
        } else if matches!(self, Type::Var) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match statement {
            Ok(stmt) => Some(stmt),
            Err(error) => {
                self.diagnostics.error_at(&error.token, &error.message);
                self.synchronize();
                None
            }
        }
    }

    /// Parses a class declaration.
    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(Type::Identifier, "Expect class name")?.clone();

        let superclass = if matches!(self, Type::Less) {
            self.consume(Type::Identifier, "Expect superclass name")?;
            Some(Expr::Variable(VariableData {
                id: expr::next_id(),
                name: self.previous().clone(),
            }))
        } else {
            None
        };

        self.consume(Type::LeftBrace, "Expect '{' before class body")?;

        let mut methods: Vec<Stmt> = vec![];
        while !self.check(Type::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(Type::RightBrace, "Expect '}' after class body")?;

        Ok(Stmt::Class(ClassData { name, superclass, methods }))
    }

    /// Parses a variable declaration.
    /// Declarations always carry an initializer; `var x;` is rejected.
    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(Type::Identifier, "Expect variable name")?.clone();

        self.consume(Type::Equal, "Expect '=' after variable name")?;
        let initializer = self.expression()?;

        self.consume(Type::Semicolon, "Expect ';' after variable declaration")?;
        Ok(Stmt::Var(VarData { name, initializer: Some(initializer) }))
    }

    /// Parses a statement.
    fn statement(&mut self) -> ParseResult<Stmt> {
        if matches!(self, Type::For) {
            return self.for_statement();
        }

        if matches!(self, Type::If) {
            return self.if_statement();
        }

        if matches!(self, Type::Print) {
            return self.print_statement();
        }

        if matches!(self, Type::Return) {
            return self.return_statement();
        }

        if matches!(self, Type::While) {
            return self.while_statement();
        }

        if matches!(self, Type::LeftBrace) {
            return Ok(Stmt::Block(BlockData { statements: self.block()? }));
        }

        self.expression_statement()
    }

    /// Parses a for statement by desugaring it into a while loop.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(Type::LeftParen, "Expect '(' after 'for'")?;

        let initializer = if matches!(self, Type::Semicolon) {
            None
        } else if matches!(self, Type::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = match !self.check(Type::Semicolon) {
            true => Some(self.expression()?),
            false => None,
        };
        self.consume(Type::Semicolon, "Expect ';' after loop condition")?;

        let increment = match !self.check(Type::RightParen) {
            true => Some(self.expression()?),
            false => None,
        };
        self.consume(Type::RightParen, "Expect ')' after for clauses")?;

        let mut body = self.statement()?;

        // Execute the increment after the body.
        if let Some(increment) = increment {
            body = Stmt::Block(BlockData {
                statements: vec![
                    body,
                    Stmt::Expression(ExpressionData { expr: increment }),
                ],
            });
        }

        // Wrap the body into a while loop.
        // If there is no condition, use true.
        body = Stmt::While(WhileData {
            condition: condition.unwrap_or(Expr::Literal(Literal::Bool(true))),
            body: Box::new(body),
        });

        // Add the initializer before the loop if there is one.
        if let Some(initializer) = initializer {
            body = Stmt::Block(BlockData {
                statements: vec![initializer, body],
            });
        }

        Ok(body)
    }

    /// Parses an if statement.
    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(Type::LeftParen, "Expect '(' after 'if'")?;
        let condition = self.expression()?;
        self.consume(Type::RightParen, "Expect ')' after if condition")?;

        let then_branch = Box::new(self.statement()?);
        let mut else_branch: Option<Box<Stmt>> = None;
        if matches!(self, Type::Else) {
            else_branch = Some(Box::new(self.statement()?));
        }

        Ok(Stmt::If(IfData { condition, then_branch, else_branch }))
    }

    /// Parses a print statement.
    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(Type::Semicolon, "Expect ';' after value")?;

        Ok(Stmt::Print(PrintData { expr }))
    }

    /// Parses a return statement.
    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().to_owned();

        let value = match self.check(Type::Semicolon) {
            true => None,
            false => Some(self.expression()?),
        };

        self.consume(Type::Semicolon, "Expect ';' after return value")?;
        Ok(Stmt::Return(ReturnData { keyword, value }))
    }

    /// Parses a while statement.
    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(Type::LeftParen, "Expect '(' after 'while'")?;
        let condition = self.expression()?;
        self.consume(Type::RightParen, "Expect ')' after condition")?;
        let body = self.statement()?;

        Ok(Stmt::While(WhileData {
            condition,
            body: Box::new(body),
        }))
    }

    /// Parses an expression statement.
    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(Type::Semicolon, "Expect ';' after expression")?;

        Ok(Stmt::Expression(ExpressionData { expr }))
    }

    /// Parses a function or method declaration.
    fn function(&mut self, kind: &str) -> ParseResult<Stmt> {
        let name = self.consume(Type::Identifier, &format!("Expect {kind} name"))?.to_owned();

        self.consume(Type::LeftParen, &format!("Expect '(' after {kind} name"))?;

        let mut params = vec![];

        if !self.check(Type::RightParen) {
            loop {
                if params.len() >= 255 {
                    let token = self.peek().clone();
                    self.diagnostics.error_at(&token, "Can't have more than 255 parameters");
                }

                params.push(self.consume(Type::Identifier, "Expect parameter name")?.to_owned());

                if !matches!(self, Type::Comma) {
                    break;
                }
            }
        }

        self.consume(Type::RightParen, "Expect ')' after parameters")?;

        self.consume(Type::LeftBrace, &format!("Expect '{{' before {kind} body"))?;

        let body = self.block()?;

        Ok(Stmt::Function(FunctionData { name, params, body }))
    }

    /// Parses a block statement.
    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check(Type::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(Type::RightBrace, "Expect '}' after block")?;

        Ok(statements)
    }

    /// Parses an expression.
    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    /// Parses an assignment expression.
    /// The left side parses as an expression first; a variable becomes an
    /// assignment target and a property access becomes a property set.
    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or()?;

        if matches!(self, Type::Equal) {
            let equals = self.previous().to_owned();
            let value = self.assignment()?;

            if let Expr::Variable(data) = expr {
                return Ok(Expr::Assign(AssignData {
                    id: expr::next_id(),
                    name: data.name,
                    value: Box::new(value),
                }));
            } else if let Expr::Get(data) = expr {
                return Ok(Expr::Set(SetData {
                    object: data.object,
                    name: data.name,
                    value: Box::new(value),
                }));
            }

            self.diagnostics.error_at(&equals, "Invalid assignment target");
        }

        Ok(expr)
    }

    /// Parses an or expression.
    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;

        while matches!(self, Type::Or) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical(LogicalData {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    /// Parses an and expression.
    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while matches!(self, Type::And) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical(LogicalData {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    /// Parses an equality expression.
    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while matches!(self, Type::BangEqual, Type::EqualEqual) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary(BinaryData {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    /// Parses a comparison expression.
    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while matches!(self, Type::Greater, Type::GreaterEqual, Type::Less, Type::LessEqual) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary(BinaryData {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    /// Parses a term expression.
    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        while matches!(self, Type::Minus, Type::Plus) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary(BinaryData {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    /// Parses a factor expression.
    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while matches!(self, Type::Slash, Type::Star) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary(BinaryData {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    /// Parses a unary expression.
    fn unary(&mut self) -> ParseResult<Expr> {
        if matches!(self, Type::Bang, Type::Minus) {
            let operator = self.previous().clone();
            let right = self.unary()?;

            return Ok(Expr::Unary(UnaryData {
                operator,
                expr: Box::new(right),
            }));
        }

        self.call()
    }

    /// Parses the arguments of a call expression.
    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = vec![];

        if !self.check(Type::RightParen) {
            while {
                if arguments.len() >= 255 {
                    let token = self.peek().clone();
                    self.diagnostics.error_at(&token, "Can't have more than 255 arguments");
                }

                arguments.push(self.expression()?);
                matches!(self, Type::Comma)
            } {}
        }

        let paren = self.consume(Type::RightParen, "Expect ')' after arguments")?;

        Ok(Expr::Call(CallData {
            callee: Box::new(callee),
            paren: paren.to_owned(),
            arguments,
        }))
    }

    /// Parses a call expression.
    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if matches!(self, Type::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if matches!(self, Type::Dot) {
                let name = self.consume(Type::Identifier, "Expect property name after '.'")?;
                expr = Expr::Get(GetData { object: Box::new(expr), name: name.clone() });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parses a primary expression.
    fn primary(&mut self) -> ParseResult<Expr> {
        if matches!(self, Type::False) {
            return Ok(Expr::Literal(Literal::Bool(false)));
        }

        if matches!(self, Type::True) {
            return Ok(Expr::Literal(Literal::Bool(true)));
        }

        if matches!(self, Type::Nil) {
            return Ok(Expr::Literal(Literal::Nil));
        }

        if matches!(self, Type::Number, Type::String) {
            return Ok(Expr::Literal(self.previous().clone().literal
                .expect("number or string to have a literal value")));
        }

        if matches!(self, Type::Super) {
            let keyword = self.previous().clone();
            self.consume(Type::Dot, "Expect '.' after 'super'")?;
            let method = self.consume(Type::Identifier, "Expect superclass method name")?.clone();

            return Ok(Expr::Super(SuperData { id: expr::next_id(), keyword, method }));
        }

        if matches!(self, Type::This) {
            return Ok(Expr::This(ThisData {
                id: expr::next_id(),
                keyword: self.previous().clone(),
            }));
        }

        if matches!(self, Type::Identifier) {
            return Ok(Expr::Variable(VariableData {
                id: expr::next_id(),
                name: self.previous().clone(),
            }));
        }

        if matches!(self, Type::LeftParen) {
            let expr = self.expression()?;
            self.consume(Type::RightParen, "Expect ')' after expression")?;

            return Ok(Expr::Grouping(GroupingData { expr: Box::new(expr) }));
        }

        Err(ParseError {
            token: self.peek().clone(),
            message: "Expect expression".to_string(),
        })
    }

    /// Tries to recover from a parse error by discarding tokens until the
    /// next statement boundary. Always consumes at least one token.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().r#type == Type::Semicolon {
                return;
            }

            match self.peek().r#type {
                Type::Class => return,
                Type::Fun => return,
                Type::Var => return,
                Type::For => return,
                Type::If => return,
                Type::While => return,
                Type::Print => return,
                Type::Return => return,
                _ => self.advance(),
            };
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, bool) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
        let statements = Parser::new(tokens, &mut diagnostics).parse();
        (statements, diagnostics.had_error())
    }

    #[test]
    fn parse_print_statement() {
        let (statements, had_error) = parse("print 1 + 2;");

        assert!(!had_error);
        assert_eq!(statements.len(), 1);

        let Stmt::Print(data) = &statements[0] else { panic!("expected print statement") };
        let Expr::Binary(binary) = &data.expr else { panic!("expected binary expression") };
        assert_eq!(binary.operator.r#type, Type::Plus);
    }

    #[test]
    fn var_requires_initializer() {
        let (statements, had_error) = parse("var x;");

        assert!(had_error);
        assert!(statements.is_empty());
    }

    #[test]
    fn for_desugars_into_while() {
        let (statements, had_error) = parse("for (var i = 0; i < 3; i = i + 1) print i;");

        assert!(!had_error);

        let Stmt::Block(block) = &statements[0] else { panic!("expected initializer block") };
        assert!(std::matches!(block.statements[0], Stmt::Var(_)));
        assert!(std::matches!(block.statements[1], Stmt::While(_)));
    }

    #[test]
    fn invalid_assignment_target_does_not_abort() {
        let (statements, had_error) = parse("1 = 2; print 3;");

        assert!(had_error);
        // The parser keeps going and still delivers the print statement.
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn synchronize_recovers_at_statement_boundary() {
        let (statements, had_error) = parse("print +; var a = 1;");

        assert!(had_error);
        assert_eq!(statements.len(), 1);
        assert!(std::matches!(statements[0], Stmt::Var(_)));
    }

    #[test]
    fn assignment_rewrites_get_into_set() {
        let (statements, had_error) = parse("a.b = 1;");

        assert!(!had_error);
        let Stmt::Expression(data) = &statements[0] else { panic!("expected expression statement") };
        assert!(std::matches!(data.expr, Expr::Set(_)));
    }
}
