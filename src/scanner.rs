use std::str::Chars;

use peekmore::{PeekMore, PeekMoreIterator};
use substring::Substring;

use crate::error::Diagnostics;
use crate::literal::Literal;
use crate::token::{Token, Type};

/// Turns a source string into a stream of tokens terminated by `EOF`.
///
/// The cursor walks the characters while `start`/`current` track char
/// offsets into the original source, so every lexeme is the exact slice
/// between the two. Lexical errors are reported to the sink and scanning
/// continues with the next character.
pub struct Scanner<'a, 'd> {
    source: &'a str,
    chars: PeekMoreIterator<Chars<'a>>,
    diagnostics: &'d mut Diagnostics,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
}

impl<'a, 'd> Scanner<'a, 'd> {
    /// Creates a new scanner.
    pub fn new(source: &'a str, diagnostics: &'d mut Diagnostics) -> Scanner<'a, 'd> {
        Scanner {
            source,
            chars: source.chars().peekmore(),
            diagnostics,
            tokens: vec![],
            start: 0,
            current: 0,
            line: 1,
        }
    }

    /// Scans the source code and returns the tokens.
    pub fn scan_tokens(mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }

        self.tokens.push(Token::new(Type::EOF, String::from(""), None, self.line));
        self.tokens
    }

    /// Returns if the scanner has reached the end of the file.
    fn is_at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }

    /// Consumes and returns the next character.
    fn advance(&mut self) -> char {
        match self.chars.next() {
            Some(c) => {
                self.current += 1;
                c
            }
            None => '\0',
        }
    }

    /// Returns the next character without consuming it.
    fn peek(&mut self) -> char {
        self.chars.peek().copied().unwrap_or('\0')
    }

    /// Returns the character after the next without consuming anything.
    /// The peek cursor is reset so `peek` keeps pointing at the next char.
    fn peek_next(&mut self) -> char {
        self.chars.advance_cursor();
        let c = self.chars.peek().copied().unwrap_or('\0');
        self.chars.reset_cursor();
        c
    }

    /// Consumes the next character if it matches the expected one.
    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() == expected {
            self.advance();
            return true;
        }

        false
    }

    /// Adds a new token spanning `start..current` to the list of tokens.
    fn add_token(&mut self, r#type: Type, literal: Option<Literal>) {
        let lexeme = self.source.substring(self.start, self.current).to_string();
        self.tokens.push(Token::new(r#type, lexeme, literal, self.line));
    }

    /// Handles a string literal.
    fn string(&mut self) {
        let opening_line = self.line;

        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.diagnostics.error(opening_line, "Unterminated string");
            return;
        }

        self.advance(); // The closing double quote.

        // The literal does not include the double quotes unlike the lexeme.
        let value = self.source.substring(self.start + 1, self.current - 1).to_string();
        self.add_token(Type::String, Some(Literal::String(value)));
    }

    /// Handles a number literal.
    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // A trailing dot is not part of the number.
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance(); // The dot.

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let value: f64 = self.source.substring(self.start, self.current).parse().unwrap();
        self.add_token(Type::Number, Some(Literal::Number(value)));
    }

    /// Handles an identifier or a keyword.
    fn identifier(&mut self) {
        while matches!(self.peek(), c if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }

        let r#type = match self.source.substring(self.start, self.current) {
            "and"    => Type::And,
            "class"  => Type::Class,
            "else"   => Type::Else,
            "false"  => Type::False,
            "for"    => Type::For,
            "fun"    => Type::Fun,
            "if"     => Type::If,
            "nil"    => Type::Nil,
            "or"     => Type::Or,
            "print"  => Type::Print,
            "return" => Type::Return,
            "super"  => Type::Super,
            "this"   => Type::This,
            "true"   => Type::True,
            "var"    => Type::Var,
            "while"  => Type::While,
            _        => Type::Identifier,
        };

        self.add_token(r#type, None);
    }

    /// Scans the next token.
    fn scan_token(&mut self) {
        let c = self.advance();
        match c {
            // One character tokens
            '(' => self.add_token(Type::LeftParen, None),
            ')' => self.add_token(Type::RightParen, None),
            '{' => self.add_token(Type::LeftBrace, None),
            '}' => self.add_token(Type::RightBrace, None),
            ',' => self.add_token(Type::Comma, None),
            '.' => self.add_token(Type::Dot, None),
            '-' => self.add_token(Type::Minus, None),
            '+' => self.add_token(Type::Plus, None),
            ';' => self.add_token(Type::Semicolon, None),
            '*' => self.add_token(Type::Star, None),

            // One or two character tokens
            '!' => {
                if self.match_next('=') {
                    self.add_token(Type::BangEqual, None);
                } else {
                    self.add_token(Type::Bang, None);
                }
            },
            '=' => {
                if self.match_next('=') {
                    self.add_token(Type::EqualEqual, None);
                } else {
                    self.add_token(Type::Equal, None);
                }
            },
            '<' => {
                if self.match_next('=') {
                    self.add_token(Type::LessEqual, None);
                } else {
                    self.add_token(Type::Less, None);
                }
            },
            '>' => {
                if self.match_next('=') {
                    self.add_token(Type::GreaterEqual, None);
                } else {
                    self.add_token(Type::Greater, None);
                }
            },
            '/' => {
                if self.match_next('/') {
                    // A comment goes until the end of the line.
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(Type::Slash, None);
                }
            },

            // Ignore whitespace
            ' ' | '\r' | '\t' => (),

            // Update line counter
            '\n' => self.line += 1,

            // String
            '"' => self.string(),

            // Numbers
            c if c.is_ascii_digit() => self.number(),

            // Identifiers
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier(),

            _ => {
                self.diagnostics.error(self.line, &format!("Unexpected character '{c}'"));
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn scan(source: &str) -> (Vec<Token>, bool) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
        (tokens, diagnostics.had_error())
    }

    #[test]
    fn scan_declaration() {
        let (tokens, had_error) = scan("var a = 1;");

        assert!(!had_error);
        let types: Vec<Type> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(
            types,
            vec![Type::Var, Type::Identifier, Type::Equal, Type::Number, Type::Semicolon, Type::EOF]
        );
    }

    #[test]
    fn lexemes_are_exact_source_slices() {
        let source = "print 1 + 2;\nvar foo = \"bar\";\nfoo <= 3.5";
        let (tokens, had_error) = scan(source);

        assert!(!had_error);

        // Stripped of whitespace, the lexemes reconstruct the source.
        let lexemes: String = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        let stripped: String = source.chars().filter(|c| !c.is_whitespace()).collect();
        assert_eq!(lexemes, stripped);
    }

    #[test]
    fn string_literal_drops_the_quotes() {
        let (tokens, _) = scan("\"hello\"");

        assert_eq!(tokens[0].lexeme, "\"hello\"");
        assert_eq!(tokens[0].literal, Some(Literal::String("hello".to_string())));
    }

    #[test]
    fn multiline_string_advances_line_counter() {
        let (tokens, had_error) = scan("\"one\ntwo\"");

        assert!(!had_error);
        assert_eq!(tokens.last().unwrap().line, 2);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let (_, had_error) = scan("\"unclosed");
        assert!(had_error);
    }

    #[test]
    fn trailing_dot_is_not_consumed() {
        let (tokens, _) = scan("1.");

        let types: Vec<Type> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(types, vec![Type::Number, Type::Dot, Type::EOF]);
        assert_eq!(tokens[0].literal, Some(Literal::Number(1.0)));
    }

    #[test]
    fn keywords_and_identifiers() {
        let (tokens, _) = scan("class classy nil nils");

        let types: Vec<Type> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(
            types,
            vec![Type::Class, Type::Identifier, Type::Nil, Type::Identifier, Type::EOF]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let (tokens, had_error) = scan("// nothing to see\n1 / 2");

        assert!(!had_error);
        let types: Vec<Type> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(types, vec![Type::Number, Type::Slash, Type::Number, Type::EOF]);
    }

    #[test]
    fn unexpected_character_is_reported_and_skipped() {
        let (tokens, had_error) = scan("1 @ 2");

        assert!(had_error);
        let types: Vec<Type> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(types, vec![Type::Number, Type::Number, Type::EOF]);
    }
}
