//! Tokenizer for pattern language source text.

use plwasm_ast::{AssignOp, Position};

use crate::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A single identifier segment; keywords are identifiers too.
    Ident(String),
    Integer(u128),
    Float(f64),
    Str(String),
    Char(char),
    /// A `#name argument` line.
    Directive {
        name: String,
        argument: String,
    },

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    ColonColon,
    Dot,
    At,
    Dollar,
    Question,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    AmpAmp,
    PipePipe,
    Shl,
    Shr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Assign(AssignOp),

    Eof,
}

impl TokenKind {
    /// Short human-readable description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Integer(value) => format!("integer '{value}'"),
            TokenKind::Float(value) => format!("float '{value}'"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Char(_) => "character literal".to_string(),
            TokenKind::Directive { name, .. } => format!("directive '#{name}'"),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::ColonColon => "::",
            TokenKind::Dot => ".",
            TokenKind::At => "@",
            TokenKind::Dollar => "$",
            TokenKind::Question => "?",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::Bang => "!",
            TokenKind::AmpAmp => "&&",
            TokenKind::PipePipe => "||",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Assign(op) => match op {
                AssignOp::Assign => "=",
                AssignOp::Add => "+=",
                AssignOp::Sub => "-=",
                AssignOp::Mul => "*=",
                AssignOp::Div => "/=",
                AssignOp::Rem => "%=",
                AssignOp::Shl => "<<=",
                AssignOp::Shr => ">>=",
                AssignOp::BitAnd => "&=",
                AssignOp::BitOr => "|=",
                AssignOp::BitXor => "^=",
            },
            _ => "?",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
}

/// Converts source text into a token vector terminated by [`TokenKind::Eof`].
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
    /// True until a non-whitespace character is seen on the current line.
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            at_line_start: true,
        }
    }

    /// Tokenizes the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_second(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.at_line_start = true;
        } else {
            self.column += 1;
            if !c.is_whitespace() {
                self.at_line_start = false;
            }
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_second() == Some('*') => {
                    let start = self.position();
                    let line_start = self.at_line_start;
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return Err(ParseError::lexer(
                                    "unterminated block comment",
                                    start,
                                ));
                            }
                        }
                    }
                    // A comment does not count as line content for directives.
                    if line_start {
                        self.at_line_start = true;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia()?;
        let line_start = self.at_line_start;
        let pos = self.position();

        let Some(c) = self.bump() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos,
            });
        };

        let kind = match c {
            '#' if line_start => self.directive(pos)?,
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier(c),
            c if c.is_ascii_digit() => self.number(c, pos)?,
            '"' => TokenKind::Str(self.string(pos)?),
            '\'' => self.character(pos)?,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '@' => TokenKind::At,
            '$' => TokenKind::Dollar,
            '?' => TokenKind::Question,
            '~' => TokenKind::Tilde,
            ':' => {
                if self.eat(':') {
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            '+' => self.with_assign(TokenKind::Plus, AssignOp::Add),
            '-' => self.with_assign(TokenKind::Minus, AssignOp::Sub),
            '*' => self.with_assign(TokenKind::Star, AssignOp::Mul),
            '/' => self.with_assign(TokenKind::Slash, AssignOp::Div),
            '%' => self.with_assign(TokenKind::Percent, AssignOp::Rem),
            '^' => self.with_assign(TokenKind::Caret, AssignOp::BitXor),
            '&' => {
                if self.eat('&') {
                    TokenKind::AmpAmp
                } else {
                    self.with_assign(TokenKind::Amp, AssignOp::BitAnd)
                }
            }
            '|' => {
                if self.eat('|') {
                    TokenKind::PipePipe
                } else {
                    self.with_assign(TokenKind::Pipe, AssignOp::BitOr)
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '=' => {
                if self.eat('=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign(AssignOp::Assign)
                }
            }
            '<' => {
                if self.eat('<') {
                    self.with_assign(TokenKind::Shl, AssignOp::Shl)
                } else if self.eat('=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('>') {
                    self.with_assign(TokenKind::Shr, AssignOp::Shr)
                } else if self.eat('=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            other => {
                return Err(ParseError::lexer(
                    format!("unexpected character '{}'", other.escape_default()),
                    pos,
                ));
            }
        };

        Ok(Token { kind, pos })
    }

    fn with_assign(&mut self, plain: TokenKind, op: AssignOp) -> TokenKind {
        if self.eat('=') {
            TokenKind::Assign(op)
        } else {
            plain
        }
    }

    fn identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::Ident(name)
    }

    fn directive(&mut self, pos: Position) -> Result<TokenKind, ParseError> {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(ParseError::preprocessor("expected directive name after '#'", pos));
        }

        let mut argument = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            if c == '/' && self.peek_second() == Some('/') {
                break;
            }
            argument.push(c);
            self.bump();
        }

        Ok(TokenKind::Directive {
            name,
            argument: argument.trim().to_string(),
        })
    }

    fn number(&mut self, first: char, pos: Position) -> Result<TokenKind, ParseError> {
        let radix = if first == '0' {
            match self.peek() {
                Some('x' | 'X') => Some(16),
                Some('b' | 'B') => Some(2),
                Some('o' | 'O') => Some(8),
                _ => None,
            }
        } else {
            None
        };

        if let Some(radix) = radix {
            self.bump();
            let digits = self.digits(|c| c.is_digit(radix));
            if digits.is_empty() {
                return Err(ParseError::lexer("expected digits after radix prefix", pos));
            }
            return u128::from_str_radix(&digits, radix)
                .map(TokenKind::Integer)
                .map_err(|_| ParseError::lexer("integer literal out of range", pos));
        }

        let mut text = String::from(first);
        text.push_str(&self.digits(|c| c.is_ascii_digit()));

        let is_float = self.peek() == Some('.')
            && self.peek_second().is_some_and(|c| c.is_ascii_digit());
        if !is_float {
            return text
                .parse::<u128>()
                .map(TokenKind::Integer)
                .map_err(|_| ParseError::lexer("integer literal out of range", pos));
        }

        self.bump();
        text.push('.');
        text.push_str(&self.digits(|c| c.is_ascii_digit()));
        if matches!(self.peek(), Some('e' | 'E')) {
            text.push('e');
            self.bump();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                text.push(sign);
                self.bump();
            }
            text.push_str(&self.digits(|c| c.is_ascii_digit()));
        }
        text.parse::<f64>()
            .map(TokenKind::Float)
            .map_err(|_| ParseError::lexer(format!("invalid float literal '{text}'"), pos))
    }

    /// Reads digits accepted by `accept`, skipping `_` separators.
    fn digits(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if accept(c) {
                out.push(c);
            } else if c != '_' {
                break;
            }
            self.bump();
        }
        out
    }

    fn escape(&mut self, pos: Position) -> Result<char, ParseError> {
        let Some(c) = self.bump() else {
            return Err(ParseError::lexer("unterminated escape sequence", pos));
        };
        Ok(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            'x' => {
                let mut value = 0u32;
                for _ in 0..2 {
                    let digit = self
                        .bump()
                        .and_then(|d| d.to_digit(16))
                        .ok_or_else(|| ParseError::lexer("invalid hex escape", pos))?;
                    value = value * 16 + digit;
                }
                char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER)
            }
            other => {
                return Err(ParseError::lexer(
                    format!("unknown escape sequence '\\{other}'"),
                    pos,
                ));
            }
        })
    }

    fn string(&mut self, pos: Position) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => out.push(self.escape(pos)?),
                Some('\n') | None => {
                    return Err(ParseError::lexer("unterminated string literal", pos));
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn character(&mut self, pos: Position) -> Result<TokenKind, ParseError> {
        let value = match self.bump() {
            Some('\\') => self.escape(pos)?,
            Some('\'') | Some('\n') | None => {
                return Err(ParseError::lexer("empty character literal", pos));
            }
            Some(c) => c,
        };
        if !self.eat('\'') {
            return Err(ParseError::lexer("unterminated character literal", pos));
        }
        Ok(TokenKind::Char(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_placement_tokens() {
        assert_eq!(
            kinds("u8 x @ 0x10;"),
            vec![
                TokenKind::Ident("u8".into()),
                TokenKind::Ident("x".into()),
                TokenKind::At,
                TokenKind::Integer(0x10),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[rstest]
    #[case::hex("0xFF", 255)]
    #[case::binary("0b1010", 10)]
    #[case::octal("0o17", 15)]
    #[case::separators("1_000", 1000)]
    #[case::decimal("42", 42)]
    fn test_integer_literals(#[case] source: &str, #[case] expected: u128) {
        assert_eq!(kinds(source)[0], TokenKind::Integer(expected));
    }

    #[test]
    fn test_float_and_member_access() {
        assert_eq!(kinds("1.5")[0], TokenKind::Float(1.5));
        assert_eq!(
            kinds("a.b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Dot,
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            kinds("<<= >> >= && || != :: +="),
            vec![
                TokenKind::Assign(AssignOp::Shl),
                TokenKind::Shr,
                TokenKind::Ge,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::NotEq,
                TokenKind::ColonColon,
                TokenKind::Assign(AssignOp::Add),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\tb\x41\"""#)[0],
            TokenKind::Str("a\tbA\"".into())
        );
        assert_eq!(kinds(r"'\n'")[0], TokenKind::Char('\n'));
    }

    #[test]
    fn test_directive_only_at_line_start() {
        assert_eq!(
            kinds("  #include <std/io.pat> // trailing\nu8 x;")[0],
            TokenKind::Directive {
                name: "include".into(),
                argument: "<std/io.pat>".into(),
            }
        );

        let err = Lexer::new("u8 x; #pragma once").tokenize().unwrap_err();
        assert_eq!(err.pos, Position::new(1, 7));
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("// line\n/* block\n */ u8"),
            vec![TokenKind::Ident("u8".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_positions_are_one_based() {
        let tokens = Lexer::new("u8 a;\n  u16 b;").tokenize().unwrap();
        assert_eq!(tokens[0].pos, Position::new(1, 1));
        assert_eq!(tokens[3].pos, Position::new(2, 3));
        assert_eq!(tokens[4].pos, Position::new(2, 7));
    }

    #[rstest]
    #[case::unterminated_string("\"abc", "unterminated string literal")]
    #[case::unterminated_comment("/* abc", "unterminated block comment")]
    #[case::stray_character("u8 `x", "unexpected character '`'")]
    #[case::bad_escape(r#""\q""#, "unknown escape sequence '\\q'")]
    #[case::empty_radix("0x;", "expected digits after radix prefix")]
    fn test_lexer_errors(#[case] source: &str, #[case] message: &str) {
        let err = Lexer::new(source).tokenize().unwrap_err();
        assert_eq!(err.message, message);
    }
}
