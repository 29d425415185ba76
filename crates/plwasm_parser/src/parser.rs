//! Recursive-descent parser.

use std::collections::HashSet;

use plwasm_ast::{
    ArraySize, AssignOp, AssignTarget, Attribute, BinaryOp, BitfieldDecl, BitfieldEntry, Block,
    Endian, EnumDecl, EnumVariant, Expr, ExprKind, FunctionDecl, Item, Literal, Param, Position,
    Pragma, Program, Stmt, StmtKind, StructDecl, TypeRef, UnaryOp, UsingDecl, VarDecl,
};
use tracing::debug;

use crate::include::{IncludeResolver, MAX_INCLUDE_DEPTH};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::ParseError;

/// Pragmas the runtime understands.
pub const KNOWN_PRAGMAS: &[&str] = &[
    "endian",
    "eval_depth",
    "array_limit",
    "pattern_limit",
    "loop_limit",
    "debug",
    "base_address",
    "once",
];

/// Deepest nesting of statements and expressions a script may use.
///
/// Counts both recursive descent (parentheses, unary prefixes, nested
/// blocks) and the height of left-folded operator and postfix chains, so the
/// evaluator never walks a tree deeper than this either.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Identifiers that can never name a type or a variable.
const RESERVED: &[&str] = &[
    "struct", "union", "enum", "bitfield", "using", "fn", "return", "if", "else", "while",
    "break", "continue", "padding", "sizeof", "addressof", "true", "false", "be", "le",
];

/// Parses pattern language source into a [`Program`].
///
/// `#include` directives are resolved through the optional
/// [`IncludeResolver`]; without one, any include is an error.
#[derive(Default)]
pub struct PatternParser<'r> {
    resolver: Option<&'r dyn IncludeResolver>,
}

#[derive(Default)]
struct IncludeState {
    /// Files that declared `#pragma once` and were already spliced in.
    once: HashSet<String>,
}

impl<'r> PatternParser<'r> {
    /// Creates a parser that rejects `#include` directives.
    pub fn new() -> Self {
        Self { resolver: None }
    }

    /// Creates a parser that resolves includes through `resolver`.
    pub fn with_resolver(resolver: &'r dyn IncludeResolver) -> Self {
        Self {
            resolver: Some(resolver),
        }
    }

    /// Parses a complete script.
    pub fn parse(&self, source: &str) -> Result<Program, ParseError> {
        let mut state = IncludeState::default();
        self.parse_file(source, 0, &mut state)
    }

    fn parse_file(
        &self,
        source: &str,
        depth: usize,
        state: &mut IncludeState,
    ) -> Result<Program, ParseError> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut stream = TokenStream::new(tokens);
        let mut program = Program::default();

        while !stream.at_eof() {
            if let TokenKind::Directive { name, argument } = &stream.peek().kind {
                let (name, argument) = (name.clone(), argument.clone());
                let pos = stream.advance().pos;
                self.directive(&name, &argument, pos, depth, state, &mut program)?;
                continue;
            }
            program.items.push(stream.item()?);
        }

        Ok(program)
    }

    fn directive(
        &self,
        name: &str,
        argument: &str,
        pos: Position,
        depth: usize,
        state: &mut IncludeState,
        program: &mut Program,
    ) -> Result<(), ParseError> {
        match name {
            "include" => self.include(argument, pos, depth, state, program),
            "pragma" => {
                program.pragmas.push(parse_pragma(argument, pos)?);
                Ok(())
            }
            other => Err(ParseError::preprocessor(
                format!("unknown directive '#{other}'"),
                pos,
            )),
        }
    }

    fn include(
        &self,
        argument: &str,
        pos: Position,
        depth: usize,
        state: &mut IncludeState,
        program: &mut Program,
    ) -> Result<(), ParseError> {
        let name = include_target(argument).ok_or_else(|| {
            ParseError::preprocessor("expected <path> or \"path\" after #include", pos)
        })?;

        if depth + 1 > MAX_INCLUDE_DEPTH {
            return Err(ParseError::preprocessor(
                format!("include depth limit of {MAX_INCLUDE_DEPTH} exceeded"),
                pos,
            ));
        }

        let resolved = self
            .resolver
            .and_then(|resolver| resolver.resolve(name))
            .ok_or_else(|| {
                ParseError::preprocessor(format!("could not find include file '{name}'"), pos)
            })?;

        if state.once.contains(&resolved.path) {
            debug!(path = %resolved.path, "skipping already included file");
            return Ok(());
        }

        debug!(path = %resolved.path, depth, "including file");
        let included = self
            .parse_file(&resolved.source, depth + 1, state)
            .map_err(|e| e.in_file(&resolved.path))?;

        if included.pragma("once").is_some() {
            state.once.insert(resolved.path.clone());
        }

        program.items.extend(included.items);
        program
            .pragmas
            .extend(included.pragmas.into_iter().filter(|p| p.key != "once"));
        Ok(())
    }
}

fn include_target(argument: &str) -> Option<&str> {
    let argument = argument.trim();
    let inner = argument
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .or_else(|| {
            argument
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
        })?;
    let inner = inner.trim();
    (!inner.is_empty()).then_some(inner)
}

fn parse_pragma(argument: &str, pos: Position) -> Result<Pragma, ParseError> {
    let mut parts = argument.splitn(2, char::is_whitespace);
    let key = parts.next().unwrap_or_default().trim();
    if key.is_empty() {
        return Err(ParseError::preprocessor("expected pragma name", pos));
    }
    if !KNOWN_PRAGMAS.contains(&key) {
        return Err(ParseError::preprocessor(
            format!("unknown pragma '{key}'"),
            pos,
        ));
    }
    let value = parts
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    Ok(Pragma {
        key: key.to_string(),
        value,
        pos,
    })
}

/// Grammar rules over a token vector.
struct TokenStream {
    tokens: Vec<Token>,
    index: usize,
    /// Statements and expressions currently being parsed.
    depth: usize,
}

impl TokenStream {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            index: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    /// Looks `offset` tokens ahead; past the end this is the `Eof` token.
    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.index + offset).min(last)]
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.index += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(name) if name == keyword)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::syntax(
            format!("expected {expected}, found {}", token.kind.describe()),
            token.pos,
        )
    }

    fn too_deep(pos: Position) -> ParseError {
        ParseError::syntax(
            format!("nesting depth limit of {MAX_NESTING_DEPTH} exceeded"),
            pos,
        )
    }

    /// Runs `rule` one nesting level deeper, failing at the current token
    /// once the limit is reached.
    fn nested<T>(
        &mut self,
        rule: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(Self::too_deep(self.peek().pos));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    /// Checks a node built by folding a chain, whose height the descent
    /// counter does not see.
    fn check_height(&self, height: usize, pos: Position) -> Result<(), ParseError> {
        if self.depth + height > MAX_NESTING_DEPTH {
            return Err(Self::too_deep(pos));
        }
        Ok(())
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_semicolon(&mut self) -> Result<(), ParseError> {
        self.expect(&TokenKind::Semicolon, "';'").map(|_| ())
    }

    fn expect_ident(&mut self, expected: &str) -> Result<String, ParseError> {
        match &self.peek().kind {
            TokenKind::Ident(name) if !RESERVED.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    // ---- items ----

    fn item(&mut self) -> Result<Item, ParseError> {
        let keyword = match &self.peek().kind {
            TokenKind::Ident(name) => name.clone(),
            _ => return Ok(Item::Statement(self.statement()?)),
        };

        match keyword.as_str() {
            "struct" => self.struct_decl(false).map(Item::Struct),
            "union" => self.struct_decl(true).map(Item::Struct),
            "enum" => self.enum_decl().map(Item::Enum),
            "bitfield" => self.bitfield_decl().map(Item::Bitfield),
            "using" => self.using_decl().map(Item::Using),
            "fn" => self.function_decl().map(Item::Function),
            _ => Ok(Item::Statement(self.statement()?)),
        }
    }

    fn struct_decl(&mut self, is_union: bool) -> Result<StructDecl, ParseError> {
        let pos = self.advance().pos;
        let name = self.expect_ident(if is_union { "union name" } else { "struct name" })?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let body = self.block_until_rbrace()?;
        self.eat(&TokenKind::Semicolon);
        Ok(StructDecl {
            name,
            is_union,
            body,
            pos,
        })
    }

    fn enum_decl(&mut self) -> Result<EnumDecl, ParseError> {
        let pos = self.advance().pos;
        let name = self.expect_ident("enum name")?;
        self.expect(&TokenKind::Colon, "':' followed by the underlying type")?;
        let underlying = self.type_ref()?;
        self.expect(&TokenKind::LBrace, "'{'")?;

        let mut variants = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let variant_pos = self.peek().pos;
            let variant = self.expect_ident("enum variant name")?;
            let value = if self.eat(&TokenKind::Assign(AssignOp::Assign)) {
                Some(self.expression()?)
            } else {
                None
            };
            variants.push(EnumVariant {
                name: variant,
                value,
                pos: variant_pos,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        self.eat(&TokenKind::Semicolon);

        Ok(EnumDecl {
            name,
            underlying,
            variants,
            pos,
        })
    }

    fn bitfield_decl(&mut self) -> Result<BitfieldDecl, ParseError> {
        let pos = self.advance().pos;
        let name = self.expect_ident("bitfield name")?;
        self.expect(&TokenKind::LBrace, "'{'")?;

        let mut entries = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let entry_pos = self.peek().pos;
            let entry = if self.check_keyword("padding") {
                self.advance();
                None
            } else {
                Some(self.expect_ident("bitfield entry name")?)
            };
            self.expect(&TokenKind::Colon, "':'")?;
            let bits = self.expression()?;
            self.expect_semicolon()?;
            entries.push(BitfieldEntry {
                name: entry,
                bits,
                pos: entry_pos,
            });
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        self.eat(&TokenKind::Semicolon);

        Ok(BitfieldDecl { name, entries, pos })
    }

    fn using_decl(&mut self) -> Result<UsingDecl, ParseError> {
        let pos = self.advance().pos;
        let name = self.expect_ident("type alias name")?;
        self.expect(&TokenKind::Assign(AssignOp::Assign), "'='")?;
        let target = self.type_ref()?;
        self.expect_semicolon()?;
        Ok(UsingDecl { name, target, pos })
    }

    fn function_decl(&mut self) -> Result<FunctionDecl, ParseError> {
        let pos = self.advance().pos;
        let name = self.expect_ident("function name")?;
        self.expect(&TokenKind::LParen, "'('")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let ty = self.type_ref()?;
                let param = self.expect_ident("parameter name")?;
                params.push(Param { ty, name: param });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let body = self.block_until_rbrace()?;
        self.eat(&TokenKind::Semicolon);

        Ok(FunctionDecl {
            name,
            params,
            body,
            pos,
        })
    }

    fn type_ref(&mut self) -> Result<TypeRef, ParseError> {
        let pos = self.peek().pos;
        let endian = if self.check_keyword("be") {
            self.advance();
            Some(Endian::Big)
        } else if self.check_keyword("le") {
            self.advance();
            Some(Endian::Little)
        } else {
            None
        };

        let mut name = self.expect_ident("type name")?;
        while self.eat(&TokenKind::ColonColon) {
            name.push_str("::");
            name.push_str(&self.expect_ident("type name")?);
        }

        Ok(TypeRef { name, endian, pos })
    }

    // ---- statements ----

    fn block_until_rbrace(&mut self) -> Result<Block, ParseError> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.at_eof() {
                return Err(self.unexpected("'}'"));
            }
            stmts.push(self.statement()?);
        }
        self.advance();
        Ok(stmts)
    }

    fn body_or_statement(&mut self) -> Result<Block, ParseError> {
        if self.eat(&TokenKind::LBrace) {
            self.block_until_rbrace()
        } else {
            Ok(vec![self.statement()?])
        }
    }

    /// Returns true if the upcoming tokens read `[be|le] Type[::Type]* name`.
    fn is_declaration_start(&self) -> bool {
        let mut offset = 0;
        if matches!(&self.peek().kind, TokenKind::Ident(k) if k == "be" || k == "le") {
            offset += 1;
        }
        let is_name = |token: &Token| {
            matches!(&token.kind, TokenKind::Ident(n) if !RESERVED.contains(&n.as_str()))
        };
        if !is_name(self.peek_at(offset)) {
            return false;
        }
        offset += 1;
        while self.peek_at(offset).kind == TokenKind::ColonColon {
            if !is_name(self.peek_at(offset + 1)) {
                return false;
            }
            offset += 2;
        }
        is_name(self.peek_at(offset))
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        self.nested(Self::bare_statement)
    }

    fn bare_statement(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.peek().pos;

        if let TokenKind::Directive { name, .. } = &self.peek().kind {
            return Err(ParseError::preprocessor(
                format!("directive '#{name}' is only allowed at the top level"),
                pos,
            ));
        }

        let keyword = match &self.peek().kind {
            TokenKind::Ident(name) => Some(name.clone()),
            _ => None,
        };

        let kind = match keyword.as_deref() {
            Some("if") => self.if_statement()?,
            Some("while") => {
                self.advance();
                self.expect(&TokenKind::LParen, "'('")?;
                let cond = self.expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                let body = self.body_or_statement()?;
                StmtKind::While { cond, body }
            }
            Some("break") => {
                self.advance();
                self.expect_semicolon()?;
                StmtKind::Break
            }
            Some("continue") => {
                self.advance();
                self.expect_semicolon()?;
                StmtKind::Continue
            }
            Some("return") => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect_semicolon()?;
                StmtKind::Return(value)
            }
            Some("padding") if self.peek_at(1).kind == TokenKind::LBracket => {
                self.advance();
                self.advance();
                let size = self.expression()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                self.expect_semicolon()?;
                StmtKind::Padding(size)
            }
            _ if self.is_declaration_start() => StmtKind::Var(self.var_decl()?),
            Some(name)
                if !RESERVED.contains(&name)
                    && matches!(self.peek_at(1).kind, TokenKind::Assign(_)) =>
            {
                self.advance();
                self.assignment(AssignTarget::Variable(name.to_string()))?
            }
            None if self.check(&TokenKind::Dollar)
                && matches!(self.peek_at(1).kind, TokenKind::Assign(_)) =>
            {
                self.advance();
                self.assignment(AssignTarget::Cursor)?
            }
            _ => {
                let expr = self.expression()?;
                self.expect_semicolon()?;
                StmtKind::Expr(expr)
            }
        };

        Ok(Stmt::new(kind, pos))
    }

    fn assignment(&mut self, target: AssignTarget) -> Result<StmtKind, ParseError> {
        let op = match self.advance().kind {
            TokenKind::Assign(op) => op,
            _ => unreachable!("caller checked for an assignment operator"),
        };
        let value = self.expression()?;
        self.expect_semicolon()?;
        Ok(StmtKind::Assign { target, op, value })
    }

    fn if_statement(&mut self) -> Result<StmtKind, ParseError> {
        self.advance();
        self.expect(&TokenKind::LParen, "'('")?;
        let cond = self.expression()?;
        self.expect(&TokenKind::RParen, "')'")?;
        let then_branch = self.body_or_statement()?;

        let else_branch = if self.check_keyword("else") {
            self.advance();
            if self.check_keyword("if") {
                let pos = self.peek().pos;
                Some(vec![Stmt::new(self.nested(Self::if_statement)?, pos)])
            } else {
                Some(self.body_or_statement()?)
            }
        } else {
            None
        };

        Ok(StmtKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn var_decl(&mut self) -> Result<VarDecl, ParseError> {
        let ty = self.type_ref()?;
        let name = self.expect_ident("variable name")?;

        let array = if self.eat(&TokenKind::LBracket) {
            let size = if self.check_keyword("while")
                && self.peek_at(1).kind == TokenKind::LParen
            {
                self.advance();
                self.advance();
                let cond = self.expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                ArraySize::While(cond)
            } else {
                ArraySize::Count(self.expression()?)
            };
            self.expect(&TokenKind::RBracket, "']'")?;
            Some(size)
        } else {
            None
        };

        let placement = if self.eat(&TokenKind::At) {
            Some(self.expression()?)
        } else {
            None
        };

        let init = if self.eat(&TokenKind::Assign(AssignOp::Assign)) {
            Some(self.expression()?)
        } else {
            None
        };

        let attributes = self.attributes()?;
        self.expect_semicolon()?;

        Ok(VarDecl {
            ty,
            name,
            array,
            placement,
            init,
            attributes,
        })
    }

    fn attributes(&mut self) -> Result<Vec<Attribute>, ParseError> {
        let mut attributes = Vec::new();
        if !(self.check(&TokenKind::LBracket) && self.peek_at(1).kind == TokenKind::LBracket) {
            return Ok(attributes);
        }
        self.advance();
        self.advance();

        loop {
            let pos = self.peek().pos;
            let name = self.expect_ident("attribute name")?;
            let mut args = Vec::new();
            if self.eat(&TokenKind::LParen) {
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen, "')'")?;
            }
            attributes.push(Attribute { name, args, pos });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(&TokenKind::RBracket, "']]'")?;
        self.expect(&TokenKind::RBracket, "']]'")?;
        Ok(attributes)
    }

    // ---- expressions ----

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::ternary)
    }

    fn ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.binary(1)?;
        if !self.check(&TokenKind::Question) {
            return Ok(cond);
        }
        self.advance();
        let then_expr = self.expression()?;
        self.expect(&TokenKind::Colon, "':'")?;
        let else_expr = self.expression()?;
        let pos = cond.pos;
        Ok(Expr::new(
            ExprKind::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            pos,
        ))
    }

    fn peek_binary_op(&self) -> Option<BinaryOp> {
        Some(match self.peek().kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            TokenKind::Shl => BinaryOp::Shl,
            TokenKind::Shr => BinaryOp::Shr,
            TokenKind::Amp => BinaryOp::BitAnd,
            TokenKind::Pipe => BinaryOp::BitOr,
            TokenKind::Caret => BinaryOp::BitXor,
            TokenKind::AmpAmp => BinaryOp::And,
            TokenKind::PipePipe => BinaryOp::Or,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            _ => return None,
        })
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        let mut height = expr_height(&lhs);
        while let Some(op) = self.peek_binary_op() {
            if op.precedence() < min_precedence {
                break;
            }
            let op_pos = self.advance().pos;
            let rhs = self.binary(op.precedence() + 1)?;
            height = height.max(expr_height(&rhs)) + 1;
            self.check_height(height, op_pos)?;
            let pos = lhs.pos;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                pos,
            );
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.peek().pos;
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitNot,
            TokenKind::Plus => {
                self.advance();
                return self.nested(Self::unary);
            }
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.nested(Self::unary)?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            pos,
        ))
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        let mut height = expr_height(&expr);
        loop {
            let pos = self.peek().pos;
            if self.eat(&TokenKind::Dot) {
                height += 1;
                self.check_height(height, pos)?;
                let field = self.expect_ident("member name")?;
                let pos = expr.pos;
                expr = Expr::new(
                    ExprKind::Member {
                        base: Box::new(expr),
                        field,
                    },
                    pos,
                );
            } else if self.check(&TokenKind::LBracket)
                && self.peek_at(1).kind != TokenKind::LBracket
            {
                self.advance();
                let index = self.expression()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                height = height.max(expr_height(&index)) + 1;
                self.check_height(height, pos)?;
                let pos = expr.pos;
                expr = Expr::new(
                    ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    },
                    pos,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        let pos = token.pos;

        let kind = match token.kind {
            TokenKind::Integer(value) => {
                self.advance();
                ExprKind::Literal(Literal::Integer(value))
            }
            TokenKind::Float(value) => {
                self.advance();
                ExprKind::Literal(Literal::Float(value))
            }
            TokenKind::Str(value) => {
                self.advance();
                ExprKind::Literal(Literal::Str(value))
            }
            TokenKind::Char(value) => {
                self.advance();
                ExprKind::Literal(Literal::Char(value))
            }
            TokenKind::Dollar => {
                self.advance();
                ExprKind::Cursor
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::Ident(ref name) if name == "true" || name == "false" => {
                self.advance();
                ExprKind::Literal(Literal::Bool(name == "true"))
            }
            TokenKind::Ident(ref name) if name == "sizeof" || name == "addressof" => {
                let is_sizeof = name == "sizeof";
                self.advance();
                self.expect(&TokenKind::LParen, "'('")?;
                let operand = Box::new(self.expression()?);
                self.expect(&TokenKind::RParen, "')'")?;
                if is_sizeof {
                    ExprKind::SizeOf(operand)
                } else {
                    ExprKind::AddressOf(operand)
                }
            }
            TokenKind::Ident(ref name) if !RESERVED.contains(&name.as_str()) => {
                self.advance();
                let mut path = name.clone();
                while self.eat(&TokenKind::ColonColon) {
                    path.push_str("::");
                    path.push_str(&self.expect_ident("identifier")?);
                }
                if self.eat(&TokenKind::LParen) {
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, "')'")?;
                    ExprKind::Call { callee: path, args }
                } else {
                    ExprKind::Ident(path)
                }
            }
            _ => return Err(self.unexpected("expression")),
        };

        Ok(Expr::new(kind, pos))
    }
}

/// Number of nodes on the longest path from `expr` down to a leaf.
///
/// Only called on trees already bounded by [`MAX_NESTING_DEPTH`].
fn expr_height(expr: &Expr) -> usize {
    let children: Vec<&Expr> = match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::Cursor => Vec::new(),
        ExprKind::Member { base, .. } => vec![base.as_ref()],
        ExprKind::Index { base, index } => vec![base.as_ref(), index.as_ref()],
        ExprKind::Call { args, .. } => args.iter().collect(),
        ExprKind::Unary { operand, .. } => vec![operand.as_ref()],
        ExprKind::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => vec![cond.as_ref(), then_expr.as_ref(), else_expr.as_ref()],
        ExprKind::SizeOf(operand) | ExprKind::AddressOf(operand) => vec![operand.as_ref()],
    };
    1 + children.into_iter().map(expr_height).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParseErrorKind, ResolvedInclude};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parse(source: &str) -> Program {
        PatternParser::new().parse(source).unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        PatternParser::new().parse(source).unwrap_err()
    }

    fn only_var(program: &Program) -> &VarDecl {
        match &program.items[..] {
            [Item::Statement(Stmt {
                kind: StmtKind::Var(var),
                ..
            })] => var,
            other => panic!("expected a single declaration, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_placement() {
        let program = parse("be u32 magic @ 0x10;");
        let var = only_var(&program);
        assert_eq!(var.ty.name, "u32");
        assert_eq!(var.ty.endian, Some(Endian::Big));
        assert_eq!(var.name, "magic");
        assert!(var.array.is_none());
        assert_eq!(
            var.placement.as_ref().map(|e| &e.kind),
            Some(&ExprKind::Literal(Literal::Integer(0x10)))
        );
    }

    #[test]
    fn test_parse_array_with_attributes() {
        let program = parse("u8 data[4] @ 0x00 [[color(\"FF0000\"), hidden]];");
        let var = only_var(&program);
        assert!(matches!(var.array, Some(ArraySize::Count(_))));
        let names: Vec<_> = var.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["color", "hidden"]);
        assert_eq!(var.attributes[0].args.len(), 1);
    }

    #[test]
    fn test_parse_while_sized_array() {
        let program = parse("u8 text[while(std::mem::read_unsigned($, 1) != 0)] @ 0;");
        let var = only_var(&program);
        assert!(matches!(var.array, Some(ArraySize::While(_))));
    }

    #[test]
    fn test_parse_struct_and_enum() {
        let program = parse(
            r#"
            enum Kind : u8 { A, B = 5, C, };
            struct Header {
                u8 len;
                Kind kind;
                if (len > 2) {
                    u8 extra[len - 2];
                } else {
                    padding[1];
                }
            };
            "#,
        );
        assert_eq!(program.items.len(), 2);
        match &program.items[0] {
            Item::Enum(decl) => {
                assert_eq!(decl.name, "Kind");
                assert_eq!(decl.variants.len(), 3);
                assert!(decl.variants[1].value.is_some());
            }
            other => panic!("expected enum, got {other:?}"),
        }
        match &program.items[1] {
            Item::Struct(decl) => {
                assert!(!decl.is_union);
                assert_eq!(decl.body.len(), 3);
            }
            other => panic!("expected struct, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_bitfield_using_function() {
        let program = parse(
            r#"
            bitfield Flags { a : 1; padding : 3; b : 4; };
            using Byte = u8;
            fn add(u32 x, u32 y) { return x + y; };
            "#,
        );
        match &program.items[0] {
            Item::Bitfield(decl) => {
                assert_eq!(decl.entries.len(), 3);
                assert!(decl.entries[1].name.is_none());
            }
            other => panic!("expected bitfield, got {other:?}"),
        }
        assert!(matches!(&program.items[1], Item::Using(u) if u.target.name == "u8"));
        assert!(matches!(&program.items[2], Item::Function(f) if f.params.len() == 2));
    }

    #[test]
    fn test_binary_precedence() {
        let program = parse("std::print(\"{}\", 1 + 2 * 3);");
        let Item::Statement(Stmt {
            kind: StmtKind::Expr(expr),
            ..
        }) = &program.items[0]
        else {
            panic!("expected expression statement");
        };
        let ExprKind::Call { callee, args } = &expr.kind else {
            panic!("expected call");
        };
        assert_eq!(callee, "std::print");
        match &args[1].kind {
            ExprKind::Binary { op, rhs, .. } => {
                assert_eq!(*op, BinaryOp::Add);
                assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn test_assignment_statements() {
        let program = parse("u32 x = 1; x += 2; $ = 4;");
        assert_eq!(program.items.len(), 3);
        assert!(matches!(
            &program.items[1],
            Item::Statement(Stmt { kind: StmtKind::Assign { op: AssignOp::Add, .. }, .. })
        ));
        assert!(matches!(
            &program.items[2],
            Item::Statement(Stmt { kind: StmtKind::Assign { target: AssignTarget::Cursor, .. }, .. })
        ));
    }

    #[rstest]
    #[case::missing_semicolon("u8 x @ 0x00\nu8 y @ 1;", 2, 1, "expected ';', found identifier 'u8'")]
    #[case::dangling_operator("u8 x @ 0x00;\nu8 y @ 0x01 +;", 2, 14, "expected expression, found ';'")]
    #[case::unclosed_struct("struct A {\n  u8 x;\n", 3, 1, "expected '}', found end of input")]
    #[case::reserved_name("u8 struct;", 1, 4, "expected ';', found identifier 'struct'")]
    fn test_syntax_error_locations(
        #[case] source: &str,
        #[case] line: u32,
        #[case] column: u32,
        #[case] message: &str,
    ) {
        let err = parse_err(source);
        assert_eq!(err.kind, ParseErrorKind::Syntax);
        assert_eq!(err.pos, Position::new(line, column));
        assert_eq!(err.message, message);
    }

    #[rstest]
    #[case::parentheses(format!("{}1{};", "(".repeat(10_000), ")".repeat(10_000)), 64)]
    #[case::unary_prefixes(format!("{}1;", "-".repeat(100_000)), 64)]
    #[case::operator_chain(format!("1{};", "+1".repeat(10_000)), 124)]
    #[case::nested_ifs(format!("{}x = 1;", "if (1) ".repeat(10_000)), 446)]
    fn test_nesting_depth_is_limited(#[case] source: String, #[case] column: u32) {
        let err = parse_err(&source);
        assert_eq!(err.kind, ParseErrorKind::Syntax);
        assert_eq!(err.pos, Position::new(1, column));
        assert_eq!(err.message, "nesting depth limit of 64 exceeded");
    }

    #[test]
    fn test_nesting_below_limit_parses() {
        let source = format!("x = {}1{};", "(".repeat(60), ")".repeat(60));
        let program = parse(&source);
        assert_eq!(program.items.len(), 1);

        let chain = format!("x = 1{};", "+1".repeat(60));
        assert_eq!(parse(&chain).items.len(), 1);
    }

    #[test]
    fn test_postfix_chain_is_limited() {
        let err = parse_err(&format!("x = a{};", "[0]".repeat(10_000)));
        assert_eq!(err.message, "nesting depth limit of 64 exceeded");
    }

    #[test]
    fn test_pragmas_are_collected() {
        let program = parse("#pragma endian big\n#pragma debug\nu8 x @ 0;");
        assert_eq!(program.pragmas.len(), 2);
        assert_eq!(program.pragma("endian").unwrap().value.as_deref(), Some("big"));
        assert!(program.pragma("debug").unwrap().value.is_none());
    }

    #[test]
    fn test_unknown_pragma_is_rejected() {
        let err = parse_err("\n#pragma frobnicate 3");
        assert_eq!(err.kind, ParseErrorKind::Preprocessor);
        assert_eq!(err.pos, Position::new(2, 1));
        assert_eq!(err.message, "unknown pragma 'frobnicate'");
    }

    #[test]
    fn test_include_without_resolver_fails() {
        let err = parse_err("#include <std/io.pat>");
        assert_eq!(err.kind, ParseErrorKind::Preprocessor);
        assert_eq!(err.message, "could not find include file 'std/io.pat'");
    }

    #[test]
    fn test_include_splices_items_once() {
        let resolver = |name: &str| {
            (name == "types.pat").then(|| ResolvedInclude {
                path: "/sources/includes/types.pat".into(),
                source: "#pragma once\nusing Byte = u8;".into(),
            })
        };
        let program = PatternParser::with_resolver(&resolver)
            .parse("#include <types.pat>\n#include \"types.pat\"\nByte b @ 0;")
            .unwrap();
        assert_eq!(program.items.len(), 2);
        assert!(program.pragma("once").is_none());
    }

    #[test]
    fn test_error_in_include_names_file() {
        let resolver = |_: &str| {
            Some(ResolvedInclude {
                path: "/sources/includes/broken.pat".into(),
                source: "u8 x @".into(),
            })
        };
        let err = PatternParser::with_resolver(&resolver)
            .parse("#include <broken.pat>")
            .unwrap_err();
        assert_eq!(err.file.as_deref(), Some("/sources/includes/broken.pat"));
        assert_eq!(err.pos, Position::new(1, 7));
    }

    #[test]
    fn test_recursive_include_hits_depth_limit() {
        let resolver = |_: &str| {
            Some(ResolvedInclude {
                path: "/sources/includes/self.pat".into(),
                source: "#include <self.pat>".into(),
            })
        };
        let err = PatternParser::with_resolver(&resolver)
            .parse("#include <self.pat>")
            .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Preprocessor);
        assert!(err.message.contains("include depth limit"));
    }
}
