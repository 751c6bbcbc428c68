// ABOUTME: Pratt-style parser building an ast::Program from Pluto source text

use crate::ast::{
    BlockStatement, CatchArm, DefPatternItem, Expr, MatchArm, MethodNode, PatternItem, Program,
    Stmt,
};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::token::{Position, Span, Token, TokenKind};

const LOWEST: u8 = 0;
const ASSIGN: u8 = 1;
const COALESCE: u8 = 2;
const OR: u8 = 3;
const AND: u8 = 4;
const BIT_OR: u8 = 5;
const BIT_AND: u8 = 6;
const EQUALS: u8 = 7;
const LESS_GREATER: u8 = 8;
const SUM: u8 = 9;
const PRODUCT: u8 = 10;
const PREFIX: u8 = 11;
const DOT: u8 = 12;

fn token_precedence(kind: TokenKind) -> u8 {
    use TokenKind::*;
    match kind {
        Assign | Declare => ASSIGN,
        QMark => COALESCE,
        Or => OR,
        And => AND,
        BitOr => BIT_OR,
        BitAnd => BIT_AND,
        Eq | NotEq => EQUALS,
        Lt | Gt | Lte | Gte => LESS_GREATER,
        Plus | Minus => SUM,
        Star | Slash | Exp | FloorDiv | Mod => PRODUCT,
        Dot => DOT,
        _ => LOWEST,
    }
}

fn is_right_associative(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::Assign | TokenKind::Declare | TokenKind::Exp)
}

/// Buffers the whole token stream up front — Pluto programs are short
/// enough that this costs nothing, and it lets block-literal parameter
/// detection and tuple-vs-grouping disambiguation backtrack freely instead
/// of needing a separate lookahead lexer.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pub errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token();
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Parser {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        while !self.at_eof() {
            statements.push(self.parse_statement());
        }
        Program { statements }
    }

    // -- token cursor -----------------------------------------------------

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn cur_kind(&self) -> TokenKind {
        self.cur().kind
    }

    fn cur_span(&self) -> Span {
        self.cur().span()
    }

    fn prev_end(&self) -> Position {
        if self.pos == 0 {
            self.cur().start
        } else {
            self.tokens[self.pos - 1].end
        }
    }

    fn at_eof(&self) -> bool {
        self.cur_kind() == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(ParseError::new(message, self.cur_span()));
    }

    /// Consumes `kind`, recording an error (and skipping the offending
    /// token so parsing keeps making progress) if it isn't there.
    fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if self.cur_kind() == kind {
            Some(self.advance())
        } else {
            self.error(format!("expected {}, found {}", kind, self.cur()));
            if !self.at_eof() {
                self.advance();
            }
            None
        }
    }

    // -- statements ---------------------------------------------------

    fn parse_statement(&mut self) -> Stmt {
        match self.cur_kind() {
            TokenKind::Return => self.parse_return(),
            TokenKind::Next => {
                let span = self.advance().span();
                self.consume_optional_semi();
                Stmt::Next(span)
            }
            TokenKind::Break => {
                let span = self.advance().span();
                self.consume_optional_semi();
                Stmt::Break(span)
            }
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Def => self.parse_function_definition(),
            TokenKind::Class => self.parse_class(),
            TokenKind::LBrace => {
                let block = self.parse_brace_block();
                Stmt::Block(block)
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn consume_optional_semi(&mut self) {
        if self.cur_kind() == TokenKind::Semi {
            self.advance();
        }
    }

    fn parse_expression_statement(&mut self) -> Stmt {
        let expr = self.parse_expression(LOWEST);
        let ends_in_brace = matches!(
            expr,
            Expr::If { .. } | Expr::Match { .. } | Expr::Try { .. }
        );
        if self.cur_kind() == TokenKind::Semi {
            self.advance();
        } else if !ends_in_brace && self.cur_kind() != TokenKind::RBrace && !self.at_eof() {
            self.error(format!("expected ';', found {}", self.cur()));
        }
        Stmt::Expression(expr)
    }

    fn parse_return(&mut self) -> Stmt {
        let start = self.advance().start; // `return`
        if self.cur_kind() == TokenKind::Semi {
            let span = Span::new(start, self.advance().end);
            return Stmt::Return(None, span);
        }
        let value = self.parse_expression(LOWEST);
        let end = self.prev_end();
        self.consume_optional_semi();
        Stmt::Return(Some(value), Span::new(start, end))
    }

    fn parse_while(&mut self) -> Stmt {
        let start = self.advance().start; // `while`
        let condition = self.parse_expression(LOWEST);
        let body = self.parse_brace_block();
        let span = Span::new(start, body.span.end);
        Stmt::While {
            condition,
            body,
            span,
        }
    }

    fn parse_for(&mut self) -> Stmt {
        let start = self.advance().start; // `for`
        let var = self
            .expect(TokenKind::Ident)
            .map(|t| t.literal)
            .unwrap_or_default();
        self.expect(TokenKind::In);
        let collection = self.parse_expression(LOWEST);
        let body = self.parse_brace_block();
        let span = Span::new(start, body.span.end);
        Stmt::For {
            var,
            collection,
            body,
            span,
        }
    }

    fn parse_function_definition(&mut self) -> Stmt {
        let start = self.advance().start; // `def`
        let pattern = self.parse_def_pattern();
        let body = self.parse_brace_block();
        let span = Span::new(start, body.span.end);
        Stmt::FunctionDefinition {
            pattern,
            body,
            span,
        }
    }

    fn parse_def_pattern(&mut self) -> Vec<DefPatternItem> {
        let mut items = Vec::new();
        loop {
            match self.cur_kind() {
                TokenKind::Ident => {
                    items.push(DefPatternItem::Identifier(self.advance().literal));
                }
                TokenKind::Param => {
                    items.push(DefPatternItem::Parameter(self.advance().literal));
                }
                _ => break,
            }
        }
        if items.is_empty() {
            self.error("a function definition needs at least one keyword or parameter");
        }
        items
    }

    fn parse_class(&mut self) -> Stmt {
        let start = self.advance().start; // `class`
        let name = self
            .expect(TokenKind::Ident)
            .map(|t| t.literal)
            .unwrap_or_default();
        let parent = if self.cur_kind() == TokenKind::Extends {
            self.advance();
            Some(self.parse_expression(LOWEST))
        } else {
            None
        };
        self.expect(TokenKind::LBrace);
        let mut methods = Vec::new();
        while !self.at_eof() && self.cur_kind() != TokenKind::RBrace {
            methods.push(self.parse_method());
        }
        let end = self.expect(TokenKind::RBrace).map(|t| t.end).unwrap_or(self.prev_end());
        Stmt::Class {
            name,
            parent,
            methods,
            span: Span::new(start, end),
        }
    }

    fn parse_method(&mut self) -> MethodNode {
        let is_init = self.cur_kind() == TokenKind::Init;
        let start = self.advance().start; // `def` or `init`
        let pattern = self.parse_def_pattern();
        let body = self.parse_brace_block();
        let span = Span::new(start, body.span.end);
        if is_init {
            MethodNode::Init {
                pattern,
                body,
                span,
            }
        } else {
            MethodNode::Function {
                pattern,
                body,
                span,
            }
        }
    }

    /// A brace-delimited statement list used for control-flow/def/class
    /// bodies — distinct from an expression-position `{ ... }`, which is
    /// always a block-literal value (see `parse_block_literal`).
    fn parse_brace_block(&mut self) -> BlockStatement {
        let start = self
            .expect(TokenKind::LBrace)
            .map(|t| t.start)
            .unwrap_or(self.cur_span().start);
        let mut statements = Vec::new();
        while !self.at_eof() && self.cur_kind() != TokenKind::RBrace {
            statements.push(self.parse_statement());
        }
        let end = self
            .expect(TokenKind::RBrace)
            .map(|t| t.end)
            .unwrap_or(self.prev_end());
        BlockStatement {
            statements,
            span: Span::new(start, end),
        }
    }

    // -- expressions ----------------------------------------------------

    fn parse_expression(&mut self, precedence: u8) -> Expr {
        let mut left = self.parse_prefix();
        while self.cur_kind() != TokenKind::Semi
            && !self.at_eof()
            && precedence < token_precedence(self.cur_kind())
        {
            left = self.parse_infix(left);
        }
        left
    }

    fn parse_prefix(&mut self) -> Expr {
        match self.cur_kind() {
            TokenKind::Number => {
                let tok = self.advance();
                let value = tok.literal.parse::<f64>().unwrap_or_else(|_| {
                    self.errors
                        .push(ParseError::new("invalid numeric literal", tok.span()));
                    0.0
                });
                Expr::Number(value, tok.span())
            }
            TokenKind::String => {
                let tok = self.advance();
                let span = tok.span();
                Expr::StringLit(tok.literal, span)
            }
            TokenKind::Char => {
                let tok = self.advance();
                let c = tok.literal.chars().next().unwrap_or('\0');
                Expr::CharLit(c, tok.span())
            }
            TokenKind::True => {
                let tok = self.advance();
                Expr::Boolean(true, tok.span())
            }
            TokenKind::False => {
                let tok = self.advance();
                Expr::Boolean(false, tok.span())
            }
            TokenKind::Null => {
                let tok = self.advance();
                Expr::Null(tok.span())
            }
            TokenKind::Ident | TokenKind::Param => {
                let tok = self.advance();
                let span = tok.span();
                Expr::Identifier(tok.literal, span)
            }
            TokenKind::Minus | TokenKind::Plus => self.parse_prefix_op(),
            TokenKind::LParen => self.parse_paren_or_tuple(),
            TokenKind::LSquare => self.parse_array_or_map(),
            TokenKind::LBrace => self.parse_block_literal(),
            TokenKind::Backslash => self.parse_call_expr(),
            TokenKind::If => self.parse_if(),
            TokenKind::Match => self.parse_match(),
            TokenKind::Try => self.parse_try(),
            _ => {
                let tok = self.advance();
                self.errors.push(ParseError::new(
                    format!("unexpected token {}", tok),
                    tok.span(),
                ));
                Expr::Null(tok.span())
            }
        }
    }

    fn parse_prefix_op(&mut self) -> Expr {
        let tok = self.advance();
        let right = self.parse_expression(PREFIX);
        let span = Span::new(tok.start, right.span().end);
        Expr::Prefix {
            op: tok.literal,
            right: Box::new(right),
            span,
        }
    }

    fn parse_infix(&mut self, left: Expr) -> Expr {
        match self.cur_kind() {
            TokenKind::Dot => self.parse_dot(left),
            TokenKind::Assign => self.parse_assign(left),
            TokenKind::Declare => self.parse_declare(left),
            kind => {
                let tok = self.advance();
                let prec = token_precedence(kind);
                let right_prec = if is_right_associative(kind) {
                    prec.saturating_sub(1)
                } else {
                    prec
                };
                let right = self.parse_expression(right_prec);
                let span = Span::new(left.span().start, right.span().end);
                Expr::Infix {
                    op: tok.literal,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                }
            }
        }
    }

    fn parse_dot(&mut self, left: Expr) -> Expr {
        self.advance(); // `.`
        if self.cur_kind() == TokenKind::Backslash {
            self.advance(); // `\`
            let items = self.parse_pattern_items();
            let end = self.prev_end();
            let span = Span::new(left.span().start, end);
            return Expr::MethodCall {
                instance: Box::new(left),
                pattern: items,
                span,
            };
        }
        let field = self
            .expect(TokenKind::Ident)
            .map(|t| t.literal)
            .unwrap_or_default();
        let end = self.prev_end();
        let span = Span::new(left.span().start, end);
        Expr::Dot {
            left: Box::new(left),
            field,
            span,
        }
    }

    fn parse_assign(&mut self, left: Expr) -> Expr {
        self.advance(); // `=`
        let value = self.parse_expression(ASSIGN.saturating_sub(1));
        let span = Span::new(left.span().start, value.span().end);
        Expr::Assign {
            target: Box::new(left),
            value: Box::new(value),
            span,
        }
    }

    fn parse_declare(&mut self, left: Expr) -> Expr {
        self.advance(); // `:=`
        let name = match &left {
            Expr::Identifier(name, _) => name.clone(),
            other => {
                self.errors.push(ParseError::new(
                    "the left side of `:=` must be a plain identifier",
                    other.span(),
                ));
                String::new()
            }
        };
        let value = self.parse_expression(ASSIGN.saturating_sub(1));
        let span = Span::new(left.span().start, value.span().end);
        Expr::Declare {
            name,
            value: Box::new(value),
            span,
        }
    }

    /// Shared by the top-level `\pattern` call production and method
    /// calls after `.`: a greedy run of bare identifiers (literal keyword
    /// slots) and parenthesized expressions (argument slots).
    fn parse_pattern_items(&mut self) -> Vec<PatternItem> {
        let mut items = Vec::new();
        loop {
            match self.cur_kind() {
                TokenKind::Ident => {
                    items.push(PatternItem::Identifier(self.advance().literal));
                }
                TokenKind::LParen => {
                    self.advance(); // (
                    let expr = self.parse_expression(LOWEST);
                    self.expect(TokenKind::RParen);
                    items.push(PatternItem::Argument(Box::new(expr)));
                }
                _ => break,
            }
        }
        if items.is_empty() {
            self.error("a call pattern needs at least one keyword or argument");
        }
        items
    }

    fn parse_call_expr(&mut self) -> Expr {
        let start = self.advance().start; // `\`
        let pattern = self.parse_pattern_items();
        let end = self.prev_end();
        Expr::FunctionCall {
            pattern,
            span: Span::new(start, end),
        }
    }

    fn parse_paren_or_tuple(&mut self) -> Expr {
        let start = self.advance().start; // `(`
        if self.cur_kind() == TokenKind::RParen {
            let end = self.advance().end;
            return Expr::TupleLit(vec![], Span::new(start, end));
        }
        let first = self.parse_expression(LOWEST);
        if self.cur_kind() == TokenKind::Comma {
            let mut elements = vec![first];
            while self.cur_kind() == TokenKind::Comma {
                self.advance();
                if self.cur_kind() == TokenKind::RParen {
                    break;
                }
                elements.push(self.parse_expression(LOWEST));
            }
            let end = self.expect(TokenKind::RParen).map(|t| t.end).unwrap_or(self.prev_end());
            return Expr::TupleLit(elements, Span::new(start, end));
        }
        self.expect(TokenKind::RParen);
        first
    }

    fn parse_array_or_map(&mut self) -> Expr {
        let start = self.advance().start; // `[`
        if self.cur_kind() == TokenKind::Colon {
            self.advance();
            let end = self.expect(TokenKind::RSquare).map(|t| t.end).unwrap_or(self.prev_end());
            return Expr::MapLit(vec![], Span::new(start, end));
        }
        if self.cur_kind() == TokenKind::RSquare {
            let end = self.advance().end;
            return Expr::ArrayLit(vec![], Span::new(start, end));
        }

        let first = self.parse_expression(LOWEST);
        if self.cur_kind() == TokenKind::Colon {
            self.advance();
            let value = self.parse_expression(LOWEST);
            let mut pairs = vec![(first, value)];
            while self.cur_kind() == TokenKind::Comma {
                self.advance();
                if self.cur_kind() == TokenKind::RSquare {
                    break;
                }
                let k = self.parse_expression(LOWEST);
                self.expect(TokenKind::Colon);
                let v = self.parse_expression(LOWEST);
                pairs.push((k, v));
            }
            let end = self.expect(TokenKind::RSquare).map(|t| t.end).unwrap_or(self.prev_end());
            return Expr::MapLit(pairs, Span::new(start, end));
        }

        let mut elements = vec![first];
        while self.cur_kind() == TokenKind::Comma {
            self.advance();
            if self.cur_kind() == TokenKind::RSquare {
                break;
            }
            elements.push(self.parse_expression(LOWEST));
        }
        let end = self.expect(TokenKind::RSquare).map(|t| t.end).unwrap_or(self.prev_end());
        Expr::ArrayLit(elements, Span::new(start, end))
    }

    /// `{ params... -> body }` if a run of bare identifiers is directly
    /// followed by `->`; otherwise an ordinary zero-parameter block.
    /// Backtracks cleanly on a miss since params never commit statements.
    fn parse_block_literal(&mut self) -> Expr {
        let start = self.advance().start; // `{`
        let params = self.try_parse_block_params();
        let mut statements = Vec::new();
        while !self.at_eof() && self.cur_kind() != TokenKind::RBrace {
            statements.push(self.parse_statement());
        }
        let end = self
            .expect(TokenKind::RBrace)
            .map(|t| t.end)
            .unwrap_or(self.prev_end());
        Expr::BlockLiteral {
            params,
            body: Box::new(BlockStatement {
                statements,
                span: Span::new(start, end),
            }),
            span: Span::new(start, end),
        }
    }

    fn try_parse_block_params(&mut self) -> Vec<String> {
        let save = self.pos;
        let mut params = Vec::new();
        while self.cur_kind() == TokenKind::Ident {
            params.push(self.advance().literal);
        }
        if self.cur_kind() == TokenKind::Arrow {
            self.advance();
            params
        } else {
            self.pos = save;
            Vec::new()
        }
    }

    fn parse_if(&mut self) -> Expr {
        let start = self.advance().start; // `if`
        let condition = self.parse_expression(LOWEST);
        let consequence = self.parse_brace_block();
        let mut end = consequence.span.end;

        let alternative = match self.cur_kind() {
            TokenKind::Elif => {
                // elif desugars to `else { if ... }`.
                let nested = self.parse_if();
                end = nested.span().end;
                Some(BlockStatement {
                    span: nested.span(),
                    statements: vec![Stmt::Expression(nested)],
                })
            }
            TokenKind::Else => {
                self.advance();
                let block = self.parse_brace_block();
                end = block.span.end;
                Some(block)
            }
            _ => None,
        };

        Expr::If {
            condition: Box::new(condition),
            consequence,
            alternative,
            span: Span::new(start, end),
        }
    }

    fn parse_match(&mut self) -> Expr {
        let start = self.advance().start; // `match`
        let scrutinee = self.parse_expression(LOWEST);
        self.expect(TokenKind::LBrace);
        let mut arms = Vec::new();
        while !self.at_eof() && self.cur_kind() != TokenKind::RBrace {
            arms.push(self.parse_match_arm());
        }
        let end = self
            .expect(TokenKind::RBrace)
            .map(|t| t.end)
            .unwrap_or(self.prev_end());
        Expr::Match {
            scrutinee: Box::new(scrutinee),
            arms,
            span: Span::new(start, end),
        }
    }

    fn parse_match_arm(&mut self) -> MatchArm {
        if self.cur_kind() == TokenKind::FatArrow {
            self.advance();
            let result = self.parse_expression(LOWEST);
            self.consume_optional_semi();
            return MatchArm {
                values: None,
                result,
            };
        }
        let mut values = vec![self.parse_expression(LOWEST)];
        while self.cur_kind() == TokenKind::Comma {
            self.advance();
            values.push(self.parse_expression(LOWEST));
        }
        self.expect(TokenKind::FatArrow);
        let result = self.parse_expression(LOWEST);
        self.consume_optional_semi();
        MatchArm {
            values: Some(values),
            result,
        }
    }

    fn parse_try(&mut self) -> Expr {
        let start = self.advance().start; // `try`
        let body = self.parse_brace_block();
        self.expect(TokenKind::Catch);
        let err_name = self
            .expect(TokenKind::Ident)
            .map(|t| t.literal)
            .unwrap_or_default();
        self.expect(TokenKind::LBrace);
        let mut arms = Vec::new();
        while !self.at_eof() && self.cur_kind() != TokenKind::RBrace {
            arms.push(self.parse_catch_arm());
        }
        let end = self
            .expect(TokenKind::RBrace)
            .map(|t| t.end)
            .unwrap_or(self.prev_end());
        Expr::Try {
            body: Box::new(body),
            err_name,
            arms,
            span: Span::new(start, end),
        }
    }

    fn parse_catch_arm(&mut self) -> CatchArm {
        if self.cur_kind() == TokenKind::FatArrow {
            self.advance();
            let result = self.parse_expression(LOWEST);
            self.consume_optional_semi();
            return CatchArm { tags: None, result };
        }
        let mut tags = vec![self.parse_expression(LOWEST)];
        while self.cur_kind() == TokenKind::Comma {
            self.advance();
            tags.push(self.parse_expression(LOWEST));
        }
        self.expect(TokenKind::FatArrow);
        let result = self.parse_expression(LOWEST);
        self.consume_optional_semi();
        CatchArm {
            tags: Some(tags),
            result,
        }
    }
}
