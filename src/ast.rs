// ABOUTME: Tagged AST node types produced by the parser

use crate::token::{Span, Token};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub enum PatternItem {
    Identifier(String),
    Argument(Box<Expr>),
}

#[derive(Debug, Clone, Serialize)]
pub enum DefPatternItem {
    Identifier(String),
    Parameter(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchArm {
    /// `None` means this is the default (`=>`-only) arm.
    pub values: Option<Vec<Expr>>,
    pub result: Expr,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatchArm {
    pub tags: Option<Vec<Expr>>,
    pub result: Expr,
}

#[derive(Debug, Clone, Serialize)]
pub enum MethodNode {
    Function {
        pattern: Vec<DefPatternItem>,
        body: BlockStatement,
        span: Span,
    },
    Init {
        pattern: Vec<DefPatternItem>,
        body: BlockStatement,
        span: Span,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockStatement {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum Expr {
    Number(f64, Span),
    StringLit(String, Span),
    CharLit(char, Span),
    Boolean(bool, Span),
    Null(Span),
    Identifier(String, Span),
    ArrayLit(Vec<Expr>, Span),
    MapLit(Vec<(Expr, Expr)>, Span),
    TupleLit(Vec<Expr>, Span),
    BlockLiteral {
        params: Vec<String>,
        body: Box<BlockStatement>,
        span: Span,
    },
    Prefix {
        op: String,
        right: Box<Expr>,
        span: Span,
    },
    Infix {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Dot {
        left: Box<Expr>,
        field: String,
        span: Span,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    Declare {
        name: String,
        value: Box<Expr>,
        span: Span,
    },
    If {
        condition: Box<Expr>,
        consequence: BlockStatement,
        alternative: Option<BlockStatement>,
        span: Span,
    },
    FunctionCall {
        pattern: Vec<PatternItem>,
        span: Span,
    },
    MethodCall {
        instance: Box<Expr>,
        pattern: Vec<PatternItem>,
        span: Span,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
        span: Span,
    },
    Try {
        body: Box<BlockStatement>,
        err_name: String,
        arms: Vec<CatchArm>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        use Expr::*;
        match self {
            Number(_, s) | StringLit(_, s) | CharLit(_, s) | Boolean(_, s) | Null(s)
            | Identifier(_, s) | ArrayLit(_, s) | MapLit(_, s) | TupleLit(_, s)
            | BlockLiteral { span: s, .. }
            | Prefix { span: s, .. }
            | Infix { span: s, .. }
            | Dot { span: s, .. }
            | Assign { span: s, .. }
            | Declare { span: s, .. }
            | If { span: s, .. }
            | FunctionCall { span: s, .. }
            | MethodCall { span: s, .. }
            | Match { span: s, .. }
            | Try { span: s, .. } => *s,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum Stmt {
    Expression(Expr),
    Return(Option<Expr>, Span),
    Block(BlockStatement),
    Next(Span),
    Break(Span),
    While {
        condition: Expr,
        body: BlockStatement,
        span: Span,
    },
    For {
        var: String,
        collection: Expr,
        body: BlockStatement,
        span: Span,
    },
    FunctionDefinition {
        pattern: Vec<DefPatternItem>,
        body: BlockStatement,
        span: Span,
    },
    Class {
        name: String,
        parent: Option<Expr>,
        methods: Vec<MethodNode>,
        span: Span,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// Renders a call/def pattern the way Pluto error messages show it:
/// `"greet $who"` for `[Identifier("greet"), Parameter("who")]`.
pub fn render_def_pattern(pattern: &[DefPatternItem]) -> String {
    pattern
        .iter()
        .map(|item| match item {
            DefPatternItem::Identifier(s) => s.clone(),
            DefPatternItem::Parameter(_) => "$".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn render_call_pattern(pattern: &[PatternItem]) -> String {
    pattern
        .iter()
        .map(|item| match item {
            PatternItem::Identifier(s) => s.clone(),
            PatternItem::Argument(_) => "$".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A leftover token reference kept only for diagnostics constructed while
/// parsing; not part of the tree itself.
#[allow(dead_code)]
pub fn token_span(tok: &Token) -> Span {
    tok.span()
}
