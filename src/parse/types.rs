//! Types produced by the lexer and grammar, consumed by the AST builder.

use serde_json::Value;

/// Byte-offset span within one line (or block) of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// 1-based column of the span start, counted in characters of `src`.
    pub fn column(&self, src: &str) -> usize {
        char_offset(src, self.start) + 1
    }
}

/// Number of characters before byte offset `byte`.
pub fn char_offset(src: &str, byte: usize) -> usize {
    src.get(..byte).map_or(byte, |head| head.chars().count())
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Bare word: command names, dotted paths (`a.b[0]`), sources (`user:github`).
    Ident(String),
    /// Quoted string with escapes already processed.
    Str(String),
    Number(Value),
    /// `--name`, stored without the dashes.
    Flag(String),
    /// `|`
    Pipe,
    /// `=`
    Eq,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// A `.` that does not belong to a word.
    Dot,
    /// `,` separating call arguments.
    Comma,
    Eof,
}

impl TokenKind {
    /// Short description used in syntax error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("'{s}'"),
            TokenKind::Str(s) => format!("string \"{s}\""),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::Flag(f) => format!("flag '--{f}'"),
            TokenKind::Pipe => "'|'".into(),
            TokenKind::Eq => "'='".into(),
            TokenKind::LParen => "'('".into(),
            TokenKind::RParen => "')'".into(),
            TokenKind::Dot => "'.'".into(),
            TokenKind::Comma => "','".into(),
            TokenKind::Eof => "end of input".into(),
        }
    }
}

/// A (kind, literal text, source span) triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The exact source text of the token, quotes included.
    pub text: String,
    pub span: Span,
}

/// Concrete parse tree for one line of input.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseNode {
    /// A quoted string or a number.
    Literal { value: Value, span: Span },
    Identifier { name: String, span: Span },
    /// `--name [value]`; `value` is a `Literal` or `Identifier` node. Also
    /// used for `key=value` call arguments.
    FlagArg {
        name: String,
        value: Option<Box<ParseNode>>,
        span: Span,
    },
    Call {
        name: String,
        span: Span,
        positional: Vec<ParseNode>,
        flags: Vec<ParseNode>,
    },
    /// Left-associative `left | right`.
    Pipe {
        left: Box<ParseNode>,
        right: Box<ParseNode>,
    },
    /// `( pipeline )`, optionally followed by output-directive flags.
    Group {
        inner: Box<ParseNode>,
        flags: Vec<ParseNode>,
        span: Span,
    },
    /// `target = expr`, only at the outermost level.
    Assignment {
        target: String,
        span: Span,
        expr: Box<ParseNode>,
    },
}

impl ParseNode {
    pub fn span(&self) -> Span {
        match self {
            ParseNode::Literal { span, .. }
            | ParseNode::Identifier { span, .. }
            | ParseNode::FlagArg { span, .. }
            | ParseNode::Call { span, .. }
            | ParseNode::Group { span, .. }
            | ParseNode::Assignment { span, .. } => *span,
            ParseNode::Pipe { left, right } => Span::new(left.span().start, right.span().end),
        }
    }
}
