pub mod grammar;
pub mod lexer;
pub mod types;

pub use lexer::{needs_continuation, tokenize};
pub use types::{ParseNode, Span, Token, TokenKind, char_offset};

use crate::error::EngineError;

/// Lex and parse one line (or balanced block) of input into a parse tree.
///
/// Syntax error positions are reported in characters, not bytes.
pub fn parse(line: &str) -> Result<ParseNode, EngineError> {
    let parsed = tokenize(line).and_then(|tokens| {
        log::trace!("tokens: {:?}", tokens.iter().map(|t| &t.kind).collect::<Vec<_>>());
        grammar::Parser::new(line, tokens).parse_line()
    });
    parsed.map_err(|e| match e {
        EngineError::Syntax {
            message,
            position,
            expected,
        } => EngineError::Syntax {
            message,
            position: char_offset(line, position),
            expected,
        },
        other => other,
    })
}
