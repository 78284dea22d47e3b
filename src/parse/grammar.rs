//! Recursive-descent grammar over the token stream.
//!
//! ```text
//! line      := IDENT '=' pipeline EOF | pipeline EOF
//! pipeline  := stage ('|' stage)*
//! stage     := '(' pipeline ')' FLAGARG* | call
//! call      := IDENT callargs? (VALUE | FLAGARG)*
//! callargs  := '(' (arg (',' arg)*)? ')'        -- '(' adjacent to IDENT
//! arg       := IDENT '=' VALUE | VALUE
//! FLAGARG   := FLAG VALUE?
//! VALUE     := STRING | NUMBER | IDENT | '.'
//! ```
//!
//! A flag consumes at most one following value token, never a
//! sub-pipeline; nested expressions need explicit grouping.

use serde_json::Value;

use super::types::{ParseNode, Span, Token, TokenKind};
use crate::error::EngineError;
use crate::value::is_identifier;

pub struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    /// `tokens` must end with `Eof`, as produced by the lexer from `src`.
    pub fn new(src: &'a str, tokens: Vec<Token>) -> Self {
        Self { src, tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn nth_kind(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self, expected: &str) -> EngineError {
        let tok = self.peek();
        let message = match tok.kind {
            TokenKind::Eof => "unexpected end of input".to_string(),
            ref other => format!("unexpected {}", other.describe()),
        };
        EngineError::syntax(message, tok.span.start, Some(expected))
    }

    pub fn parse_line(mut self) -> Result<ParseNode, EngineError> {
        if self.peek_kind() == &TokenKind::Eof {
            return Err(self.unexpected("a command"));
        }

        let node = if matches!(self.peek_kind(), TokenKind::Ident(_))
            && self.nth_kind(1) == Some(&TokenKind::Eq)
        {
            self.assignment()?
        } else {
            self.pipeline()?
        };

        if self.peek_kind() != &TokenKind::Eof {
            let expected = match self.peek_kind() {
                TokenKind::RParen => "no ')' without a matching '('",
                _ => "'|' or end of input",
            };
            return Err(self.unexpected(expected));
        }
        Ok(node)
    }

    fn assignment(&mut self) -> Result<ParseNode, EngineError> {
        let target = self.advance();
        let TokenKind::Ident(name) = target.kind else {
            return Err(EngineError::syntax("expected a variable name", target.span.start, None));
        };
        if !is_identifier(&name) {
            return Err(EngineError::syntax(
                format!("assignment target '{name}' must be a bare identifier"),
                target.span.start,
                Some("a name like 'pets'"),
            ));
        }
        self.advance(); // '='
        if self.peek_kind() == &TokenKind::Eof {
            return Err(self.unexpected("an expression after '='"));
        }
        let expr = self.pipeline()?;
        Ok(ParseNode::Assignment {
            target: name,
            span: Span::new(target.span.start, expr.span().end),
            expr: Box::new(expr),
        })
    }

    fn pipeline(&mut self) -> Result<ParseNode, EngineError> {
        let mut left = self.stage()?;
        while self.peek_kind() == &TokenKind::Pipe {
            self.advance();
            let right = self.stage()?;
            left = ParseNode::Pipe {
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn stage(&mut self) -> Result<ParseNode, EngineError> {
        match self.peek_kind() {
            TokenKind::LParen => self.group(),
            TokenKind::Ident(_) => self.call(),
            _ => Err(self.unexpected("a command name or '('")),
        }
    }

    fn group(&mut self) -> Result<ParseNode, EngineError> {
        let open = self.advance();
        if self.peek_kind() == &TokenKind::RParen {
            return Err(self.unexpected("a command inside '( )'"));
        }
        let inner = self.pipeline()?;
        if self.peek_kind() != &TokenKind::RParen {
            return Err(self.unexpected(&format!(
                "')' to close the group opened at column {}",
                open.span.column(self.src)
            )));
        }
        let close = self.advance();
        let mut end = close.span.end;

        let mut flags = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Flag(_) => {
                    let flag = self.flag_arg();
                    end = flag.span().end;
                    flags.push(flag);
                }
                TokenKind::Pipe | TokenKind::RParen | TokenKind::Eof => break,
                _ => return Err(self.unexpected("'|' or an output flag after a group")),
            }
        }

        Ok(ParseNode::Group {
            inner: Box::new(inner),
            flags,
            span: Span::new(open.span.start, end),
        })
    }

    fn call(&mut self) -> Result<ParseNode, EngineError> {
        let head = self.advance();
        let TokenKind::Ident(name) = head.kind else {
            return Err(EngineError::syntax("expected a command name", head.span.start, None));
        };
        let mut end = head.span.end;
        let mut positional = Vec::new();
        let mut flags = Vec::new();

        if self.peek_kind() == &TokenKind::LParen && self.peek().span.start == head.span.end {
            end = self.call_args(&mut positional, &mut flags)?;
        }

        loop {
            match self.peek_kind() {
                TokenKind::Flag(_) => {
                    let flag = self.flag_arg();
                    end = flag.span().end;
                    flags.push(flag);
                }
                TokenKind::Str(_) | TokenKind::Number(_) | TokenKind::Ident(_) | TokenKind::Dot => {
                    let value = self.value_node();
                    end = value.span().end;
                    positional.push(value);
                }
                TokenKind::Pipe | TokenKind::RParen | TokenKind::Eof => break,
                TokenKind::LParen => {
                    return Err(self.unexpected(
                        "'|' before a group, or no space between a command and its argument list",
                    ));
                }
                _ => return Err(self.unexpected("an argument, a flag, '|' or end of input")),
            }
        }

        Ok(ParseNode::Call {
            name,
            span: Span::new(head.span.start, end),
            positional,
            flags,
        })
    }

    /// `( arg, ... )` directly after a command name. Returns the end offset.
    fn call_args(
        &mut self,
        positional: &mut Vec<ParseNode>,
        flags: &mut Vec<ParseNode>,
    ) -> Result<usize, EngineError> {
        let open = self.advance();
        let closing_hint = format!(
            "')' to close the argument list opened at column {}",
            open.span.column(self.src)
        );

        if self.peek_kind() == &TokenKind::RParen {
            return Ok(self.advance().span.end);
        }

        loop {
            match self.peek_kind() {
                TokenKind::Ident(_) if self.nth_kind(1) == Some(&TokenKind::Eq) => {
                    let key = self.advance();
                    self.advance(); // '='
                    if !is_value(self.peek_kind()) {
                        return Err(self.unexpected(&format!("a value for '{}'", key.text)));
                    }
                    let value = self.value_node();
                    flags.push(ParseNode::FlagArg {
                        name: key.text,
                        span: Span::new(key.span.start, value.span().end),
                        value: Some(Box::new(value)),
                    });
                }
                _ if is_value(self.peek_kind()) => positional.push(self.value_node()),
                TokenKind::Eof => return Err(self.unexpected(&closing_hint)),
                _ => return Err(self.unexpected("an argument or ')'")),
            }

            match self.peek_kind() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => return Ok(self.advance().span.end),
                TokenKind::Eof => return Err(self.unexpected(&closing_hint)),
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }
    }

    fn flag_arg(&mut self) -> ParseNode {
        let tok = self.advance();
        let name = match tok.kind {
            TokenKind::Flag(name) => name,
            _ => tok.text,
        };
        if is_value(self.peek_kind()) {
            let value = self.value_node();
            ParseNode::FlagArg {
                name,
                span: Span::new(tok.span.start, value.span().end),
                value: Some(Box::new(value)),
            }
        } else {
            ParseNode::FlagArg {
                name,
                value: None,
                span: tok.span,
            }
        }
    }

    /// Caller has checked `is_value(self.peek_kind())`.
    fn value_node(&mut self) -> ParseNode {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Ident(name) => ParseNode::Identifier {
                name,
                span: tok.span,
            },
            TokenKind::Str(s) => ParseNode::Literal {
                value: Value::String(s),
                span: tok.span,
            },
            TokenKind::Number(n) => ParseNode::Literal {
                value: n,
                span: tok.span,
            },
            _ => ParseNode::Identifier {
                name: tok.text,
                span: tok.span,
            },
        }
    }
}

/// A lone `.` counts as a value so `--query .` reads naturally.
fn is_value(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Str(_) | TokenKind::Number(_) | TokenKind::Ident(_) | TokenKind::Dot
    )
}
