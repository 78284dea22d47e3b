//! Lexer: turns one line (or a balanced multi-line block) into tokens.

use serde_json::Value;

use super::types::{Span, Token, TokenKind};
use crate::error::EngineError;

/// Characters that always end a bare word.
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '|' | '=' | '(' | ')' | '"' | '\'')
}

/// Which kind of parenthesis is currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paren {
    /// `name(` with no space: argument list, where `,` separates.
    Call,
    Group,
}

pub struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    parens: Vec<Paren>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().collect(),
            pos: 0,
            parens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|&(_, c)| c)
    }

    /// Byte offset of the current char (or end of input).
    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(i, _)| i)
            .unwrap_or(self.src.len())
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn in_call_args(&self) -> bool {
        self.parens.last() == Some(&Paren::Call)
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, EngineError> {
        let mut tokens: Vec<Token> = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let start = self.offset();
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    span: Span::new(start, start),
                });
                break;
            };

            let kind = match c {
                '|' => {
                    self.pos += 1;
                    TokenKind::Pipe
                }
                '=' => {
                    self.pos += 1;
                    TokenKind::Eq
                }
                '(' => {
                    // Adjacent to a preceding word: argument list.
                    let call = tokens.last().is_some_and(|t| {
                        matches!(t.kind, TokenKind::Ident(_)) && t.span.end == start
                    });
                    self.parens.push(if call { Paren::Call } else { Paren::Group });
                    self.pos += 1;
                    TokenKind::LParen
                }
                ')' => {
                    self.parens.pop();
                    self.pos += 1;
                    TokenKind::RParen
                }
                ',' if self.in_call_args() => {
                    self.pos += 1;
                    TokenKind::Comma
                }
                '"' | '\'' => TokenKind::Str(self.string(c)?),
                '.' if self.peek_at(1).is_none_or(is_delimiter) => {
                    self.pos += 1;
                    TokenKind::Dot
                }
                _ => self.word(start)?,
            };

            let end = self.offset();
            tokens.push(Token {
                kind,
                text: self.src[start..end].to_string(),
                span: Span::new(start, end),
            });
        }
        Ok(tokens)
    }

    /// Quoted string. The opening quote is at the current position.
    fn string(&mut self, quote: char) -> Result<String, EngineError> {
        let open = self.offset();
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(EngineError::syntax(
                    "unterminated string",
                    open,
                    Some(&format!("closing {quote}")),
                ));
            };
            self.pos += 1;
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            match self.peek() {
                Some(e) => {
                    self.pos += 1;
                    match e {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        '\\' | '"' | '\'' => out.push(e),
                        // Unknown escapes are kept verbatim (paths, regexes).
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                None => {
                    return Err(EngineError::syntax(
                        "unterminated string",
                        open,
                        Some(&format!("closing {quote}")),
                    ));
                }
            }
        }
    }

    /// Bare word: flag, number, or identifier. A `{{ ... }}` template
    /// closed on the same line stays inside the word, spaces included.
    fn word(&mut self, start: usize) -> Result<TokenKind, EngineError> {
        let split_on_comma = self.in_call_args();
        while let Some(c) = self.peek() {
            if c == '{'
                && self.peek_at(1) == Some('{')
                && let Some(len) = template_len(&self.src[self.offset()..])
            {
                let end = self.offset() + len;
                while self.offset() < end {
                    self.pos += 1;
                }
                continue;
            }
            if is_delimiter(c) || (split_on_comma && c == ',') {
                break;
            }
            self.pos += 1;
        }
        let text = &self.src[start..self.offset()];

        if let Some(name) = text.strip_prefix("--") {
            let valid = name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(EngineError::syntax(
                    format!("invalid flag '{text}'"),
                    start,
                    Some("--name"),
                ));
            }
            return Ok(TokenKind::Flag(name.to_string()));
        }

        if let Some(n) = parse_number(text) {
            return Ok(TokenKind::Number(n));
        }
        Ok(TokenKind::Ident(text.to_string()))
    }
}

/// Byte length of the `{{ ... }}` template at the start of `rest`, if it
/// closes before the end of the line.
fn template_len(rest: &str) -> Option<usize> {
    let line = rest.split('\n').next().unwrap_or(rest);
    line.find("}}").map(|close| close + 2)
}

/// `-?digits[.digits][e[+-]digits]` as a whole word.
fn parse_number(text: &str) -> Option<Value> {
    let body = text.strip_prefix('-').unwrap_or(text);
    if !body.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if body.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(i) = text.parse::<i64>() {
            return Some(Value::from(i));
        }
    }
    let looks_numeric = body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !looks_numeric || body.ends_with('.') {
        return None;
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// Tokenize a full input line.
pub fn tokenize(src: &str) -> Result<Vec<Token>, EngineError> {
    Lexer::new(src).tokenize()
}

/// True when `src` has an unterminated string or unbalanced `(`, i.e. the
/// REPL should keep reading continuation lines.
pub fn needs_continuation(src: &str) -> bool {
    let (mut sq, mut dq, mut esc) = (false, false, false);
    // One entry per open paren: true for an argument list.
    let mut parens: Vec<bool> = Vec::new();
    let mut comment = false;
    // `#` opens a comment only where a token could start.
    let mut token_start = true;

    let mut chars = src.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if comment {
            if c == '\n' {
                comment = false;
                token_start = true;
            }
            continue;
        }
        if esc {
            esc = false;
            continue;
        }
        if c == '\\' && (sq || dq) {
            esc = true;
            continue;
        }
        if c == '\'' && !dq {
            sq = !sq;
            token_start = !sq;
            continue;
        }
        if c == '"' && !sq {
            dq = !dq;
            token_start = !dq;
            continue;
        }
        if sq || dq {
            continue;
        }
        if c == '{'
            && src[i + 1..].starts_with('{')
            && let Some(len) = template_len(&src[i..])
        {
            // Skip the template body; `chars` already consumed the first brace.
            let end = i + len;
            while chars.next_if(|&(j, _)| j < end).is_some() {}
            token_start = false;
            continue;
        }
        match c {
            '#' if token_start => comment = true,
            '(' => parens.push(!token_start),
            ')' => {
                parens.pop();
            }
            _ => {}
        }
        token_start = is_delimiter(c) || (c == ',' && parens.last() == Some(&true));
    }

    sq || dq || !parens.is_empty()
}
