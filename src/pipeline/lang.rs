// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Pipeline configuration grammar
//!
//! ```text
//! // comment             /* block comment */
//! define($DEV 0);
//! src :: FromDevice($DEV);
//! src -> EtherMirror -> [0] ToDevice($DEV) [0] -> Discard;
//! tee :: Tee(2);  tee [1] -> Print(copy) -> Discard;
//! ```
//!
//! Statements are separated by `;`. A statement is either a `define` of one or
//! more `$NAME value` pairs or a chain of elements joined by `->`. An element
//! in a chain is a declaration (`name :: Class(args)`), a reference to an
//! already declared name, or an anonymous `Class(args)`. Output and input
//! ports default to 0 and are written `[n]` after the source and before the
//! destination respectively.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct LangError {
    pub line: usize,
    pub message: String,
}

impl LangError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub class: String,
    pub args: Vec<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub from: String,
    pub from_port: usize,
    pub to: String,
    pub to_port: usize,
    pub line: usize,
}

/// A parsed configuration: declarations in source order plus connections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub declarations: Vec<Declaration>,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokKind {
    Ident(String),
    Args(String),
    Colons,
    Arrow,
    LBracket,
    RBracket,
    Semi,
}

#[derive(Debug, Clone)]
struct Tok {
    kind: TokKind,
    line: usize,
}

/// Parse configuration text
pub fn parse(text: &str) -> Result<Program, LangError> {
    let stripped = strip_comments(text)?;
    let tokens = tokenize(&stripped)?;
    let mut parser = Parser::default();
    for stmt in tokens.split(|t| t.kind == TokKind::Semi) {
        if !stmt.is_empty() {
            parser.statement(stmt)?;
        }
    }
    Ok(parser.program)
}

/// Blank out comments, keeping newlines so line numbers survive
fn strip_comments(text: &str) -> Result<String, LangError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut line = 1;
    let mut in_quote = false;

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
        }
        if in_quote {
            if c == '"' {
                in_quote = false;
            }
            out.push(c);
            continue;
        }
        match (c, chars.peek()) {
            ('"', _) => {
                in_quote = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                let start = line;
                chars.next();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == '\n' {
                        line += 1;
                        out.push('\n');
                    } else if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(LangError::new(start, "unterminated comment"));
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '@'
}

fn tokenize(text: &str) -> Result<Vec<Tok>, LangError> {
    let mut toks = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        if c == '\n' {
            line += 1;
            chars.next();
            continue;
        }
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let tok_line = line;
        let kind = match c {
            ';' => {
                chars.next();
                TokKind::Semi
            }
            '[' => {
                chars.next();
                TokKind::LBracket
            }
            ']' => {
                chars.next();
                TokKind::RBracket
            }
            ':' => {
                chars.next();
                if chars.next() != Some(':') {
                    return Err(LangError::new(line, "expected '::'"));
                }
                TokKind::Colons
            }
            '-' => {
                chars.next();
                if chars.next() != Some('>') {
                    return Err(LangError::new(line, "expected '->'"));
                }
                TokKind::Arrow
            }
            '(' => {
                chars.next();
                let mut depth = 1;
                let mut raw = String::new();
                let mut in_quote = false;
                loop {
                    let Some(c) = chars.next() else {
                        return Err(LangError::new(tok_line, "unterminated argument list"));
                    };
                    if c == '\n' {
                        line += 1;
                    }
                    if in_quote {
                        in_quote = c != '"';
                    } else if c == '"' {
                        in_quote = true;
                    } else if c == '(' {
                        depth += 1;
                    } else if c == ')' {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    raw.push(c);
                }
                TokKind::Args(raw)
            }
            c if is_ident_char(c) => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_ident_char(c) {
                        break;
                    }
                    ident.push(c);
                    chars.next();
                }
                TokKind::Ident(ident)
            }
            other => {
                return Err(LangError::new(
                    line,
                    format!("unexpected character '{}'", other),
                ))
            }
        };
        toks.push(Tok {
            kind,
            line: tok_line,
        });
    }
    Ok(toks)
}

/// Split an argument list at top-level commas
fn split_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    for c in raw.chars() {
        match c {
            '"' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => depth = depth.saturating_sub(1),
            ',' if !in_quote && depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    let last = current.trim();
    if !last.is_empty() || !args.is_empty() {
        args.push(last.to_string());
    }
    args
}

#[derive(Default)]
struct Parser {
    program: Program,
    defines: HashMap<String, String>,
    names: HashSet<String>,
    anon: usize,
}

impl Parser {
    fn substitute(&self, arg: &str, line: usize) -> Result<String, LangError> {
        let mut out = String::with_capacity(arg.len());
        let mut chars = arg.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if !(c.is_ascii_alphanumeric() || c == '_') {
                    break;
                }
                name.push(c);
                chars.next();
            }
            match self.defines.get(&name) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(LangError::new(
                        line,
                        format!("undefined variable '${}'", name),
                    ))
                }
            }
        }
        Ok(out)
    }

    fn args(&self, raw: &str, line: usize) -> Result<Vec<String>, LangError> {
        split_args(raw)
            .iter()
            .map(|a| self.substitute(a, line))
            .collect()
    }

    fn define(&mut self, raw: &str, line: usize) -> Result<(), LangError> {
        for arg in split_args(raw) {
            let malformed = || LangError::new(line, "define expects '$NAME value'");
            let rest = arg.strip_prefix('$').ok_or_else(malformed)?;
            let (name, value) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(malformed)?;
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(malformed());
            }
            let value = self.substitute(value.trim(), line)?;
            self.defines.insert(name.to_string(), value);
        }
        Ok(())
    }

    fn declare(&mut self, name: String, class: String, args: Vec<String>, line: usize) -> Result<String, LangError> {
        if !self.names.insert(name.clone()) {
            return Err(LangError::new(
                line,
                format!("redeclaration of element '{}'", name),
            ));
        }
        self.program.declarations.push(Declaration {
            name: name.clone(),
            class,
            args,
            line,
        });
        Ok(name)
    }

    fn anonymous(&mut self, class: String, args: Vec<String>, line: usize) -> Result<String, LangError> {
        self.anon += 1;
        let name = format!("{}@{}", class, self.anon);
        self.declare(name, class, args, line)
    }

    /// Parse one element reference starting at `i`; returns its name and the
    /// index of the next token
    fn element(&mut self, toks: &[Tok], i: usize) -> Result<(String, usize), LangError> {
        let tok = &toks[i];
        let TokKind::Ident(first) = &tok.kind else {
            return Err(LangError::new(tok.line, "expected element"));
        };
        let line = tok.line;

        match toks.get(i + 1).map(|t| &t.kind) {
            Some(TokKind::Colons) => {
                let Some(TokKind::Ident(class)) = toks.get(i + 2).map(|t| &t.kind) else {
                    return Err(LangError::new(line, "expected class name after '::'"));
                };
                let (args, next) = match toks.get(i + 3).map(|t| &t.kind) {
                    Some(TokKind::Args(raw)) => (self.args(raw, line)?, i + 4),
                    _ => (Vec::new(), i + 3),
                };
                let name = self.declare(first.clone(), class.clone(), args, line)?;
                Ok((name, next))
            }
            Some(TokKind::Args(raw)) => {
                let args = self.args(raw, line)?;
                let name = self.anonymous(first.clone(), args, line)?;
                Ok((name, i + 2))
            }
            _ if self.names.contains(first) => Ok((first.clone(), i + 1)),
            _ => {
                let name = self.anonymous(first.clone(), Vec::new(), line)?;
                Ok((name, i + 1))
            }
        }
    }

    fn port(&self, toks: &[Tok], i: usize) -> Result<Option<(usize, usize)>, LangError> {
        if toks.get(i).map(|t| &t.kind) != Some(&TokKind::LBracket) {
            return Ok(None);
        }
        let line = toks[i].line;
        let (Some(TokKind::Ident(n)), Some(TokKind::RBracket)) = (
            toks.get(i + 1).map(|t| &t.kind),
            toks.get(i + 2).map(|t| &t.kind),
        ) else {
            return Err(LangError::new(line, "malformed port"));
        };
        let port = n
            .parse::<usize>()
            .map_err(|_| LangError::new(line, format!("invalid port '{}'", n)))?;
        Ok(Some((port, i + 3)))
    }

    fn statement(&mut self, toks: &[Tok]) -> Result<(), LangError> {
        let line = toks[0].line;
        if let [Tok {
            kind: TokKind::Ident(kw),
            ..
        }, Tok {
            kind: TokKind::Args(raw),
            ..
        }] = toks
        {
            if kw == "define" {
                return self.define(raw, line);
            }
        }

        let mut i = 0;
        let mut upstream: Option<(String, usize)> = None;
        loop {
            let input_port = match self.port(toks, i)? {
                Some((p, next)) => {
                    i = next;
                    Some(p)
                }
                None => None,
            };
            if i >= toks.len() {
                return Err(LangError::new(line, "expected element"));
            }
            let (name, next) = self.element(toks, i)?;
            i = next;
            let output_port = match self.port(toks, i)? {
                Some((p, next)) => {
                    i = next;
                    Some(p)
                }
                None => None,
            };

            match upstream.take() {
                Some((from, from_port)) => self.program.connections.push(Connection {
                    from,
                    from_port,
                    to: name.clone(),
                    to_port: input_port.unwrap_or(0),
                    line: toks[i.saturating_sub(1)].line,
                }),
                None if input_port.is_some() => {
                    return Err(LangError::new(line, "input port with no connection"));
                }
                None => {}
            }

            if i == toks.len() {
                if output_port.is_some() {
                    return Err(LangError::new(line, "output port with no connection"));
                }
                return Ok(());
            }
            if toks[i].kind != TokKind::Arrow {
                return Err(LangError::new(toks[i].line, "expected '->' or ';'"));
            }
            i += 1;
            if i == toks.len() {
                return Err(LangError::new(toks[i - 1].line, "expected element after '->'"));
            }
            upstream = Some((name, output_port.unwrap_or(0)));
        }
    }
}
