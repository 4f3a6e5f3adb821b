use crate::errors::EntityError;

use super::expr::{PathNode, is_identifier};

// Safety limit to prevent resource abuse
const MAX_EXPRESSION_LEN: usize = 4096;

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        let word = &self.src[start..self.pos];
        if is_identifier(word) {
            Some(word)
        } else {
            self.pos = start;
            None
        }
    }

    /// Consumes a bracketed indexer and returns its trimmed content.
    fn indexer(&mut self) -> Result<&'a str, EntityError> {
        let open = self.pos;
        self.bump();
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.bump() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.src[start..self.pos - 1].trim());
                    }
                }
                _ => {}
            }
        }
        Err(unsupported(format!("unclosed indexer at position {open}")))
    }

    fn unexpected(&self) -> EntityError {
        match self.peek() {
            Some(c) => unsupported(format!("unexpected {c:?} at position {}", self.pos)),
            None => unsupported("unexpected end of expression".into()),
        }
    }
}

fn unsupported(msg: String) -> EntityError {
    EntityError::UnsupportedExpression(msg)
}

/// Parses `x => x.A[0].B`, `|x| x.A[0].B` or bare `x.A[0].B` into a node tree.
pub(crate) fn parse_expression(text: &str) -> Result<PathNode, EntityError> {
    if text.len() > MAX_EXPRESSION_LEN {
        return Err(unsupported(format!("expression longer than {MAX_EXPRESSION_LEN} bytes")));
    }
    let mut cur = Cursor::new(text.trim());
    if cur.rest().is_empty() {
        return Err(unsupported("empty expression".into()));
    }

    let param = if cur.eat("|") {
        cur.skip_ws();
        let p = cur.ident().ok_or_else(|| cur.unexpected())?;
        cur.skip_ws();
        if !cur.eat("|") {
            return Err(cur.unexpected());
        }
        Some(p)
    } else {
        let save = cur.pos;
        let p = cur.ident().ok_or_else(|| cur.unexpected())?;
        cur.skip_ws();
        if cur.eat("=>") {
            Some(p)
        } else {
            cur.pos = save;
            None
        }
    };

    cur.skip_ws();
    let root = cur.ident().ok_or_else(|| cur.unexpected())?;
    if let Some(p) = param
        && p != root
    {
        return Err(unsupported(format!("expression is rooted at {root:?}, not the parameter {p:?}")));
    }

    let mut node = PathNode::Root;
    loop {
        cur.skip_ws();
        match cur.peek() {
            None => break,
            Some('.') => {
                cur.bump();
                cur.skip_ws();
                let name = cur.ident().ok_or_else(|| cur.unexpected())?;
                cur.skip_ws();
                if cur.peek() == Some('(') {
                    return Err(unsupported(format!("method call {name}(..) is not a member access")));
                }
                node = PathNode::Member { name: name.to_string(), parent: Box::new(node) };
            }
            Some('[') => {
                let index = cur.indexer()?;
                if index.is_empty() {
                    return Err(unsupported("indexer without an argument".into()));
                }
                node = PathNode::Index { parent: Box::new(node) };
            }
            Some(_) => return Err(cur.unexpected()),
        }
    }

    node.validate()?;
    log::debug!("parsed expression {text:?} with root {root}");
    Ok(node)
}
