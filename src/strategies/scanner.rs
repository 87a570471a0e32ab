// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

//! Tokenizer for the arms of a shell `case ... esac` statement.
//!
//! The scanner walks the source byte by byte and understands just enough of
//! the shell grammar to find arm patterns, arm bodies and the closing `esac`:
//! single and double quotes, backslash escapes, `#` comments and nested
//! `case` blocks.  Terminators that appear inside any of those never end an
//! arm.  All delimiters are ASCII, so every slice taken lands on a UTF-8
//! character boundary.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Reached end of input before the `esac` closing the statement.
    #[error("case statement starting at byte {start} is not terminated by esac")]
    Unterminated { start: usize },
}

/// One arm of a case statement: its `|`-separated labels and the raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseArm<'a> {
    pub labels: Vec<String>,
    pub body: &'a str,
}

/// Parse arms starting at `start`, which must point just past the `in`
/// keyword of a `case WORD in` header.
pub fn parse_case_arms(src: &str, start: usize) -> Result<Vec<CaseArm<'_>>, ScanError> {
    let mut cur = Cursor::at(src, start);
    let mut arms = Vec::new();

    loop {
        cur.skip_blank();
        if cur.at_end() {
            return Err(ScanError::Unterminated { start });
        }
        if cur.at_keyword("esac") {
            return Ok(arms);
        }

        let pattern = cur
            .read_pattern()
            .ok_or(ScanError::Unterminated { start })?;
        let body = cur.read_body().ok_or(ScanError::Unterminated { start })?;
        arms.push(CaseArm {
            labels: split_labels(pattern),
            body,
        });
    }
}

/// Return the raw argument of the first `echo` in an arm body.  Quotes are
/// removed; everything inside them, including backslash-newline
/// continuations, is returned untouched.
pub fn echo_argument(body: &str) -> Option<&str> {
    let mut cur = Cursor::at(body, 0);

    while let Some(b) = cur.peek() {
        match b {
            b'\\' => cur.advance(2),
            b'\'' => {
                cur.skip_single_quoted();
            }
            b'"' => {
                cur.skip_double_quoted();
            }
            b'#' if cur.at_word_start() => cur.skip_line(),
            _ if cur.at_keyword("echo") => {
                cur.advance(4);
                return cur.read_echo_operand();
            }
            _ => cur.advance(1),
        }
    }
    None
}

/// Byte offset of the `}` closing a brace group whose body starts at
/// `start`.  Braces inside quotes and comments are not counted; `${...}`
/// expansions balance like any other group.
pub fn block_end(src: &str, start: usize) -> Option<usize> {
    let mut cur = Cursor::at(src, start);
    let mut depth = 0usize;

    while let Some(b) = cur.peek() {
        match b {
            b'\\' => cur.advance(2),
            b'\'' => {
                cur.skip_single_quoted();
            }
            b'"' => {
                cur.skip_double_quoted();
            }
            b'#' if cur.at_word_start() => cur.skip_line(),
            b'{' => {
                depth += 1;
                cur.advance(1);
            }
            b'}' => {
                if depth == 0 {
                    return Some(cur.pos);
                }
                depth -= 1;
                cur.advance(1);
            }
            _ => cur.advance(1),
        }
    }
    None
}

/// Split a raw arm pattern into its alternatives, dropping surrounding quotes.
fn split_labels(pattern: &str) -> Vec<String> {
    pattern
        .split('|')
        .map(|label| {
            let label = label.trim();
            let unquoted = label
                .strip_prefix('"')
                .and_then(|l| l.strip_suffix('"'))
                .or_else(|| label.strip_prefix('\'').and_then(|l| l.strip_suffix('\'')))
                .unwrap_or(label);
            unquoted.to_string()
        })
        .filter(|label| !label.is_empty())
        .collect()
}

/// Bytes that may legally precede a reserved word.
fn is_word_boundary_before(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b';' | b'(' | b')' | b'|' | b'&')
}

fn is_word_boundary_after(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b';' | b')')
}

struct Cursor<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at(src: &'a str, pos: usize) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: pos.min(src.len()),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.bytes.len());
    }

    fn at_word_start(&self) -> bool {
        self.pos == 0 || is_word_boundary_before(self.bytes[self.pos - 1])
    }

    /// True when a reserved word starts here and is delimited on both sides.
    fn at_keyword(&self, word: &str) -> bool {
        if !self.at_word_start() || !self.bytes[self.pos..].starts_with(word.as_bytes()) {
            return false;
        }
        self.bytes
            .get(self.pos + word.len())
            .is_none_or(|&b| is_word_boundary_after(b))
    }

    fn skip_line(&mut self) {
        while let Some(b) = self.peek() {
            self.advance(1);
            if b == b'\n' {
                break;
            }
        }
    }

    /// Skip whitespace and full-line comments between arms.
    fn skip_blank(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' => self.advance(1),
                b'#' => self.skip_line(),
                _ => break,
            }
        }
    }

    /// Skip a single-quoted string.  Returns false if input ends first.
    fn skip_single_quoted(&mut self) -> bool {
        self.advance(1);
        while let Some(b) = self.peek() {
            self.advance(1);
            if b == b'\'' {
                return true;
            }
        }
        false
    }

    /// Skip a double-quoted string.  Returns false if input ends first.
    fn skip_double_quoted(&mut self) -> bool {
        self.advance(1);
        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.advance(2),
                b'"' => {
                    self.advance(1);
                    return true;
                }
                _ => self.advance(1),
            }
        }
        false
    }

    /// Length of an `echo` option word (`-n`, `-e`, `-E` or a combination)
    /// starting here, if there is one.
    fn echo_flag_len(&self) -> Option<usize> {
        let rest = &self.bytes[self.pos..];
        let len = rest
            .iter()
            .position(|b| matches!(b, b' ' | b'\t' | b'\n' | b';'))
            .unwrap_or(rest.len());
        let word = &rest[..len];
        let is_flag = word.len() > 1
            && word[0] == b'-'
            && word[1..].iter().all(|b| matches!(b, b'n' | b'e' | b'E'));
        is_flag.then_some(len)
    }

    /// Read an arm pattern up to its closing `)`.
    fn read_pattern(&mut self) -> Option<&'a str> {
        if self.peek() == Some(b'(') {
            self.advance(1);
        }
        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b')' => {
                    let pattern = &self.src[start..self.pos];
                    self.advance(1);
                    return Some(pattern);
                }
                b'\\' => self.advance(2),
                b'\'' => {
                    self.skip_single_quoted();
                }
                b'"' => {
                    self.skip_double_quoted();
                }
                _ => self.advance(1),
            }
        }
        None
    }

    /// Read an arm body up to `;;`, `;&`, `;;&` or the enclosing `esac`.
    /// The terminator is consumed; a closing `esac` is left for the caller.
    fn read_body(&mut self) -> Option<&'a str> {
        let start = self.pos;
        let mut depth = 0usize;

        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.advance(2),
                b'\'' => {
                    self.skip_single_quoted();
                }
                b'"' => {
                    self.skip_double_quoted();
                }
                b'#' if self.at_word_start() => self.skip_line(),
                b';' if depth == 0 && matches!(self.peek_at(1), Some(b';') | Some(b'&')) => {
                    let body = &self.src[start..self.pos];
                    self.advance(2);
                    if self.peek() == Some(b'&') {
                        self.advance(1);
                    }
                    return Some(body);
                }
                _ if self.at_keyword("case") => {
                    depth += 1;
                    self.advance(4);
                }
                _ if self.at_keyword("esac") => {
                    if depth == 0 {
                        return Some(&self.src[start..self.pos]);
                    }
                    depth -= 1;
                    self.advance(4);
                }
                _ => self.advance(1),
            }
        }
        None
    }

    /// Read the operand that follows an `echo`, skipping any option flags.
    fn read_echo_operand(&mut self) -> Option<&'a str> {
        loop {
            while matches!(self.peek(), Some(b' ' | b'\t')) {
                self.advance(1);
            }
            if self.peek() == Some(b'\\') && self.peek_at(1) == Some(b'\n') {
                self.advance(2);
                continue;
            }
            if let Some(len) = self.echo_flag_len() {
                self.advance(len);
                continue;
            }
            break;
        }

        // A quote that never closes yields nothing rather than a guess.
        match self.peek()? {
            b'"' => {
                let start = self.pos + 1;
                if self.skip_double_quoted() {
                    Some(&self.src[start..self.pos - 1])
                } else {
                    None
                }
            }
            b'\'' => {
                let start = self.pos + 1;
                if self.skip_single_quoted() {
                    Some(&self.src[start..self.pos - 1])
                } else {
                    None
                }
            }
            b'\n' | b';' => None,
            _ => {
                // Unquoted: every word up to the end of the command.
                let start = self.pos;
                while let Some(b) = self.peek() {
                    match b {
                        b'\\' => self.advance(2),
                        b'\n' | b';' => break,
                        b'#' if self.at_word_start() => break,
                        _ => self.advance(1),
                    }
                }
                Some(self.src[start..self.pos].trim_end())
            }
        }
    }
}
