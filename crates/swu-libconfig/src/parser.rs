//! libconfig text parser.
//!
//! Recursive descent over the source characters, tracking line and column
//! for diagnostics. `@include` directives are only honoured when parsing
//! from a file, since they resolve relative to the including file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::value::{Document, Group, Setting, Value};

/// Origin label used for text that did not come from a file.
const STRING_ORIGIN: &str = "<string>";

/// Errors produced while loading a libconfig document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{origin}:{line}:{column}: {message}")]
    Syntax {
        origin: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("include cycle through {}", .0.display())]
    IncludeCycle(PathBuf),
}

/// Parse a libconfig document from text.
///
/// `@include` directives are rejected; use [`parse_file`] for documents
/// that include other files.
pub fn parse(text: &str) -> Result<Document, ParseError> {
    let mut parser = Parser::new(text, STRING_ORIGIN.to_string(), None);
    let root = parser.parse_document(&mut Vec::new())?;
    Ok(Document::new(root))
}

/// Parse a libconfig document from a file, following `@include` directives.
pub fn parse_file(path: &Path) -> Result<Document, ParseError> {
    let mut stack = Vec::new();
    let root = parse_included(path, &mut stack)?;
    Ok(Document::new(root))
}

fn parse_included(path: &Path, stack: &mut Vec<PathBuf>) -> Result<Group, ParseError> {
    let canonical = fs::canonicalize(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if stack.contains(&canonical) {
        return Err(ParseError::IncludeCycle(canonical));
    }

    let text = fs::read_to_string(&canonical).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = canonical.parent().map(Path::to_path_buf);

    stack.push(canonical);
    let mut parser = Parser::new(&text, path.display().to_string(), base_dir);
    let group = parser.parse_document(stack);
    stack.pop();
    group
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    origin: String,
    base_dir: Option<PathBuf>,
}

impl Parser {
    fn new(text: &str, origin: String, base_dir: Option<PathBuf>) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            origin,
            base_dir,
        }
    }

    fn parse_document(&mut self, stack: &mut Vec<PathBuf>) -> Result<Group, ParseError> {
        let group = self.parse_settings(None, stack)?;
        self.skip_trivia()?;
        match self.peek() {
            None => Ok(group),
            Some(c) => Err(self.error(format!("unexpected '{}'", c))),
        }
    }

    /// Parse settings until `close` (or end of input for the top level).
    fn parse_settings(
        &mut self,
        close: Option<char>,
        stack: &mut Vec<PathBuf>,
    ) -> Result<Group, ParseError> {
        let mut group = Group::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => {
                    if let Some(close) = close {
                        return Err(self.error(format!("expected '{}' before end of input", close)));
                    }
                    return Ok(group);
                }
                Some(c) if Some(c) == close => return Ok(group),
                Some('@') => self.parse_include(&mut group, stack)?,
                Some(c) if is_name_start(c) => {
                    let setting = self.parse_setting(stack)?;
                    if group.contains(&setting.name) {
                        return Err(self.error(format!("duplicate setting '{}'", setting.name)));
                    }
                    group.push(setting);
                }
                Some(c) if close.is_none() => {
                    return Err(self.error(format!("unexpected '{}'", c)));
                }
                Some(c) => return Err(self.error(format!("expected setting name, found '{}'", c))),
            }
        }
    }

    fn parse_setting(&mut self, stack: &mut Vec<PathBuf>) -> Result<Setting, ParseError> {
        let name = self.parse_name();
        self.skip_trivia()?;
        match self.peek() {
            Some('=') | Some(':') => {
                self.bump();
            }
            _ => return Err(self.error(format!("expected '=' or ':' after '{}'", name))),
        }
        let value = self.parse_value(stack)?;
        self.skip_trivia()?;
        if matches!(self.peek(), Some(';') | Some(',')) {
            self.bump();
        }
        Ok(Setting { name, value })
    }

    fn parse_include(&mut self, group: &mut Group, stack: &mut Vec<PathBuf>) -> Result<(), ParseError> {
        self.bump();
        let directive = self.parse_name();
        if directive != "include" {
            return Err(self.error(format!("unknown directive '@{}'", directive)));
        }
        self.skip_trivia()?;
        if self.peek() != Some('"') {
            return Err(self.error("expected quoted path after @include"));
        }
        let target = self.parse_string()?;

        let base_dir = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => return Err(self.error("@include is only supported when parsing a file")),
        };
        let included = parse_included(&base_dir.join(target), stack)?;
        for setting in included.iter() {
            if group.contains(&setting.name) {
                return Err(self.error(format!("duplicate setting '{}' from include", setting.name)));
            }
            group.push(setting.clone());
        }
        Ok(())
    }

    fn parse_value(&mut self, stack: &mut Vec<PathBuf>) -> Result<Value, ParseError> {
        self.skip_trivia()?;
        match self.peek() {
            Some('{') => {
                self.bump();
                let group = self.parse_settings(Some('}'), stack)?;
                self.bump();
                Ok(Value::Group(group))
            }
            Some('(') => {
                self.bump();
                let items = self.parse_items(')', stack)?;
                Ok(Value::List(items))
            }
            Some('[') => {
                self.bump();
                let items = self.parse_items(']', stack)?;
                if let Some(bad) = items
                    .iter()
                    .find(|v| matches!(v, Value::Group(_) | Value::List(_) | Value::Array(_)))
                {
                    return Err(self.error(format!("array elements must be scalars, found {}", bad.kind())));
                }
                Ok(Value::Array(items))
            }
            Some('"') => {
                let mut text = self.parse_string()?;
                // Adjacent literals concatenate.
                loop {
                    self.skip_trivia()?;
                    if self.peek() != Some('"') {
                        break;
                    }
                    text.push_str(&self.parse_string()?);
                }
                Ok(Value::Str(text))
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() => {
                let word = self.parse_name();
                match word.to_ascii_lowercase().as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(self.error(format!("unexpected word '{}'", word))),
                }
            }
            Some(c) => Err(self.error(format!("unexpected '{}' where a value was expected", c))),
            None => Err(self.error("expected a value before end of input")),
        }
    }

    fn parse_items(&mut self, close: char, stack: &mut Vec<PathBuf>) -> Result<Vec<Value>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.peek() == Some(close) {
                self.bump();
                return Ok(items);
            }
            items.push(self.parse_value(stack)?);
            self.skip_trivia()?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(c) if c == close => {}
                Some(c) => return Err(self.error(format!("expected ',' or '{}', found '{}'", close, c))),
                None => return Err(self.error(format!("expected '{}' before end of input", close))),
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        self.bump();
        let mut out = String::new();
        loop {
            let c = match self.bump() {
                Some(c) => c,
                None => return Err(self.error("unterminated string")),
            };
            match c {
                '"' => return Ok(out),
                '\\' => {
                    let escaped = match self.bump() {
                        Some(e) => e,
                        None => return Err(self.error("unterminated escape")),
                    };
                    match escaped {
                        '"' => out.push('"'),
                        '\\' => out.push('\\'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        'f' => out.push('\u{0c}'),
                        'x' => {
                            let hi = self.bump().and_then(|c| c.to_digit(16));
                            let lo = self.bump().and_then(|c| c.to_digit(16));
                            match (hi, lo) {
                                (Some(hi), Some(lo)) => out.push(char::from((hi * 16 + lo) as u8)),
                                _ => return Err(self.error("invalid \\x escape")),
                            }
                        }
                        other => return Err(self.error(format!("invalid escape '\\{}'", other))),
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value, ParseError> {
        let (line, column) = (self.line, self.column);
        let mut token = String::new();
        while let Some(c) = self.peek() {
            let in_exponent = matches!(c, '+' | '-') && matches!(token.chars().last(), Some('e') | Some('E'));
            if c.is_ascii_alphanumeric() || c == '.' || in_exponent || (token.is_empty() && matches!(c, '+' | '-')) {
                token.push(c);
                self.bump();
            } else {
                break;
            }
        }

        let invalid = |parser: &Self| ParseError::Syntax {
            origin: parser.origin.clone(),
            line,
            column,
            message: format!("invalid number '{}'", token),
        };

        let (body, long) = match token.strip_suffix('L') {
            Some(body) => (body, true),
            None => (token.as_str(), false),
        };
        let (negative, digits) = match body.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, body.strip_prefix('+').unwrap_or(body)),
        };

        if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            let magnitude = u64::from_str_radix(hex, 16).map_err(|_| invalid(self))?;
            // Hex literals are bit patterns; 0xFFFFFFFF is a valid 32-bit value.
            let value = if negative {
                // -0x8000000000000000 is the most negative 64-bit value.
                i64::try_from(-i128::from(magnitude)).map_err(|_| invalid(self))?
            } else {
                magnitude as i64
            };
            return Ok(if long || magnitude > u64::from(u32::MAX) {
                Value::Int64(value)
            } else {
                Value::Int(value)
            });
        }

        let is_float = digits.contains('.') || digits.contains('e') || digits.contains('E');
        if is_float {
            if long {
                return Err(invalid(self));
            }
            return body.parse::<f64>().map(Value::Float).map_err(|_| invalid(self));
        }

        let value = body.parse::<i64>().map_err(|_| invalid(self))?;
        if long || i32::try_from(value).is_err() {
            Ok(Value::Int64(value))
        } else {
            Ok(Value::Int(value))
        }
    }

    fn parse_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        name
    }

    /// Skip whitespace and all three comment styles.
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('#'), _) | (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => return Err(self.error("unterminated comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            origin: self.origin.clone(),
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '*'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '*')
}
