//! Whitespace-delimited token serialization for element configuration.
//!
//! Each device saves its configuration as a flat sequence of tokens:
//! numbers in engineering or plain notation, strings with backslash
//! escapes so they survive whitespace splitting. The surrounding file
//! grammar (one record per line, leading kind tag) belongs to whoever
//! stores the circuit; this module only defines the token protocol.

use crate::error::{Error, Result};
use crate::units::parse_value;

/// Escape a string so it forms a single whitespace-free token.
pub fn escape(s: &str) -> String {
    if s.is_empty() {
        return "\\0".into();
    }
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ' ' => out.push_str("\\s"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`escape`].
pub fn unescape(s: &str) -> String {
    if s == "\\0" {
        return String::new();
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Accumulates a token record.
#[derive(Debug, Default)]
pub struct TokenWriter {
    buf: String,
}

impl TokenWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn sep(&mut self) {
        if !self.buf.is_empty() {
            self.buf.push(' ');
        }
    }

    /// Append a raw token. The caller guarantees it is whitespace-free.
    pub fn push_token(&mut self, token: &str) {
        self.sep();
        self.buf.push_str(token);
    }

    /// Append a numeric parameter.
    pub fn push_num(&mut self, value: f64) {
        self.sep();
        self.buf.push_str(&format!("{value}"));
    }

    /// Append an integer parameter.
    pub fn push_int(&mut self, value: i64) {
        self.sep();
        self.buf.push_str(&format!("{value}"));
    }

    /// Append an escaped string parameter.
    pub fn push_str(&mut self, value: &str) {
        self.sep();
        self.buf.push_str(&escape(value));
    }

    /// The finished record.
    pub fn finish(self) -> String {
        self.buf
    }
}

/// Walks a token record.
#[derive(Debug)]
pub struct TokenReader<'a> {
    tokens: std::iter::Peekable<std::str::SplitWhitespace<'a>>,
}

impl<'a> TokenReader<'a> {
    pub fn new(record: &'a str) -> Self {
        Self {
            tokens: record.split_whitespace().peekable(),
        }
    }

    /// The next raw token.
    pub fn next_token(&mut self) -> Result<&'a str> {
        self.tokens
            .next()
            .ok_or_else(|| Error::MalformedRecord("unexpected end of record".into()))
    }

    /// The next token as a number, engineering suffixes allowed.
    pub fn num(&mut self) -> Result<f64> {
        let token = self.next_token()?;
        parse_value(token)
            .ok_or_else(|| Error::MalformedRecord(format!("expected a number, got '{token}'")))
    }

    /// The next token as an integer.
    pub fn int(&mut self) -> Result<i64> {
        let token = self.next_token()?;
        token
            .parse()
            .map_err(|_| Error::MalformedRecord(format!("expected an integer, got '{token}'")))
    }

    /// The next token as an unescaped string.
    pub fn string(&mut self) -> Result<String> {
        Ok(unescape(self.next_token()?))
    }

    /// True when the record is exhausted.
    pub fn finished(&mut self) -> bool {
        self.tokens.peek().is_none()
    }

    /// Error unless the record is exhausted.
    pub fn expect_end(&mut self) -> Result<()> {
        match self.tokens.peek() {
            None => Ok(()),
            Some(tok) => Err(Error::MalformedRecord(format!(
                "trailing token '{tok}' in record"
            ))),
        }
    }
}

/// Serialization contract: a device's configuration as a token sequence.
///
/// `read_params` must accept exactly what `write_params` produced.
pub trait Persist {
    /// Short type tag identifying the device kind.
    fn kind(&self) -> &'static str;

    /// Append configuration tokens.
    fn write_params(&self, w: &mut TokenWriter);

    /// Parse configuration tokens written by `write_params`.
    fn read_params(r: &mut TokenReader<'_>) -> Result<Self>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_round_trip() {
        for s in ["", "plain", "two words", "tab\there", "back\\slash", "a\nb"] {
            let escaped = escape(s);
            assert!(!escaped.contains(char::is_whitespace), "{escaped:?}");
            assert_eq!(unescape(&escaped), s);
        }
    }

    #[test]
    fn test_writer_reader_round_trip() {
        let mut w = TokenWriter::new();
        w.push_token("resistor");
        w.push_num(4700.0);
        w.push_int(-3);
        w.push_str("load resistor");
        let record = w.finish();

        let mut r = TokenReader::new(&record);
        assert_eq!(r.next_token().unwrap(), "resistor");
        assert_eq!(r.num().unwrap(), 4700.0);
        assert_eq!(r.int().unwrap(), -3);
        assert_eq!(r.string().unwrap(), "load resistor");
        assert!(r.finished());
    }

    #[test]
    fn test_reader_engineering_notation() {
        let mut r = TokenReader::new("4.7k 100n");
        assert!((r.num().unwrap() - 4700.0).abs() < 1e-9);
        assert!((r.num().unwrap() - 100e-9).abs() < 1e-18);
    }

    #[test]
    fn test_reader_errors() {
        let mut r = TokenReader::new("abc");
        assert!(r.num().is_err());
        assert!(r.next_token().is_err());

        let mut r = TokenReader::new("1 2");
        r.num().unwrap();
        assert!(r.expect_end().is_err());
    }
}
