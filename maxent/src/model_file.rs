//! Tokenizer for the whitespace separated model file format.
use std::{
    io::{BufReader, Read},
    str::FromStr,
};

use flussab::{text::LineReader, DeferredReader};

use crate::error::{Error, Result};

/// Reads whitespace separated tokens from a model file.
///
/// Reading stops right after the last requested token, so several models stored back to back in
/// one stream can be read with the same reader.
pub struct TokenReader<'r> {
    input: LineReader<'r>,
    token: String,
}

impl<'r> TokenReader<'r> {
    /// Creates a token reader reading from a [`BufReader`].
    pub fn from_buf_reader(buf_reader: BufReader<impl Read + 'r>) -> Self {
        Self::from_line_reader(LineReader::new(DeferredReader::from_buf_reader(buf_reader)))
    }

    /// Creates a token reader reading from a [`Read`] instance.
    ///
    /// If the [`Read`] instance is a [`BufReader`], it is better to use
    /// [`from_buf_reader`][Self::from_buf_reader] to avoid double buffering.
    pub fn new(read: impl Read + 'r) -> Self {
        Self::from_line_reader(LineReader::new(DeferredReader::from_read(read)))
    }

    fn from_line_reader(input: LineReader<'r>) -> Self {
        Self {
            input,
            token: String::new(),
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.input.reader.request_byte() {
                Some(b'\n') => {
                    self.input.reader.advance(1);
                    self.input.line_at_offset(0);
                }
                Some(byte) if byte.is_ascii_whitespace() => self.input.reader.advance(1),
                _ => break,
            }
        }
    }

    #[cold]
    fn invalid_token(&mut self, message: String) -> Error {
        let err = self.input.give_up_at(self.input.reader.mark(), message);
        Error::input("TokenReader", err.to_string())
    }

    /// Returns the next token, or `None` at the end of the input.
    pub fn next_token(&mut self) -> Result<Option<&str>> {
        self.skip_whitespace();
        self.input.reader.set_mark();

        let mut len = 0;
        while matches!(
            self.input.reader.request_byte_at_offset(len),
            Some(byte) if !byte.is_ascii_whitespace()
        ) {
            len += 1;
        }
        if len == 0 {
            self.input.reader.check_io_error()?;
            return Ok(None);
        }

        match std::str::from_utf8(&self.input.reader.buf()[..len]) {
            Ok(token) => {
                self.token.clear();
                self.token.push_str(token);
            }
            Err(err) => {
                return Err(self.invalid_token(format!("token is not valid UTF-8: {err}")));
            }
        }
        self.input.reader.advance(len);
        Ok(Some(&self.token))
    }

    /// Returns the next token, failing at the end of the input.
    ///
    /// `what` names the expected item for the error message.
    pub fn expect_token(&mut self, what: &str) -> Result<&str> {
        match self.next_token()? {
            Some(token) => Ok(token),
            None => Err(Error::input(
                "TokenReader::expect_token",
                format!("unexpected end of input, expected {what}"),
            )),
        }
    }

    /// Parses the next token.
    pub fn parse<T: FromStr>(&mut self, what: &str) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        let token = self.expect_token(what)?;
        let message = match token.parse() {
            Ok(value) => return Ok(value),
            Err(err) => format!("invalid {what} {token:?}: {err}"),
        };
        Err(self.invalid_token(message))
    }
}
