use std::io::{self, BufReader, Bytes, Read};
use std::iter::Peekable;
use std::str::Chars;

use crate::error::GramError;

/// A forward-only character cursor the lexer pulls from.
pub trait Reader {
    fn has_next(&mut self) -> Result<bool, GramError>;
    fn next(&mut self) -> Result<char, GramError>;
}

fn exhausted() -> GramError {
    GramError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "read past the end of the schema source",
    ))
}

/// Reads from schema text that is already in memory.
pub struct StrReader<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> StrReader<'a> {
    pub fn new(content: &'a str) -> StrReader<'a> {
        StrReader {
            chars: content.chars().peekable(),
        }
    }
}

impl Reader for StrReader<'_> {
    fn has_next(&mut self) -> Result<bool, GramError> {
        Ok(self.chars.peek().is_some())
    }

    fn next(&mut self) -> Result<char, GramError> {
        self.chars.next().ok_or_else(exhausted)
    }
}

/// Reads a schema incrementally from any byte stream. Each byte becomes one
/// character, so sources are expected to be ASCII as TL schemas are.
pub struct StreamReader<R: Read> {
    bytes:  Bytes<BufReader<R>>,
    peeked: Option<u8>,
}

impl<R: Read> StreamReader<R> {
    pub fn new(source: R) -> StreamReader<R> {
        StreamReader {
            bytes:  BufReader::new(source).bytes(),
            peeked: None,
        }
    }
}

impl<R: Read> Reader for StreamReader<R> {
    fn has_next(&mut self) -> Result<bool, GramError> {
        if self.peeked.is_none() {
            self.peeked = self.bytes.next().transpose()?;
        }
        Ok(self.peeked.is_some())
    }

    fn next(&mut self) -> Result<char, GramError> {
        if !self.has_next()? {
            return Err(exhausted());
        }
        self.peeked.take().map(char::from).ok_or_else(exhausted)
    }
}
