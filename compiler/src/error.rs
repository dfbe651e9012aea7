use thiserror::Error;

use crate::tokenizer::LexState;

#[derive(Debug, Error)]
pub enum GramError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lexical error at line {line}, column {column}: unexpected {ch:?} in state {state:?}")]
    Lex {
        state:  LexState,
        ch:     char,
        line:   usize,
        column: usize,
    },

    #[error("Unexpected end of input in state {state:?} at line {line}, column {column}")]
    UnexpectedEof {
        state:  LexState,
        line:   usize,
        column: usize,
    },

    #[error("Malformed type literal {0}")]
    MalformedType(String),

    #[error("Parse error at line {line}, column {column}: {msg}")]
    ParseError {
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("Unresolved reference: type {name} of field {field} in {definition} is never defined")]
    UnresolvedReference {
        name:       String,
        field:      String,
        definition: String,
    },

    #[error("Verifier error: {0}")]
    VerifierError(String),

    #[error("Invalid settings: {0}")]
    Settings(String),

    #[error("Settings JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
