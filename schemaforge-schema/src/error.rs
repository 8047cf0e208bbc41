use thiserror::Error;

/// Malformed schema text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema parse error at {line}:{column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}
