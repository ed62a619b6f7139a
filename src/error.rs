use crate::token::Token;
use crate::types::GameVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Failures that stop the compiler outright. Problems in script text are [`Diagnostic`]s instead.
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("IOError: {0}")]
    IO(#[from] std::io::Error),
    #[error("FileNotFoundError: {0}")]
    FileNotFound(String),
    #[error("JsonError: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid syntax definition {id}: {message}")]
    InvalidSyntax { id: u32, message: String },
    #[error("Command {id} is not available for {version}")]
    MissingSyntax { id: u32, version: GameVersion },
    #[error("Jump on line {line} was never resolved")]
    UnresolvedJump { line: usize },
}

/// A problem found in script text: message, 1-based line and half-open character range.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, line: usize, start: usize, end: usize) -> Self {
        Self {
            message: message.into(),
            line,
            start,
            end,
        }
    }

    pub fn from_token(message: impl Into<String>, line: usize, token: &Token) -> Self {
        Self::new(message, line, token.start, token.end)
    }

    /// Formats the diagnostic against a source path, compiler style.
    pub fn render(&self, path: &Path) -> String {
        format!(
            "Error: {}\n  --> {}:{}:{}",
            self.message,
            path.display(),
            self.line,
            self.start + 1,
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "line {} [{}..{}]: {}",
            self.line, self.start, self.end, self.message
        )
    }
}
