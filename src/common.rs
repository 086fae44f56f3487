use std::{io, ops::Range, path::PathBuf};

pub type Span = Range<usize>;

/// A non-fatal problem found while parsing or running a script.
///
/// Diagnostics never stop the parser or the interpreter; they are collected
/// so callers can report them (the CLI prints them to stderr).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Error at line {line}: {message}")]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Diagnostic {
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not open {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not read picture folder {}", path.display())]
    Assets {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("console i/o failed")]
    Console(#[from] io::Error),
}
