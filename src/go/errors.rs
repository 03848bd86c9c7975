use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyntaxError {
    #[error("failed to set Go language for parser")]
    LanguageSet,

    #[error("failed to parse source code")]
    ParseFailed,

    #[error("{path}:{line}:{column}: syntax error")]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
    },

    #[error("syntax error detected at byte {byte_start}..{byte_end}")]
    InvalidSpan { byte_start: usize, byte_end: usize },

    #[error("multiple syntax errors detected: {count} ERROR nodes")]
    MultipleSyntaxErrors { count: usize },

    #[error("{path}: missing package clause")]
    MissingPackage { path: PathBuf },

    #[error("{path}: source is not valid UTF-8")]
    Utf8 { path: PathBuf },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
