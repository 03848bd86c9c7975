use crate::edit::EditError;
use crate::go::SyntaxError;
use std::path::PathBuf;
use thiserror::Error;

/// Why a patch-file function is not a usable template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}: func {function}: {reason}")]
pub struct SignatureMismatch {
    pub path: PathBuf,
    pub function: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("no valid patch found ({} candidate(s) rejected)", rejected.len())]
    NoPatchFound { rejected: Vec<SignatureMismatch> },

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("func {function}: unsupported receiver type `{receiver}`")]
    ReceiverShape { function: String, receiver: String },

    #[error("{path}: instrumented output does not parse: {source}")]
    InvalidOutput {
        path: PathBuf,
        #[source]
        source: SyntaxError,
    },
}
