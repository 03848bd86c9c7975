use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DepsError {
    #[error("failed to spawn `go mod download`: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("`go mod download` failed ({status}): {stderr}")]
    Download { status: String, stderr: String },

    #[error("malformed `go mod download -json` output: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{path}: not a go.mod file (missing module directive)")]
    InvalidGoMod { path: PathBuf },

    #[error("invalid module path pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DepsError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| DepsError::Io { path, source }
    }
}
