//! go-instrument: hygienic instrumentation of Go source files
//!
//! Functions in a target file receive a copy of the code held by "patch"
//! templates, prefixed with a small prologue binding the template's
//! parameters. Template locals are renamed with a fresh suffix first so the
//! injected code cannot capture or shadow anything in the target.
//!
//! # Architecture
//!
//! Every change to a target compiles down to a single primitive: [`Edit`], a
//! byte-span insert, delete or replace against the original buffer. Target
//! files are parsed with tree-sitter only to locate function bodies and the
//! import section; the original bytes outside the edit points are preserved
//! exactly.
//!
//! # Example
//!
//! ```no_run
//! use go_instrument::{Instrumenter, SourceUnit};
//!
//! let target = SourceUnit::read("api/user.go")?;
//! let patch = SourceUnit::read("trace.go")?;
//! let rewrite = Instrumenter::default().rewrite(&target, &[patch])?;
//! println!("{}", rewrite.content);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod deps;
pub mod edit;
pub mod go;
pub mod instrument;
pub mod pool;

// Re-exports
pub use config::{
    discover, load_from_path, load_from_str, ConfigError, InstrumentConfig, VendorConfig,
};
pub use deps::{vendor, DepsError, VendorReport};
pub use edit::{apply, write_atomic, Edit, EditError, EditKind, EditSet};
pub use go::{validate_rewrite, validate_syntax, SourceUnit, SyntaxError};
pub use instrument::{
    default_filter, FuncFilter, InstrumentError, Instrumenter, PatchTemplate, Rewrite,
    SignatureMismatch, SuffixGenerator,
};
