//! The instrumentation pipeline.
//!
//! For one target file: find the templates in the patch files, rename their
//! locals against the target, synthesize a prologue plus the template body for
//! every eligible function, merge the patch imports, then apply all edits to
//! the original bytes in one pass.

pub mod errors;
pub mod hygiene;
pub mod imports;
pub mod rewriter;
pub mod selector;
pub mod synth;

pub use errors::{InstrumentError, SignatureMismatch};
pub use hygiene::{collect_locals, rename, Hygiene, SuffixGenerator};
pub use imports::{merge_imports, missing_imports};
pub use rewriter::{Instrumenter, Rewrite};
pub use selector::{
    default_filter, select, select_templates, All, DocMarker, FuncFilter, NamePattern, Not,
    PatchTemplate, SourcedTemplate, TemplateParams, EXCLUDE_MARKER,
};
pub use synth::{qualified_name, span_name, Synthesizer};
