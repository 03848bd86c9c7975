//! Go source handling: tree-sitter parsing, the owned declaration model and
//! the printer for synthesized code.
//!
//! Target files are never re-printed. The tree is only read to find byte
//! offsets and declarations; new code is printed separately and spliced in by
//! [`crate::edit`].

pub mod ast;
pub mod errors;
mod lower;
pub mod parser;
pub mod printer;
pub mod source;
pub mod validator;

pub use errors::SyntaxError;
pub use parser::{GoParser, ParsedSource};
pub use source::{LineIndex, SourceUnit};
pub use validator::{validate_rewrite, validate_syntax};
