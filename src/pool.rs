//! Thread-local parser pooling.
//!
//! Each worker thread keeps one [`GoParser`] and reuses it for every file it
//! instruments, so parallel runs never share parser state.

use crate::go::{GoParser, SyntaxError};
use std::cell::RefCell;

thread_local! {
    static GO_PARSER: RefCell<Option<GoParser>> = const { RefCell::new(None) };
}

/// Execute function with pooled parser instance.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use go_instrument::pool::with_parser;
///
/// let has_errors = with_parser(|parser| {
///     parser
///         .parse_with_source("package main\n")
///         .map(|parsed| parsed.has_errors())
/// })??;
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(f: F) -> Result<R, SyntaxError>
where
    F: FnOnce(&mut GoParser) -> R,
{
    GO_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(GoParser::new()?);
        }
        slot.as_mut()
            .map(f)
            .ok_or(SyntaxError::ParseFailed)
    })
}
