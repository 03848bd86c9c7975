use crate::go::errors::SyntaxError;
use crate::go::parser::ErrorNode;
use crate::pool::with_parser;

fn error_nodes(source: &str) -> Result<Vec<ErrorNode>, SyntaxError> {
    with_parser(|parser| {
        parser
            .parse_with_source(source)
            .map(|parsed| parsed.error_nodes())
    })?
}

/// Validate that Go source code has no syntax errors.
pub fn validate_syntax(source: &str) -> Result<(), SyntaxError> {
    let errors = error_nodes(source)?;
    match errors.len() {
        0 => Ok(()),
        1 => Err(SyntaxError::InvalidSpan {
            byte_start: errors[0].byte_start,
            byte_end: errors[0].byte_end,
        }),
        n => Err(SyntaxError::MultipleSyntaxErrors { count: n }),
    }
}

/// Check that `rewritten` introduces no syntax errors that `original` did
/// not already have. Any growth in the number of error nodes counts.
pub fn validate_rewrite(original: &str, rewritten: &str) -> Result<(), SyntaxError> {
    let before = error_nodes(original)?.len();
    let after = error_nodes(rewritten)?;

    match after.len().saturating_sub(before) {
        0 => Ok(()),
        1 => Err(SyntaxError::InvalidSpan {
            byte_start: after[0].byte_start,
            byte_end: after[0].byte_end,
        }),
        n => Err(SyntaxError::MultipleSyntaxErrors { count: n }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_valid_syntax() {
        let source = "package main\n\nfunc main() {\n\tprintln(\"hello\")\n}\n";
        assert!(validate_syntax(source).is_ok());
    }

    #[test]
    fn validate_invalid_syntax() {
        assert!(validate_syntax("package main\n\nfunc main( { }\n").is_err());
    }

    #[test]
    fn rewrite_introducing_error_is_rejected() {
        let original = "package main\n\nfunc main() {\n}\n";
        let rewritten = "package main\n\nfunc main() {\n\tx := \n}\n";
        assert!(validate_rewrite(original, rewritten).is_err());
    }

    #[test]
    fn rewrite_of_valid_code_passes() {
        let original = "package main\n\nfunc main() {\n}\n";
        let rewritten = "package main\n\nfunc main() {\n\tx := 1\n\t_ = x\n}\n";
        assert!(validate_rewrite(original, rewritten).is_ok());
    }
}
