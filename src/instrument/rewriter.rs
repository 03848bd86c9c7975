use crate::edit::EditSet;
use crate::go::{validate_rewrite, SourceUnit, SyntaxError};
use crate::instrument::errors::InstrumentError;
use crate::instrument::hygiene::{collect_locals, Hygiene, SuffixGenerator};
use crate::instrument::imports::merge_imports;
use crate::instrument::selector::{default_filter, select, select_templates, FuncFilter};
use crate::instrument::synth::{qualified_name, Synthesizer};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of instrumenting one file.
#[derive(Debug, Clone)]
pub struct Rewrite {
    /// The rewritten file.
    pub content: String,
    /// Qualified names of the functions that received code.
    pub instrumented: Vec<String>,
    /// The edits that produced `content` from the original buffer.
    pub edits: EditSet,
}

impl Rewrite {
    pub fn is_unchanged(&self) -> bool {
        self.instrumented.is_empty()
    }
}

/// Injects patch templates into target files.
pub struct Instrumenter {
    filter: Box<dyn FuncFilter>,
    suffixes: Arc<SuffixGenerator>,
    validate_output: bool,
}

impl Default for Instrumenter {
    fn default() -> Self {
        Self::new(default_filter(None))
    }
}

impl Instrumenter {
    pub fn new(filter: impl FuncFilter + 'static) -> Self {
        Self {
            filter: Box::new(filter),
            suffixes: SuffixGenerator::global(),
            validate_output: true,
        }
    }

    pub fn with_suffixes(mut self, suffixes: Arc<SuffixGenerator>) -> Self {
        self.suffixes = suffixes;
        self
    }

    /// Re-parse the output and fail on syntax errors the edits introduced.
    pub fn validate_output(mut self, validate: bool) -> Self {
        self.validate_output = validate;
        self
    }

    /// Instrument `target` with every template found in `patches`.
    ///
    /// Nothing is written anywhere; any error discards all edits for the file.
    pub fn rewrite(
        &self,
        target: &SourceUnit,
        patches: &[SourceUnit],
    ) -> Result<Rewrite, InstrumentError> {
        let sourced = select_templates(patches)?;
        let original = target.content();
        let mut edits = EditSet::for_buffer(original.as_bytes());

        if target.functions().is_empty() {
            debug!(path = %target.path().display(), "no functions, leaving file unchanged");
            return Ok(Rewrite {
                content: original.to_string(),
                instrumented: Vec::new(),
                edits,
            });
        }

        let hygiene = Hygiene::new(Arc::clone(&self.suffixes));
        let mut taken = target.identifiers();
        let mut templates = Vec::with_capacity(sourced.len());
        for entry in &sourced {
            let renamed = hygiene.prepare(&entry.template, &entry.origin, &taken);
            taken.extend(collect_locals(&renamed));
            debug!(
                template = %renamed.name,
                origin = %entry.origin.display(),
                "prepared template"
            );
            templates.push(renamed);
        }

        let synth = Synthesizer::new(target);
        let mut instrumented = Vec::new();
        for decl in select(target.functions(), self.filter.as_ref()) {
            let inserts = synth.edits(decl, &templates)?;
            if inserts.is_empty() {
                continue;
            }
            let name = qualified_name(decl)?;
            debug!(function = %name, edits = inserts.len(), "instrumenting");
            edits.extend(inserts);
            instrumented.push(name);
        }

        if instrumented.is_empty() {
            return Ok(Rewrite {
                content: original.to_string(),
                instrumented,
                edits,
            });
        }
        edits.push(merge_imports(target, patches));

        let bytes = edits.apply(original.as_bytes())?;
        let content = String::from_utf8(bytes).map_err(|_| SyntaxError::Utf8 {
            path: target.path().to_path_buf(),
        })?;

        if self.validate_output {
            validate_rewrite(original, &content).map_err(|source| {
                InstrumentError::InvalidOutput {
                    path: target.path().to_path_buf(),
                    source,
                }
            })?;
        }

        info!(
            path = %target.path().display(),
            functions = instrumented.len(),
            "instrumented"
        );
        Ok(Rewrite {
            content,
            instrumented,
            edits,
        })
    }
}
