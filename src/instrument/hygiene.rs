//! Hygienic renaming of template locals.
//!
//! Every name a template binds (its parameters and anything its body declares
//! or assigns) gets a suffix before the body is inlined, so the injected code
//! can never capture or shadow a name of the function it lands in.

use crate::go::ast::{is_blank, Stmt};
use crate::instrument::selector::{PatchTemplate, TemplateParams};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Names bound by `template`: its parameters plus every binding occurrence in
/// its body. `_` is never included.
pub fn collect_locals(template: &PatchTemplate) -> BTreeSet<String> {
    let mut locals: BTreeSet<String> = template.param_names().map(str::to_string).collect();
    for stmt in &template.body {
        if let Stmt::Fragment(fragment) = stmt {
            locals.extend(
                fragment
                    .bound_names()
                    .filter(|name| !is_blank(name))
                    .map(str::to_string),
            );
        }
    }
    locals
}

type Clock = dyn Fn() -> u64 + Send + Sync;

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Produces rename suffixes: patch file stem, clock reading and a counter
/// that never repeats for the lifetime of the generator.
pub struct SuffixGenerator {
    counter: AtomicU64,
    clock: Box<Clock>,
}

impl fmt::Debug for SuffixGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuffixGenerator")
            .field("counter", &self.counter.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for SuffixGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SuffixGenerator {
    pub fn new() -> Self {
        Self::with_clock(unix_seconds)
    }

    pub fn with_clock(clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        Self {
            counter: AtomicU64::new(0),
            clock: Box::new(clock),
        }
    }

    /// The process-wide generator.
    pub fn global() -> Arc<SuffixGenerator> {
        static GLOBAL: OnceLock<Arc<SuffixGenerator>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(SuffixGenerator::new())))
    }

    pub fn next(&self, patch_path: &Path) -> String {
        let count = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let stem = patch_path
            .file_stem()
            .map(|stem| stem.to_string_lossy())
            .unwrap_or_default();
        sanitise(&format!("{stem}{}{count}", (self.clock)()))
    }
}

/// Keep only characters valid anywhere in a Go identifier and not `_`.
fn sanitise(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Copy of `template` with every local `n` renamed to `n + suffix`.
pub fn rename(template: &PatchTemplate, suffix: &str) -> PatchTemplate {
    let mapping: HashMap<String, String> = collect_locals(template)
        .into_iter()
        .map(|name| {
            let renamed = format!("{name}{suffix}");
            (name, renamed)
        })
        .collect();
    let map = |name: &str| mapping.get(name).cloned().unwrap_or_else(|| name.to_string());

    let body = template
        .body
        .iter()
        .map(|stmt| match stmt {
            Stmt::Fragment(fragment) => Stmt::Fragment(fragment.renamed(&mapping)),
            other => other.clone(),
        })
        .collect();

    PatchTemplate {
        name: template.name.clone(),
        params: TemplateParams {
            span: map(&template.params.span),
            has_ctx: map(&template.params.has_ctx),
            ctx: map(&template.params.ctx),
            args: map(&template.params.args),
        },
        ctx_package: template.ctx_package.clone(),
        body,
    }
}

/// Renames templates against the identifiers already present in a target.
#[derive(Debug, Clone)]
pub struct Hygiene {
    suffixes: Arc<SuffixGenerator>,
}

impl Hygiene {
    pub fn new(suffixes: Arc<SuffixGenerator>) -> Self {
        Self { suffixes }
    }

    /// Rename `template` with fresh suffixes until no renamed local appears in
    /// `taken` or among the template's own identifiers.
    pub fn prepare(
        &self,
        template: &PatchTemplate,
        patch_path: &Path,
        taken: &HashSet<String>,
    ) -> PatchTemplate {
        let locals = collect_locals(template);
        let own: HashSet<&str> = template
            .body
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Fragment(fragment) => Some(fragment.idents()),
                _ => None,
            })
            .flatten()
            .collect();

        loop {
            let suffix = self.suffixes.next(patch_path);
            let collides = locals.iter().any(|name| {
                let renamed = format!("{name}{suffix}");
                taken.contains(&renamed) || own.contains(renamed.as_str())
            });
            if !collides {
                return rename(template, &suffix);
            }
            tracing::debug!(%suffix, template = %template.name, "suffix collides, drawing another");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::go::SourceUnit;
    use crate::instrument::selector::select_templates;
    use proptest::prelude::*;
    use std::path::PathBuf;

    const PATCH: &str = "package patch

import (
	\"context\"
	\"fmt\"
)

func Log(span string, _ bool, ctx context.Context, args ...interface{}) {
	msg := fmt.Sprintf(\"enter %s\", span)
	for i, arg := range args {
		fmt.Println(i, arg, msg)
	}
	var _ = ctx
	done := func(err error) { fmt.Println(span, err) }
	done(nil)
}
";

    fn template() -> PatchTemplate {
        let unit = SourceUnit::parse("log.go", PATCH).unwrap();
        select_templates(std::slice::from_ref(&unit))
            .unwrap()
            .remove(0)
            .template
    }

    fn body(template: &PatchTemplate) -> Vec<String> {
        template
            .body
            .iter()
            .map(|stmt| match stmt {
                Stmt::Fragment(fragment) => fragment.render().0,
                other => panic!("unexpected statement {other:?}"),
            })
            .collect()
    }

    #[test]
    fn collects_params_and_body_bindings() {
        let locals: Vec<String> = collect_locals(&template()).into_iter().collect();
        assert_eq!(
            locals,
            vec!["arg", "args", "ctx", "done", "err", "i", "msg", "span"]
        );
    }

    #[test]
    fn rename_rewrites_identifiers_only() {
        let renamed = rename(&template(), "X1");
        assert_eq!(renamed.params.span, "spanX1");
        assert_eq!(renamed.params.has_ctx, "_");
        assert_eq!(renamed.params.ctx, "ctxX1");
        assert_eq!(
            body(&renamed)[0],
            "msgX1 := fmt.Sprintf(\"enter %s\", spanX1)"
        );
        assert_eq!(body(&renamed)[2], "var _ = ctxX1");
        assert_eq!(
            body(&renamed)[3],
            "doneX1 := func(errX1 error) { fmt.Println(spanX1, errX1) }"
        );
    }

    #[test]
    fn struct_literal_keys_keep_field_names() {
        let patch = "package patch\n\nimport \"context\"\n\nfunc P(span string, has bool, ctx context.Context, args ...any) {\n\tstart := span\n\tm := struct{ start string }{start: start}\n\t_ = m\n}\n";
        let unit = SourceUnit::parse("p.go", patch).unwrap();
        let template = select_templates(std::slice::from_ref(&unit))
            .unwrap()
            .remove(0)
            .template;
        let renamed = rename(&template, "S1");
        assert_eq!(
            body(&renamed)[1],
            "mS1 := struct{ start string }{start: startS1}"
        );
    }

    #[test]
    fn suffix_uses_stem_clock_and_counter() {
        let generator = SuffixGenerator::with_clock(|| 1_700_000_000);
        let path = PathBuf::from("patches/my_trace.go");
        assert_eq!(generator.next(&path), "mytrace17000000001");
        assert_eq!(generator.next(&path), "mytrace17000000002");
    }

    #[test]
    fn prepare_skips_taken_suffixes() {
        let generator = Arc::new(SuffixGenerator::with_clock(|| 7));
        let hygiene = Hygiene::new(generator);
        let taken = HashSet::from(["msglog71".to_string()]);
        let prepared = hygiene.prepare(&template(), Path::new("log.go"), &taken);
        assert_eq!(prepared.params.span, "spanlog72");
    }

    #[test]
    fn global_generator_is_shared() {
        let a = SuffixGenerator::global();
        let b = SuffixGenerator::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert_ne!(a.next(Path::new("p.go")), b.next(Path::new("p.go")));
    }

    #[test]
    fn concurrent_draws_stay_unique() {
        let generator = Arc::new(SuffixGenerator::with_clock(|| 42));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || {
                    (0..1000)
                        .map(|_| generator.next(Path::new("trace.go")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for suffix in handle.join().unwrap() {
                assert!(seen.insert(suffix));
            }
        }
        assert_eq!(seen.len(), 8000);
    }

    proptest! {
        #[test]
        fn distinct_suffixes_never_collide(
            stem in "[a-z_]{1,8}",
            clock in 0u64..4_000_000_000,
            draws in 2usize..16,
        ) {
            let generator = SuffixGenerator::with_clock(move || clock);
            let path = PathBuf::from(format!("{stem}.go"));
            let locals = collect_locals(&template());
            let mut seen = HashSet::new();
            for _ in 0..draws {
                let suffix = generator.next(&path);
                prop_assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
                for name in &locals {
                    let fresh = seen.insert(format!("{name}{suffix}"));
                    prop_assert!(fresh);
                }
            }
        }
    }
}
