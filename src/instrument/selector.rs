//! Choosing which functions get instrumented, and which patch functions can
//! be used as templates.

use crate::go::ast::{is_blank, FuncDecl, ImportSpec, ParamGroup, Stmt, TypeExpr, BLANK};
use crate::go::printer::print_func;
use crate::go::SourceUnit;
use crate::instrument::errors::{InstrumentError, SignatureMismatch};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Doc-comment line that keeps a function from being instrumented.
pub const EXCLUDE_MARKER: &str = "//instrument:exclude";

/// Predicate over function declarations.
pub trait FuncFilter: Send + Sync {
    fn matches(&self, decl: &FuncDecl) -> bool;
}

impl<F> FuncFilter for F
where
    F: Fn(&FuncDecl) -> bool + Send + Sync,
{
    fn matches(&self, decl: &FuncDecl) -> bool {
        self(decl)
    }
}

/// Matches declarations carrying [`EXCLUDE_MARKER`] in their doc comment.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocMarker;

impl FuncFilter for DocMarker {
    fn matches(&self, decl: &FuncDecl) -> bool {
        decl.doc.iter().any(|line| line.starts_with(EXCLUDE_MARKER))
    }
}

/// Matches declarations whose simple name matches the pattern. Without a
/// pattern nothing matches.
#[derive(Debug, Clone, Default)]
pub struct NamePattern(pub Option<Regex>);

impl FuncFilter for NamePattern {
    fn matches(&self, decl: &FuncDecl) -> bool {
        self.0
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(&decl.name))
    }
}

#[derive(Debug, Clone)]
pub struct Not<F>(pub F);

impl<F: FuncFilter> FuncFilter for Not<F> {
    fn matches(&self, decl: &FuncDecl) -> bool {
        !self.0.matches(decl)
    }
}

/// Conjunction; an empty list matches everything.
#[derive(Default)]
pub struct All(pub Vec<Box<dyn FuncFilter>>);

impl FuncFilter for All {
    fn matches(&self, decl: &FuncDecl) -> bool {
        self.0.iter().all(|filter| filter.matches(decl))
    }
}

/// Eligible targets: no exclusion marker and a name outside `exclude`.
pub fn default_filter(exclude: Option<Regex>) -> All {
    All(vec![
        Box::new(Not(DocMarker)),
        Box::new(Not(NamePattern(exclude))),
    ])
}

/// Declarations accepted by `filter`, in source order.
pub fn select<'a>(decls: &'a [FuncDecl], filter: &dyn FuncFilter) -> Vec<&'a FuncDecl> {
    decls.iter().filter(|decl| filter.matches(decl)).collect()
}

/// Names of the four template parameters; any of them may be `_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParams {
    pub span: String,
    pub has_ctx: String,
    pub ctx: String,
    pub args: String,
}

/// A patch function with the fixed
/// `(string, bool, <context>.Context, ...interface{})` shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchTemplate {
    pub name: String,
    pub params: TemplateParams,
    /// The patch file's name for the `context` package.
    pub ctx_package: String,
    pub body: Vec<Stmt>,
}

impl PatchTemplate {
    /// Check `decl` against the template shape. `imports` are the patch
    /// file's import specs, used to resolve the context package.
    pub fn from_decl(
        path: &Path,
        decl: &FuncDecl,
        imports: &[&ImportSpec],
    ) -> Result<Self, SignatureMismatch> {
        let mismatch = |reason: String| SignatureMismatch {
            path: path.to_path_buf(),
            function: decl.name.clone(),
            reason,
        };

        if decl.receiver.is_some() {
            return Err(mismatch("methods cannot be templates".into()));
        }
        let body = match &decl.body {
            Some(block) => block.statements.clone(),
            None => return Err(mismatch("declaration has no body".into())),
        };

        let flat: Vec<(&str, &ParamGroup)> = decl
            .params
            .iter()
            .flat_map(|group| match group.names.as_slice() {
                [] => vec![(BLANK, group)],
                names => names.iter().map(|name| (name.as_str(), group)).collect(),
            })
            .collect();
        let [span, has_ctx, ctx, args] = flat.as_slice() else {
            return Err(mismatch(format!(
                "expected 4 parameters, found {}",
                flat.len()
            )));
        };

        let is_named = |group: &ParamGroup, want: &str| {
            !group.variadic && matches!(&group.ty, TypeExpr::Named(name) if name == want)
        };
        if !is_named(span.1, "string") {
            return Err(mismatch(format!("parameter 1 must be string, found {}", span.1)));
        }
        if !is_named(has_ctx.1, "bool") {
            return Err(mismatch(format!("parameter 2 must be bool, found {}", has_ctx.1)));
        }

        let ctx_package = imports
            .iter()
            .find(|spec| spec.path == "context")
            .map(|spec| spec.binding().to_string());
        let ctx_package = match (&ctx.1.ty, ctx_package) {
            (TypeExpr::Qualified { package, name }, Some(binding))
                if !ctx.1.variadic && name == "Context" && *package == binding =>
            {
                binding
            }
            (_, None) => {
                return Err(mismatch("patch file does not import \"context\"".into()));
            }
            _ => {
                return Err(mismatch(format!(
                    "parameter 3 must be context.Context, found {}",
                    ctx.1
                )));
            }
        };

        if !(args.1.variadic && args.1.ty.is_any()) {
            return Err(mismatch(format!(
                "parameter 4 must be ...interface{{}}, found {}",
                args.1
            )));
        }

        Ok(Self {
            name: decl.name.clone(),
            params: TemplateParams {
                span: span.0.to_string(),
                has_ctx: has_ctx.0.to_string(),
                ctx: ctx.0.to_string(),
                args: args.0.to_string(),
            },
            ctx_package,
            body,
        })
    }

    /// Non-blank parameter names in declaration order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        let p = &self.params;
        [&p.span, &p.has_ctx, &p.ctx, &p.args]
            .into_iter()
            .map(String::as_str)
            .filter(|name| !is_blank(name))
    }

    /// Render the template as a Go function declaration.
    pub fn to_go(&self) -> String {
        let param = |name: &str, ty: TypeExpr, variadic: bool| ParamGroup {
            names: vec![name.to_string()],
            ty,
            variadic,
        };
        let params = [
            param(&self.params.span, TypeExpr::Named("string".into()), false),
            param(&self.params.has_ctx, TypeExpr::Named("bool".into()), false),
            param(
                &self.params.ctx,
                TypeExpr::Qualified {
                    package: self.ctx_package.clone(),
                    name: "Context".into(),
                },
                false,
            ),
            param(&self.params.args, TypeExpr::EmptyInterface, true),
        ];
        print_func(&self.name, &params, &self.body)
    }
}

/// A template together with the patch file it came from.
#[derive(Debug, Clone)]
pub struct SourcedTemplate {
    pub origin: PathBuf,
    pub template: PatchTemplate,
}

/// Every template found in `patches`, in patch order then source order.
///
/// Fails with [`InstrumentError::NoPatchFound`] when no patch file holds a
/// single valid template.
pub fn select_templates(patches: &[SourceUnit]) -> Result<Vec<SourcedTemplate>, InstrumentError> {
    let mut templates = Vec::new();
    let mut rejected = Vec::new();

    for patch in patches {
        let imports: Vec<&ImportSpec> = patch.import_specs().collect();
        let before = templates.len();
        for decl in patch.functions() {
            match PatchTemplate::from_decl(patch.path(), decl, &imports) {
                Ok(template) => templates.push(SourcedTemplate {
                    origin: patch.path().to_path_buf(),
                    template,
                }),
                Err(reason) => {
                    tracing::debug!(%reason, "skipping patch function");
                    rejected.push(reason);
                }
            }
        }
        if templates.len() == before {
            tracing::warn!(path = %patch.path().display(), "patch file holds no template");
        }
    }

    if templates.is_empty() {
        return Err(InstrumentError::NoPatchFound { rejected });
    }
    Ok(templates)
}
