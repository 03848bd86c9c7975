//! Synthesis of the statements injected at the top of a target function.

use crate::edit::Edit;
use crate::go::ast::{is_blank, Expr, FuncDecl, Stmt, TypeExpr};
use crate::go::printer::print_stmts;
use crate::go::SourceUnit;
use crate::instrument::errors::InstrumentError;
use crate::instrument::selector::PatchTemplate;

/// `(<recv>).<name>` for methods, `<name>` otherwise.
///
/// Receivers are reduced to their base type name, keeping the pointer:
/// `T`, `*T`, `T[P]` and `*T[P]` give `T`, `*T`, `T` and `*T`.
pub fn qualified_name(decl: &FuncDecl) -> Result<String, InstrumentError> {
    let Some(receiver) = &decl.receiver else {
        return Ok(decl.name.clone());
    };

    let base = |ty: &TypeExpr| match ty {
        TypeExpr::Named(name) => Some(name.clone()),
        TypeExpr::Generic { base, args } if args.len() == 1 => match base.as_ref() {
            TypeExpr::Named(name) => Some(name.clone()),
            _ => None,
        },
        _ => None,
    };
    let resolved = match &receiver.ty {
        TypeExpr::Pointer(inner) => base(inner).map(|name| format!("*{name}")),
        other => base(other),
    };

    match resolved {
        Some(ty) => Ok(format!("({ty}).{}", decl.name)),
        None => Err(InstrumentError::ReceiverShape {
            function: decl.name.clone(),
            receiver: receiver.ty.to_string(),
        }),
    }
}

/// `<file base name>-<package>.<qualified name>`
pub fn span_name(file_name: &str, package: &str, decl: &FuncDecl) -> Result<String, InstrumentError> {
    Ok(format!("{file_name}-{package}.{}", qualified_name(decl)?))
}

/// Builds injected statements for the functions of one target file.
#[derive(Debug)]
pub struct Synthesizer<'a> {
    file_name: String,
    package: &'a str,
    context_package: &'a str,
}

impl<'a> Synthesizer<'a> {
    pub fn new(target: &'a SourceUnit) -> Self {
        Self {
            file_name: target.file_name(),
            package: target.package(),
            context_package: target.import_binding("context").unwrap_or("context"),
        }
    }

    /// First non-blank parameter of type `context.Context`, spelled with the
    /// target's name for the package.
    pub fn context_param<'d>(&self, decl: &'d FuncDecl) -> Option<&'d str> {
        decl.params
            .iter()
            .filter(|group| !group.variadic && group.ty.is_qualified(self.context_package, "Context"))
            .flat_map(|group| group.names.iter())
            .map(String::as_str)
            .find(|name| !is_blank(name))
    }

    /// Statements binding `template`'s parameters for `decl`, followed by the
    /// template body. `None` for declarations without a body.
    pub fn synthesize(
        &self,
        decl: &FuncDecl,
        template: &PatchTemplate,
    ) -> Result<Option<Vec<Stmt>>, InstrumentError> {
        if decl.body.is_none() {
            return Ok(None);
        }
        let params = &template.params;
        let ctx_var = self.context_param(decl);
        let span = Expr::Str(span_name(&self.file_name, self.package, decl)?);

        let mut stmts = Vec::with_capacity(template.body.len() + 5);
        if is_blank(&params.span) {
            stmts.push(Stmt::assign(&params.span, span));
        } else {
            stmts.push(Stmt::define(&params.span, span));
        }

        if !is_blank(&params.has_ctx) {
            stmts.push(Stmt::define(&params.has_ctx, Expr::Bool(ctx_var.is_some())));
        }

        if !is_blank(&params.ctx) {
            let value = match ctx_var {
                Some(name) => Expr::ident(name),
                None => Expr::call_qualified(&template.ctx_package, "Background"),
            };
            stmts.push(Stmt::define(&params.ctx, value));
        }

        if !is_blank(&params.args) {
            stmts.push(Stmt::define(
                &params.args,
                Expr::SliceLit {
                    elem: TypeExpr::EmptyInterface,
                    elements: decl.param_names().map(Expr::ident).collect(),
                },
            ));
        }

        stmts.extend(template.body.iter().cloned());

        if let Some(name) = ctx_var {
            if !is_blank(&params.ctx) {
                stmts.push(Stmt::assign(name, Expr::ident(&params.ctx)));
            }
        }

        Ok(Some(stmts))
    }

    /// One insert after the opening brace of `decl` per template, in template
    /// order.
    pub fn edits(
        &self,
        decl: &FuncDecl,
        templates: &[PatchTemplate],
    ) -> Result<Vec<Edit>, InstrumentError> {
        let Some(block) = &decl.body else {
            return Ok(Vec::new());
        };
        let mut edits = Vec::with_capacity(templates.len());
        for template in templates {
            if let Some(stmts) = self.synthesize(decl, template)? {
                edits.push(Edit::insert(block.lbrace + 1, print_stmts(&stmts, 1)));
            }
        }
        Ok(edits)
    }
}
