//! Renders synthesized syntax back to Go source text.
//!
//! Output never depends on the byte layout of the file it will be inserted
//! into: statements are laid out one per line at a fixed tab indentation.
//! Printed blocks start and end with a newline so they can be dropped right
//! after an opening brace or a package clause.

use crate::go::ast::{Expr, Fragment, ImportSpec, ParamGroup, Stmt};
use std::fmt::Write as _;

/// Quote `value` as a Go interpreted string literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub fn print_expr(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Str(value) => quote(value),
        Expr::Bool(value) => value.to_string(),
        Expr::Selector { operand, field } => format!("{}.{}", print_expr(operand), field),
        Expr::Call { func, args } => format!("{}({})", print_expr(func), print_list(args)),
        Expr::SliceLit { elem, elements } => format!("[]{}{{{}}}", elem, print_list(elements)),
    }
}

fn print_list(exprs: &[Expr]) -> String {
    exprs.iter().map(print_expr).collect::<Vec<_>>().join(", ")
}

/// Print `stmts` one per line, each indented by `indent` tabs.
pub fn print_stmts(stmts: &[Stmt], indent: usize) -> String {
    let pad = "\t".repeat(indent);
    let mut out = String::from("\n");
    for stmt in stmts {
        write_stmt(&mut out, stmt, &pad);
        out.push('\n');
    }
    out
}

fn write_stmt(out: &mut String, stmt: &Stmt, pad: &str) {
    match stmt {
        Stmt::Assign { lhs, op, rhs } => {
            let _ = write!(
                out,
                "{pad}{} {} {}",
                print_list(lhs),
                op.token(),
                print_list(rhs)
            );
        }
        Stmt::Fragment(fragment) => write_fragment(out, fragment, pad),
    }
}

fn write_fragment(out: &mut String, fragment: &Fragment, pad: &str) {
    let (text, verbatim) = fragment.render();
    let mut offset = 0;
    for (i, line) in text.split('\n').enumerate() {
        let start = offset;
        offset += line.len() + 1;
        if i == 0 {
            out.push_str(pad);
            out.push_str(line);
            continue;
        }
        out.push('\n');
        if verbatim.iter().any(|range| range.start < start && start < range.end) {
            out.push_str(line);
            continue;
        }
        let line = strip_indent(line, &fragment.base_indent);
        if line.trim().is_empty() {
            continue;
        }
        out.push_str(pad);
        out.push_str(line);
    }
}

/// Remove at most `base.len()` bytes of leading blanks.
fn strip_indent<'a>(line: &'a str, base: &str) -> &'a str {
    if let Some(rest) = line.strip_prefix(base) {
        return rest;
    }
    let blanks = line
        .bytes()
        .take(base.len())
        .take_while(|b| *b == b' ' || *b == b'\t')
        .count();
    &line[blanks..]
}

fn spec_text(spec: &ImportSpec) -> String {
    match &spec.alias {
        Some(alias) => format!("{alias} {}", quote(&spec.path)),
        None => quote(&spec.path),
    }
}

/// Print a complete `import` declaration; empty when there are no specs.
pub fn print_import_decl(specs: &[ImportSpec]) -> String {
    match specs {
        [] => String::new(),
        [spec] => format!("\nimport {}\n", spec_text(spec)),
        _ => {
            let mut out = String::from("\nimport (\n");
            out.push_str(&print_import_specs(specs, 1));
            out.push_str(")\n");
            out
        }
    }
}

/// Print bare import specs, one per line.
pub fn print_import_specs(specs: &[ImportSpec], indent: usize) -> String {
    let pad = "\t".repeat(indent);
    specs
        .iter()
        .map(|spec| format!("{pad}{}\n", spec_text(spec)))
        .collect()
}

/// Print a function declaration.
pub fn print_func(name: &str, params: &[ParamGroup], body: &[Stmt]) -> String {
    let params = params
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("func {name}({params}) {{{}}}\n", print_stmts(body, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::go::ast::{Piece, TypeExpr};

    fn fragment(pieces: Vec<Piece>, base: &str) -> Stmt {
        Stmt::Fragment(Fragment {
            pieces,
            base_indent: base.to_string(),
        })
    }

    #[test]
    fn quotes_go_strings() {
        assert_eq!(quote("a.go-main.(*T).f"), "\"a.go-main.(*T).f\"");
        assert_eq!(quote("say \"hi\"\\\n"), "\"say \\\"hi\\\"\\\\\\n\"");
        assert_eq!(quote("\u{1}"), "\"\\x01\"");
    }

    #[test]
    fn prints_synthesized_assignments() {
        let stmts = vec![
            Stmt::define("span", Expr::Str("x.go-p.f".into())),
            Stmt::define("ctx2", Expr::call_qualified("gonativectx", "Background")),
            Stmt::define(
                "args2",
                Expr::SliceLit {
                    elem: TypeExpr::EmptyInterface,
                    elements: vec![Expr::ident("a"), Expr::ident("b")],
                },
            ),
            Stmt::assign("ctx", Expr::ident("ctx2")),
        ];
        assert_eq!(
            print_stmts(&stmts, 1),
            "\n\tspan := \"x.go-p.f\"\n\tctx2 := gonativectx.Background()\n\targs2 := []interface{}{a, b}\n\tctx = ctx2\n"
        );
    }

    #[test]
    fn reindents_fragments() {
        let stmt = fragment(
            vec![
                Piece::Text("if ".into()),
                Piece::Ident { name: "ok".into(), bound: false },
                Piece::Text(" {\n\t\t\tcall()\n\n\t\t}".into()),
            ],
            "\t\t",
        );
        assert_eq!(print_stmts(&[stmt], 1), "\n\tif ok {\n\t\tcall()\n\n\t}\n");
    }

    #[test]
    fn raw_string_lines_are_untouched() {
        let stmt = fragment(
            vec![
                Piece::Ident { name: "s".into(), bound: true },
                Piece::Text(" := ".into()),
                Piece::Verbatim("`a\n    b\n`".into()),
            ],
            "    ",
        );
        assert_eq!(print_stmts(&[stmt], 2), "\n\t\ts := `a\n    b\n`\n");
    }

    #[test]
    fn prints_import_decls() {
        let one = [ImportSpec::new(None, "context")];
        assert_eq!(print_import_decl(&one), "\nimport \"context\"\n");

        let two = [
            ImportSpec::new(Some("gonativectx"), "context"),
            ImportSpec::new(None, "runtime/trace"),
        ];
        assert_eq!(
            print_import_decl(&two),
            "\nimport (\n\tgonativectx \"context\"\n\t\"runtime/trace\"\n)\n"
        );
        assert_eq!(print_import_decl(&[]), "");
        assert_eq!(print_import_specs(&two[1..], 1), "\t\"runtime/trace\"\n");
    }

    #[test]
    fn prints_function_declaration() {
        let params = vec![
            ParamGroup {
                names: vec!["span".into()],
                ty: TypeExpr::Named("string".into()),
                variadic: false,
            },
            ParamGroup {
                names: vec!["args".into()],
                ty: TypeExpr::Named("any".into()),
                variadic: true,
            },
        ];
        let body = vec![fragment(
            vec![Piece::Text("println(".into()), Piece::Ident { name: "span".into(), bound: false }, Piece::Text(")".into())],
            "\t",
        )];
        assert_eq!(
            print_func("Probe", &params, &body),
            "func Probe(span string, args ...any) {\n\tprintln(span)\n}\n"
        );
    }
}
