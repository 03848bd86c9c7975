//! Merging patch imports into a target file with a single edit.

use crate::edit::Edit;
use crate::go::ast::ImportSpec;
use crate::go::printer::{print_import_decl, print_import_specs};
use crate::go::SourceUnit;

/// Patch imports the target lacks, deduplicated by (alias, path), in patch
/// order.
pub fn missing_imports(target: &SourceUnit, patches: &[SourceUnit]) -> Vec<ImportSpec> {
    let mut missing: Vec<ImportSpec> = Vec::new();
    for spec in patches.iter().flat_map(|patch| patch.import_specs()) {
        let present = target.import_specs().any(|existing| existing == spec);
        if !present && !missing.contains(spec) {
            missing.push(spec.clone());
        }
    }
    missing
}

/// The one edit that adds every missing patch import to `target`.
///
/// A target with exactly one parenthesized declaration of several specs gets
/// the new specs appended before its `)`. Every other layout (no imports, a
/// single spec, several declarations) gets a fresh declaration after the
/// package clause. Existing specs are never moved or removed; when nothing is
/// missing the edit is an empty insert.
pub fn merge_imports(target: &SourceUnit, patches: &[SourceUnit]) -> Edit {
    let missing = missing_imports(target, patches);
    let after_package = target.package_line_end();
    if missing.is_empty() {
        return Edit::insert(after_package, "");
    }

    if let [decl] = target.imports() {
        if let (Some(rparen), true) = (decl.rparen, decl.specs.len() > 1) {
            let content = target.content();
            let line_start = content[..rparen].rfind('\n').map_or(0, |i| i + 1);
            let specs = print_import_specs(&missing, 1);
            return if content[line_start..rparen].trim().is_empty() {
                Edit::insert(line_start, specs)
            } else {
                Edit::insert(rparen, format!("\n{specs}"))
            };
        }
    }

    Edit::insert(after_package, print_import_decl(&missing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::apply;

    fn unit(path: &str, src: &str) -> SourceUnit {
        SourceUnit::parse(path, src).unwrap()
    }

    fn merged(target: &str, patches: &[&str]) -> String {
        let target = unit("t.go", target);
        let patches: Vec<SourceUnit> = patches
            .iter()
            .enumerate()
            .map(|(i, src)| unit(&format!("p{i}.go"), src))
            .collect();
        let edit = merge_imports(&target, &patches);
        String::from_utf8(apply(target.content().as_bytes(), &[edit]).unwrap()).unwrap()
    }

    const PATCH: &str = "package p\n\nimport (\n\tgonativectx \"context\"\n\t\"runtime/trace\"\n)\n";

    #[test]
    fn no_imports_gets_new_block() {
        assert_eq!(
            merged("package t\n\nfunc F() {}\n", &[PATCH]),
            "package t\n\nimport (\n\tgonativectx \"context\"\n\t\"runtime/trace\"\n)\n\nfunc F() {}\n"
        );
    }

    #[test]
    fn single_spec_is_left_alone() {
        assert_eq!(
            merged("package t\n\nimport \"runtime/trace\"\n", &[PATCH]),
            "package t\n\nimport gonativectx \"context\"\n\nimport \"runtime/trace\"\n"
        );
    }

    #[test]
    fn multi_spec_block_is_extended_before_paren() {
        assert_eq!(
            merged("package t\n\nimport (\n\t\"fmt\"\n\t\"os\"\n)\n", &[PATCH]),
            "package t\n\nimport (\n\t\"fmt\"\n\t\"os\"\n\tgonativectx \"context\"\n\t\"runtime/trace\"\n)\n"
        );
        assert_eq!(
            merged("package t\n\nimport (\"fmt\"; \"os\")\n", &[PATCH]),
            "package t\n\nimport (\"fmt\"; \"os\"\n\tgonativectx \"context\"\n\t\"runtime/trace\"\n)\n"
        );
    }

    #[test]
    fn empty_block_gets_a_new_block() {
        assert_eq!(
            merged("package t\n\nimport ()\n", &[PATCH]),
            "package t\n\nimport (\n\tgonativectx \"context\"\n\t\"runtime/trace\"\n)\n\nimport ()\n"
        );
    }

    #[test]
    fn several_blocks_get_a_new_block() {
        assert_eq!(
            merged("package t\n\nimport \"fmt\"\nimport \"os\"\n", &[PATCH]),
            "package t\n\nimport (\n\tgonativectx \"context\"\n\t\"runtime/trace\"\n)\n\nimport \"fmt\"\nimport \"os\"\n"
        );
    }

    #[test]
    fn dedups_by_alias_and_path() {
        let other = "package q\n\nimport (\n\t\"context\"\n\t\"runtime/trace\"\n)\n";
        let target = unit("t.go", "package t\n\nimport (\n\t\"fmt\"\n\t\"runtime/trace\"\n)\n");
        let patches = vec![unit("a.go", PATCH), unit("b.go", other)];
        assert_eq!(
            missing_imports(&target, &patches),
            vec![
                ImportSpec::new(Some("gonativectx"), "context"),
                ImportSpec::new(None, "context"),
            ]
        );
    }

    #[test]
    fn nothing_missing_is_an_empty_insert() {
        let target = unit("t.go", "package t\n\nimport \"fmt\"\n");
        let patch = unit("p.go", "package p\n\nimport \"fmt\"\n");
        let edit = merge_imports(&target, std::slice::from_ref(&patch));
        assert_eq!(edit, Edit::insert(target.package_line_end(), ""));
    }
}
