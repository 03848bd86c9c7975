use crate::go::ast::{FuncDecl, ImportDecl, ImportSpec};
use crate::go::errors::SyntaxError;
use crate::go::lower::lower_file;
use crate::go::parser::ParsedSource;
use crate::pool::with_parser;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Tree};

/// Byte offset to line/column mapping for one buffer.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { line_starts }
    }

    /// 1-based line and byte column of `offset`.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|start| *start <= offset);
        let line_start = self.line_starts[line.saturating_sub(1)];
        (line.max(1), offset - line_start + 1)
    }
}

/// A parsed Go file: verbatim content, its syntax tree and the declarations
/// lowered from it.
pub struct SourceUnit {
    path: PathBuf,
    content: String,
    tree: Tree,
    lines: LineIndex,
    package: String,
    package_line_end: usize,
    imports: Vec<ImportDecl>,
    functions: Vec<FuncDecl>,
}

impl std::fmt::Debug for SourceUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceUnit")
            .field("path", &self.path)
            .field("package", &self.package)
            .field("imports", &self.imports.len())
            .field("functions", &self.functions.len())
            .finish()
    }
}

impl SourceUnit {
    /// Parse `content` as the Go file at `path`.
    ///
    /// Any ERROR or MISSING node in the tree fails the whole file.
    pub fn parse(path: impl Into<PathBuf>, content: impl Into<String>) -> Result<Self, SyntaxError> {
        let path = path.into();
        let content = content.into();
        let lines = LineIndex::new(&content);

        let tree = with_parser(|parser| parser.parse(&content))??;
        let parsed = ParsedSource {
            source: &content,
            tree,
        };
        if let Some(error) = parsed.error_nodes().first() {
            let (line, column) = lines.position(error.byte_start);
            return Err(SyntaxError::Syntax { path, line, column });
        }
        let tree = parsed.tree;

        let lowered = lower_file(tree.root_node(), &content)
            .ok_or_else(|| SyntaxError::MissingPackage { path: path.clone() })?;

        Ok(Self {
            path,
            content,
            tree,
            lines,
            package: lowered.package,
            package_line_end: lowered.package_line_end,
            imports: lowered.imports,
            functions: lowered.functions,
        })
    }

    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self, SyntaxError> {
        let path = path.into();
        match String::from_utf8(bytes) {
            Ok(content) => Self::parse(path, content),
            Err(_) => Err(SyntaxError::Utf8 { path }),
        }
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, SyntaxError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| SyntaxError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(path, bytes)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name of the file, extension included.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Offset just past the line holding the package clause.
    pub fn package_line_end(&self) -> usize {
        self.package_line_end
    }

    pub fn imports(&self) -> &[ImportDecl] {
        &self.imports
    }

    pub fn import_specs(&self) -> impl Iterator<Item = &ImportSpec> {
        self.imports.iter().flat_map(|decl| decl.specs.iter())
    }

    /// Name under which the file refers to the package at `path`.
    pub fn import_binding(&self, path: &str) -> Option<&str> {
        self.import_specs()
            .find(|spec| spec.path == path)
            .map(ImportSpec::binding)
    }

    pub fn functions(&self) -> &[FuncDecl] {
        &self.functions
    }

    /// Every identifier-like token in the file.
    pub fn identifiers(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        collect_identifiers(self.tree.root_node(), &self.content, &mut names);
        names
    }
}

fn collect_identifiers(node: Node<'_>, src: &str, names: &mut HashSet<String>) {
    match node.kind() {
        "identifier" | "field_identifier" | "package_identifier" | "type_identifier"
        | "label_name" => {
            names.insert(src[node.byte_range()].to_string());
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_identifiers(child, src, names);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_index_positions() {
        let index = LineIndex::new("ab\ncd\n\nx");
        assert_eq!(index.position(0), (1, 1));
        assert_eq!(index.position(1), (1, 2));
        assert_eq!(index.position(3), (2, 1));
        assert_eq!(index.position(6), (3, 1));
        assert_eq!(index.position(7), (4, 1));
    }

    #[test]
    fn syntax_error_reports_position() {
        let err = SourceUnit::parse("bad.go", "package p\n\nfunc f( {\n}\n").unwrap_err();
        match err {
            SyntaxError::Syntax { path, line, .. } => {
                assert_eq!(path, PathBuf::from("bad.go"));
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let err = SourceUnit::from_bytes("x.go", vec![0x70, 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, SyntaxError::Utf8 { .. }));
    }

    #[test]
    fn collects_identifiers_and_bindings() {
        let unit = SourceUnit::parse(
            "dir/a.go",
            "package a\n\nimport ctxpkg \"context\"\n\nfunc (s *server) Run(ctx ctxpkg.Context) { local := 1; _ = local }\n",
        )
        .unwrap();
        assert_eq!(unit.file_name(), "a.go");
        assert_eq!(unit.package(), "a");
        assert_eq!(unit.import_binding("context"), Some("ctxpkg"));
        assert_eq!(unit.import_binding("fmt"), None);
        let names = unit.identifiers();
        for name in ["server", "Run", "ctx", "ctxpkg", "Context", "local", "s"] {
            assert!(names.contains(name), "missing {name}");
        }
    }
}
