//! Lowering of tree-sitter Go nodes into the owned model in [`crate::go::ast`].

use crate::go::ast::{
    Block, FuncDecl, Fragment, ImportDecl, ImportSpec, ParamGroup, Piece, Receiver, Stmt,
    TypeExpr,
};
use std::ops::Range;
use tree_sitter::Node;

/// Everything the instrumenter needs from one file.
pub(crate) struct LoweredFile {
    pub package: String,
    /// Offset just past the line holding the package clause.
    pub package_line_end: usize,
    pub imports: Vec<ImportDecl>,
    pub functions: Vec<FuncDecl>,
}

fn text<'a>(node: Node<'_>, src: &'a str) -> &'a str {
    &src[node.byte_range()]
}

fn field_text(node: Node<'_>, field: &str, src: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|child| text(child, src).to_string())
}

/// Returns `None` when the file has no package clause.
pub(crate) fn lower_file(root: Node<'_>, src: &str) -> Option<LoweredFile> {
    let mut package = None;
    let mut imports = Vec::new();
    let mut functions = Vec::new();

    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        match node.kind() {
            "package_clause" => {
                let mut inner = node.walk();
                let name = node
                    .named_children(&mut inner)
                    .find(|child| child.kind() == "package_identifier")
                    .map(|child| text(child, src).to_string());
                let line_end = src[node.end_byte()..]
                    .find('\n')
                    .map(|i| node.end_byte() + i + 1)
                    .unwrap_or(src.len());
                package = name.map(|name| (name, line_end));
            }
            "import_declaration" => imports.push(lower_import_decl(node, src)),
            "function_declaration" | "method_declaration" => {
                functions.push(lower_func(node, src));
            }
            _ => {}
        }
    }

    let (package, package_line_end) = package?;
    Some(LoweredFile {
        package,
        package_line_end,
        imports,
        functions,
    })
}

fn lower_import_decl(node: Node<'_>, src: &str) -> ImportDecl {
    let mut specs = Vec::new();
    let mut rparen = None;

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "import_spec" => specs.push(lower_import_spec(child, src)),
            "import_spec_list" => {
                let mut inner = child.walk();
                for entry in child.children(&mut inner) {
                    match entry.kind() {
                        "import_spec" => specs.push(lower_import_spec(entry, src)),
                        ")" => rparen = Some(entry.start_byte()),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    ImportDecl {
        specs,
        rparen,
        span: node.byte_range(),
    }
}

fn lower_import_spec(node: Node<'_>, src: &str) -> ImportSpec {
    let alias = field_text(node, "name", src);
    let path = field_text(node, "path", src).unwrap_or_default();
    let path = path
        .strip_prefix(['"', '`'])
        .and_then(|p| p.strip_suffix(['"', '`']))
        .unwrap_or(&path)
        .to_string();
    ImportSpec { alias, path }
}

fn lower_func(node: Node<'_>, src: &str) -> FuncDecl {
    let name = field_text(node, "name", src).unwrap_or_default();

    let receiver = node
        .child_by_field_name("receiver")
        .and_then(|list| lower_params(list, src).into_iter().next())
        .map(|group| Receiver {
            name: group.names.into_iter().next(),
            ty: group.ty,
        });

    let params = node
        .child_by_field_name("parameters")
        .map(|list| lower_params(list, src))
        .unwrap_or_default();

    let body = node.child_by_field_name("body").map(|block| Block {
        lbrace: block.start_byte(),
        rbrace: block.end_byte().saturating_sub(1),
        statements: lower_statements(block, src),
    });

    FuncDecl {
        name,
        receiver,
        params,
        body,
        doc: doc_comment(node, src),
        span: node.byte_range(),
    }
}

/// Comment group ending on the line directly above `node`.
fn doc_comment(node: Node<'_>, src: &str) -> Vec<String> {
    let mut groups = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut current = node.prev_named_sibling();

    while let Some(comment) = current {
        if comment.kind() != "comment" {
            break;
        }
        let end_row = comment.end_position().row;
        if end_row != expected_row && end_row + 1 != expected_row {
            break;
        }
        // a comment trailing code on its line belongs to that code
        let start_row = comment.start_position().row;
        if comment
            .prev_sibling()
            .is_some_and(|prev| prev.end_position().row == start_row)
        {
            break;
        }
        groups.push(text(comment, src));
        expected_row = comment.start_position().row;
        current = comment.prev_named_sibling();
    }

    groups
        .into_iter()
        .rev()
        .flat_map(|comment| comment.lines().map(str::to_string).collect::<Vec<_>>())
        .collect()
}

pub(crate) fn lower_params(list: Node<'_>, src: &str) -> Vec<ParamGroup> {
    let mut groups = Vec::new();
    let mut cursor = list.walk();
    for param in list.named_children(&mut cursor) {
        let variadic = match param.kind() {
            "parameter_declaration" => false,
            "variadic_parameter_declaration" => true,
            _ => continue,
        };
        let mut inner = param.walk();
        let names = param
            .children_by_field_name("name", &mut inner)
            .map(|name| text(name, src).to_string())
            .collect();
        let ty = param
            .child_by_field_name("type")
            .map(|ty| lower_type(ty, src))
            .unwrap_or_else(|| TypeExpr::Other(String::new()));
        groups.push(ParamGroup {
            names,
            ty,
            variadic,
        });
    }
    groups
}

pub(crate) fn lower_type(node: Node<'_>, src: &str) -> TypeExpr {
    match node.kind() {
        "type_identifier" => TypeExpr::Named(text(node, src).to_string()),
        "qualified_type" => TypeExpr::Qualified {
            package: field_text(node, "package", src).unwrap_or_default(),
            name: field_text(node, "name", src).unwrap_or_default(),
        },
        "pointer_type" => match node.named_child(0) {
            Some(inner) => TypeExpr::Pointer(Box::new(lower_type(inner, src))),
            None => TypeExpr::Other(text(node, src).to_string()),
        },
        "generic_type" => {
            let base = node
                .child_by_field_name("type")
                .map(|base| lower_type(base, src))
                .unwrap_or_else(|| TypeExpr::Other(String::new()));
            let mut args = Vec::new();
            if let Some(list) = node.child_by_field_name("type_arguments") {
                let mut cursor = list.walk();
                for arg in list.named_children(&mut cursor) {
                    match arg.kind() {
                        "comment" => {}
                        "type_elem" if arg.named_child_count() == 1 => {
                            if let Some(inner) = arg.named_child(0) {
                                args.push(lower_type(inner, src));
                            }
                        }
                        _ => args.push(lower_type(arg, src)),
                    }
                }
            }
            TypeExpr::Generic {
                base: Box::new(base),
                args,
            }
        }
        "slice_type" => match node.child_by_field_name("element") {
            Some(elem) => TypeExpr::Slice(Box::new(lower_type(elem, src))),
            None => TypeExpr::Other(text(node, src).to_string()),
        },
        "interface_type" if node.named_child_count() == 0 => TypeExpr::EmptyInterface,
        _ => TypeExpr::Other(text(node, src).to_string()),
    }
}

fn lower_statements(block: Node<'_>, src: &str) -> Vec<Stmt> {
    let mut statements = Vec::new();
    let mut cursor = block.walk();
    for child in block.named_children(&mut cursor) {
        if child.kind() == "statement_list" {
            let mut inner = child.walk();
            for stmt in child.named_children(&mut inner) {
                statements.push(Stmt::Fragment(lower_fragment(stmt, src)));
            }
        } else {
            statements.push(Stmt::Fragment(lower_fragment(child, src)));
        }
    }
    statements
}

pub(crate) fn lower_fragment(node: Node<'_>, src: &str) -> Fragment {
    let mut marks = Marks::default();
    marks.walk(node, false);

    let range = node.byte_range();
    let mut pieces = Vec::new();
    let mut pos = range.start;
    for mark in marks.0 {
        if mark.range.start < pos {
            continue;
        }
        if mark.range.start > pos {
            pieces.push(Piece::Text(src[pos..mark.range.start].to_string()));
        }
        let token = src[mark.range.clone()].to_string();
        pieces.push(match mark.kind {
            MarkKind::Ident { bound } => Piece::Ident { name: token, bound },
            MarkKind::Verbatim => Piece::Verbatim(token),
        });
        pos = mark.range.end;
    }
    if pos < range.end {
        pieces.push(Piece::Text(src[pos..range.end].to_string()));
    }

    let line_start = src[..range.start].rfind('\n').map_or(0, |i| i + 1);
    let base_indent = src[line_start..range.start]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();

    Fragment {
        pieces,
        base_indent,
    }
}

enum MarkKind {
    Ident { bound: bool },
    Verbatim,
}

struct Mark {
    range: Range<usize>,
    kind: MarkKind,
}

/// Identifier and raw-literal tokens of a statement, in source order.
#[derive(Default)]
struct Marks(Vec<Mark>);

impl Marks {
    fn push(&mut self, node: Node<'_>, kind: MarkKind) {
        self.0.push(Mark {
            range: node.byte_range(),
            kind,
        });
    }

    fn walk(&mut self, node: Node<'_>, in_call: bool) {
        match node.kind() {
            "identifier" => self.push(node, MarkKind::Ident { bound: false }),
            "raw_string_literal" => self.push(node, MarkKind::Verbatim),
            "call_expression" => self.walk_children(node, true),
            "short_var_declaration" | "assignment_statement" | "range_clause"
            | "receive_statement" => self.walk_fields(node, in_call, &["left"]),
            "type_switch_statement" => self.walk_fields(node, in_call, &["alias"]),
            "var_spec" | "const_spec" => self.walk_fields(node, in_call, &["name"]),
            "func_literal" | "function_type" => self.walk_fields(node, in_call, &["parameters"]),
            "keyed_element" => self.walk_keyed(node, in_call),
            _ => self.walk_children(node, in_call),
        }
    }

    /// Bare identifier keys of composite literals name struct fields and
    /// stay as text.
    fn walk_keyed(&mut self, node: Node<'_>, in_call: bool) {
        let mut cursor = node.walk();
        for (idx, child) in node.named_children(&mut cursor).enumerate() {
            if idx == 0 && is_bare_key(child) {
                continue;
            }
            self.walk(child, in_call);
        }
    }

    fn walk_children(&mut self, node: Node<'_>, in_call: bool) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, in_call);
        }
    }

    /// Walks children, treating those under `binding_fields` as binding
    /// positions.
    fn walk_fields(&mut self, node: Node<'_>, in_call: bool, binding_fields: &[&str]) {
        let mut cursor = node.walk();
        if !cursor.goto_first_child() {
            return;
        }
        loop {
            let child = cursor.node();
            match cursor.field_name() {
                Some(field) if binding_fields.contains(&field) => self.bind(child, in_call),
                _ => self.walk(child, in_call),
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }

    fn bind(&mut self, node: Node<'_>, in_call: bool) {
        match node.kind() {
            "identifier" => self.push(node, MarkKind::Ident { bound: !in_call }),
            "expression_list" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == "identifier" {
                        self.push(child, MarkKind::Ident { bound: !in_call });
                    } else {
                        self.walk(child, in_call);
                    }
                }
            }
            "parameter_list" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    match child.kind() {
                        "parameter_declaration" | "variadic_parameter_declaration" => {
                            self.walk_fields(child, in_call, &["name"]);
                        }
                        _ => self.walk(child, in_call),
                    }
                }
            }
            _ => self.walk(node, in_call),
        }
    }
}

fn is_bare_key(node: Node<'_>) -> bool {
    match node.kind() {
        "identifier" | "field_identifier" => true,
        "literal_element" => {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            matches!(children.as_slice(), [only] if only.kind() == "identifier")
        }
        _ => false,
    }
}
