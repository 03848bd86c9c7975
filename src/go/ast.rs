//! Owned syntax model for the parts of a Go file the instrumenter reads or
//! synthesizes.
//!
//! Declarations, parameter lists, receivers and imports are lowered into
//! closed enums. Statements lifted from patch bodies stay close to the source
//! text as [`Fragment`]s: token sequences in which identifiers are separate
//! pieces, so they can be renamed without touching strings or comments.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

/// Name that never binds a value.
pub const BLANK: &str = "_";

pub fn is_blank(name: &str) -> bool {
    name == BLANK
}

/// A type expression as it appears in a parameter or receiver list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// `string`, `any`, `Ring`
    Named(String),
    /// `context.Context`
    Qualified { package: String, name: String },
    /// `*T`
    Pointer(Box<TypeExpr>),
    /// `Ring[T]`
    Generic {
        base: Box<TypeExpr>,
        args: Vec<TypeExpr>,
    },
    /// `[]T`
    Slice(Box<TypeExpr>),
    /// `interface{}`
    EmptyInterface,
    /// Any other type, kept verbatim.
    Other(String),
}

impl TypeExpr {
    pub fn is_qualified(&self, package: &str, name: &str) -> bool {
        matches!(self, TypeExpr::Qualified { package: p, name: n } if p == package && n == name)
    }

    /// True for `interface{}` and `any`.
    pub fn is_any(&self) -> bool {
        match self {
            TypeExpr::EmptyInterface => true,
            TypeExpr::Named(name) => name == "any",
            _ => false,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named(name) => f.write_str(name),
            TypeExpr::Qualified { package, name } => write!(f, "{package}.{name}"),
            TypeExpr::Pointer(inner) => write!(f, "*{inner}"),
            TypeExpr::Generic { base, args } => {
                write!(f, "{base}[")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str("]")
            }
            TypeExpr::Slice(elem) => write!(f, "[]{elem}"),
            TypeExpr::EmptyInterface => f.write_str("interface{}"),
            TypeExpr::Other(text) => f.write_str(text),
        }
    }
}

/// One entry of a parameter list: `a, b int` or `args ...any`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamGroup {
    pub names: Vec<String>,
    pub ty: TypeExpr,
    pub variadic: bool,
}

impl fmt::Display for ParamGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.names.is_empty() {
            write!(f, "{} ", self.names.join(", "))?;
        }
        if self.variadic {
            f.write_str("...")?;
        }
        write!(f, "{}", self.ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    pub name: Option<String>,
    pub ty: TypeExpr,
}

/// A function body: brace offsets in the original buffer plus its statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub lbrace: usize,
    pub rbrace: usize,
    pub statements: Vec<Stmt>,
}

/// A top-level `func` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    pub name: String,
    pub receiver: Option<Receiver>,
    pub params: Vec<ParamGroup>,
    /// `None` for declarations without a body (implemented elsewhere).
    pub body: Option<Block>,
    /// Lines of the comment group directly above the declaration.
    pub doc: Vec<String>,
    pub span: Range<usize>,
}

impl FuncDecl {
    /// Non-blank parameter names in declaration order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .flat_map(|group| group.names.iter())
            .map(String::as_str)
            .filter(|name| !is_blank(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImportSpec {
    /// Explicit package name, `.` or `_`.
    pub alias: Option<String>,
    /// Unquoted import path.
    pub path: String,
}

impl ImportSpec {
    pub fn new(alias: Option<&str>, path: &str) -> Self {
        Self {
            alias: alias.map(str::to_string),
            path: path.to_string(),
        }
    }

    /// Name the package is referred to by, defaulting to the last path
    /// element.
    pub fn binding(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

/// One `import` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub specs: Vec<ImportSpec>,
    /// Offset of the closing `)` for parenthesized declarations.
    pub rparen: Option<usize>,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `:=`
    Define,
    /// `=`
    Assign,
}

impl AssignOp {
    pub fn token(self) -> &'static str {
        match self {
            AssignOp::Define => ":=",
            AssignOp::Assign => "=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Ident(String),
    Str(String),
    Bool(bool),
    Selector { operand: Box<Expr>, field: String },
    Call { func: Box<Expr>, args: Vec<Expr> },
    /// `[]elem{a, b}`
    SliceLit { elem: TypeExpr, elements: Vec<Expr> },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    /// `package.func()`
    pub fn call_qualified(package: &str, func: &str) -> Self {
        Expr::Call {
            func: Box::new(Expr::Selector {
                operand: Box::new(Expr::ident(package)),
                field: func.to_string(),
            }),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Assign {
        lhs: Vec<Expr>,
        op: AssignOp,
        rhs: Vec<Expr>,
    },
    Fragment(Fragment),
}

impl Stmt {
    pub fn define(name: &str, value: Expr) -> Self {
        Stmt::Assign {
            lhs: vec![Expr::ident(name)],
            op: AssignOp::Define,
            rhs: vec![value],
        }
    }

    pub fn assign(name: &str, value: Expr) -> Self {
        Stmt::Assign {
            lhs: vec![Expr::ident(name)],
            op: AssignOp::Assign,
            rhs: vec![value],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Source text between identifier tokens, including comments.
    Text(String),
    /// An identifier token; `bound` marks a binding occurrence.
    Ident { name: String, bound: bool },
    /// Text that must be emitted byte-for-byte, e.g. raw string literals.
    Verbatim(String),
}

/// A statement copied from source as a sequence of pieces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub pieces: Vec<Piece>,
    /// Leading whitespace of the line the statement started on.
    pub base_indent: String,
}

impl Fragment {
    pub fn bound_names(&self) -> impl Iterator<Item = &str> {
        self.pieces.iter().filter_map(|piece| match piece {
            Piece::Ident { name, bound: true } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn idents(&self) -> impl Iterator<Item = &str> {
        self.pieces.iter().filter_map(|piece| match piece {
            Piece::Ident { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Copy of this fragment with identifiers replaced through `mapping`.
    pub fn renamed(&self, mapping: &HashMap<String, String>) -> Fragment {
        let pieces = self
            .pieces
            .iter()
            .map(|piece| match piece {
                Piece::Ident { name, bound } => Piece::Ident {
                    name: mapping.get(name).cloned().unwrap_or_else(|| name.clone()),
                    bound: *bound,
                },
                other => other.clone(),
            })
            .collect();
        Fragment {
            pieces,
            base_indent: self.base_indent.clone(),
        }
    }

    /// Concatenated text plus the byte ranges that must not be re-indented.
    pub fn render(&self) -> (String, Vec<Range<usize>>) {
        let mut text = String::new();
        let mut verbatim = Vec::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(s) => text.push_str(s),
                Piece::Ident { name, .. } => text.push_str(name),
                Piece::Verbatim(s) => {
                    let start = text.len();
                    text.push_str(s);
                    verbatim.push(start..text.len());
                }
            }
        }
        (text, verbatim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_display() {
        let ty = TypeExpr::Pointer(Box::new(TypeExpr::Generic {
            base: Box::new(TypeExpr::Named("Ring".into())),
            args: vec![TypeExpr::Named("K".into()), TypeExpr::Named("V".into())],
        }));
        assert_eq!(ty.to_string(), "*Ring[K, V]");
        assert_eq!(TypeExpr::Slice(Box::new(TypeExpr::EmptyInterface)).to_string(), "[]interface{}");
    }

    #[test]
    fn import_binding_defaults_to_last_element() {
        assert_eq!(ImportSpec::new(None, "runtime/trace").binding(), "trace");
        assert_eq!(ImportSpec::new(Some("gonativectx"), "context").binding(), "gonativectx");
    }

    #[test]
    fn fragment_rename_only_touches_identifiers() {
        let fragment = Fragment {
            pieces: vec![
                Piece::Ident { name: "t".into(), bound: true },
                Piece::Text(" := \"t\" // t\n".into()),
                Piece::Ident { name: "t".into(), bound: false },
            ],
            base_indent: "\t".into(),
        };
        let mapping = HashMap::from([("t".to_string(), "tX1".to_string())]);
        let (text, _) = fragment.renamed(&mapping).render();
        assert_eq!(text, "tX1 := \"t\" // t\ntX1");
    }
}
