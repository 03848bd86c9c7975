//! Reading and extending `replace` directives in a `go.mod` file.

use crate::deps::errors::DepsError;
use crate::deps::module::{store_dir, ModuleDesc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path};

/// A `replace old => new` directive, versions dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replace {
    pub old: String,
    pub new: String,
}

impl Replace {
    fn parse(directive: &str) -> Option<Self> {
        let (old, new) = directive.split_once("=>")?;
        Some(Self {
            old: old.split_whitespace().next()?.to_string(),
            new: new.split_whitespace().next()?.to_string(),
        })
    }
}

fn strip_comment(line: &str) -> &str {
    line.split_once("//").map_or(line, |(code, _)| code).trim()
}

/// Every `replace` directive in `go.mod` source, single-line and blocks.
///
/// Fails unless the file declares a module.
pub fn parse_replaces(path: &Path, go_mod: &str) -> Result<Vec<Replace>, DepsError> {
    let mut replaces = Vec::new();
    let mut has_module = false;
    let mut in_block = false;

    for line in go_mod.lines().map(strip_comment) {
        if in_block {
            if line == ")" {
                in_block = false;
            } else if let Some(replace) = Replace::parse(line) {
                replaces.push(replace);
            }
            continue;
        }
        let Some((keyword, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        match (keyword, rest.trim()) {
            ("module", name) if !name.is_empty() => has_module = true,
            ("replace", "(") => in_block = true,
            ("replace", directive) => replaces.extend(Replace::parse(directive)),
            _ => {}
        }
    }

    if !has_module {
        return Err(DepsError::InvalidGoMod {
            path: path.to_path_buf(),
        });
    }
    Ok(replaces)
}

/// How a local directory is spelled on the right of a `replace`: relative
/// paths must start with `./` or `../` to be read as directories.
fn local_path(dir: &Path) -> String {
    let text = dir.to_string_lossy().replace('\\', "/");
    match dir.components().next() {
        Some(Component::Normal(_)) => format!("./{text}"),
        _ => text,
    }
}

/// `replace` lines pointing each module at its copy under `pkgmod_dir`,
/// skipping directives `existing` already has.
pub fn replace_directives(
    pkgmod_dir: &Path,
    descs: &[ModuleDesc],
    existing: &[Replace],
) -> Vec<String> {
    descs
        .iter()
        .filter_map(|desc| {
            let new = local_path(&store_dir(pkgmod_dir, &desc.dir));
            let present = existing
                .iter()
                .any(|replace| replace.old == desc.path && replace.new == new);
            (!present).then(|| format!("replace {} => {}\n", desc.path, new))
        })
        .collect()
}

/// Append `lines` to the `go.mod` at `path`.
pub fn append_replaces(path: &Path, lines: &[String]) -> Result<(), DepsError> {
    if lines.is_empty() {
        return Ok(());
    }
    let current = fs::read_to_string(path).map_err(DepsError::io(path))?;
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(DepsError::io(path))?;
    if !current.is_empty() && !current.ends_with('\n') {
        file.write_all(b"\n").map_err(DepsError::io(path))?;
    }
    for line in lines {
        file.write_all(line.as_bytes()).map_err(DepsError::io(path))?;
    }
    Ok(())
}
