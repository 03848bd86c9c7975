//! Downloading module dependencies and copying them out of the module cache.

use crate::deps::errors::DepsError;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use walkdir::WalkDir;

pub const GO_MOD: &str = "go.mod";

/// One entry of `go mod download -json`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct ModuleDesc {
    pub path: String,
    pub version: String,
    pub error: String,
    pub info: String,
    pub go_mod: String,
    pub zip: String,
    /// Extracted module source in the module cache.
    pub dir: PathBuf,
    pub sum: String,
    pub go_mod_sum: String,
}

/// Run `go mod download -json` in `project`.
pub fn download(project: &Path) -> Result<Vec<ModuleDesc>, DepsError> {
    let output = Command::new("go")
        .current_dir(project)
        .args(["mod", "download", "-json"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(DepsError::Spawn)?;

    if !output.status.success() {
        return Err(DepsError::Download {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    parse_download_output(&output.stdout)
}

/// Decode the concatenated JSON objects printed by `go mod download -json`.
/// Entries that carry an error are logged and dropped.
pub fn parse_download_output(stdout: &[u8]) -> Result<Vec<ModuleDesc>, DepsError> {
    let mut descs = Vec::new();
    for desc in serde_json::Deserializer::from_slice(stdout).into_iter::<ModuleDesc>() {
        let desc = desc?;
        if !desc.error.is_empty() {
            tracing::warn!(module = %desc.path, error = %desc.error, "skipping module");
            continue;
        }
        descs.push(desc);
    }
    Ok(descs)
}

/// Modules that have a `go.mod` and whose path matches `pattern`.
///
/// When nothing is selected and `fallback_to_all` is set, every module is
/// returned instead.
pub fn select_modules(
    descs: &[ModuleDesc],
    pattern: Option<&Regex>,
    fallback_to_all: bool,
) -> Vec<ModuleDesc> {
    let selected: Vec<ModuleDesc> = descs
        .iter()
        .filter(|desc| desc.dir.join(GO_MOD).is_file())
        .filter(|desc| pattern.is_some_and(|pattern| pattern.is_match(&desc.path)))
        .cloned()
        .collect();

    if selected.is_empty() && fallback_to_all {
        tracing::warn!(
            modules = descs.len(),
            "no module matched the path pattern, selecting all modules"
        );
        return descs.to_vec();
    }
    selected
}

/// Where a module cache directory is copied under `pkgmod_dir`: the part of
/// `module_dir` after `/pkg/mod/`, or all of it.
pub fn store_dir(pkgmod_dir: &Path, module_dir: &Path) -> PathBuf {
    const MOD_CACHE: &str = "/pkg/mod/";
    let dir = module_dir.to_string_lossy();
    let relative = match dir.find(MOD_CACHE) {
        Some(idx) => &dir[idx + MOD_CACHE.len()..],
        None => &dir[..],
    };
    let relative: PathBuf = Path::new(relative)
        .components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect();
    pkgmod_dir.join(relative)
}

/// Copy every module into `pkgmod_dir`, returning the destination of each.
///
/// Copies are left writable; the module cache itself is read-only.
pub fn copy_modules(pkgmod_dir: &Path, descs: &[ModuleDesc]) -> Result<Vec<PathBuf>, DepsError> {
    fs::create_dir_all(pkgmod_dir).map_err(DepsError::io(pkgmod_dir))?;

    let mut copied = Vec::with_capacity(descs.len());
    for desc in descs {
        let dest = store_dir(pkgmod_dir, &desc.dir);
        copy_tree(&desc.dir, &dest)?;
        tracing::debug!(module = %desc.path, dest = %dest.display(), "copied module");
        copied.push(dest);
    }
    Ok(copied)
}

fn copy_tree(src: &Path, dest: &Path) -> Result<(), DepsError> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| DepsError::Io {
            path: src.to_path_buf(),
            source: e.into(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(DepsError::io(&target))?;
            make_writable(&target).map_err(DepsError::io(&target))?;
        } else if entry.file_type().is_file() {
            if target.exists() {
                make_writable(&target).map_err(DepsError::io(&target))?;
            }
            fs::copy(entry.path(), &target).map_err(DepsError::io(entry.path()))?;
            make_writable(&target).map_err(DepsError::io(&target))?;
        }
    }
    Ok(())
}

fn make_writable(path: &Path) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(perms.mode() | 0o200);
    }
    #[cfg(not(unix))]
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    fs::set_permissions(path, perms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn module(root: &Path, path: &str, with_go_mod: bool) -> ModuleDesc {
        let dir = root.join("pkg/mod").join(format!("{path}@v1.0.0"));
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("lib.go"), "package lib\n").unwrap();
        fs::write(dir.join("sub/x.go"), "package sub\n").unwrap();
        if with_go_mod {
            fs::write(dir.join(GO_MOD), format!("module {path}\n")).unwrap();
        }
        ModuleDesc {
            path: path.to_string(),
            version: "v1.0.0".into(),
            dir,
            ..ModuleDesc::default()
        }
    }

    #[test]
    fn decodes_json_stream() {
        let out = br#"{
	"Path": "github.com/acme/log",
	"Version": "v1.2.0",
	"Dir": "/home/u/go/pkg/mod/github.com/acme/log@v1.2.0",
	"GoModSum": "h1:abc="
}
{
	"Path": "example.com/broken",
	"Version": "v0.0.1",
	"Error": "not found"
}
"#;
        let descs = parse_download_output(out).unwrap();
        assert_eq!(descs.len(), 1);
        assert_eq!(descs[0].path, "github.com/acme/log");
        assert_eq!(descs[0].go_mod_sum, "h1:abc=");
        assert!(parse_download_output(b"{\"Path\": ").is_err());
    }

    #[test]
    fn selects_matching_modules_with_go_mod() {
        let root = TempDir::new().unwrap();
        let descs = vec![
            module(root.path(), "github.com/acme/log", true),
            module(root.path(), "github.com/acme/nomod", false),
            module(root.path(), "golang.org/x/sync", true),
        ];
        let pattern = Regex::new("acme").unwrap();
        let selected = select_modules(&descs, Some(&pattern), true);
        assert_eq!(selected, vec![descs[0].clone()]);
    }

    #[test]
    fn falls_back_to_all_only_when_enabled() {
        let root = TempDir::new().unwrap();
        let descs = vec![module(root.path(), "golang.org/x/sync", true)];
        let pattern = Regex::new("acme").unwrap();
        assert_eq!(select_modules(&descs, Some(&pattern), true), descs);
        assert!(select_modules(&descs, Some(&pattern), false).is_empty());
        assert_eq!(select_modules(&descs, None, true), descs);
    }

    #[test]
    fn store_dir_strips_module_cache_prefix() {
        assert_eq!(
            store_dir(
                Path::new("instrumented_pkgmods"),
                Path::new("/home/u/go/pkg/mod/github.com/acme/log@v1.2.0")
            ),
            PathBuf::from("instrumented_pkgmods/github.com/acme/log@v1.2.0")
        );
        assert_eq!(
            store_dir(Path::new("out"), Path::new("/vendor/lib")),
            PathBuf::from("out/vendor/lib")
        );
    }

    #[test]
    fn copies_module_trees_writable() {
        let root = TempDir::new().unwrap();
        let desc = module(root.path(), "github.com/acme/log", true);
        let lib = desc.dir.join("lib.go");
        let mut perms = fs::metadata(&lib).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&lib, perms).unwrap();

        let out = root.path().join("out");
        let copied = copy_modules(&out, std::slice::from_ref(&desc)).unwrap();
        assert_eq!(copied, vec![out.join("github.com/acme/log@v1.0.0")]);
        assert_eq!(fs::read_to_string(copied[0].join("sub/x.go")).unwrap(), "package sub\n");
        assert!(!fs::metadata(copied[0].join("lib.go")).unwrap().permissions().readonly());

        // a second run overwrites the previous copy
        copy_modules(&out, std::slice::from_ref(&desc)).unwrap();
    }
}
