//! Vendoring module dependencies so they can be instrumented too.
//!
//! Dependencies are downloaded with `go mod download -json`, the selected
//! modules are copied out of the read-only module cache, and the project's
//! `go.mod` gets a `replace` directive pointing each module at its copy.

pub mod errors;
pub mod gomod;
pub mod module;

pub use errors::DepsError;
pub use gomod::{append_replaces, parse_replaces, replace_directives, Replace};
pub use module::{
    copy_modules, download, parse_download_output, select_modules, store_dir, ModuleDesc, GO_MOD,
};

use crate::config::VendorConfig;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// What a vendoring run did.
#[derive(Debug, Clone, Default)]
pub struct VendorReport {
    /// Module copies, one per selected module.
    pub copied: Vec<PathBuf>,
    /// `replace` lines appended to `go.mod`.
    pub replaces: Vec<String>,
}

/// Copy the dependencies of the module at `project` selected by `config`
/// under its `pkgmod_dir` and redirect them in `go.mod`.
///
/// A relative `pkgmod_dir` is taken relative to `project`.
pub fn vendor(project: &Path, config: &VendorConfig) -> Result<VendorReport, DepsError> {
    let go_mod_path = project.join(GO_MOD);
    let go_mod = fs::read_to_string(&go_mod_path).map_err(DepsError::io(&go_mod_path))?;
    let existing = parse_replaces(&go_mod_path, &go_mod)?;

    let pattern = config.path_pattern.as_deref().map(Regex::new).transpose()?;
    let descs = download(project)?;
    let selected = select_modules(&descs, pattern.as_ref(), config.fallback_to_all);
    tracing::info!(
        downloaded = descs.len(),
        selected = selected.len(),
        "resolved module dependencies"
    );

    let copied = copy_modules(&project.join(&config.pkgmod_dir), &selected)?;
    let replaces = replace_directives(&config.pkgmod_dir, &selected, &existing);
    append_replaces(&go_mod_path, &replaces)?;

    Ok(VendorReport { copied, replaces })
}
