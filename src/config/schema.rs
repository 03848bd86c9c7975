use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Contents of `instrument.toml`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InstrumentConfig {
    /// Patch files holding templates.
    #[serde(default)]
    pub patches: Vec<PathBuf>,
    /// Regex of function names never instrumented.
    #[serde(default)]
    pub exclude_func: Option<String>,
    #[serde(default = "default_true")]
    pub skip_tests: bool,
    #[serde(default = "default_true")]
    pub validate_output: bool,
    #[serde(default)]
    pub vendor: VendorConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VendorConfig {
    /// Regex selecting which downloaded modules to copy.
    #[serde(default)]
    pub path_pattern: Option<String>,
    #[serde(default = "default_pkgmod_dir")]
    pub pkgmod_dir: PathBuf,
    /// Copy every module when `path_pattern` matches none.
    #[serde(default = "default_true")]
    pub fallback_to_all: bool,
}

fn default_true() -> bool {
    true
}

fn default_pkgmod_dir() -> PathBuf {
    PathBuf::from("instrumented_pkgmods")
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            patches: Vec::new(),
            exclude_func: None,
            skip_tests: true,
            validate_output: true,
            vendor: VendorConfig::default(),
        }
    }
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            path_pattern: None,
            pkgmod_dir: default_pkgmod_dir(),
            fallback_to_all: true,
        }
    }
}

impl InstrumentConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        for (index, patch) in self.patches.iter().enumerate() {
            if patch.as_os_str().is_empty() {
                issues.push(ValidationIssue::EmptyPatchPath { index });
            }
        }

        let patterns = [
            ("exclude_func", self.exclude_func.as_deref()),
            ("vendor.path_pattern", self.vendor.path_pattern.as_deref()),
        ];
        for (field, pattern) in patterns {
            if let Some(pattern) = pattern {
                if let Err(error) = Regex::new(pattern) {
                    issues.push(ValidationIssue::InvalidPattern {
                        field,
                        message: error.to_string(),
                    });
                }
            }
        }

        if self.vendor.pkgmod_dir.as_os_str().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "vendor.pkgmod_dir",
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Compiled `exclude_func`; `None` when unset.
    pub fn exclude_regex(&self) -> Result<Option<Regex>, regex::Error> {
        self.exclude_func.as_deref().map(Regex::new).transpose()
    }

    /// Make relative patch paths relative to `base` instead of the working
    /// directory.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for patch in &mut self.patches {
            if patch.is_relative() {
                *patch = base.join(&*patch);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyPatchPath { index: usize },
    MissingField { field: &'static str },
    InvalidPattern { field: &'static str, message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPatchPath { index } => {
                write!(f, "patches[{index}] is an empty path")
            }
            ValidationIssue::MissingField { field } => {
                write!(f, "missing required field '{field}'")
            }
            ValidationIssue::InvalidPattern { field, message } => {
                write!(f, "'{field}' is not a valid regex: {message}")
            }
        }
    }
}
