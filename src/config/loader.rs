use crate::config::schema::{InstrumentConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "instrument.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(f, "failed to parse {}: {}", path.display(), source),
                None => write!(f, "failed to parse instrument config: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid instrument config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<InstrumentConfig, ConfigError> {
    let config: InstrumentConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

/// Load and validate a config file. Relative patch paths are taken relative
/// to the file's directory.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<InstrumentConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = load_from_str(&contents).map_err(|error| error.with_path(path))?;
    if let Some(dir) = path.parent() {
        config.resolve_relative_to(dir);
    }
    Ok(config)
}

/// Load `explicit` if given, else `instrument.toml` in `dir` when it exists,
/// else defaults.
pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<InstrumentConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }
    let candidate = dir.join(CONFIG_FILE);
    if candidate.is_file() {
        tracing::debug!(path = %candidate.display(), "using config file");
        load_from_path(candidate)
    } else {
        Ok(InstrumentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ValidationIssue;

    #[test]
    fn empty_input_gives_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config, InstrumentConfig::default());
        assert!(config.skip_tests);
        assert!(config.vendor.fallback_to_all);
        assert_eq!(config.vendor.pkgmod_dir, PathBuf::from("instrumented_pkgmods"));
    }

    #[test]
    fn reports_every_issue() {
        let err = load_from_str(
            "patches = [\"\"]\nexclude_func = \"(\"\n\n[vendor]\npath_pattern = \"[\"\n",
        )
        .unwrap_err();
        match err {
            ConfigError::Validation { path: None, source } => {
                assert_eq!(source.issues.len(), 3);
                assert_eq!(source.issues[0], ValidationIssue::EmptyPatchPath { index: 0 });
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            load_from_str("pattches = []\n"),
            Err(ConfigError::Toml { .. })
        ));
    }

    #[test]
    fn path_is_attached_and_patches_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "patches = [\"trace.go\", \"/abs/log.go\"]\n").unwrap();

        let config = discover(None, dir.path()).unwrap();
        assert_eq!(
            config.patches,
            vec![dir.path().join("trace.go"), PathBuf::from("/abs/log.go")]
        );

        fs::write(&path, "skip_tests = \"yes\"\n").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn missing_default_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(discover(None, dir.path()).unwrap(), InstrumentConfig::default());
        assert!(matches!(
            discover(Some(dir.path().join("nope.toml").as_path()), dir.path()),
            Err(ConfigError::Io { .. })
        ));
    }
}
