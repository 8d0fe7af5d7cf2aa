//! Reads settings from the process environment, after optionally loading a
//! `.env` file into it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{key}`")]
    MissingVar { key: &'static str },

    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("failed to load {path}: {source}")]
    Dotenv {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Loads `path` into the process environment. Variables already set win over
/// the file. A missing file is not an error; returns whether one was loaded.
pub fn hydrate(path: &Path) -> Result<bool, ConfigError> {
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!(path = %path.display(), "loaded env file");
            Ok(true)
        }
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ConfigError::Dotenv { path: path.to_path_buf(), source }),
    }
}

/// Where settings come from. Tests use a `HashMap` instead of the process env.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// trimmed value, with blank treated as unset.
pub fn optional(source: &impl EnvSource, key: &str) -> Option<String> {
    source.var(key).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub fn optional_or(source: &impl EnvSource, key: &str, default: &str) -> String {
    optional(source, key).unwrap_or_else(|| default.to_string())
}

/// first of `keys` that is set.
pub fn first_of(source: &impl EnvSource, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| optional(source, k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn blank_is_unset() {
        let src = env(&[("DOMAIN_NAME", "  example.com "), ("SUB_DOMAIN", "   ")]);
        assert_eq!(optional(&src, "DOMAIN_NAME").as_deref(), Some("example.com"));
        assert_eq!(optional(&src, "SUB_DOMAIN"), None);
        assert_eq!(optional_or(&src, "SUB_DOMAIN", "api"), "api");
    }

    #[test]
    fn first_of_respects_order() {
        let src = env(&[("CDK_DEFAULT_REGION", "eu-west-1"), ("AWS_REGION", "us-west-2")]);
        assert_eq!(first_of(&src, &["AWS_REGION", "CDK_DEFAULT_REGION"]).as_deref(), Some("us-west-2"));
        assert_eq!(first_of(&src, &["NOPE"]), None);
    }

    #[test]
    fn missing_env_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!hydrate(&dir.path().join(".env")).unwrap());
    }

    #[test]
    fn env_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "DOTENV_READER_TEST_KEY=from-file\n").unwrap();
        assert!(hydrate(&path).unwrap());
        assert_eq!(optional(&ProcessEnv, "DOTENV_READER_TEST_KEY").as_deref(), Some("from-file"));
    }
}
