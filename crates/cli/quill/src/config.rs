//! `quill.toml` parsing

use anyhow::{Context, Result};
use ql_lower::LowerOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File looked up next to the input when no `--config` is given
pub const FILE_NAME: &str = "quill.toml";

/// Function run when neither `--entry` nor `[run] entry` names one
pub const DEFAULT_ENTRY: &str = "main";

/// Tool configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuillConfig {
    /// Logging
    #[serde(default)]
    pub log: LogConfig,

    /// Lowering limits
    #[serde(default)]
    pub lower: LowerConfig,

    /// `quill run` defaults
    #[serde(default)]
    pub run: RunConfig,
}

/// `[log]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, e.g. `warn` or `ql_lower=debug`
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

/// `[lower]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowerConfig {
    /// Cap on deferred continuations
    #[serde(default)]
    pub max_deferred: Option<usize>,
}

impl LowerConfig {
    /// Options handed to the lowerer
    #[must_use]
    pub fn options(&self) -> LowerOptions {
        LowerOptions {
            max_deferred: self.max_deferred,
        }
    }
}

/// `[run]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Entry function
    #[serde(default)]
    pub entry: Option<String>,
}

impl QuillConfig {
    /// Load the configuration for `input`
    ///
    /// An explicit path must exist. Otherwise `quill.toml` beside the
    /// input is used when present, and defaults when not.
    pub fn load(input: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let candidate = input
            .parent()
            .map_or_else(|| Path::new(FILE_NAME).to_path_buf(), |dir| dir.join(FILE_NAME));
        if candidate.is_file() {
            Self::from_file(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Read and parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Parse configuration text
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Entry function, with `--entry` taking precedence
    #[must_use]
    pub fn entry<'a>(&'a self, flag: Option<&'a str>) -> &'a str {
        flag.or(self.run.entry.as_deref()).unwrap_or(DEFAULT_ENTRY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QuillConfig::parse("").unwrap();
        assert_eq!(config, QuillConfig::default());
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.lower.options(), LowerOptions::default());
        assert_eq!(config.entry(None), "main");
    }

    #[test]
    fn test_full_file() {
        let config = QuillConfig::parse(
            r#"
[log]
level = "ql_lower=debug"

[lower]
max_deferred = 64

[run]
entry = "start"
"#,
        )
        .unwrap();
        assert_eq!(config.log.level, "ql_lower=debug");
        assert_eq!(config.lower.options().max_deferred, Some(64));
        assert_eq!(config.entry(None), "start");
        assert_eq!(config.entry(Some("other")), "other");
    }

    #[test]
    fn test_rejects_bad_types() {
        assert!(QuillConfig::parse("[lower]\nmax_deferred = \"many\"").is_err());
    }

    #[test]
    fn test_load_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tree.json");
        assert_eq!(QuillConfig::load(&input, None).unwrap(), QuillConfig::default());

        std::fs::write(dir.path().join(FILE_NAME), "[run]\nentry = \"go\"\n").unwrap();
        assert_eq!(QuillConfig::load(&input, None).unwrap().entry(None), "go");
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tree.json");
        let missing = dir.path().join("nope.toml");
        assert!(QuillConfig::load(&input, Some(&missing)).is_err());
    }
}
