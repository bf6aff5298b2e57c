/// Project configuration: reference language, content paths, logging.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("reference language must not be empty")]
    EmptyReferenceLanguage,
}

/// Log output format for the tool binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Install the global subscriber, writing to stderr. `RUST_LOG`
    /// overrides the configured level. Call once, from a binary.
    pub fn init(&self) {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Top-level configuration, usually loaded from `narrative.ron`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Language guaranteed to have complete coverage.
    #[serde(default = "default_reference_language")]
    pub reference_language: String,
    /// Authored records: `main/*.ron` chapters and `side/*.ron` cases.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// `_meta/registry.ron` plus one `<language>/ui.json` per language.
    #[serde(default = "default_locales_dir")]
    pub locales_dir: PathBuf,
    /// Chapter whose ending leads to the terminal sentinel. Defaults to the
    /// highest chapter number being compiled.
    #[serde(default)]
    pub final_chapter: Option<u32>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference_language: default_reference_language(),
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            locales_dir: default_locales_dir(),
            final_chapter: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a configuration from a RON string. Missing fields take defaults.
    pub fn parse_ron(input: &str) -> Result<Config, ConfigError> {
        let config: Config = ron::from_str(input)?;
        if config.reference_language.trim().is_empty() {
            return Err(ConfigError::EmptyReferenceLanguage);
        }
        Ok(config)
    }
}

fn default_reference_language() -> String {
    "english".to_string()
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("source")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_locales_dir() -> PathBuf {
    PathBuf::from("locales")
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.reference_language, "english");
        assert_eq!(config.output_dir, PathBuf::from("content"));
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.final_chapter.is_none());
    }

    #[test]
    fn parse_partial_config() {
        let config = Config::parse_ron(
            r#"(
                reference_language: "schinese",
                final_chapter: Some(7),
                logging: (level: "debug", format: json),
            )"#,
        )
        .unwrap();
        assert_eq!(config.reference_language, "schinese");
        assert_eq!(config.final_chapter, Some(7));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.source_dir, PathBuf::from("source"));
    }

    #[test]
    fn empty_reference_language_rejected() {
        let result = Config::parse_ron(r#"(reference_language: " ")"#);
        assert!(matches!(result, Err(ConfigError::EmptyReferenceLanguage)));
    }

    #[test]
    fn invalid_ron_rejected() {
        assert!(matches!(
            Config::parse_ron("(reference_language: )"),
            Err(ConfigError::Ron(_))
        ));
    }
}
