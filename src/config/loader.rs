//! Reading affinity configuration from disk, strings and the environment
//!
//! Files are JSON. Every entry point validates before returning, so a
//! `Config` obtained here always builds a rule snapshot.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::types::Config;
use crate::error::ConfigError;
use crate::rules::AttributePriority;

/// Environment variable overriding `log.level`
pub const ENV_LOG_LEVEL: &str = "AFFINITY_LOG_LEVEL";

/// Environment variable overriding `log.format`
pub const ENV_LOG_FORMAT: &str = "AFFINITY_LOG_FORMAT";

/// Environment variable overriding `priority` (comma-separated keys)
pub const ENV_PRIORITY: &str = "AFFINITY_PRIORITY";

/// Read and validate a configuration file
///
/// # Errors
///
/// - `ConfigError::FileNotFound` if `path` does not exist
/// - `ConfigError::IoError` if it cannot be read
/// - `ConfigError::ParseError` / `ConfigError::ValidationError` for bad contents
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    debug!(path = %path.display(), "reading affinity configuration");
    let text = fs::read_to_string(path)?;
    let config = parse_validated(&text).map_err(|e| match e {
        ConfigError::ParseError(reason) => {
            ConfigError::ParseError(format!("{}: {reason}", path.display()))
        }
        other => other,
    })?;

    info!(
        path = %path.display(),
        rules = config.rules.len(),
        enabled = config.rules.iter().filter(|rule| rule.enabled).count(),
        priority = %config.priority,
        "affinity configuration loaded"
    );
    Ok(config)
}

/// Parse and validate configuration JSON held in memory
///
/// # Errors
///
/// Returns `ConfigError::ParseError` for malformed JSON and
/// `ConfigError::ValidationError` for rules that do not build.
pub fn load_config_str(json: &str) -> Result<Config, ConfigError> {
    parse_validated(json)
}

fn parse_validated(json: &str) -> Result<Config, ConfigError> {
    let config: Config =
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// [`load_config`] followed by [`apply_env_overrides`]
///
/// # Errors
///
/// Any error of either step.
pub fn load_config_with_env(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Apply the `AFFINITY_*` environment overrides to `config`
///
/// - `AFFINITY_LOG_LEVEL` replaces `log.level`
/// - `AFFINITY_LOG_FORMAT` replaces `log.format` (`json` or `text`)
/// - `AFFINITY_PRIORITY` replaces `priority`, e.g. `src,dst,port,protocol`
///
/// # Errors
///
/// Returns `ConfigError::EnvError` for an unparsable priority and
/// `ConfigError::ValidationError` if the result no longer validates.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
        debug!(from = %config.log.level, to = %level, "{} override", ENV_LOG_LEVEL);
        config.log.level = level;
    }

    if let Ok(format) = std::env::var(ENV_LOG_FORMAT) {
        debug!(from = %config.log.format, to = %format, "{} override", ENV_LOG_FORMAT);
        config.log.format = format;
    }

    if let Ok(text) = std::env::var(ENV_PRIORITY) {
        let priority = AttributePriority::parse(&text).map_err(|e| ConfigError::EnvError {
            name: ENV_PRIORITY.into(),
            reason: e.to_string(),
        })?;
        debug!(from = %config.priority, to = %priority, "{} override", ENV_PRIORITY);
        config.priority = priority;
    }

    config.validate()
}

/// Write the built-in example configuration to `path`
///
/// # Errors
///
/// Returns `ConfigError::IoError` if the file cannot be written.
pub fn create_default_config(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(&Config::default_config())
        .map_err(|e| ConfigError::ParseError(format!("cannot serialize default config: {e}")))?;
    fs::write(path, json)?;
    Ok(())
}
