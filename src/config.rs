//! Watcher configuration.
//!
//! Loaded from `~/.prwatch/config.toml` when present. The file only
//! supplies defaults; command-line flags always win, and built-in
//! defaults apply when neither source sets a value.

use std::path::PathBuf;
use std::{fs, io};

use serde::Deserialize;

/// Built-in default poll interval for watch mode.
pub const DEFAULT_POLL_SECONDS: u64 = 30;

/// Built-in default flaky-rerun budget per head commit.
pub const DEFAULT_MAX_FLAKY_RETRIES: u32 = 3;

/// Optional user defaults for the watcher.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Default watch poll interval, in seconds.
    pub poll_seconds: Option<u64>,

    /// Default rerun budget per head SHA.
    pub max_flaky_retries: Option<u32>,
}

impl Config {
    /// Load config from `~/.prwatch/config.toml`. A missing file is
    /// not an error; a present-but-invalid one is.
    pub fn load() -> Result<Self, String> {
        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };

        let contents = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        Self::parse(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// The config file path: `~/.prwatch/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".prwatch").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_sets_nothing() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.poll_seconds, None);
        assert_eq!(config.max_flaky_retries, None);
    }

    #[test]
    fn kebab_case_keys_are_read() {
        let config = Config::parse("poll-seconds = 15\nmax-flaky-retries = 1\n").unwrap();
        assert_eq!(config.poll_seconds, Some(15));
        assert_eq!(config.max_flaky_retries, Some(1));
    }

    #[test]
    fn malformed_toml_is_rejected() {
        assert!(Config::parse("poll-seconds = [").is_err());
    }
}
