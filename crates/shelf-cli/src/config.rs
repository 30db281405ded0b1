//! Configuration system for the Shelf CLI.

use serde::{Deserialize, Serialize};
use shelf_core::Timeouts;
use shelf_relay::{DEFAULT_IRC_PORT, Endpoint};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shelf configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Relay configuration
    #[serde(default)]
    pub relay: RelayConfig,
    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,
    /// Download configuration
    #[serde(default)]
    pub download: DownloadConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// IRC server hostname
    #[serde(default = "default_server")]
    pub server: String,
    /// IRC server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Channel to search in
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Fixed nickname (random `bookseeker_<nnn>` if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Seconds without new results before a search stops early
    #[serde(default = "default_quiet_period")]
    pub quiet_period_secs: u64,
    /// Absolute search deadline in seconds
    #[serde(default = "default_search_deadline")]
    pub deadline_secs: u64,
    /// Extensions to keep (all if empty)
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Absolute download deadline in seconds
    #[serde(default = "default_download_deadline")]
    pub deadline_secs: u64,
    /// Transfer connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Default output file or directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_server() -> String {
    "irc.irchighway.net".to_string()
}

fn default_port() -> u16 {
    DEFAULT_IRC_PORT
}

fn default_channel() -> String {
    "#ebooks".to_string()
}

fn default_quiet_period() -> u64 {
    5
}

fn default_search_deadline() -> u64 {
    30
}

fn default_download_deadline() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            port: default_port(),
            channel: default_channel(),
            nick: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            quiet_period_secs: default_quiet_period(),
            deadline_secs: default_search_deadline(),
            extensions: Vec::new(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_download_deadline(),
            connect_timeout_secs: default_connect_timeout(),
            output: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("shelf/config.toml")
    }

    /// Load config from the default path, falling back to defaults if the
    /// file does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();

        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Relay endpoint described by the `[relay]` section
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(
            self.relay.server.clone(),
            Some(self.relay.port),
            &self.relay.channel,
        )
    }

    /// Negotiation timers described by `[search]` and `[download]`
    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            quiet_period: Duration::from_secs(self.search.quiet_period_secs),
            search_deadline: Duration::from_secs(self.search.deadline_secs),
            download_deadline: Duration::from_secs(self.download.deadline_secs),
            connect_timeout: Duration::from_secs(self.download.connect_timeout_secs),
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.endpoint().validate()?;

        if self.relay.port == 0 {
            anyhow::bail!("Relay port must be non-zero");
        }

        if self.search.quiet_period_secs == 0 || self.search.deadline_secs == 0 {
            anyhow::bail!("Search timeouts must be non-zero");
        }

        if self.search.quiet_period_secs >= self.search.deadline_secs {
            anyhow::bail!(
                "Quiet period ({}s) must be shorter than the search deadline ({}s)",
                self.search.quiet_period_secs,
                self.search.deadline_secs
            );
        }

        if self.download.deadline_secs == 0 || self.download.connect_timeout_secs == 0 {
            anyhow::bail!("Download timeouts must be non-zero");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.relay.server, "irc.irchighway.net");
        assert_eq!(config.relay.port, 6667);
        assert_eq!(config.relay.channel, "#ebooks");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.timeouts(), Timeouts::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.relay.channel = "#".to_string();
        assert!(config.validate().is_err());

        config.relay.channel = "#bookz".to_string();
        config.search.quiet_period_secs = 30;
        assert!(config.validate().is_err());

        config.search.quiet_period_secs = 5;
        config.download.connect_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.download.connect_timeout_secs = 10;
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "DEBUG".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [relay]
            server = "irc.undernet.org"
            channel = "bookz"

            [search]
            extensions = ["epub", "mobi"]
            "#,
        )
        .unwrap();

        assert_eq!(config.relay.port, 6667);
        assert_eq!(config.search.deadline_secs, 30);
        assert_eq!(config.endpoint().channel(), "#bookz");
        assert_eq!(config.search.extensions, vec!["epub", "mobi"]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.relay.nick = Some("reader".to_string());
        config.download.output = Some(PathBuf::from("books/"));
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.relay.nick.as_deref(), Some("reader"));
        assert_eq!(loaded.download.output, Some(PathBuf::from("books/")));
        assert_eq!(loaded.search.quiet_period_secs, 5);
    }
}
