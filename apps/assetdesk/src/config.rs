//! # Configuration
//!
//! Optional TOML file plus environment overrides.
//!
//! ```toml
//! approvers = ["ops-lead@example.com"]
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [storage]
//! database = "/var/lib/assetdesk/desk.db"
//! backend = "redb"
//!
//! [mail]
//! smtp_host = "smtp.example.com"
//! from = "assetdesk@example.com"
//!
//! [scheduler]
//! interval_secs = 86400
//! ```
//!
//! ## Environment Overrides
//!
//! - `ASSETDESK_API_KEY`: bearer key for the API (unset disables auth)
//! - `ASSETDESK_CORS_ORIGINS`: comma-separated origins, or `*`
//! - `ASSETDESK_RATE_LIMIT`: requests per second, 0 disables
//! - `ASSETDESK_SMTP_HOST`, `ASSETDESK_SMTP_USERNAME`, `ASSETDESK_SMTP_PASSWORD`

use assetdesk_core::{DeskError, Recipients};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Requests per second when nothing else is configured.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Database path when neither the CLI nor the file names one.
pub const DEFAULT_DATABASE: &str = "assetdesk.db";

/// Config files are small; anything bigger is a mistake.
const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

/// Storage backend selector shared by the CLI and the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ACID database, every transition committed as it happens
    #[default]
    Redb,
    /// Snapshot file rewritten after every change
    File,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::File => "file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub cors_origins: Option<String>,
    pub rate_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_key: None,
            cors_origins: None,
            rate_limit: DEFAULT_RATE_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Defaults with the environment applied. Used when no file is loaded.
    pub fn from_env() -> Self {
        let mut server = Self::default();
        server.apply_overrides(&env_value);
        server
    }

    fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ASSETDESK_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(origins) = lookup("ASSETDESK_CORS_ORIGINS") {
            self.cors_origins = Some(origins);
        }
        if let Some(limit) = lookup("ASSETDESK_RATE_LIMIT") {
            match limit.trim().parse() {
                Ok(rps) => self.rate_limit = rps,
                Err(_) => tracing::warn!(
                    value = %limit,
                    "Ignoring ASSETDESK_RATE_LIMIT: not a number"
                ),
            }
        }
        self.api_key = self.api_key.take().filter(|k| !k.is_empty());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: Option<PathBuf>,
    pub backend: Option<Backend>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// No host means notifications are only logged.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub starttls: bool,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            username: None,
            password: None,
            from: "assetdesk@localhost".to_string(),
            starttls: true,
        }
    }
}

impl MailConfig {
    fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("ASSETDESK_SMTP_HOST") {
            self.smtp_host = Some(host);
        }
        if let Some(username) = lookup("ASSETDESK_SMTP_USERNAME") {
            self.username = Some(username);
        }
        if let Some(password) = lookup("ASSETDESK_SMTP_PASSWORD") {
            self.password = Some(password);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Seconds between two runs of the daily jobs.
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 24 * 60 * 60,
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub mail: MailConfig,
    pub scheduler: SchedulerConfig,
    /// Addresses notified of approvals and escalations.
    pub approvers: Vec<String>,
    /// Addresses notified of vehicle document expiry.
    pub fleet: Vec<String>,
    /// Addresses notified of new helpdesk tickets.
    pub helpdesk: Vec<String>,
}

impl Config {
    /// Load the file when given, then apply the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, DeskError> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => Self::default(),
        };
        config.apply_overrides(&env_value);
        Ok(config)
    }

    /// Parse TOML text without touching the environment.
    pub fn parse(text: &str) -> Result<Self, DeskError> {
        toml::from_str(text)
            .map_err(|e| DeskError::DeserializationError(format!("Config: {}", e)))
    }

    fn read(path: &Path) -> Result<Self, DeskError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            DeskError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_SIZE {
            return Err(DeskError::IoError(format!(
                "Config '{}' exceeds {} bytes",
                path.display(),
                MAX_CONFIG_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            DeskError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        self.server.apply_overrides(lookup);
        self.mail.apply_overrides(lookup);
    }

    /// Recipient lists for the registry, when the file names any.
    pub fn recipients(&self) -> Option<Recipients> {
        if self.approvers.is_empty() && self.fleet.is_empty() && self.helpdesk.is_empty() {
            return None;
        }
        Some(Recipients {
            approvers: self.approvers.clone(),
            fleet: self.fleet.clone(),
            helpdesk: self.helpdesk.clone(),
        })
    }

    /// CLI flag first, then the file, then the default.
    pub fn database(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.storage.database.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    pub fn backend(&self, cli: Option<Backend>) -> Backend {
        cli.or(self.storage.backend).unwrap_or_default()
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.server.rate_limit, DEFAULT_RATE_LIMIT);
        assert!(config.scheduler.enabled);
        assert!(config.recipients().is_none());
    }

    #[test]
    fn sections_are_read() {
        let config = Config::parse(
            r#"
            approvers = ["lead@example.com"]

            [server]
            port = 9090

            [storage]
            backend = "file"
            database = "desk.snapshot"

            [mail]
            smtp_host = "smtp.example.com"
            smtp_port = 2525

            [scheduler]
            interval_secs = 60
            "#,
        )
        .expect("parse");

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.backend(None), Backend::File);
        assert_eq!(config.backend(Some(Backend::Redb)), Backend::Redb);
        assert_eq!(config.database(None), PathBuf::from("desk.snapshot"));
        assert_eq!(config.mail.smtp_port, 2525);
        assert_eq!(config.scheduler.interval_secs, 60);
        let recipients = config.recipients().expect("recipients");
        assert_eq!(recipients.approvers, vec!["lead@example.com".to_string()]);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = Config::parse("[storage]\nbackend = \"sqlite\"").expect_err("backend");
        assert!(matches!(err, DeskError::DeserializationError(_)));
    }

    #[test]
    fn environment_wins_over_file() {
        let mut config =
            Config::parse("[server]\napi_key = \"from-file\"\nrate_limit = 5").expect("parse");
        config.apply_overrides(&lookup_from(&[
            ("ASSETDESK_API_KEY", "from-env"),
            ("ASSETDESK_RATE_LIMIT", "0"),
            ("ASSETDESK_SMTP_HOST", "mail.internal"),
        ]));
        assert_eq!(config.server.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.server.rate_limit, 0);
        assert_eq!(config.mail.smtp_host.as_deref(), Some("mail.internal"));
    }

    #[test]
    fn bad_rate_limit_keeps_previous_value() {
        let mut server = ServerConfig::default();
        server.apply_overrides(&lookup_from(&[("ASSETDESK_RATE_LIMIT", "fast")]));
        assert_eq!(server.rate_limit, DEFAULT_RATE_LIMIT);
    }

    #[test]
    fn empty_api_key_disables_auth() {
        let mut server = ServerConfig {
            api_key: Some(String::new()),
            ..ServerConfig::default()
        };
        server.apply_overrides(&lookup_from(&[]));
        assert!(server.api_key.is_none());
    }
}
