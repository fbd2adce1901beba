use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drive::batch::MAX_BATCH_SIZE;
use crate::drive::RetryPolicy;

pub const CONFIG_FILE_NAME: &str = "drivemaster.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Requests per batch when fetching permissions (at most 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Sheets ranges holding `name | email | title` rows for the access matrix
    #[serde(default)]
    pub contacts: Vec<ContactSource>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            credentials: CredentialsConfig::default(),
            paths: PathsConfig::default(),
            retry: RetryConfig::default(),
            batch_size: default_batch_size(),
            contacts: Vec::new(),
        }
    }
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// OAuth client secret of the installed (desktop) application
    #[serde(default = "default_client_secret")]
    pub client_secret: PathBuf,
    /// Where the access/refresh token is cached between runs
    #[serde(default = "default_token_cache")]
    pub token_cache: PathBuf,
    /// Local port the OAuth consent redirect lands on
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

fn default_client_secret() -> PathBuf {
    PathBuf::from("credentials/credentials_DeskApp.json")
}

fn default_token_cache() -> PathBuf {
    PathBuf::from("credentials/token.json")
}

fn default_redirect_port() -> u16 {
    8080
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            client_secret: default_client_secret(),
            token_cache: default_token_cache(),
            redirect_port: default_redirect_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_archives")]
    pub archives: PathBuf,
    #[serde(default = "default_reports")]
    pub reports: PathBuf,
    #[serde(default = "default_logs")]
    pub logs: PathBuf,
}

fn default_archives() -> PathBuf {
    PathBuf::from("archives")
}

fn default_reports() -> PathBuf {
    PathBuf::from("reports")
}

fn default_logs() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            archives: default_archives(),
            reports: default_reports(),
            logs: default_logs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            jitter: self.jitter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSource {
    pub spreadsheet_id: String,
    /// A1 range, e.g. `Sponsors!B:D`
    pub range: String,
}

impl AppConfig {
    /// Load `path`, or `./drivemaster.toml` when no path is given. A missing
    /// default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(CONFIG_FILE_NAME), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::Missing(path));
            }
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(text)?;
        config.batch_size = config.batch_size.clamp(1, MAX_BATCH_SIZE);
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.retry.policy(), RetryPolicy::default());
        assert_eq!(config.paths.logs, PathBuf::from("logs"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            batch_size = 500

            [retry]
            max_retries = 2

            [[contacts]]
            spreadsheet_id = "sheet-1"
            range = "Sponsors!B:D"
            "#,
        )
        .unwrap();

        assert_eq!(config.batch_size, MAX_BATCH_SIZE);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.credentials.redirect_port, 8080);
        assert_eq!(config.contacts.len(), 1);
        assert_eq!(config.contacts[0].range, "Sponsors!B:D");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/drivemaster.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[paths]\nlogs = \"audit\"\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.paths.logs, PathBuf::from("audit"));
        assert_eq!(config.paths.archives, PathBuf::from("archives"));
    }
}
