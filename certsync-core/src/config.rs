//! TOML configuration shared by `certsync push` and `certsync pull`.
//!
//! ```toml
//! key_dir = "/etc/certsync/keys"
//! cert_dir = "/etc/ssl/certsync"
//! reload_cmd = "systemctl reload nginx"
//!
//! [[issue_commands]]
//! command = "lego --domains example.com renew"
//! env = { CF_DNS_API_TOKEN = "..." }
//!
//! [s3]
//! bucket = "certs"
//! region = "us-east-1"
//! prefix = "prod"
//!
//! [daemon]
//! enabled = true
//! interval_secs = 3600
//! jitter_secs = 300
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Object storage connection settings.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub prefix: String,
    pub force_path_style: bool,
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("prefix", &self.prefix)
            .field("force_path_style", &self.force_path_style)
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

/// A certificate issuance command run before each push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IssueCommand {
    pub command: String,
    /// Added on top of the inherited process environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Periodic scheduling settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub jitter_secs: u64,
}

impl DaemonConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_secs)
    }
}

/// Full configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub key_dir: PathBuf,
    pub cert_dir: PathBuf,
    #[serde(default)]
    pub reload_cmd: Option<String>,
    /// Push only.
    #[serde(default, alias = "lego_commands")]
    pub issue_commands: Vec<IssueCommand>,
    #[serde(default)]
    pub s3: S3Config,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl Config {
    /// Read, parse and validate the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot drive a sync run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("key_dir is required".to_string()));
        }
        if self.cert_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("cert_dir is required".to_string()));
        }
        if self.s3.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("s3.bucket is required".to_string()));
        }
        if self.daemon.enabled && self.daemon.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "daemon.interval_secs must be greater than zero when daemon.enabled".to_string(),
            ));
        }
        if let Some(index) = self
            .issue_commands
            .iter()
            .position(|cmd| cmd.command.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "issue_commands[{index}].command is empty"
            )));
        }
        Ok(())
    }

    /// The reload hook, with an empty string treated as unset.
    pub fn reload_command(&self) -> Option<&str> {
        self.reload_cmd
            .as_deref()
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
key_dir = "/var/lib/certsync/keys"
cert_dir = "/etc/ssl/certsync"

[s3]
bucket = "certs"
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.key_dir, PathBuf::from("/var/lib/certsync/keys"));
        assert!(config.issue_commands.is_empty());
        assert!(config.reload_command().is_none());
        assert!(!config.daemon.enabled);
        assert_eq!(config.s3.prefix, "");
        assert!(!config.s3.force_path_style);
    }

    #[test]
    fn legacy_lego_commands_alias_is_accepted() {
        let raw = format!(
            "{MINIMAL}\n[[lego_commands]]\ncommand = \"lego renew\"\nenv = {{ TOKEN = \"abc\" }}\n"
        );
        let config: Config = toml::from_str(&raw).unwrap();
        assert_eq!(config.issue_commands.len(), 1);
        assert_eq!(config.issue_commands[0].command, "lego renew");
        assert_eq!(
            config.issue_commands[0].env.get("TOKEN").map(String::as_str),
            Some("abc")
        );
    }

    #[test]
    fn blank_reload_command_is_unset() {
        let config = Config {
            reload_cmd: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(config.reload_command().is_none());
    }

    #[test]
    fn missing_bucket_is_invalid() {
        let config: Config =
            toml::from_str("key_dir = \"/k\"\ncert_dir = \"/c\"\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("s3.bucket"));
    }

    #[test]
    fn enabled_daemon_requires_interval() {
        let raw = format!("{MINIMAL}\n[daemon]\nenabled = true\n");
        let config: Config = toml::from_str(&raw).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("interval_secs"));
    }

    #[test]
    fn debug_redacts_secret_key() {
        let s3 = S3Config {
            bucket: "certs".to_string(),
            secret_key: "hunter2".to_string(),
            ..S3Config::default()
        };
        let rendered = format!("{s3:?}");
        assert!(rendered.contains("certs"));
        assert!(!rendered.contains("hunter2"));
    }
}
