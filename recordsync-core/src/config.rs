//! Configuration system for recordsync.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/recordsync/config.toml` and/or
//! `.recordsync/config.toml` in the workspace directory. Salesforce credentials
//! never live in the file; the config names the environment variables holding them.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Upper bound the sObject Collections API accepts per request.
pub const MAX_BATCH_SIZE: usize = 200;

/// Top-level configuration, built once at process start and passed by argument.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub salesforce: SalesforceConfig,
    #[serde(default)]
    pub write: WriteConfig,
    #[serde(default)]
    pub data: DataConfig,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.write.validate()
    }
}

/// Connection settings for the Salesforce org.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesforceConfig {
    /// REST API version used for data calls.
    pub api_version: String,
    pub login_url_env: String,
    pub username_env: String,
    pub password_env: String,
    /// Security token appended to the password.
    pub security_token_env: String,
    pub client_id_env: String,
    pub client_secret_env: String,
}

impl Default for SalesforceConfig {
    fn default() -> Self {
        Self {
            api_version: "61.0".to_string(),
            login_url_env: "SF_LOGIN_URL".to_string(),
            username_env: "SF_USERNAME".to_string(),
            password_env: "SF_PASSWORD".to_string(),
            security_token_env: "SF_TOKEN".to_string(),
            client_id_env: "SF_CLIENT_ID".to_string(),
            client_secret_env: "SF_CLIENT_SECRET".to_string(),
        }
    }
}

/// Credentials resolved from the environment.
#[derive(Clone)]
pub struct SalesforceCredentials {
    pub login_url: String,
    pub username: String,
    /// Password with the security token already appended.
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for SalesforceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesforceCredentials")
            .field("login_url", &self.login_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl SalesforceConfig {
    /// Read credentials from the process environment.
    pub fn credentials(&self) -> Result<SalesforceCredentials, ConfigError> {
        self.credentials_from(|var| std::env::var(var).ok())
    }

    /// Resolve credentials through an arbitrary lookup. Empty values count as missing.
    /// The security token may be absent (orgs with trusted IP ranges).
    pub fn credentials_from<F>(&self, lookup: F) -> Result<SalesforceCredentials, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::EnvVarMissing {
                    var: var.to_string(),
                })
        };
        let password = required(&self.password_env)?;
        let token = lookup(&self.security_token_env).unwrap_or_default();

        Ok(SalesforceCredentials {
            login_url: required(&self.login_url_env)?
                .trim_end_matches('/')
                .to_string(),
            username: required(&self.username_env)?,
            password: format!("{password}{token}"),
            client_id: required(&self.client_id_env)?,
            client_secret: required(&self.client_secret_env)?,
        })
    }
}

/// Batched write settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteConfig {
    /// Records per upsert call.
    pub batch_size: usize,
    /// Chunks of one write that may be in flight at once.
    pub max_concurrent_chunks: usize,
    /// Deadline for a single upsert call.
    pub call_timeout_secs: u64,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            max_concurrent_chunks: 1,
            call_timeout_secs: 120,
        }
    }
}

impl WriteConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::Invalid {
                message: format!(
                    "write.batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                    self.batch_size
                ),
            });
        }
        if self.max_concurrent_chunks == 0 {
            return Err(ConfigError::Invalid {
                message: "write.max_concurrent_chunks must be at least 1".to_string(),
            });
        }
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "write.call_timeout_secs must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Where report source folders live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root directory; each report reads from a sub-folder of it.
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("test-data"),
        }
    }
}

impl DataConfig {
    /// Resolve `data_dir` against the workspace when it is relative.
    pub fn resolve(&self, workspace: &Path) -> PathBuf {
        if self.data_dir.is_absolute() {
            self.data_dir.clone()
        } else {
            workspace.join(&self.data_dir)
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `RECORDSYNC_`)
/// 3. Workspace-local config (`.recordsync/config.toml`)
/// 4. User config (`~/.config/recordsync/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&SyncConfig>,
) -> Result<SyncConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(SyncConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "recordsync", "recordsync") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // RECORDSYNC_WRITE__BATCH_SIZE, RECORDSYNC_DATA__DATA_DIR, etc.
    figment = figment.merge(Env::prefixed("RECORDSYNC_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: SyncConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

/// Location of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".recordsync").join("config.toml")
}
