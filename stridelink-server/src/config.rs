//! Server configuration handling.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Path of the account store file.
    #[serde(default = "default_accounts_path")]
    pub accounts_path: PathBuf,

    /// Logging level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Activity provider settings.
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Identity assertion settings.
    #[serde(default)]
    pub identity: IdentitySettings,

    /// Frontend redirect targets for the authorization callback.
    #[serde(default)]
    pub frontend: FrontendSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// OAuth client ID issued by the provider.
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret issued by the provider. Prefer the
    /// STRIDELINK_PROVIDER_CLIENT_SECRET environment variable over
    /// writing this to disk.
    #[serde(default)]
    pub client_secret: String,

    /// Redirect URI registered with the provider.
    #[serde(default)]
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySettings {
    /// Shared HMAC secret for identity assertion verification. Prefer
    /// the STRIDELINK_IDENTITY_SECRET environment variable.
    #[serde(default)]
    pub jwt_secret: String,

    /// Expected issuer; unchecked when absent.
    #[serde(default)]
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendSettings {
    /// Where the callback sends the browser after a successful link.
    pub success_url: String,

    /// Where the callback sends the browser after a failed link. A
    /// generic message is appended; provider detail never reaches the URL.
    pub error_url: String,
}

impl Default for FrontendSettings {
    fn default() -> Self {
        Self {
            success_url: "http://localhost:5173/activities?provider_connected=true".to_string(),
            error_url: "http://localhost:5173/error".to_string(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_accounts_path() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().join("accounts.json"))
        .unwrap_or_else(|| PathBuf::from(".stridelink/accounts.json"))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            config_path: PathBuf::new(),
            accounts_path: default_accounts_path(),
            log_level: default_log_level(),
            provider: ProviderSettings::default(),
            identity: IdentitySettings::default(),
            frontend: FrontendSettings::default(),
        }
    }
}

/// Load configuration from the default location or create defaults.
///
/// Secrets are taken from the environment when set, overriding the file.
pub fn load_config() -> Result<ServerConfig> {
    let dirs = project_dirs();
    let config_path = dirs
        .as_ref()
        .map(|d| d.config_dir().join("server.toml"))
        .unwrap_or_else(|| PathBuf::from("stridelink-server.toml"));

    let mut config: ServerConfig = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else {
        ServerConfig::default()
    };

    config.config_path = config_path;

    if let Ok(client_id) = std::env::var("STRIDELINK_PROVIDER_CLIENT_ID") {
        config.provider.client_id = client_id;
    }
    if let Ok(client_secret) = std::env::var("STRIDELINK_PROVIDER_CLIENT_SECRET") {
        config.provider.client_secret = client_secret;
    }
    if let Ok(jwt_secret) = std::env::var("STRIDELINK_IDENTITY_SECRET") {
        config.identity.jwt_secret = jwt_secret;
    }

    if let Some(parent) = config.accounts_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {:?}", parent))?;
    }

    Ok(config)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "stridelink", "stridelink")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert!(config.frontend.error_url.ends_with("/error"));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: ServerConfig = toml::from_str(
            r#"
            bind_addr = "0.0.0.0:9000"
            accounts_path = "/var/lib/stridelink/accounts.json"

            [provider]
            client_id = "abc"
            redirect_uri = "https://app.example.com/auth/provider/callback"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.provider.client_id, "abc");
        assert!(config.provider.client_secret.is_empty());
        assert_eq!(config.log_level, "info");
    }
}
