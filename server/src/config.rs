use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use crate::auth::config::AuthConfig;

/// Top-level server configuration, loaded from guildhall.toml.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub auth: AuthSection,
    pub storage: StorageSection,
}

#[derive(Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub web_address: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            web_address: "0.0.0.0:8080".into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite:guildhall.db?mode=rwc".into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub jwt_secret: String,
    pub public_url: String,
}

impl Default for AuthSection {
    fn default() -> Self {
        let defaults = AuthConfig::default();
        Self {
            jwt_secret: defaults.jwt_secret,
            public_url: defaults.public_url,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory that storage paths such as `server/server_icon/<uuid>.png`
    /// are resolved against.
    pub media_root: String,
    pub max_upload_size_mb: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            media_root: "media".into(),
            max_upload_size_mb: 10,
        }
    }
}

impl ServerConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {path}"))?;
            Self::from_toml(&contents)
                .with_context(|| format!("failed to parse config file {path}"))?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("WEB_ADDRESS") {
            self.server.web_address = v;
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Ok(v) = std::env::var("PUBLIC_URL") {
            self.auth.public_url = v;
        }
        if let Ok(v) = std::env::var("MEDIA_ROOT") {
            self.storage.media_root = v;
        }
        if let Ok(v) = std::env::var("MAX_UPLOAD_SIZE_MB")
            && let Ok(mb) = v.parse()
        {
            self.storage.max_upload_size_mb = mb;
        }
    }

    /// Convert into an AuthConfig for the auth layer.
    pub fn to_auth_config(&self) -> AuthConfig {
        AuthConfig {
            jwt_secret: self.auth.jwt_secret.clone(),
            public_url: self.auth.public_url.clone(),
        }
    }

    /// Upload size limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        (self.storage.max_upload_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.web_address, "0.0.0.0:8080");
        assert_eq!(config.database.url, "sqlite:guildhall.db?mode=rwc");
        assert_eq!(config.storage.media_root, "media");
        assert_eq!(config.max_upload_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.to_auth_config().public_url, "http://localhost:8080");
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            [storage]
            media_root = "/var/lib/guildhall/media"

            [auth]
            jwt_secret = "s3cret"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.media_root, "/var/lib/guildhall/media");
        assert_eq!(config.storage.max_upload_size_mb, 10);
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.auth.public_url, "http://localhost:8080");
        assert_eq!(config.server.web_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_auth_section_holds_only_validation_settings() {
        // Token lifetime belongs to the issuing login service; a shared
        // config file that still carries it is accepted and the key ignored.
        let config = ServerConfig::from_toml(
            r#"
            [auth]
            jwt_secret = "shared"
            session_expiry_hours = 24
            "#,
        )
        .unwrap();
        let auth = config.to_auth_config();
        assert_eq!(auth.jwt_secret, "shared");
        assert_eq!(auth.public_url, "http://localhost:8080");
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        assert!(ServerConfig::from_toml("[storage\nmedia_root = 1").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ServerConfig::load("/nonexistent/guildhall.toml").unwrap();
        assert!(!config.database.url.is_empty());
    }
}
