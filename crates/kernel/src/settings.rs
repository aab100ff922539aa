use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKSHELF_ENV";
const CONFIG_DIR_ENV: &str = "BOOKSHELF_CONFIG_DIR";
const ENV_PREFIX: &str = "BOOKSHELF";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
///
/// A `Settings` value is built once and handed to the application explicitly,
/// so independent instances (e.g. in tests) never share configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay
    /// and `BOOKSHELF_*` variables (`__` separates nested keys, e.g.
    /// `BOOKSHELF_AUTH__API_KEY`).
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .with_context(|| "unable to resolve current directory")?
                .join("config"),
        };

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = match environment.as_str() {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        if settings.environment == Environment::Production
            && settings.auth.secret_key == AuthSettings::default_secret_key()
        {
            tracing::warn!("production environment is using the default token signing secret");
        }

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8000
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }

    /// `host:port` string suitable for binding a listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file, or `:memory:` for a private in-memory database.
    #[serde(default = "DatabaseSettings::default_path")]
    pub path: String,
}

impl DatabaseSettings {
    fn default_path() -> String {
        "books.db".to_string()
    }

    /// Settings pointing at a fresh in-memory database.
    pub fn in_memory() -> Self {
        Self {
            path: ":memory:".to_string(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Static API key accepted in the `X-API-Key` header. Empty disables the
    /// key scheme entirely.
    #[serde(default)]
    pub api_key: String,
    /// HMAC secret used to sign and verify bearer tokens.
    #[serde(default = "AuthSettings::default_secret_key")]
    pub secret_key: String,
    #[serde(default = "AuthSettings::default_token_ttl_minutes")]
    pub token_ttl_minutes: u32,
}

impl AuthSettings {
    fn default_secret_key() -> String {
        "change-me-local-signing-secret".to_string()
    }

    fn default_token_ttl_minutes() -> u32 {
        30
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: Self::default_secret_key(),
            token_ttl_minutes: Self::default_token_ttl_minutes(),
        }
    }
}

/// Per-route request ceilings, counted per client address per minute.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "RateLimitSettings::default_enabled")]
    pub enabled: bool,
    #[serde(default = "RateLimitSettings::default_root_per_minute")]
    pub root_per_minute: u32,
    #[serde(default = "RateLimitSettings::default_token_per_minute")]
    pub token_per_minute: u32,
    #[serde(default = "RateLimitSettings::default_read_per_minute")]
    pub read_per_minute: u32,
    #[serde(default = "RateLimitSettings::default_write_per_minute")]
    pub write_per_minute: u32,
}

impl RateLimitSettings {
    fn default_enabled() -> bool {
        true
    }

    fn default_root_per_minute() -> u32 {
        100
    }

    fn default_token_per_minute() -> u32 {
        5
    }

    fn default_read_per_minute() -> u32 {
        30
    }

    fn default_write_per_minute() -> u32 {
        10
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            root_per_minute: Self::default_root_per_minute(),
            token_per_minute: Self::default_token_per_minute(),
            read_per_minute: Self::default_read_per_minute(),
            write_per_minute: Self::default_write_per_minute(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_server_binds_port_8000() {
        let settings = Settings::default();
        assert_eq!(settings.server.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn default_auth_disables_static_key() {
        let settings = Settings::default();
        assert!(settings.auth.api_key.is_empty());
        assert_eq!(settings.auth.token_ttl_minutes, 30);
    }

    #[test]
    fn default_rate_limits_match_route_ceilings() {
        let limits = RateLimitSettings::default();
        assert!(limits.enabled);
        assert_eq!(limits.root_per_minute, 100);
        assert_eq!(limits.token_per_minute, 5);
        assert_eq!(limits.read_per_minute, 30);
        assert_eq!(limits.write_per_minute, 10);
    }

    #[test]
    fn partial_sections_fall_back_to_defaults() {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                "[auth]\napi_key = \"k\"\n[database]\npath = \":memory:\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let settings: Settings = cfg.try_deserialize().unwrap();

        assert_eq!(settings.auth.api_key, "k");
        assert_eq!(settings.auth.token_ttl_minutes, 30);
        assert_eq!(settings.database.path, ":memory:");
        assert_eq!(settings.server.port, 8000);
    }
}
