use clap::{Args, Parser, ValueEnum};
use std::time::Duration;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub sessions: SessionConfig,

    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "ASTRAL_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "ASTRAL_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Upper bound on the time spent handling a single request
    #[arg(long, env = "ASTRAL_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// How long to wait for background workers after shutdown is signalled
    #[arg(long, env = "ASTRAL_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for signing access tokens
    #[arg(long, env = "ASTRAL_ACCESS_SECRET", hide_env_values = true)]
    pub access_secret: String,

    /// Secret key for signing refresh tokens. Must differ from the access secret.
    #[arg(long, env = "ASTRAL_REFRESH_SECRET", hide_env_values = true)]
    pub refresh_secret: String,

    /// Access token time-to-live in seconds
    #[arg(long, env = "ASTRAL_ACCESS_TOKEN_TTL_SECS", default_value_t = 900)]
    pub access_token_ttl_secs: u64,

    /// Refresh token time-to-live in seconds
    #[arg(long, env = "ASTRAL_REFRESH_TOKEN_TTL_SECS", default_value_t = 604_800)]
    pub refresh_token_ttl_secs: u64,
}

impl AuthConfig {
    #[must_use]
    pub const fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_ttl_secs)
    }

    #[must_use]
    pub const fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_ttl_secs)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SessionBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Clone, Debug, Args)]
pub struct SessionConfig {
    /// Where session records live. `memory` is only suitable for a single node.
    #[arg(long = "session-backend", env = "ASTRAL_SESSION_BACKEND", value_enum, default_value_t = SessionBackend::Redis)]
    pub backend: SessionBackend,

    /// Redis connection URL
    #[arg(long, env = "ASTRAL_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Key prefix for session records in Redis
    #[arg(long, env = "ASTRAL_REDIS_PREFIX", default_value = "session:")]
    pub redis_prefix: String,

    /// How many times to retry the initial Redis connection
    #[arg(long, env = "ASTRAL_REDIS_CONNECT_RETRIES", default_value_t = 5)]
    pub connect_retries: usize,

    /// Upper bound on a single session store operation
    #[arg(long, env = "ASTRAL_STORE_TIMEOUT_MS", default_value_t = 500)]
    pub store_timeout_ms: u64,

    /// How often the in-memory backend purges expired sessions (0 disables)
    #[arg(long, env = "ASTRAL_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[arg(long, env = "ASTRAL_DATABASE_URL")]
    pub database_url: String,

    /// Maximum number of pooled connections
    #[arg(long, env = "ASTRAL_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Seconds to wait for a free connection
    #[arg(long, env = "ASTRAL_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "ASTRAL_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint. Traces and metrics are only exported when set.
    #[arg(long, env = "ASTRAL_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

/// Longest token lifetime accepted at startup (ten years).
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

impl Config {
    /// Parses configuration from the command line and environment.
    ///
    /// # Errors
    /// Returns an error if the parsed values are inconsistent.
    pub fn load() -> anyhow::Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants clap cannot express.
    ///
    /// # Errors
    /// Returns an error if the signing secrets are empty or shared, or a TTL is zero or
    /// longer than [`MAX_TOKEN_TTL_SECS`].
    pub fn validate(&self) -> anyhow::Result<()> {
        let auth = &self.auth;
        if auth.access_secret.is_empty() || auth.refresh_secret.is_empty() {
            anyhow::bail!("access and refresh secrets must not be empty");
        }
        if auth.access_secret == auth.refresh_secret {
            anyhow::bail!("access and refresh tokens must be signed with different secrets");
        }
        if auth.access_token_ttl_secs == 0 || auth.refresh_token_ttl_secs == 0 {
            anyhow::bail!("token lifetimes must be at least one second");
        }
        if auth.access_token_ttl_secs > MAX_TOKEN_TTL_SECS || auth.refresh_token_ttl_secs > MAX_TOKEN_TTL_SECS {
            anyhow::bail!("token lifetimes must not exceed {MAX_TOKEN_TTL_SECS} seconds");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Config {
        let mut args = vec![
            "astral-server",
            "--database-url",
            "postgres://localhost/astral",
            "--access-secret",
            "access",
            "--refresh-secret",
            "refresh",
        ];
        args.extend_from_slice(extra);
        Config::parse_from(args)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.auth.access_token_ttl_secs, 900);
        assert_eq!(config.auth.refresh_token_ttl_secs, 604_800);
        assert_eq!(config.sessions.backend, SessionBackend::Redis);
        assert_eq!(config.sessions.store_timeout(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_memory_backend_flag() {
        let config = parse(&["--session-backend", "memory"]);
        assert_eq!(config.sessions.backend, SessionBackend::Memory);
    }

    #[test]
    fn test_shared_secret_rejected() {
        let mut config = parse(&[]);
        config.auth.refresh_secret = config.auth.access_secret.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = parse(&[]);
        config.auth.access_token_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let config = parse(&["--refresh-token-ttl-secs", "1000000000000"]);
        assert!(config.validate().is_err());

        let config = parse(&["--access-token-ttl-secs", &(MAX_TOKEN_TTL_SECS + 1).to_string()]);
        assert!(config.validate().is_err());

        let config = parse(&["--refresh-token-ttl-secs", &MAX_TOKEN_TTL_SECS.to_string()]);
        assert!(config.validate().is_ok());
    }
}
