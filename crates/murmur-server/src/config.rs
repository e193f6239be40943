//! Server configuration loading from file and environment variables.

use murmur_google::GoogleConfig;
use murmur_voice::RealtimeConfig;
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Conversation provider credentials.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Google OAuth client and API endpoints.
    #[serde(default)]
    pub google: GoogleConfig,

    /// Identity verification service.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Signing of the OAuth `state` parameter.
    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub frontend: FrontendConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Deployment label reported by `/api/check-config`.
    #[serde(default = "default_environment")]
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,

    /// How long a request waits for a pooled connection.
    #[serde(default = "default_checkout_timeout_ms")]
    pub checkout_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "murmur_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Supabase-style identity service used to verify bearer tokens.
#[derive(Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub supabase_url: String,

    #[serde(default)]
    pub supabase_anon_key: String,

    #[serde(default = "default_identity_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for OAuth `state` values. A random key is generated at
    /// startup when empty, which invalidates pending consents on restart.
    #[serde(default)]
    pub state_secret: String,

    /// Lifetime of a signed `state`, in seconds.
    #[serde(default = "default_state_ttl_secs")]
    pub state_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    /// Where the OAuth callback redirects the browser.
    #[serde(default = "default_frontend_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    /// Upper bound on a single domain tool execution, in seconds.
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3001
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_db_path() -> String {
    "murmur.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_checkout_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_identity_timeout_secs() -> u64 {
    10
}

fn default_state_ttl_secs() -> u64 {
    600
}

fn default_frontend_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
            checkout_timeout_ms: default_checkout_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            timeout_secs: default_identity_timeout_secs(),
        }
    }
}

impl IdentityConfig {
    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("supabase_url", &self.supabase_url)
            .field("supabase_anon_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            state_secret: String::new(),
            state_ttl_secs: default_state_ttl_secs(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("state_secret", &"[REDACTED]")
            .field("state_ttl_secs", &self.state_ttl_secs)
            .finish()
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            url: default_frontend_url(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout_secs(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides (see [`apply_env_overrides`]).
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Overrides config values from `lookup` (the process environment in
/// production):
///
/// | Variable | Field |
/// |---|---|
/// | `MURMUR_HOST`, `MURMUR_PORT` | `server.host`, `server.port` |
/// | `MURMUR_ENV` | `server.environment` |
/// | `MURMUR_DB_PATH` | `database.path` |
/// | `MURMUR_LOG_LEVEL`, `MURMUR_LOG_JSON` | `logging.level`, `logging.json` |
/// | `OPENAI_API_KEY` | `realtime.api_key` |
/// | `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REDIRECT_URI` | `google.*` |
/// | `FRONTEND_URL` | `frontend.url` |
/// | `SUPABASE_URL`, `SUPABASE_ANON_KEY` | `identity.*` |
/// | `MURMUR_STATE_SECRET` | `auth.state_secret` |
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(parsed) = var("MURMUR_HOST").and_then(|h| h.parse().ok()) {
        config.server.host = parsed;
    }
    if let Some(parsed) = var("MURMUR_PORT").and_then(|p| p.parse().ok()) {
        config.server.port = parsed;
    }
    if let Some(env) = var("MURMUR_ENV") {
        config.server.environment = env;
    }
    if let Some(path) = var("MURMUR_DB_PATH") {
        config.database.path = path;
    }
    if let Some(level) = var("MURMUR_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("MURMUR_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(key) = var("OPENAI_API_KEY") {
        config.realtime.api_key = key;
    }
    if let Some(id) = var("GOOGLE_CLIENT_ID") {
        config.google.client_id = id;
    }
    if let Some(secret) = var("GOOGLE_CLIENT_SECRET") {
        config.google.client_secret = secret;
    }
    if let Some(uri) = var("GOOGLE_REDIRECT_URI") {
        config.google.redirect_uri = uri;
    }
    if let Some(url) = var("FRONTEND_URL") {
        config.frontend.url = url;
    }
    if let Some(url) = var("SUPABASE_URL") {
        config.identity.supabase_url = url;
    }
    if let Some(key) = var("SUPABASE_ANON_KEY") {
        config.identity.supabase_anon_key = key;
    }
    if let Some(secret) = var("MURMUR_STATE_SECRET") {
        config.auth.state_secret = secret;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn sections_default_when_missing() {
        let config: Config = toml::from_str("[server]\nport = 4000\n").unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.environment, "development");
        assert_eq!(config.database.path, "murmur.db");
        assert_eq!(config.tools.timeout_secs, 30);
        assert_eq!(config.auth.state_ttl_secs, 600);
        assert!(!config.realtime.is_configured());
        assert!(!config.identity.is_configured());
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config: Config = toml::from_str(
            "[database]\npath = \"file.db\"\n[google]\nclient_id = \"from-file\"\n",
        )
        .unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("MURMUR_PORT", "9090"),
            ("MURMUR_DB_PATH", "env.db"),
            ("MURMUR_LOG_JSON", "1"),
            ("GOOGLE_CLIENT_ID", "from-env"),
            ("OPENAI_API_KEY", "sk-env"),
            ("SUPABASE_URL", "   "),
            ("MURMUR_HOST", "not-an-ip"),
        ]);
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.path, "env.db");
        assert!(config.logging.json);
        assert_eq!(config.google.client_id, "from-env");
        assert!(config.realtime.is_configured());
        assert!(config.identity.supabase_url.is_empty());
        assert_eq!(config.server.host, default_host());
    }

    #[test]
    fn secrets_stay_out_of_debug_output() {
        let mut config = Config::default();
        config.identity.supabase_anon_key = "anon-secret".into();
        config.auth.state_secret = "hmac-secret".into();
        config.realtime.api_key = "sk-secret".into();
        config.google.client_secret = "g-secret".into();
        let rendered = format!("{config:?}");
        for secret in ["anon-secret", "hmac-secret", "sk-secret", "g-secret"] {
            assert!(!rendered.contains(secret), "{secret} leaked");
        }
    }
}
