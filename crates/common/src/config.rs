//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Site identity used in outbound mail.
    pub site: SiteConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// SMTP configuration for the notification gateway.
    pub smtp: SmtpConfig,
    /// Attachment storage configuration.
    pub storage: StorageConfig,
    /// Account request policy.
    #[serde(default)]
    pub requests: RequestPolicyConfig,
}

/// Site identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Human-readable site name, used in email subjects and bodies.
    pub name: String,
    /// Public base URL, used to build confirmation links.
    pub url: String,
    /// Whether the whole system is in read-only mode.
    #[serde(default)]
    pub read_only: bool,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL for the leader.
    pub url: String,
    /// Optional read replica URL for follower reads.
    #[serde(default)]
    pub replica_url: Option<String>,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// SMTP relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// SMTP host.
    pub host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Username for relay authentication.
    #[serde(default)]
    pub username: Option<String>,
    /// Password for relay authentication.
    #[serde(default)]
    pub password: Option<String>,
    /// From address for all outbound mail.
    pub from_address: String,
}

/// Attachment storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding attachments of pending requests.
    #[serde(default = "default_request_dir")]
    pub request_dir: String,
    /// Directory holding attachments of accepted credentials.
    #[serde(default = "default_credential_dir")]
    pub credential_dir: String,
}

/// One account request queue classification.
///
/// Mirrors the shape `(subpage key, granted group, auto user-page text)`.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestTypeConfig {
    /// Queue key, also used as the return path after acceptance.
    pub key: String,
    /// Group granted on completion; empty, "user" and "*" grant nothing.
    #[serde(default)]
    pub group: String,
    /// Text appended to the seeded user page for this type.
    #[serde(default)]
    pub auto_text: String,
}

/// One "area of interest" tag requesters may pick.
#[derive(Debug, Clone, Deserialize)]
pub struct AreaConfig {
    /// Tag name.
    pub name: String,
    /// Text appended to the seeded user page when this area was picked.
    #[serde(default)]
    pub user_text: String,
}

/// Account request policy.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestPolicyConfig {
    /// Max successful submissions per submitter IP per window; 0 disables.
    #[serde(default = "default_throttle")]
    pub throttle: u32,
    /// Throttle window in seconds.
    #[serde(default = "default_throttle_window_secs")]
    pub throttle_window_secs: u64,
    /// Whether the terms-of-service checkbox must be set.
    #[serde(default = "default_true")]
    pub tos_required: bool,
    /// Whether the biography field is enabled.
    #[serde(default = "default_true")]
    pub bio_enabled: bool,
    /// Minimum biography length in words.
    #[serde(default = "default_bio_min_words")]
    pub bio_min_words: u32,
    /// Whether file attachments are enabled.
    #[serde(default)]
    pub attachments_enabled: bool,
    /// Allowed attachment extensions.
    #[serde(default = "default_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Confirmation token lifetime in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    /// Whether accepted request data is copied to the credential store.
    #[serde(default = "default_true")]
    pub save_credentials: bool,
    /// Whether a user page is seeded from the biography on completion.
    #[serde(default = "default_true")]
    pub user_page_from_bio: bool,
    /// Text appended to every seeded user page.
    #[serde(default)]
    pub auto_bio_text: String,
    /// Whether new users get a welcome message on completion.
    #[serde(default = "default_true")]
    pub auto_welcome: bool,
    /// Request queue classifications, indexed by the request's type number.
    #[serde(default)]
    pub types: Vec<RequestTypeConfig>,
    /// Areas of interest requesters may pick.
    #[serde(default)]
    pub areas: Vec<AreaConfig>,
}

impl Default for RequestPolicyConfig {
    fn default() -> Self {
        Self {
            throttle: default_throttle(),
            throttle_window_secs: default_throttle_window_secs(),
            tos_required: true,
            bio_enabled: true,
            bio_min_words: default_bio_min_words(),
            attachments_enabled: false,
            allowed_extensions: default_extensions(),
            token_ttl_secs: default_token_ttl_secs(),
            save_credentials: true,
            user_page_from_bio: true,
            auto_bio_text: String::new(),
            auto_welcome: true,
            types: Vec::new(),
            areas: Vec::new(),
        }
    }
}

impl RequestPolicyConfig {
    /// Look up the queue classification for a request type number.
    #[must_use]
    pub fn request_type(&self, type_number: i32) -> Option<&RequestTypeConfig> {
        usize::try_from(type_number)
            .ok()
            .and_then(|idx| self.types.get(idx))
    }

    /// Look up an area of interest by name.
    #[must_use]
    pub fn area(&self, name: &str) -> Option<&AreaConfig> {
        self.areas.iter().find(|a| a.name == name)
    }
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_smtp_port() -> u16 {
    587
}

fn default_request_dir() -> String {
    "./files/accountreqs".to_string()
}

fn default_credential_dir() -> String {
    "./files/accountcreds".to_string()
}

const fn default_throttle() -> u32 {
    1
}

const fn default_throttle_window_secs() -> u64 {
    86_400
}

const fn default_bio_min_words() -> u32 {
    50
}

fn default_extensions() -> Vec<String> {
    ["txt", "pdf", "doc", "latex", "rtf", "text", "wp", "wpd", "sxw"]
        .into_iter()
        .map(String::from)
        .collect()
}

const fn default_token_ttl_secs() -> u64 {
    7 * 24 * 3600
}

const fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `VESTIBULE_ENV`)
    /// 3. Environment variables with `VESTIBULE_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        // Pick up a local .env before reading the environment source.
        let _ = dotenvy::dotenv();

        let env = std::env::var("VESTIBULE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("VESTIBULE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = RequestPolicyConfig::default();
        assert_eq!(policy.throttle, 1);
        assert_eq!(policy.throttle_window_secs, 86_400);
        assert_eq!(policy.bio_min_words, 50);
        assert!(policy.tos_required);
        assert!(!policy.attachments_enabled);
        assert!(policy.allowed_extensions.iter().any(|e| e == "pdf"));
    }

    #[test]
    fn test_request_type_lookup() {
        let policy = RequestPolicyConfig {
            types: vec![
                RequestTypeConfig {
                    key: "authors".to_string(),
                    group: String::new(),
                    auto_text: String::new(),
                },
                RequestTypeConfig {
                    key: "editors".to_string(),
                    group: "editor".to_string(),
                    auto_text: String::new(),
                },
            ],
            ..Default::default()
        };

        assert_eq!(policy.request_type(1).map(|t| t.key.as_str()), Some("editors"));
        assert!(policy.request_type(5).is_none());
        assert!(policy.request_type(-1).is_none());
    }
}
