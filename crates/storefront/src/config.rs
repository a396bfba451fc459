//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `NOVA_API_BASE_URL` - Base URL of the persistence and catalog API
//! - `NOVA_API_TOKEN` - Bearer token for the API (high entropy, not a placeholder)
//!
//! ## Optional
//! - `NOVA_CART_LIMIT` - Maximum distinct items in the cart (default: 10)
//! - `NOVA_WISHLIST_LIMIT` - Maximum distinct items in the wishlist (default: 10)
//! - `NOVA_SYNC_MODE` - `optimistic` or `pessimistic` (default: optimistic)
//! - `NOVA_REQUEST_TIMEOUT_SECS` - Bound on each remote call (default: 10)
//! - `NOVA_RETRY_BACKOFF_MS` - Base delay before the single retry (default: 250)
//! - `NOVA_CATALOG_CACHE_TTL_SECS` - Product cache lifetime (default: 300)
//! - `NOVA_CATALOG_CACHE_CAPACITY` - Product cache size (default: 1000)

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use nova_cart_core::{CollectionKind, DEFAULT_CAPACITY_LIMIT};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_TOKEN_LENGTH: usize = 16;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Remote API connection
    pub api: ApiConfig,
    /// Capacity limits per collection
    pub limits: LimitsConfig,
    /// Remote sync behaviour
    pub sync: SyncConfig,
    /// Product catalog cache
    pub catalog_cache: CatalogCacheConfig,
}

/// Remote API connection settings.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL; collection and product paths are joined onto it
    pub base_url: Url,
    /// Bearer token
    pub token: SecretString,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Capacity limits for the cart and the wishlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitsConfig {
    pub cart: usize,
    pub wishlist: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            cart: DEFAULT_CAPACITY_LIMIT,
            wishlist: DEFAULT_CAPACITY_LIMIT,
        }
    }
}

impl LimitsConfig {
    /// Limit for a collection kind.
    #[must_use]
    pub const fn for_kind(&self, kind: CollectionKind) -> usize {
        match kind {
            CollectionKind::Cart => self.cart,
            CollectionKind::Wishlist => self.wishlist,
        }
    }
}

/// When local state changes relative to the remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Apply locally, send, roll back on failure.
    #[default]
    Optimistic,
    /// Send, apply only what the server confirms.
    Pessimistic,
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(Self::Optimistic),
            "pessimistic" => Ok(Self::Pessimistic),
            other => Err(format!("expected optimistic or pessimistic, got {other}")),
        }
    }
}

/// Remote sync settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub mode: SyncMode,
    /// Bound on a single remote call
    pub request_timeout: Duration,
    /// Base delay before the one retry of a failed call
    pub retry_backoff: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::Optimistic,
            request_timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(250),
        }
    }
}

/// Product catalog cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogCacheConfig {
    pub ttl: Duration,
    pub capacity: u64,
}

impl Default for CatalogCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            capacity: 1000,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        let base_url = vars.required("NOVA_API_BASE_URL")?;
        let base_url = parse_base_url(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("NOVA_API_BASE_URL".to_string(), e))?;
        let token = vars.validated_secret("NOVA_API_TOKEN")?;

        let limits = LimitsConfig {
            cart: vars.limit("NOVA_CART_LIMIT")?,
            wishlist: vars.limit("NOVA_WISHLIST_LIMIT")?,
        };

        let sync = SyncConfig {
            mode: vars.parsed_or("NOVA_SYNC_MODE", SyncMode::Optimistic)?,
            request_timeout: Duration::from_secs(vars.parsed_or("NOVA_REQUEST_TIMEOUT_SECS", 10)?),
            retry_backoff: Duration::from_millis(vars.parsed_or("NOVA_RETRY_BACKOFF_MS", 250)?),
        };
        if sync.request_timeout.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "NOVA_REQUEST_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let catalog_cache = CatalogCacheConfig {
            ttl: Duration::from_secs(vars.parsed_or("NOVA_CATALOG_CACHE_TTL_SECS", 300)?),
            capacity: vars.parsed_or("NOVA_CATALOG_CACHE_CAPACITY", 1000)?,
        };

        Ok(Self {
            api: ApiConfig { base_url, token },
            limits,
            sync,
            catalog_cache,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        (self.0)(key)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Parse an optional variable, falling back to `default` when unset.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.0)(key) {
            Some(value) if !value.trim().is_empty() => value
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
            _ => Ok(default),
        }
    }

    /// Parse a capacity limit, which must be at least 1.
    fn limit(&self, key: &str) -> Result<usize, ConfigError> {
        let limit = self.parsed_or(key, DEFAULT_CAPACITY_LIMIT)?;
        if limit == 0 {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                "must be at least 1".to_string(),
            ));
        }
        Ok(limit)
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        let secret = SecretString::from(value);
        validate_token_length(&secret, key)?;
        validate_secret_strength(secret.expose_secret(), key)?;
        Ok(secret)
    }
}

/// Parse the API base URL. A trailing slash is added so relative joins keep
/// any path prefix.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {}", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Validate that a token meets minimum length requirements.
fn validate_token_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}
