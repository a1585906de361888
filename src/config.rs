use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;

use crate::r2::SignError;

pub const DEFAULT_BUCKET: &str = "multitalk-videos";
pub const R2_DOMAIN: &str = "r2.cloudflarestorage.com";

pub const ENV_BUCKET: &str = "R2_BUCKET_NAME";
pub const ENV_ACCOUNT_ID: &str = "R2_ACCOUNT_ID";
pub const ENV_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
pub const ENV_ACCESS_KEY_SECRET: &str = "R2_ACCESS_KEY_SECRET";

/// Credentials for an R2 account
#[derive(Clone, Default, PartialEq, Eq)]
pub struct R2Credentials {
    pub account_id: String,
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl R2Credentials {
    pub fn new(
        account_id: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }

    /// S3-compatible endpoint for this account
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.{}", self.account_id, R2_DOMAIN)
    }

    /// Name of the first empty credential field, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("account_id", &self.account_id),
            ("access_key_id", &self.access_key_id),
            ("access_key_secret", &self.access_key_secret),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

impl fmt::Debug for R2Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = if self.access_key_secret.is_empty() {
            ""
        } else {
            "***"
        };
        f.debug_struct("R2Credentials")
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &secret)
            .finish()
    }
}

/// Configuration for presigning R2 URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bucket: String,
    pub credentials: R2Credentials,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            credentials: R2Credentials::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and .env file
    ///
    /// Missing variables fall back to their defaults. Credentials default to
    /// empty strings and are only rejected when a URL is signed.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from a specific env file
    ///
    /// Only the file is consulted: variables it does not set take their
    /// defaults, even if the process environment or ./.env defines them.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    // `from_path_iter` is the only dotenv 0.15 API that parses a file without
    // exporting it into the process environment
    #[allow(deprecated)]
    pub fn from_env_file(path: &Path) -> Result<Self> {
        let vars = dotenv::from_path_iter(path)
            .with_context(|| format!("Failed to open env file: {}", path.display()))?
            .collect::<std::result::Result<HashMap<String, String>, _>>()
            .with_context(|| format!("Failed to parse env file: {}", path.display()))?;

        Ok(Self::from_lookup(|name| vars.get(name).cloned()))
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket = lookup(ENV_BUCKET)
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BUCKET.to_string());

        Self {
            bucket,
            credentials: R2Credentials {
                account_id: lookup(ENV_ACCOUNT_ID).unwrap_or_default(),
                access_key_id: lookup(ENV_ACCESS_KEY_ID).unwrap_or_default(),
                access_key_secret: lookup(ENV_ACCESS_KEY_SECRET).unwrap_or_default(),
            },
        }
    }
}

/// Validate a bucket name according to R2 naming rules
///
/// R2 bucket names are 3-63 characters of lowercase letters, digits and
/// hyphens, and must start and end with a letter or digit.
pub fn validate_bucket_name(bucket: &str) -> std::result::Result<(), SignError> {
    let invalid = |reason: String| SignError::InvalidBucket {
        bucket: bucket.to_string(),
        reason,
    };

    if bucket.is_empty() {
        return Err(invalid("bucket name cannot be empty".to_string()));
    }

    if bucket.len() < 3 || bucket.len() > 63 {
        return Err(invalid(format!(
            "must be between 3 and 63 characters (got {})",
            bucket.len()
        )));
    }

    if let Some(c) = bucket
        .chars()
        .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '-')
    {
        return Err(invalid(format!(
            "contains invalid character '{}'. Only lowercase letters, numbers and hyphens are allowed",
            c
        )));
    }

    if bucket.starts_with('-') || bucket.ends_with('-') {
        return Err(invalid(
            "must start and end with a lowercase letter or number".to_string(),
        ));
    }

    Ok(())
}
