use aws_sdk_s3::presigning::{PresignedRequest, PresigningConfig};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tracing::{debug, error};

use super::client::build_client;
use super::error::{Result, SignError};
use crate::config::{Config, R2Credentials, validate_bucket_name};

/// Default URL validity window (1 hour)
pub const DEFAULT_EXPIRATION_SECS: u64 = 3600;

/// SigV4 presigned URLs are valid for at most 7 days
pub const MAX_EXPIRATION_SECS: u64 = 7 * 24 * 60 * 60;

/// What the presigned URL allows its holder to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Download the object (S3 GetObject)
    #[default]
    Read,
    /// Upload the object (S3 PutObject)
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" | "get" | "get_object" => Ok(Self::Read),
            "write" | "put" | "put_object" => Ok(Self::Write),
            other => Err(format!(
                "unknown operation '{}' (expected read/get_object or write/put_object)",
                other
            )),
        }
    }
}

/// A single presigning request
///
/// Bucket and credentials fall back to the signer's [`Config`] unless
/// overridden here.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub key: String,
    pub operation: Operation,
    pub expires_in: Duration,
    pub content_type: Option<String>,
    pub bucket: Option<String>,
    pub credentials: Option<R2Credentials>,
    pub issued_at: Option<SystemTime>,
}

impl SignRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operation: Operation::default(),
            expires_in: Duration::from_secs(DEFAULT_EXPIRATION_SECS),
            content_type: None,
            bucket: None,
            credentials: None,
            issued_at: None,
        }
    }

    /// Request a download URL
    pub fn read(key: impl Into<String>) -> Self {
        Self::new(key).operation(Operation::Read)
    }

    /// Request an upload URL
    pub fn write(key: impl Into<String>) -> Self {
        Self::new(key).operation(Operation::Write)
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    pub fn expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = expires_in;
        self
    }

    pub fn expires_in_secs(self, secs: u64) -> Self {
        self.expires_in(Duration::from_secs(secs))
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn credentials(mut self, credentials: R2Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Pin the signing time instead of using the current clock
    ///
    /// Signatures depend on the signing time, so pinning it makes the URL
    /// reproducible for identical inputs.
    pub fn issued_at(mut self, issued_at: SystemTime) -> Self {
        self.issued_at = Some(issued_at);
        self
    }

    /// Content type that will be bound into the signature
    ///
    /// Only uploads carry one, and only when it is non-empty.
    pub fn signed_content_type(&self) -> Option<&str> {
        match self.operation {
            Operation::Write => self
                .content_type
                .as_deref()
                .map(str::trim)
                .filter(|ct| !ct.is_empty()),
            Operation::Read => None,
        }
    }
}

/// A ready-to-use presigned URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresignedUrl {
    pub operation: Operation,
    pub method: String,
    pub url: String,
    /// Headers the HTTP client must send along with the URL
    pub headers: BTreeMap<String, String>,
    pub expires_in_secs: u64,
}

impl PresignedUrl {
    fn from_request(operation: Operation, request: PresignedRequest, expires_in_secs: u64) -> Self {
        Self {
            operation,
            method: request.method().to_string(),
            url: request.uri().to_string(),
            headers: request
                .headers()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                .collect(),
            expires_in_secs,
        }
    }
}

/// Generates presigned R2 URLs from a base configuration
#[derive(Debug, Clone, Default)]
pub struct Signer {
    config: Config,
}

impl Signer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Generate a presigned URL for one object
    ///
    /// Signing is computed locally; no request is sent to R2.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, the bucket name is invalid, a
    /// credential is missing, the expiration is out of range, or the SDK
    /// fails to presign the request.
    pub async fn sign(&self, request: &SignRequest) -> Result<PresignedUrl> {
        if request.key.trim().is_empty() {
            return Err(SignError::MissingObjectKey);
        }

        let bucket = request.bucket.as_deref().unwrap_or(&self.config.bucket);
        validate_bucket_name(bucket)?;

        let credentials = request
            .credentials
            .as_ref()
            .unwrap_or(&self.config.credentials);
        if let Some(field) = credentials.missing_field() {
            return Err(SignError::MissingCredential { field });
        }

        let expires_in_secs = request.expires_in.as_secs();
        if expires_in_secs == 0 || expires_in_secs > MAX_EXPIRATION_SECS {
            return Err(SignError::InvalidExpiration {
                secs: expires_in_secs,
            });
        }

        debug!(
            "Presigning {} for r2://{}/{} (expires in {}s)",
            request.operation, bucket, request.key, expires_in_secs
        );

        let mut presigning = PresigningConfig::builder().expires_in(request.expires_in);
        if let Some(issued_at) = request.issued_at {
            presigning = presigning.start_time(issued_at);
        }
        let presigning_config = presigning.build().map_err(SignError::presigning)?;

        let client = build_client(credentials);
        let presigned = match request.operation {
            Operation::Read => client
                .get_object()
                .bucket(bucket)
                .key(&request.key)
                .presigned(presigning_config)
                .await
                .map_err(SignError::presigning)?,
            Operation::Write => client
                .put_object()
                .bucket(bucket)
                .key(&request.key)
                .set_content_type(request.signed_content_type().map(str::to_string))
                .presigned(presigning_config)
                .await
                .map_err(SignError::presigning)?,
        };

        Ok(PresignedUrl::from_request(
            request.operation,
            presigned,
            expires_in_secs,
        ))
    }

    /// Generate a presigned URL, returning `None` on any failure
    ///
    /// The error is logged; callers only see whether a URL was produced.
    pub async fn presign_url(&self, request: &SignRequest) -> Option<String> {
        match self.sign(request).await {
            Ok(presigned) => Some(presigned.url),
            Err(e) => {
                error!("Error generating presigned URL for {}: {}", request.key, e);
                None
            }
        }
    }
}
