use thiserror::Error;

/// Errors that can occur while presigning an R2 URL
#[derive(Error, Debug)]
pub enum SignError {
    /// No object key was given
    #[error("Object key cannot be empty")]
    MissingObjectKey,

    /// A credential value is empty
    #[error("Missing R2 credential: {field}")]
    MissingCredential { field: &'static str },

    /// Bucket name violates R2 naming rules
    #[error("Invalid bucket '{bucket}': {reason}")]
    InvalidBucket { bucket: String, reason: String },

    /// Expiration outside the range SigV4 accepts
    #[error("Invalid expiration: {secs} seconds (must be between 1 and {max})", max = super::presign::MAX_EXPIRATION_SECS)]
    InvalidExpiration { secs: u64 },

    /// AWS SDK presigning error wrapper
    #[error("Presigning failed: {0}")]
    Presigning(String),
}

impl SignError {
    /// Wrap any SDK error, keeping its full source chain in the message
    pub fn presigning<E: std::error::Error>(error: E) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Presigning(message)
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingObjectKey => "Object key cannot be empty\n\nPossible solutions:\n  \
                 1. Pass the object key as an argument: r2sign videos/clip1.mp4"
                .to_string(),
            Self::MissingCredential { field } => {
                let var = match *field {
                    "account_id" => "R2_ACCOUNT_ID",
                    "access_key_id" => "R2_ACCESS_KEY_ID",
                    _ => "R2_ACCESS_KEY_SECRET",
                };
                format!(
                    "Missing R2 credential: {}\n\nPossible solutions:\n  \
                     1. Set {} in your environment or .env file\n  \
                     2. Pass it on the command line: --{}",
                    field,
                    var,
                    field.replace('_', "-")
                )
            }
            Self::InvalidBucket { bucket, reason } => {
                format!(
                    "Invalid bucket '{}': {}\n\nPossible solutions:\n  \
                     1. Check R2_BUCKET_NAME in .env\n  \
                     2. Override it with --bucket",
                    bucket, reason
                )
            }
            Self::InvalidExpiration { secs } => {
                format!(
                    "Invalid expiration: {} seconds\n\nPossible solutions:\n  \
                     1. Use a value between 1 and {} seconds (7 days)",
                    secs,
                    super::presign::MAX_EXPIRATION_SECS
                )
            }
            Self::Presigning(_) => self.to_string(),
        }
    }
}

/// Result type for presigning operations
pub type Result<T> = std::result::Result<T, SignError>;
