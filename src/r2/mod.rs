pub mod client;
pub mod error;
pub mod helpers;
pub mod presign;

pub use error::SignError;
pub use helpers::detect_content_type;
pub use presign::{DEFAULT_EXPIRATION_SECS, Operation, PresignedUrl, SignRequest, Signer};
