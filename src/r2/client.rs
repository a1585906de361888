use aws_config::Region;
use aws_sdk_s3::{
    Client,
    config::{Config, Credentials, RequestChecksumCalculation},
};

use crate::config::R2Credentials;

/// R2 ignores regions but SigV4 needs one in the credential scope
pub const R2_REGION: &str = "auto";

/// Build an S3 client pointed at the account's R2 endpoint
///
/// Uses static credentials, path-style addressing
/// (`https://{account}.r2.cloudflarestorage.com/{bucket}/{key}`) and SigV4 with
/// the `auto` region. Building the client does not touch the network.
pub fn build_client(credentials: &R2Credentials) -> Client {
    let static_credentials = Credentials::new(
        credentials.access_key_id.clone(),
        credentials.access_key_secret.clone(),
        None,
        None,
        "r2",
    );

    let config = Config::builder()
        .endpoint_url(credentials.endpoint_url())
        .region(Region::new(R2_REGION))
        .credentials_provider(static_credentials)
        .force_path_style(true)
        // R2 rejects the SDK's default checksum parameters on presigned uploads
        .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
        .behavior_version_latest()
        .build();

    Client::from_conf(config)
}
