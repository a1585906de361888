mod config;
mod r2;

use anyhow::Result;
use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use config::{Config, R2Credentials};
use r2::{
    DEFAULT_EXPIRATION_SECS, Operation, PresignedUrl, SignRequest, Signer, detect_content_type,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "r2sign",
    version = env!("CARGO_PKG_VERSION"),
    author = "Tyr Chen <tyr.chen@gmail.com>",
    about = "Generate presigned download/upload URLs for Cloudflare R2 objects",
    long_about = "Generates time-limited presigned URLs for objects in a Cloudflare R2 bucket. \
                  Signing happens locally, nothing is sent to R2. Configure via .env file with R2 credentials.",
    after_help = "Examples:\n  \
                  r2sign clip1.mp4                             # 1-hour download URL\n  \
                  r2sign clip1.mp4 -e 600                      # 10-minute download URL\n  \
                  r2sign uploads/clip1.mp4 -o write -t video/mp4  # Upload URL bound to a content type\n  \
                  r2sign uploads/clip1.mp4 -o write --detect-content-type\n  \
                  r2sign a.mp4 b.mp4 --json                    # JSON output, one object per key\n\n\
                  Configuration (.env):\n  \
                  R2_BUCKET_NAME=multitalk-videos\n  \
                  R2_ACCOUNT_ID=<account id>\n  \
                  R2_ACCESS_KEY_ID=<access key id>\n  \
                  R2_ACCESS_KEY_SECRET=<access key secret>"
)]
struct Cli {
    /// Object key(s) to sign
    #[arg(required = true)]
    keys: Vec<String>,

    /// Operation the URL allows: read (get_object) or write (put_object)
    #[arg(long, short = 'o', default_value = "read")]
    operation: Operation,

    /// URL expiration in seconds (max 604800 = 7 days)
    #[arg(long, short = 'e', default_value_t = DEFAULT_EXPIRATION_SECS)]
    expires: u64,

    /// Content-Type uploads must declare (write only)
    #[arg(long, short = 't')]
    content_type: Option<String>,

    /// Derive the Content-Type from each key's extension (write only)
    #[arg(long, conflicts_with = "content_type")]
    detect_content_type: bool,

    /// Bucket name (overrides R2_BUCKET_NAME)
    #[arg(long, short = 'b')]
    bucket: Option<String>,

    /// Cloudflare account ID (overrides R2_ACCOUNT_ID)
    #[arg(long)]
    account_id: Option<String>,

    /// R2 access key ID (overrides R2_ACCESS_KEY_ID)
    #[arg(long)]
    access_key_id: Option<String>,

    /// R2 access key secret (overrides R2_ACCESS_KEY_SECRET)
    #[arg(long)]
    access_key_secret: Option<String>,

    /// Load configuration from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Sign as of this Unix timestamp instead of now (reproducible URLs)
    #[arg(long, value_name = "UNIX_SECS")]
    issued_at: Option<u64>,

    /// Print each result as a JSON object
    #[arg(long, conflicts_with = "url_only")]
    json: bool,

    /// Print bare URLs only, one per line
    #[arg(long)]
    url_only: bool,
}

impl Cli {
    /// Credential overrides from the command line, merged over the config
    fn credential_overrides(&self, base: &R2Credentials) -> Option<R2Credentials> {
        if self.account_id.is_none()
            && self.access_key_id.is_none()
            && self.access_key_secret.is_none()
        {
            return None;
        }

        Some(R2Credentials {
            account_id: self
                .account_id
                .clone()
                .unwrap_or_else(|| base.account_id.clone()),
            access_key_id: self
                .access_key_id
                .clone()
                .unwrap_or_else(|| base.access_key_id.clone()),
            access_key_secret: self
                .access_key_secret
                .clone()
                .unwrap_or_else(|| base.access_key_secret.clone()),
        })
    }

    fn build_request(&self, key: &str, base: &R2Credentials) -> SignRequest {
        let mut request = match self.operation {
            Operation::Read => SignRequest::read(key),
            Operation::Write => SignRequest::write(key),
        }
        .expires_in_secs(self.expires);

        let content_type = if self.detect_content_type {
            detect_content_type(key).map(str::to_string)
        } else {
            self.content_type.clone()
        };
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }
        if let Some(bucket) = &self.bucket {
            request = request.bucket(bucket.clone());
        }
        if let Some(credentials) = self.credential_overrides(base) {
            request = request.credentials(credentials);
        }
        if let Some(secs) = self.issued_at {
            request = request.issued_at(SystemTime::UNIX_EPOCH + Duration::from_secs(secs));
        }

        request
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file early to get LOG_LEVEL
    dotenv::dotenv().ok();

    // Initialize tracing/logging with support for LOG_LEVEL from .env
    let log_level = std::env::var("LOG_LEVEL")
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.env_file {
        Some(path) => Config::from_env_file(path)?,
        None => Config::from_env(),
    };
    let signer = Signer::new(config);

    info!(
        "Signing {} key(s) for {} in bucket {}",
        cli.keys.len(),
        cli.operation,
        cli.bucket.as_deref().unwrap_or(&signer.config().bucket)
    );

    let mut failed = 0usize;
    for key in &cli.keys {
        match sign_key(&cli, &signer, key).await? {
            Some(output) => println!("{}", output),
            None => failed += 1,
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} key(s) could not be signed", failed, cli.keys.len());
    }

    Ok(())
}

/// Sign one key and render it in the selected output format
///
/// Returns `None` when the key could not be signed; the failure has already
/// been reported.
async fn sign_key(cli: &Cli, signer: &Signer, key: &str) -> Result<Option<String>> {
    let request = cli.build_request(key, &signer.config().credentials);

    if cli.url_only {
        // Failures are already logged by the signer
        return Ok(signer.presign_url(&request).await);
    }

    match signer.sign(&request).await {
        Ok(presigned) if cli.json => Ok(Some(serde_json::to_string(&presigned)?)),
        Ok(presigned) => Ok(Some(format_presigned(key, &presigned))),
        Err(e) => {
            error!("Failed to sign {}: {}", key, e);
            eprintln!(
                "{} {}\n\n{}",
                style("✗").red(),
                style(key).red(),
                e.user_message()
            );
            Ok(None)
        }
    }
}

/// Format a presigned URL with the headers its request must carry
fn format_presigned(key: &str, presigned: &PresignedUrl) -> String {
    let mut output = format!(
        "{} {} {}\n  {} {}",
        style("✓").green(),
        style(key).green(),
        style(format!(
            "({}, expires in {}s)",
            presigned.method, presigned.expires_in_secs
        ))
        .dim(),
        style("🔗").blue(),
        presigned.url
    );
    for (name, value) in &presigned.headers {
        output.push_str(&format!("\n  {} {}: {}", style("↳").dim(), name, value));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("r2sign").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["clip1.mp4"]);

        assert_eq!(cli.keys, vec!["clip1.mp4"]);
        assert_eq!(cli.operation, Operation::Read);
        assert_eq!(cli.expires, 3600);
        assert!(cli.content_type.is_none());
    }

    #[test]
    fn test_operation_aliases() {
        assert_eq!(parse(&["k", "-o", "put_object"]).operation, Operation::Write);
        assert_eq!(parse(&["k", "--operation", "get"]).operation, Operation::Read);
        assert!(Cli::try_parse_from(["r2sign", "k", "-o", "delete"]).is_err());
    }

    #[test]
    fn test_requires_key() {
        assert!(Cli::try_parse_from(["r2sign"]).is_err());
    }

    #[test]
    fn test_build_request_detects_content_type() {
        let cli = parse(&["a.mp4", "-o", "write", "--detect-content-type", "-e", "600"]);
        let request = cli.build_request("a.mp4", &R2Credentials::default());

        assert_eq!(request.operation, Operation::Write);
        assert_eq!(request.expires_in.as_secs(), 600);
        assert_eq!(request.signed_content_type(), Some("video/mp4"));
        assert!(request.credentials.is_none());
        assert!(request.bucket.is_none());
    }

    #[test]
    fn test_credential_overrides_merge_with_config() {
        let cli = parse(&["a.mp4", "--account-id", "def456", "-b", "other-bucket"]);
        let base = R2Credentials::new("abc123", "K", "S");
        let request = cli.build_request("a.mp4", &base);

        assert_eq!(request.bucket.as_deref(), Some("other-bucket"));
        assert_eq!(
            request.credentials,
            Some(R2Credentials::new("def456", "K", "S"))
        );
    }

    fn test_signer() -> Signer {
        Signer::new(Config {
            bucket: "multitalk-videos".to_string(),
            credentials: R2Credentials::new("abc123", "K", "S"),
        })
    }

    #[tokio::test]
    async fn test_url_only_output() {
        let cli = parse(&["clip1.mp4", "--url-only"]);

        let output = sign_key(&cli, &test_signer(), "clip1.mp4")
            .await
            .unwrap()
            .unwrap();

        assert!(output.starts_with("https://abc123.r2.cloudflarestorage.com/multitalk-videos/clip1.mp4?"));
        assert!(!output.contains('\n'));
    }

    #[tokio::test]
    async fn test_json_output() {
        let cli = parse(&["clip1.mp4", "-o", "write", "-t", "video/mp4", "--json"]);

        let output = sign_key(&cli, &test_signer(), "clip1.mp4")
            .await
            .unwrap()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(json["operation"], "write");
        assert_eq!(json["method"], "PUT");
        assert_eq!(json["headers"]["content-type"], "video/mp4");
        assert!(
            json["url"]
                .as_str()
                .unwrap()
                .starts_with("https://abc123.r2.cloudflarestorage.com/multitalk-videos/clip1.mp4?")
        );
    }

    #[tokio::test]
    async fn test_text_output_lists_headers() {
        let cli = parse(&["clip1.mp4", "-o", "write", "-t", "video/mp4"]);

        let output = sign_key(&cli, &test_signer(), "clip1.mp4")
            .await
            .unwrap()
            .unwrap();

        assert!(output.contains("https://abc123.r2.cloudflarestorage.com/multitalk-videos/clip1.mp4?"));
        assert!(output.contains("content-type: video/mp4"));
    }

    #[tokio::test]
    async fn test_failed_key_produces_no_output() {
        let signer = Signer::new(Config::default());

        let url_only = parse(&["clip1.mp4", "--url-only"]);
        assert!(sign_key(&url_only, &signer, "clip1.mp4").await.unwrap().is_none());

        let json = parse(&["clip1.mp4", "--json"]);
        assert!(sign_key(&json, &signer, "clip1.mp4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_issued_at_makes_urls_reproducible() {
        let cli = parse(&["clip1.mp4", "--url-only", "--issued-at", "1760000000"]);
        let signer = test_signer();

        let first = sign_key(&cli, &signer, "clip1.mp4").await.unwrap().unwrap();
        let second = sign_key(&cli, &signer, "clip1.mp4").await.unwrap().unwrap();

        assert_eq!(first, second);
        assert!(first.contains("X-Amz-Date=20251009T"));
    }

    #[test]
    fn test_url_only_conflicts_with_json() {
        assert!(Cli::try_parse_from(["r2sign", "k", "--json", "--url-only"]).is_err());
    }
}
