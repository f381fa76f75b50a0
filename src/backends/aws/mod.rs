//! AWS backend: DynamoDB registry and API Gateway issuer.
//!
//! Integrates with DynamoDB and API Gateway using the official AWS SDK.
//!
//! # Requirements
//!
//! - AWS credentials configured via:
//!   - Environment variables (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`)
//!   - Shared credentials file (`~/.aws/credentials`)
//!   - IAM instance role (for EC2/ECS/Lambda)
//!
//! # Features
//!
//! - Native SDK integration (no CLI)
//! - Automatic credential refresh
//! - Conditional writes for conflict-safe rotation
//! - Custom endpoint support (for LocalStack testing)
//!
//! # Example
//!
//! ```no_run
//! use keysweep::{BackendType, Config, factory};
//!
//! #[tokio::main]
//! async fn main() -> keysweep::Result<()> {
//!     let config = Config::new(BackendType::Aws)
//!         .with_table("api-key-registry")
//!         .with_option("region", "us-west-2");
//!
//!     let sweeper = factory::sweeper(&config).await?;
//!     let report = sweeper.sweep(config.stale_threshold).await?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

mod apigateway;
mod dynamodb;

pub use apigateway::ApiGatewayIssuer;
pub use dynamodb::DynamoRegistry;

use crate::{Config, KeysweepError};
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};

/// Loads the shared AWS SDK configuration, honoring the `region` and
/// `endpoint` options (the latter for LocalStack-style testing).
pub(crate) async fn sdk_config(config: &Config) -> aws_config::SdkConfig {
    let region = config
        .get_option("region")
        .cloned()
        .unwrap_or_else(|| "us-east-1".to_string());

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region));

    if let Some(endpoint) = config.get_option("endpoint") {
        loader = loader.endpoint_url(endpoint);
    }

    loader.load().await
}

/// Maps an SDK error onto the crate's transient/permanent taxonomy.
///
/// Throttling and fault codes become retryable [`KeysweepError`] variants;
/// anything unrecognized is preserved as a non-transient error with its
/// full source chain.
pub(crate) fn classify<E>(operation: &str, err: SdkError<E>) -> KeysweepError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::TimeoutError(_) => {
            return KeysweepError::Timeout(format!("{}: request timed out", operation));
        }
        SdkError::DispatchFailure(_) => {
            return KeysweepError::Unavailable(format!("{}: connection failure", operation));
        }
        _ => {}
    }

    let code = err.code().unwrap_or_default();
    let message = err.message().unwrap_or("no message").to_string();
    match code {
        "ThrottlingException"
        | "TooManyRequestsException"
        | "ProvisionedThroughputExceededException"
        | "RequestLimitExceeded" => {
            KeysweepError::Throttled(format!("{}: {}: {}", operation, code, message))
        }
        "ServiceUnavailable" | "ServiceUnavailableException" | "InternalServerError"
        | "InternalFailure" => {
            KeysweepError::Unavailable(format!("{}: {}: {}", operation, code, message))
        }
        _ => KeysweepError::Other(anyhow::Error::new(err).context(operation.to_string())),
    }
}
