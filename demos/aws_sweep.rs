//! One sweep against DynamoDB and API Gateway.
//!
//! Requires AWS credentials in the environment and an existing registry
//! table. Point `endpoint` at LocalStack to try it without a real account.
//!
//! Run with:
//!   KEYSWEEP_TABLE=api-key-registry AWS_REGION=us-east-1 \
//!     cargo run --example aws_sweep --features aws

use keysweep::{factory, BackendType, Config};

#[tokio::main]
async fn main() -> keysweep::Result<()> {
    tracing_subscriber::fmt::init();

    let table =
        std::env::var("KEYSWEEP_TABLE").unwrap_or_else(|_| "api-key-registry".to_string());
    let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());

    let mut config = Config::new(BackendType::Aws)
        .with_table(table)
        .with_option("region", region)
        .with_sweep_concurrency(4);

    if let Ok(endpoint) = std::env::var("LOCALSTACK_ENDPOINT") {
        config = config.with_option("endpoint", endpoint);
    }

    let sweeper = factory::sweeper(&config).await?;
    let report = sweeper.sweep(config.stale_threshold).await?;

    println!("sweep report: {}", report);
    Ok(())
}
