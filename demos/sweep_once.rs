//! One sweep over a seeded mock registry.
//!
//! Demonstrates the full pipeline: a registry with a mix of stale and fresh
//! records, one scan-filter-dispatch cycle, and the per-entry outcomes
//! aggregated into a report.
//!
//! Run with: cargo run --example sweep_once

use chrono::{Duration, Utc};
use keysweep::backends::mock::{MockIssuer, MockRegistry};
use keysweep::{KeyRecord, Registry, Rotator, Sweeper};
use std::sync::Arc;

#[tokio::main]
async fn main() -> keysweep::Result<()> {
    tracing_subscriber::fmt::init();

    let registry = Arc::new(MockRegistry::new());
    let issuer = Arc::new(MockIssuer::new());

    // Seed three lineages: two past the 30-day threshold, one fresh.
    for (item, key, age_days) in [
        ("billing-api", "key-billing", 45),
        ("partner-api", "key-partner", 31),
        ("internal-api", "key-internal", 3),
    ] {
        let mut record = KeyRecord::new(item, key, "secret", "standard-plan");
        record.last_rotated_at = Utc::now() - Duration::days(age_days);
        issuer.seed_key(key, "standard-plan").await;
        registry.set_record(record).await;
    }

    let rotator = Rotator::new(registry.clone(), issuer.clone());
    let sweeper = Sweeper::new(registry.clone(), rotator).with_concurrency(2);

    let threshold = std::time::Duration::from_secs(30 * 24 * 60 * 60);
    let report = sweeper.sweep(threshold).await?;

    println!("\nsweep report: {}\n", report);

    for record in registry.scan_all().await? {
        println!(
            "  {:<14} -> {} (rotated at {})",
            record.item_id,
            record.external_key_id,
            record.last_rotated_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }

    for key in ["key-billing", "key-partner", "key-internal"] {
        if issuer.is_revoked(key).await {
            println!("  revoked: {}", key);
        }
    }

    Ok(())
}
