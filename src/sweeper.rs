//! Periodic stale-credential sweep.
//!
//! A sweep is one scan-filter-dispatch cycle: scan the registry, keep the
//! records past the staleness threshold, and run the rotation protocol for
//! each of them, aggregating per-entry outcomes into a [`SweepReport`]. One
//! entry's failure never aborts the rest of the batch.

use crate::rotator::{RotationOutcome, Rotator};
use crate::{KeyRecord, Registry, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Aggregated counts from one sweep.
///
/// `rotated + skipped + failed == stale`, and `stale <= scanned`. A failed
/// entry is simply picked up again by the next sweep; the report never hides
/// it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records returned by the scan.
    pub scanned: usize,
    /// Records past the staleness threshold at scan time.
    pub stale: usize,
    /// Entries whose credential was replaced.
    pub rotated: usize,
    /// Entries skipped because another rotation already won.
    pub skipped: usize,
    /// Entries that failed and wait for the next sweep.
    pub failed: usize,
}

impl std::fmt::Display for SweepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scanned {}, stale {}, rotated {}, skipped {}, failed {}",
            self.scanned, self.stale, self.rotated, self.skipped, self.failed
        )
    }
}

/// Scans the registry and dispatches rotations for stale entries.
///
/// Rotations for distinct items are independent, so the sweep fans them out
/// with bounded concurrency. Correctness does not depend on the parallelism:
/// the registry's conditional update arbitrates racing rotations, including
/// overlap with a slow previous sweep.
///
/// # Example
///
/// ```no_run
/// use keysweep::{BackendType, Config, factory};
///
/// #[tokio::main]
/// async fn main() -> keysweep::Result<()> {
///     let config = Config::new(BackendType::Mock);
///     let threshold = config.stale_threshold;
///     let sweeper = factory::sweeper(&config).await?;
///
///     let report = sweeper.sweep(threshold).await?;
///     println!("sweep complete: {}", report);
///     Ok(())
/// }
/// ```
pub struct Sweeper {
    registry: Arc<dyn Registry>,
    rotator: Rotator,
    concurrency: usize,
}

impl Sweeper {
    /// Creates a sweeper dispatching through `rotator`.
    ///
    /// `registry` is the store to scan; it should be the same store the
    /// rotator updates.
    pub fn new(registry: Arc<dyn Registry>, rotator: Rotator) -> Self {
        Self {
            registry,
            rotator,
            concurrency: 4,
        }
    }

    /// Sets the maximum number of rotations run in parallel (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Runs one sweep with the given staleness threshold.
    ///
    /// # Errors
    ///
    /// Returns an error only if the scan itself fails; that is a sweep-level
    /// failure for the trigger to retry on its next invocation. Per-entry
    /// failures are folded into the report instead.
    pub async fn sweep(&self, stale_threshold: Duration) -> Result<SweepReport> {
        let records = self.registry.scan_all().await?;
        let scanned = records.len();
        let now = Utc::now();

        for record in &records {
            debug!(
                item = %record.item_id,
                last_rotated_at = %record.last_rotated_at,
                "scanned record"
            );
        }

        let stale: Vec<KeyRecord> = records
            .into_iter()
            .filter(|record| record.is_stale(now, stale_threshold))
            .collect();

        let mut report = SweepReport {
            scanned,
            stale: stale.len(),
            ..Default::default()
        };

        if stale.is_empty() {
            info!(%report, "sweep complete; no stale records");
            return Ok(report);
        }

        debug!(stale = stale.len(), "dispatching rotations");

        let rotator = &self.rotator;
        let outcomes: Vec<RotationOutcome> = stream::iter(stale)
            .map(|record| async move {
                match rotator.rotate(record.rotation_request()).await {
                    Ok(outcome) => outcome,
                    // A validation failure is a hard error for this entry
                    // only; the batch keeps going.
                    Err(err) => {
                        warn!(item = %record.item_id, error = %err, "rotation rejected");
                        RotationOutcome::Failed {
                            reason: err.to_string(),
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in &outcomes {
            match outcome {
                RotationOutcome::Rotated { .. } => report.rotated += 1,
                RotationOutcome::Skipped(_) => report.skipped += 1,
                RotationOutcome::Failed { .. } => report.failed += 1,
            }
        }

        info!(%report, "sweep complete");
        Ok(report)
    }
}
