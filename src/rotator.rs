//! Single-entry rotation protocol.
//!
//! The rotator replaces one item's credential in four steps: create the new
//! key, bind it to the item's usage plan, persist it to the registry with a
//! conditional update, then revoke the superseded key. The ordering is the
//! safety property: a record never points at a revoked key, and callers
//! reading the registry at any instant see a valid credential.

use crate::retry::{with_retries, RetryPolicy};
use crate::{
    Issuer, RecordUpdate, Registry, Result, RotationRequest, Revocation, UpdateOutcome,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a rotation stood down without changing anything durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The registry no longer holds the expected key id: a concurrent sweep
    /// or a retried job already rotated this item.
    AlreadyRotated,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRotated => write!(f, "already rotated"),
        }
    }
}

/// Typed outcome of one rotation attempt.
///
/// Callers assert on this instead of parsing logs. `Failed` covers
/// infrastructure errors after retries were exhausted; the entry is picked
/// up again by the next sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// The registry record now points at a fresh credential and the old one
    /// was scheduled for revocation.
    Rotated {
        /// Issuer-side id of the replacement key.
        new_key_id: String,
    },
    /// Nothing durable changed; another rotation already won.
    Skipped(SkipReason),
    /// The rotation did not complete; safe to retry on the next sweep.
    Failed {
        /// Human-readable cause, for the sweep report and logs.
        reason: String,
    },
}

/// Executes the rotation protocol against a registry and an issuer.
///
/// Both collaborators are injected as capability interfaces, so tests can
/// substitute the mock implementations. The rotator holds no mutable state;
/// one instance may serve many concurrent rotations.
///
/// # Example
///
/// ```
/// use keysweep::backends::mock::{MockIssuer, MockRegistry};
/// use keysweep::{KeyRecord, Registry, Rotator};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> keysweep::Result<()> {
/// let registry = Arc::new(MockRegistry::new());
/// let issuer = Arc::new(MockIssuer::new());
/// registry.set_record(KeyRecord::new("item-1", "key-1", "secret", "plan-1")).await;
/// issuer.seed_key("key-1", "plan-1").await;
///
/// let rotator = Rotator::new(registry, issuer);
/// let record = rotator.registry().scan_all().await?.remove(0);
/// let outcome = rotator.rotate(record.rotation_request()).await?;
/// # let _ = outcome;
/// # Ok(())
/// # }
/// ```
pub struct Rotator {
    registry: Arc<dyn Registry>,
    issuer: Arc<dyn Issuer>,
    retry: RetryPolicy,
}

impl Rotator {
    /// Creates a rotator with the default retry policy.
    pub fn new(registry: Arc<dyn Registry>, issuer: Arc<dyn Issuer>) -> Self {
        Self {
            registry,
            issuer,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy applied to every network call.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The registry this rotator writes to.
    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    /// Rotates one entry.
    ///
    /// # Errors
    ///
    /// `Err` is returned only for validation failures: a malformed request
    /// is a hard error for that entry and is never retried. Every
    /// infrastructure failure resolves to `Ok(RotationOutcome::Failed)` so a
    /// sweep can aggregate outcomes without special cases.
    ///
    /// Calling `rotate` twice with the same request is safe: the second call
    /// resolves to `Skipped` once the first has persisted, or performs an
    /// independent attempt if the first never reached the registry.
    pub async fn rotate(&self, request: RotationRequest) -> Result<RotationOutcome> {
        request.validate()?;

        debug!(
            item = %request.item_id,
            expected_key = %request.external_key_id,
            "starting rotation"
        );

        // Step 1: mint the replacement. Nothing is committed yet, so a
        // failure here leaves the record untouched and retryable.
        let new_key = match with_retries(&self.retry, "create_key", || self.issuer.create_key())
            .await
        {
            Ok(key) => key,
            Err(err) => {
                debug!(item = %request.item_id, error = %err, "create failed");
                return Ok(RotationOutcome::Failed {
                    reason: format!("create_key: {}", err),
                });
            }
        };

        // Step 2: bind to the usage plan before any caller can see the key.
        if let Err(err) = with_retries(&self.retry, "bind_usage_plan", || {
            self.issuer
                .bind_usage_plan(&new_key.key_id, &request.usage_plan_id)
        })
        .await
        {
            debug!(item = %request.item_id, error = %err, "bind failed");
            self.revoke_orphan(&new_key.key_id).await;
            return Ok(RotationOutcome::Failed {
                reason: format!("bind_usage_plan: {}", err),
            });
        }

        // Step 3: persist, conditioned on the expected key still being
        // current. This is the single-writer-wins point.
        let update = RecordUpdate::replacing(
            &request.item_id,
            &request.external_key_id,
            &new_key.key_id,
            &new_key.key_value,
            Utc::now(),
        );

        match with_retries(&self.retry, "conditional_update", || {
            self.registry.conditional_update(update.clone())
        })
        .await
        {
            Ok(UpdateOutcome::Applied) => {
                info!(
                    item = %request.item_id,
                    old_key = %request.external_key_id,
                    new_key = %new_key.key_id,
                    "record updated"
                );
            }
            Ok(UpdateOutcome::Conflict) => {
                debug!(
                    item = %request.item_id,
                    expected_key = %request.external_key_id,
                    "conditional update lost to a concurrent rotation"
                );
                self.revoke_orphan(&new_key.key_id).await;
                return Ok(RotationOutcome::Skipped(SkipReason::AlreadyRotated));
            }
            Err(err) => {
                // The record still holds the expected key, so the caller may
                // retry from scratch. The new key never became current.
                warn!(
                    item = %request.item_id,
                    orphaned_key = %new_key.key_id,
                    error = %err,
                    "registry update failed; orphaned key awaits reconciliation"
                );
                return Ok(RotationOutcome::Failed {
                    reason: format!("conditional_update: {}", err),
                });
            }
        }

        // Step 4: the old key is superseded and no record points at it.
        // Revocation failure leaves a harmless orphan and never flips the
        // outcome.
        match with_retries(&self.retry, "revoke_key", || {
            self.issuer.revoke_key(&request.external_key_id)
        })
        .await
        {
            Ok(Revocation::Revoked) => {
                debug!(item = %request.item_id, key = %request.external_key_id, "old key revoked");
            }
            Ok(Revocation::AlreadyAbsent) => {
                debug!(
                    item = %request.item_id,
                    key = %request.external_key_id,
                    "old key already absent"
                );
            }
            Err(err) => {
                warn!(
                    item = %request.item_id,
                    orphaned_key = %request.external_key_id,
                    error = %err,
                    "failed to revoke superseded key; orphaned key awaits reconciliation"
                );
            }
        }

        Ok(RotationOutcome::Rotated {
            new_key_id: new_key.key_id,
        })
    }

    /// Best-effort revocation of a key that never became current.
    async fn revoke_orphan(&self, key_id: &str) {
        match with_retries(&self.retry, "revoke_key", || self.issuer.revoke_key(key_id)).await {
            Ok(_) => debug!(key = %key_id, "revoked orphaned key"),
            Err(err) => {
                warn!(
                    orphaned_key = %key_id,
                    error = %err,
                    "orphaned key awaits reconciliation"
                );
            }
        }
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::backends::mock::{MockIssuer, MockRegistry};
    use crate::{KeyRecord, KeysweepError};

    fn fixture() -> (Arc<MockRegistry>, Arc<MockIssuer>, Rotator) {
        let registry = Arc::new(MockRegistry::new());
        let issuer = Arc::new(MockIssuer::new());
        let rotator = Rotator::new(registry.clone(), issuer.clone())
            .with_retry_policy(RetryPolicy::no_retries());
        (registry, issuer, rotator)
    }

    async fn seed(registry: &MockRegistry, issuer: &MockIssuer) -> RotationRequest {
        let record = KeyRecord::new("item-1", "key-1", "secret-1", "plan-1");
        issuer.seed_key("key-1", "plan-1").await;
        registry.set_record(record.clone()).await;
        record.rotation_request()
    }

    #[tokio::test]
    async fn test_rotate_happy_path() {
        let (registry, issuer, rotator) = fixture();
        let request = seed(&registry, &issuer).await;

        let outcome = rotator.rotate(request).await.unwrap();

        let new_key_id = match outcome {
            RotationOutcome::Rotated { new_key_id } => new_key_id,
            other => panic!("expected Rotated, got {:?}", other),
        };

        let record = registry.get_record("item-1").await.unwrap();
        assert_eq!(record.external_key_id, new_key_id);
        assert_eq!(issuer.binding_of(&new_key_id).await.as_deref(), Some("plan-1"));
        assert!(!issuer.is_revoked(&new_key_id).await);
        assert!(issuer.is_revoked("key-1").await);
    }

    #[tokio::test]
    async fn test_rotate_conflict_skips_and_cleans_up() {
        let (registry, issuer, rotator) = fixture();
        let request = seed(&registry, &issuer).await;

        // Another rotation already replaced key-1.
        let first = rotator.rotate(request.clone()).await.unwrap();
        let winner = match first {
            RotationOutcome::Rotated { new_key_id } => new_key_id,
            other => panic!("expected Rotated, got {:?}", other),
        };

        // Retried dispatch with the original expected key.
        let second = rotator.rotate(request).await.unwrap();
        assert_eq!(
            second,
            RotationOutcome::Skipped(SkipReason::AlreadyRotated)
        );

        // The winner's record is preserved and its key untouched.
        let record = registry.get_record("item-1").await.unwrap();
        assert_eq!(record.external_key_id, winner);
        assert!(!issuer.is_revoked(&winner).await);

        // The loser's fresh key was revoked, not leaked.
        let live = issuer.live_keys().await;
        assert_eq!(live, vec![winner]);
    }

    #[tokio::test]
    async fn test_create_failure_leaves_record_unchanged() {
        let (registry, issuer, rotator) = fixture();
        let request = seed(&registry, &issuer).await;
        let before = registry.get_record("item-1").await.unwrap();

        issuer
            .set_create_error(KeysweepError::Unavailable("issuer down".to_string()))
            .await;

        let outcome = rotator.rotate(request).await.unwrap();

        assert!(matches!(outcome, RotationOutcome::Failed { .. }));
        assert_eq!(registry.get_record("item-1").await.unwrap(), before);
        assert_eq!(issuer.live_keys().await, vec!["key-1".to_string()]);
    }

    #[tokio::test]
    async fn test_bind_failure_fails_and_revokes_fresh_key() {
        let (registry, issuer, rotator) = fixture();
        let request = seed(&registry, &issuer).await;
        let before = registry.get_record("item-1").await.unwrap();

        issuer
            .set_bind_error(KeysweepError::Throttled("slow down".to_string()))
            .await;

        let outcome = rotator.rotate(request).await.unwrap();

        assert!(matches!(outcome, RotationOutcome::Failed { .. }));
        assert_eq!(registry.get_record("item-1").await.unwrap(), before);
        // Only the original key is live; the aborted key was cleaned up.
        assert_eq!(issuer.live_keys().await, vec!["key-1".to_string()]);
    }

    #[tokio::test]
    async fn test_registry_failure_fails_and_orphans_new_key() {
        let (registry, issuer, rotator) = fixture();
        let request = seed(&registry, &issuer).await;
        let before = registry.get_record("item-1").await.unwrap();

        registry
            .set_update_error(KeysweepError::Unavailable("store down".to_string()))
            .await;

        let outcome = rotator.rotate(request.clone()).await.unwrap();
        assert!(matches!(outcome, RotationOutcome::Failed { .. }));

        // Record still holds the expected key, so a retry is safe.
        assert_eq!(registry.get_record("item-1").await.unwrap(), before);

        // Store recovers; the retried rotation completes independently.
        registry.clear_update_error().await;
        let outcome = rotator.rotate(request).await.unwrap();
        assert!(matches!(outcome, RotationOutcome::Rotated { .. }));
    }

    #[tokio::test]
    async fn test_revoke_failure_still_rotated() {
        let (registry, issuer, rotator) = fixture();
        let request = seed(&registry, &issuer).await;

        issuer
            .set_revoke_error(KeysweepError::Unavailable("issuer down".to_string()))
            .await;

        let outcome = rotator.rotate(request).await.unwrap();

        let new_key_id = match outcome {
            RotationOutcome::Rotated { new_key_id } => new_key_id,
            other => panic!("expected Rotated, got {:?}", other),
        };

        // Old key could not be revoked but the record moved on.
        let record = registry.get_record("item-1").await.unwrap();
        assert_eq!(record.external_key_id, new_key_id);
        assert!(!issuer.is_revoked("key-1").await);
    }

    #[tokio::test]
    async fn test_revoke_already_absent_is_success() {
        let (registry, issuer, rotator) = fixture();
        let request = seed(&registry, &issuer).await;

        // The old key vanished at the issuer (e.g. an earlier retry revoked
        // it after the record had already moved on, then was rolled back by
        // an operator). Rotation still succeeds.
        issuer.drop_key("key-1").await;

        let outcome = rotator.rotate(request).await.unwrap();
        assert!(matches!(outcome, RotationOutcome::Rotated { .. }));
    }

    #[tokio::test]
    async fn test_validation_error_is_hard_error() {
        let (_registry, _issuer, rotator) = fixture();

        let request = RotationRequest {
            item_id: "item-1".to_string(),
            external_key_id: String::new(),
            usage_plan_id: "plan-1".to_string(),
        };

        let result = rotator.rotate(request).await;
        assert!(matches!(result, Err(KeysweepError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_idempotent_rerun_changes_registry_once() {
        let (registry, issuer, rotator) = fixture();
        let request = seed(&registry, &issuer).await;

        let first = rotator.rotate(request.clone()).await.unwrap();
        let second = rotator.rotate(request).await.unwrap();

        assert!(matches!(first, RotationOutcome::Rotated { .. }));
        assert_eq!(second, RotationOutcome::Skipped(SkipReason::AlreadyRotated));

        // Exactly one live, bound credential remains.
        let record = registry.get_record("item-1").await.unwrap();
        let live = issuer.live_keys().await;
        assert_eq!(live, vec![record.external_key_id.clone()]);
        assert_eq!(
            issuer.binding_of(&record.external_key_id).await.as_deref(),
            Some("plan-1")
        );
    }

    #[tokio::test]
    async fn test_concurrent_rotations_one_winner() {
        let (registry, issuer, rotator) = fixture();
        let request = seed(&registry, &issuer).await;

        let (a, b) = tokio::join!(
            rotator.rotate(request.clone()),
            rotator.rotate(request.clone())
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let rotated = [&a, &b]
            .iter()
            .filter(|o| matches!(o, RotationOutcome::Rotated { .. }))
            .count();
        let skipped = [&a, &b]
            .iter()
            .filter(|o| matches!(o, RotationOutcome::Skipped(_)))
            .count();

        assert_eq!(rotated, 1, "exactly one rotation must win: {:?} / {:?}", a, b);
        assert_eq!(skipped, 1);

        // No duplicate current credentials, old key revoked, loser revoked.
        let record = registry.get_record("item-1").await.unwrap();
        assert_eq!(issuer.live_keys().await, vec![record.external_key_id]);
        assert!(issuer.is_revoked("key-1").await);
    }
}
