//! Registry trait definition for credential record stores.
//!
//! This module defines the [`Registry`] trait that record store
//! implementations must satisfy. The registry is the single source of truth
//! for which credential is current per item, and its conditional update is
//! the only coordination primitive the rotation protocol relies on.

use crate::{KeyRecord, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Outcome of a conditional registry update.
///
/// A conflict is a normal signal, not an error: it means another rotation
/// already replaced the expected key, and the caller should stand down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The stored key id matched the expected value and the record was
    /// replaced durably.
    Applied,
    /// The stored key id no longer matches; the record was left untouched.
    Conflict,
}

/// Fields written by a successful rotation.
///
/// The update replaces the record's key id, key value, and rotation
/// timestamp in one write, conditioned on `expected_key_id` still being the
/// stored key id. `item_id` and the usage plan binding never change.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    /// Primary key of the record to update.
    pub item_id: String,
    /// Key id the record must still hold for the update to apply.
    pub expected_key_id: String,
    /// Replacement key id.
    pub new_key_id: String,
    /// Replacement secret material.
    pub new_key_value: String,
    /// New `lastRotatedAt` value.
    pub rotated_at: DateTime<Utc>,
}

impl RecordUpdate {
    /// Builds an update replacing `expected_key_id` with a freshly issued key,
    /// stamped at `rotated_at`.
    pub fn replacing(
        item_id: impl Into<String>,
        expected_key_id: impl Into<String>,
        new_key_id: impl Into<String>,
        new_key_value: impl Into<String>,
        rotated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            expected_key_id: expected_key_id.into(),
            new_key_id: new_key_id.into(),
            new_key_value: new_key_value.into(),
            rotated_at,
        }
    }
}

/// Registry represents a durable store of [`KeyRecord`]s.
///
/// All implementations must be `Send + Sync` to support concurrent access
/// across async tasks.
///
/// # Implementations
///
/// - **SDK-based**: DynamoDB (`aws` feature)
/// - **Testing**: Mock registry with error injection (`mock` feature)
#[async_trait]
pub trait Registry: Send + Sync {
    /// Returns the registry name (e.g., "dynamodb", "mock").
    fn name(&self) -> &str;

    /// Returns every record in the registry.
    ///
    /// No ordering guarantee. The result is a finite snapshot that may be
    /// stale by the time processing completes; that is acceptable because a
    /// record rotated after the scan fails the rotator's conditional update
    /// rather than being double-rotated.
    ///
    /// # Errors
    ///
    /// Returns a transient error ([`KeysweepError::Unavailable`](crate::KeysweepError::Unavailable),
    /// [`KeysweepError::Throttled`](crate::KeysweepError::Throttled)) if the
    /// store cannot be reached. A scan failure aborts the whole sweep.
    async fn scan_all(&self) -> Result<Vec<KeyRecord>>;

    /// Applies `update` only if the stored key id still equals
    /// `update.expected_key_id`.
    ///
    /// Returns [`UpdateOutcome::Conflict`] when the condition does not hold;
    /// the record is left untouched in that case.
    ///
    /// # Errors
    ///
    /// - [`KeysweepError::RecordNotFound`](crate::KeysweepError::RecordNotFound):
    ///   no record exists for `update.item_id` (records are never deleted by
    ///   the rotation core, so this indicates administrative interference)
    /// - Transient store errors, safe to retry: the conditional check makes
    ///   a retried update idempotent
    async fn conditional_update(&self, update: RecordUpdate) -> Result<UpdateOutcome>;
}
