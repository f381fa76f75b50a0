//! Registry record and rotation request data structures.

use crate::validation::validate_field;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A registry record tracking one credential lineage.
///
/// Exactly one record exists per `item_id`. The record always points at the
/// currently valid credential: `external_key_id` and `key_value` refer to a
/// key that is bound to `usage_plan_id` at the issuer and not yet revoked.
/// Only the rotator mutates a record, and only through the registry's
/// conditional update.
///
/// Field names are serialized using the registry's wire names so that
/// records round-trip against tables written by administrative tooling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyRecord {
    /// Opaque unique identifier; immutable primary key.
    #[serde(rename = "itemID")]
    pub item_id: String,

    /// Identifier of the currently active key at the issuer.
    #[serde(rename = "externalKeyID")]
    pub external_key_id: String,

    /// Current secret material (opaque string).
    #[serde(rename = "keyValue")]
    pub key_value: String,

    /// Usage plan this lineage is bound to; immutable for the life of the item.
    #[serde(rename = "usagePlanID")]
    pub usage_plan_id: String,

    /// Timestamp of the last successful rotation (or creation).
    #[serde(rename = "lastRotatedAt")]
    pub last_rotated_at: DateTime<Utc>,
}

impl KeyRecord {
    /// Creates a record with `last_rotated_at` set to now.
    ///
    /// Records are normally created out-of-band by provisioning; this
    /// constructor exists for seeding and tests.
    pub fn new(
        item_id: impl Into<String>,
        external_key_id: impl Into<String>,
        key_value: impl Into<String>,
        usage_plan_id: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            external_key_id: external_key_id.into(),
            key_value: key_value.into(),
            usage_plan_id: usage_plan_id.into(),
            last_rotated_at: Utc::now(),
        }
    }

    /// Age of the current credential relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_rotated_at
    }

    /// Whether the credential is past the staleness threshold at `now`.
    ///
    /// The comparison is inclusive: a credential whose age equals the
    /// threshold is stale.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: std::time::Duration) -> bool {
        match Duration::from_std(threshold) {
            Ok(t) => self.age(now) >= t,
            // Threshold too large to represent; nothing is ever that old.
            Err(_) => false,
        }
    }

    /// Rotation request targeting this record's current key.
    pub fn rotation_request(&self) -> RotationRequest {
        RotationRequest {
            item_id: self.item_id.clone(),
            external_key_id: self.external_key_id.clone(),
            usage_plan_id: self.usage_plan_id.clone(),
        }
    }
}

/// Dispatch message from the sweeper to the rotator.
///
/// Carries exactly the fields needed to rotate one entry. The struct is
/// serde-serializable so the dispatch channel can be an out-of-process
/// invocation as well as an in-process call; the field set and meaning are
/// fixed either way.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RotationRequest {
    /// Registry primary key of the record to rotate.
    #[serde(rename = "itemID")]
    pub item_id: String,

    /// The key id the caller observed as current; the registry update is
    /// conditioned on it still being current.
    #[serde(rename = "externalKeyID")]
    pub external_key_id: String,

    /// Usage plan to bind the replacement key to.
    #[serde(rename = "usagePlanID")]
    pub usage_plan_id: String,
}

impl RotationRequest {
    /// Validates that all required fields are present and well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`KeysweepError::InvalidRequest`] if any field is empty,
    /// oversized, or contains control characters. Validation failures are
    /// hard errors: they are never retried.
    pub fn validate(&self) -> Result<()> {
        validate_field("itemID", &self.item_id)?;
        validate_field("externalKeyID", &self.external_key_id)?;
        validate_field("usagePlanID", &self.usage_plan_id)?;
        Ok(())
    }
}
