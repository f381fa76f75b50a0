//! Issuer trait definition for credential-issuing services.
//!
//! This module defines the [`Issuer`] trait that credential service
//! implementations must satisfy: creating a key, binding it to a usage plan,
//! and revoking a key by identifier.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A freshly issued credential: identifier plus secret material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuedKey {
    /// Issuer-side identifier of the key.
    pub key_id: String,
    /// Secret material presented by callers.
    pub key_value: String,
}

/// Outcome of a revocation.
///
/// Revoking a key that no longer exists is the expected result of a retried
/// rotation, so it is reported as a distinct success rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revocation {
    /// The key existed and was revoked.
    Revoked,
    /// The key was already gone.
    AlreadyAbsent,
}

/// Issuer represents an external service that mints and revokes credentials.
///
/// All implementations must be `Send + Sync` to support concurrent access
/// across async tasks.
///
/// # Implementations
///
/// - **SDK-based**: API Gateway API keys (`aws` feature)
/// - **Testing**: Mock issuer with error injection (`mock` feature)
#[async_trait]
pub trait Issuer: Send + Sync {
    /// Returns the issuer name (e.g., "apigateway", "mock").
    fn name(&self) -> &str;

    /// Creates a new credential.
    ///
    /// The key is live at the issuer after this call but not yet bound to
    /// any usage plan and not yet recorded anywhere. A key created here that
    /// never reaches the registry is an orphan, eligible for best-effort
    /// cleanup.
    ///
    /// # Errors
    ///
    /// Transient errors (throttling, unavailability) are safe to retry:
    /// nothing has been committed yet.
    async fn create_key(&self) -> Result<IssuedKey>;

    /// Binds `key_id` to `usage_plan_id`.
    ///
    /// # Errors
    ///
    /// Transient errors are safe to retry; binding an already-bound key is
    /// implementation-defined but must not produce a second binding.
    async fn bind_usage_plan(&self, key_id: &str, usage_plan_id: &str) -> Result<()>;

    /// Revokes `key_id`.
    ///
    /// Returns [`Revocation::AlreadyAbsent`] when the key does not exist;
    /// that is a success, not an error.
    ///
    /// # Errors
    ///
    /// Transient errors are safe to retry by the absent-is-success rule.
    async fn revoke_key(&self, key_id: &str) -> Result<Revocation>;
}
