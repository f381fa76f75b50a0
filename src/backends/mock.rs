//! Mock registry and issuer for testing.
//!
//! Complete in-memory implementations with error injection for exercising
//! the rotation protocol's failure paths. The mock issuer additionally
//! tracks bindings and revocations so tests can assert the no-gap /
//! no-duplicate invariants directly.

use crate::{
    IssuedKey, Issuer, KeyRecord, KeysweepError, RecordUpdate, Registry, Result, Revocation,
    UpdateOutcome,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Replays an injected error.
///
/// Transient variants are reconstructed as themselves so retry behavior can
/// be tested; everything else is re-rendered through `anyhow`.
fn replay(err: &KeysweepError) -> KeysweepError {
    match err {
        KeysweepError::Throttled(s) => KeysweepError::Throttled(s.clone()),
        KeysweepError::Unavailable(s) => KeysweepError::Unavailable(s.clone()),
        KeysweepError::Timeout(s) => KeysweepError::Timeout(s.clone()),
        other => KeysweepError::Other(anyhow::anyhow!("{}", other)),
    }
}

/// Mock registry for testing.
///
/// Stores records in memory with support for error injection, including
/// per-item update failures for batch-isolation tests.
///
/// # Example
///
/// ```
/// use keysweep::backends::mock::MockRegistry;
/// use keysweep::{KeyRecord, Registry};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> keysweep::Result<()> {
/// let registry = MockRegistry::new();
/// registry.set_record(KeyRecord::new("item-1", "key-1", "secret", "plan-1")).await;
///
/// let records = registry.scan_all().await?;
/// assert_eq!(records.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockRegistry {
    records: Arc<RwLock<HashMap<String, KeyRecord>>>,
    scan_error: Arc<RwLock<Option<KeysweepError>>>,
    update_error: Arc<RwLock<Option<KeysweepError>>>,
    failing_items: Arc<RwLock<HashSet<String>>>,
}

impl MockRegistry {
    /// Creates a new mock registry with no records.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            scan_error: Arc::new(RwLock::new(None)),
            update_error: Arc::new(RwLock::new(None)),
            failing_items: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Pre-populates the registry with a record.
    pub async fn set_record(&self, record: KeyRecord) {
        let mut records = self.records.write().await;
        records.insert(record.item_id.clone(), record);
    }

    /// Returns a record by item id.
    pub async fn get_record(&self, item_id: &str) -> Option<KeyRecord> {
        let records = self.records.read().await;
        records.get(item_id).cloned()
    }

    /// Injects an error returned by every `scan_all` call.
    pub async fn set_scan_error(&self, err: KeysweepError) {
        *self.scan_error.write().await = Some(err);
    }

    /// Injects an error returned by every `conditional_update` call.
    pub async fn set_update_error(&self, err: KeysweepError) {
        *self.update_error.write().await = Some(err);
    }

    /// Clears the injected update error.
    pub async fn clear_update_error(&self) {
        *self.update_error.write().await = None;
    }

    /// Makes `conditional_update` fail for one specific item only.
    pub async fn fail_update_for(&self, item_id: impl Into<String>) {
        self.failing_items.write().await.insert(item_id.into());
    }

    /// Clears all per-item update failures.
    pub async fn clear_failing_items(&self) {
        self.failing_items.write().await.clear();
    }
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Registry for MockRegistry {
    fn name(&self) -> &str {
        "mock"
    }

    async fn scan_all(&self) -> Result<Vec<KeyRecord>> {
        if let Some(ref err) = *self.scan_error.read().await {
            return Err(replay(err));
        }

        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }

    async fn conditional_update(&self, update: RecordUpdate) -> Result<UpdateOutcome> {
        if let Some(ref err) = *self.update_error.read().await {
            return Err(replay(err));
        }
        if self.failing_items.read().await.contains(&update.item_id) {
            return Err(KeysweepError::Unavailable(format!(
                "injected failure for {}",
                update.item_id
            )));
        }

        let mut records = self.records.write().await;
        let record = records
            .get_mut(&update.item_id)
            .ok_or_else(|| KeysweepError::RecordNotFound(update.item_id.clone()))?;

        if record.external_key_id != update.expected_key_id {
            return Ok(UpdateOutcome::Conflict);
        }

        record.external_key_id = update.new_key_id;
        record.key_value = update.new_key_value;
        record.last_rotated_at = update.rotated_at;
        Ok(UpdateOutcome::Applied)
    }
}

/// Mock issuer for testing.
///
/// Issues keys with deterministic `issued-N` ids and tracks the full key
/// lifecycle (live, bound, revoked) so tests can assert that rotation never
/// leaves a gap or a duplicate.
pub struct MockIssuer {
    state: Arc<RwLock<IssuerState>>,
    transient_create_failures: AtomicU32,
}

#[derive(Default)]
struct IssuerState {
    counter: u64,
    /// key id -> usage plan binding (None until bound)
    live: HashMap<String, Option<String>>,
    revoked: HashSet<String>,
    create_error: Option<KeysweepError>,
    bind_error: Option<KeysweepError>,
    revoke_error: Option<KeysweepError>,
}

impl MockIssuer {
    /// Creates a new mock issuer with no keys.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(IssuerState::default())),
            transient_create_failures: AtomicU32::new(0),
        }
    }

    /// Pre-populates a live key already bound to a usage plan.
    ///
    /// Use for the key a seeded [`KeyRecord`] points at.
    pub async fn seed_key(&self, key_id: impl Into<String>, usage_plan_id: impl Into<String>) {
        let mut state = self.state.write().await;
        state
            .live
            .insert(key_id.into(), Some(usage_plan_id.into()));
    }

    /// Removes a key without marking it revoked, as if it vanished upstream.
    pub async fn drop_key(&self, key_id: &str) {
        let mut state = self.state.write().await;
        state.live.remove(key_id);
    }

    /// Injects an error returned by every `create_key` call.
    pub async fn set_create_error(&self, err: KeysweepError) {
        self.state.write().await.create_error = Some(err);
    }

    /// Makes the next `n` `create_key` calls fail with a transient error,
    /// then recover. Useful for retry tests.
    pub fn fail_next_creates(&self, n: u32) {
        self.transient_create_failures.store(n, Ordering::SeqCst);
    }

    /// Injects an error returned by every `bind_usage_plan` call.
    pub async fn set_bind_error(&self, err: KeysweepError) {
        self.state.write().await.bind_error = Some(err);
    }

    /// Injects an error returned by every `revoke_key` call.
    pub async fn set_revoke_error(&self, err: KeysweepError) {
        self.state.write().await.revoke_error = Some(err);
    }

    /// Whether `key_id` has been revoked.
    pub async fn is_revoked(&self, key_id: &str) -> bool {
        self.state.read().await.revoked.contains(key_id)
    }

    /// The usage plan `key_id` is bound to, if any.
    pub async fn binding_of(&self, key_id: &str) -> Option<String> {
        self.state
            .read()
            .await
            .live
            .get(key_id)
            .and_then(|binding| binding.clone())
    }

    /// All keys currently live at the issuer, sorted.
    pub async fn live_keys(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut keys: Vec<String> = state.live.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Total keys issued via `create_key`.
    pub async fn issued_count(&self) -> u64 {
        self.state.read().await.counter
    }
}

impl Default for MockIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Issuer for MockIssuer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_key(&self) -> Result<IssuedKey> {
        if self
            .transient_create_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(KeysweepError::Unavailable(
                "injected transient failure".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        if let Some(ref err) = state.create_error {
            return Err(replay(err));
        }

        state.counter += 1;
        let key = IssuedKey {
            key_id: format!("issued-{}", state.counter),
            key_value: uuid::Uuid::new_v4().to_string(),
        };
        state.live.insert(key.key_id.clone(), None);
        Ok(key)
    }

    async fn bind_usage_plan(&self, key_id: &str, usage_plan_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(ref err) = state.bind_error {
            return Err(replay(err));
        }

        let binding = state
            .live
            .get_mut(key_id)
            .ok_or_else(|| KeysweepError::Other(anyhow::anyhow!("no such key: {}", key_id)))?;
        *binding = Some(usage_plan_id.to_string());
        Ok(())
    }

    async fn revoke_key(&self, key_id: &str) -> Result<Revocation> {
        let mut state = self.state.write().await;
        if let Some(ref err) = state.revoke_error {
            return Err(replay(err));
        }

        if state.live.remove(key_id).is_some() {
            state.revoked.insert(key_id.to_string());
            Ok(Revocation::Revoked)
        } else {
            Ok(Revocation::AlreadyAbsent)
        }
    }
}
