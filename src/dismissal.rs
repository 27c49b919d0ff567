//! Persisted dismissal of overwork warnings.
//!
//! For every period two entries live in a key/value store: the content hash of the
//! records the user last saw, and a dismissal flag. When the records change, the hash
//! no longer matches and any earlier dismissal is cleared, so the warning comes back.
//!
//! Store failures never hide a warning: if the dismissal state cannot be read or
//! brought up to date, the period is treated as not dismissed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::record::TaskRecord;

const KEY_PREFIX: &str = "overwork-warning";
const DISMISSED: &str = "true";

/// SHA-256 (lower-case hex) of the JSON serialization of `records`, in the given order.
pub fn content_hash(records: &[TaskRecord]) -> String {
    let bytes = serde_json::to_vec(records).unwrap_or_else(|_| format!("{records:?}").into_bytes());
    let digest = Sha256::digest(&bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn hash_key(period_key: &str) -> String {
    format!("{}:{}:hash", KEY_PREFIX, period_key)
}

pub fn dismissed_key(period_key: &str) -> String {
    format!("{}:{}:dismissed", KEY_PREFIX, period_key)
}

/// Asynchronous string key/value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// Store that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: AsyncMutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// Every write rewrites the file through a temp file and a rename. Writes within one
/// process are serialized; across processes the last write wins.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: AsyncMutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore {
            path: path.into(),
            lock: AsyncMutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(HashMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // BTreeMap keeps the file diff-friendly.
        let sorted: std::collections::BTreeMap<_, _> = map.iter().collect();
        let data = serde_json::to_string_pretty(&sorted)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn update<F>(&self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, String>) + Send,
    {
        let _guard = self.lock.lock().await;
        // A state file that no longer parses is replaced, so `reset` and `dismiss` can
        // repair it. Dismissals it held are lost and their warnings show again.
        let mut map = match self.read_map().await {
            Ok(map) => map,
            Err(Error::Json(e)) => {
                warn!(path = %self.path.display(), error = %e, "Dismissal state unreadable, starting over");
                HashMap::new()
            }
            Err(e) => return Err(self.store_error(key, e)),
        };
        f(&mut map);
        self.write_map(&map)
            .await
            .map_err(|e| self.store_error(key, e))
    }

    fn store_error(&self, key: &str, e: Error) -> Error {
        Error::store(key, format!("{}: {}", self.path.display(), e))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        let map = self.read_map().await.map_err(|e| self.store_error(key, e))?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let value = value.to_string();
        self.update(key, move |map| {
            map.insert(key.to_string(), value);
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.update(key, |map| {
            map.remove(key);
        })
        .await
    }
}

/// Outcome of a warning check for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningDecision {
    pub period_key: String,
    pub content_hash: String,
    pub exceeds_limit: bool,
    pub dismissed: bool,
    /// The records differ from those of the last check, so any dismissal was cleared.
    pub hash_changed: bool,
    /// Whether the warning should be displayed.
    pub show: bool,
}

#[derive(Debug, Default)]
struct Focus {
    period_key: Option<String>,
    generation: u64,
}

/// Runs the dismissal protocol against a store.
///
/// Each `evaluate` call becomes the newest request. If another request or a
/// [`focus`](Self::focus) change happens while it waits on the store, its result is
/// discarded and `None` is returned.
pub struct DismissalTracker<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
    focus: Mutex<Focus>,
}

impl<S: KeyValueStore + ?Sized> DismissalTracker<S> {
    pub fn new(store: Arc<S>) -> Self {
        DismissalTracker {
            store,
            focus: Mutex::new(Focus::default()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Record that the caller now looks at `period_key`, invalidating in-flight checks.
    pub fn focus(&self, period_key: &str) -> u64 {
        let mut focus = self.focus.lock().unwrap_or_else(PoisonError::into_inner);
        focus.period_key = Some(period_key.to_string());
        focus.generation += 1;
        focus.generation
    }

    fn is_current(&self, period_key: &str, generation: u64) -> bool {
        let focus = self.focus.lock().unwrap_or_else(PoisonError::into_inner);
        focus.generation == generation && focus.period_key.as_deref() == Some(period_key)
    }

    /// Decide whether the warning for `period_key` should be shown.
    pub async fn evaluate(
        &self,
        period_key: &str,
        records: &[TaskRecord],
        exceeds_limit: bool,
    ) -> Option<WarningDecision> {
        let generation = self.focus(period_key);
        let current_hash = content_hash(records);

        let (dismissed, hash_changed) = match self.sync_hash(period_key, &current_hash).await {
            Ok(hash_changed) => match self.store.get(&dismissed_key(period_key)).await {
                Ok(flag) => (flag.as_deref() == Some(DISMISSED), hash_changed),
                Err(e) => {
                    warn!(period = period_key, error = %e, "Could not read dismissal flag, showing warning");
                    (false, hash_changed)
                }
            },
            Err(e) => {
                warn!(period = period_key, error = %e, "Could not sync content hash, showing warning");
                (false, false)
            }
        };

        if !self.is_current(period_key, generation) {
            debug!(period = period_key, "Discarding stale dismissal check");
            return None;
        }

        Some(WarningDecision {
            period_key: period_key.to_string(),
            content_hash: current_hash,
            exceeds_limit,
            dismissed,
            hash_changed,
            show: exceeds_limit && !dismissed,
        })
    }

    /// Mark the warning for `period_key` as understood for the given records.
    ///
    /// Other periods are untouched.
    pub async fn acknowledge(&self, period_key: &str, records: &[TaskRecord]) -> Result<()> {
        let current_hash = content_hash(records);
        self.sync_hash(period_key, &current_hash).await?;
        self.store.set(&dismissed_key(period_key), DISMISSED).await?;
        debug!(period = period_key, "Warning dismissed");
        Ok(())
    }

    /// Forget the stored hash and dismissal for `period_key`.
    pub async fn reset(&self, period_key: &str) -> Result<()> {
        self.store.remove(&dismissed_key(period_key)).await?;
        self.store.remove(&hash_key(period_key)).await?;
        Ok(())
    }

    /// Store `current_hash` for the period, clearing the dismissal if it changed.
    /// Returns whether the hash changed.
    async fn sync_hash(&self, period_key: &str, current_hash: &str) -> Result<bool> {
        let stored = self.store.get(&hash_key(period_key)).await?;
        if stored.as_deref() == Some(current_hash) {
            return Ok(false);
        }
        self.store.remove(&dismissed_key(period_key)).await?;
        self.store.set(&hash_key(period_key), current_hash).await?;
        debug!(period = period_key, "Record set changed, dismissal cleared");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    fn records(effort: &str) -> Vec<TaskRecord> {
        vec![
            TaskRecord::new("1", "01-Jan-2025").with_effort("5"),
            TaskRecord::new("2", "01-Jan-2025").with_effort(effort),
        ]
    }

    /// Store whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            Err(Error::store(key, "unavailable"))
        }

        async fn set(&self, key: &str, _value: &str) -> Result<()> {
            Err(Error::store(key, "unavailable"))
        }

        async fn remove(&self, key: &str) -> Result<()> {
            Err(Error::store(key, "unavailable"))
        }
    }

    /// Memory store whose first read waits until released.
    struct GatedStore {
        inner: MemoryStore,
        entered: Notify,
        gate: Notify,
        armed: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for GatedStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            if self.armed.swap(false, std::sync::atomic::Ordering::SeqCst) {
                self.entered.notify_one();
                self.gate.notified().await;
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key).await
        }
    }

    #[test]
    fn test_content_hash_is_deterministic_and_sensitive() {
        let a = content_hash(&records("6"));
        assert_eq!(a, content_hash(&records("6")));
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_hash(&records("7")));
        assert_ne!(a, content_hash(&[]));
    }

    #[tokio::test]
    async fn test_warning_shown_then_dismissed() {
        let tracker = DismissalTracker::new(Arc::new(MemoryStore::new()));
        let recs = records("6");

        let first = tracker.evaluate("2024-12-30", &recs, true).await.unwrap();
        assert!(first.show);
        assert!(first.hash_changed);

        tracker.acknowledge("2024-12-30", &recs).await.unwrap();
        let second = tracker.evaluate("2024-12-30", &recs, true).await.unwrap();
        assert!(second.dismissed);
        assert!(!second.show);
        assert!(!second.hash_changed);
    }

    #[tokio::test]
    async fn test_changed_records_bring_warning_back() {
        let tracker = DismissalTracker::new(Arc::new(MemoryStore::new()));
        tracker.evaluate("2024-12-30", &records("6"), true).await.unwrap();
        tracker.acknowledge("2024-12-30", &records("6")).await.unwrap();

        let after_change = tracker.evaluate("2024-12-30", &records("7"), true).await.unwrap();
        assert!(after_change.hash_changed);
        assert!(!after_change.dismissed);
        assert!(after_change.show);

        let stored = tracker.store().get(&dismissed_key("2024-12-30")).await.unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_dismissal_is_per_period() {
        let tracker = DismissalTracker::new(Arc::new(MemoryStore::new()));
        let recs = records("6");
        tracker.acknowledge("2024-12-30", &recs).await.unwrap();

        let other = tracker.evaluate("2025-01-06", &recs, true).await.unwrap();
        assert!(other.show);
        let same = tracker.evaluate("2024-12-30", &recs, true).await.unwrap();
        assert!(!same.show);
    }

    #[tokio::test]
    async fn test_no_warning_without_violation() {
        let tracker = DismissalTracker::new(Arc::new(MemoryStore::new()));
        let decision = tracker.evaluate("2025-01", &records("1"), false).await.unwrap();
        assert!(!decision.show);
        assert!(!decision.dismissed);
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let tracker = DismissalTracker::new(Arc::new(BrokenStore));
        let decision = tracker.evaluate("2025-01", &records("6"), true).await.unwrap();
        assert!(decision.show);
        assert!(!decision.dismissed);

        assert!(tracker.acknowledge("2025-01", &records("6")).await.is_err());
    }

    #[tokio::test]
    async fn test_reset_forgets_dismissal() {
        let tracker = DismissalTracker::new(Arc::new(MemoryStore::new()));
        let recs = records("6");
        tracker.acknowledge("2025-01", &recs).await.unwrap();
        tracker.reset("2025-01").await.unwrap();

        let decision = tracker.evaluate("2025-01", &recs, true).await.unwrap();
        assert!(decision.show);
        assert!(decision.hash_changed);
    }

    #[tokio::test]
    async fn test_stale_check_is_discarded() {
        let store = Arc::new(GatedStore {
            inner: MemoryStore::new(),
            entered: Notify::new(),
            gate: Notify::new(),
            armed: std::sync::atomic::AtomicBool::new(true),
        });
        let tracker = DismissalTracker::new(store.clone());
        let recs = records("6");

        let (stale, ()) = tokio::join!(tracker.evaluate("2024-12-30", &recs, true), async {
            store.entered.notified().await;
            tracker.focus("2025-01-06");
            store.gate.notify_one();
        });
        assert!(stale.is_none());

        let fresh = tracker.evaluate("2025-01-06", &recs, true).await;
        assert!(fresh.is_some());
    }
}
