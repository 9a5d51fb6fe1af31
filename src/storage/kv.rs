use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{ContentStore, StoreResult};

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct StoreSettings {
    pub name: String,
    /// Optional persistence settings loaded from `<data dir>/store.json`.
    #[serde(default)]
    pub persistence: Option<PersistenceSettings>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { name: "memory".to_string(), persistence: None }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct PersistenceSettings {
    /// Enable periodic snapshotting of the store to disk
    #[serde(default)]
    pub enabled: bool,
    /// Interval in milliseconds between snapshots
    #[serde(default = "PersistenceSettings::default_interval_ms")]
    pub interval_ms: u64,
}

impl PersistenceSettings {
    fn default_interval_ms() -> u64 { 5_000 }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self { enabled: true, interval_ms: Self::default_interval_ms() }
    }
}

#[derive(Default)]
struct State {
    values: HashMap<String, Bytes>,
    /// Key listing as the backend would report it. Puts show up at once;
    /// deleted keys linger here until the next sweep.
    listed: BTreeSet<String>,
}

#[derive(Serialize, Deserialize)]
struct SnapEntry { key: String, value: Vec<u8> }

#[derive(Serialize, Deserialize)]
struct Snapshot { version: u32, created_ms: i64, entries: Vec<SnapEntry> }

const SNAPSHOT_VERSION: u32 = 1;

/// In-process content store with the listing semantics of an
/// eventually-consistent backend: point reads are exact, `list_keys` may
/// still report keys that were deleted since the last [`MemoryStore::sweep`].
#[derive(Clone)]
pub struct MemoryStore {
    pub(crate) settings: StoreSettings,
    dir: Option<PathBuf>,
    state: Arc<parking_lot::RwLock<State>>,
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

impl MemoryStore {
    /// Volatile store with no backing directory.
    pub fn new() -> Self {
        Self { settings: StoreSettings::default(), dir: None, state: Arc::new(parking_lot::RwLock::new(State::default())) }
    }

    fn config_path(dir: &Path) -> PathBuf { dir.join("store.json") }
    fn snapshot_path(dir: &Path) -> PathBuf { dir.join("snapshot.bin") }

    /// Open a store rooted at `dir`: read `store.json` (writing defaults when
    /// absent) and load `snapshot.bin` if one exists.
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let cfg = Self::config_path(&dir);
        let settings = match std::fs::read(&cfg) {
            Ok(bytes) => serde_json::from_slice::<StoreSettings>(&bytes)?,
            Err(_) => {
                let s = StoreSettings { persistence: Some(PersistenceSettings::default()), ..StoreSettings::default() };
                std::fs::write(&cfg, serde_json::to_vec_pretty(&s)?)?;
                s
            }
        };
        let store = Self { settings, dir: Some(dir), state: Arc::new(parking_lot::RwLock::new(State::default())) };
        let loaded = store.load_snapshot()?;
        tracing::info!(target: "storage", name = %store.settings.name, loaded, "memory store opened");
        Ok(store)
    }

    pub fn persistence_enabled(&self) -> bool {
        self.dir.is_some() && self.settings.persistence.as_ref().map(|p| p.enabled).unwrap_or(false)
    }

    pub fn snapshot_interval(&self) -> Duration {
        let ms = self.settings.persistence.as_ref().map(|p| p.interval_ms).unwrap_or(5_000);
        Duration::from_millis(ms.max(1))
    }

    /// Write all live values to `snapshot.bin` (tmp file then rename).
    pub fn save_snapshot(&self) -> anyhow::Result<usize> {
        let Some(dir) = self.dir.as_ref() else { return Ok(0) };
        let entries: Vec<SnapEntry> = self.state.read().values.iter()
            .map(|(k, v)| SnapEntry { key: k.clone(), value: v.to_vec() })
            .collect();
        let n = entries.len();
        let snap = Snapshot { version: SNAPSHOT_VERSION, created_ms: chrono::Utc::now().timestamp_millis(), entries };
        let bytes = bincode::serialize(&snap)?;
        let path = Self::snapshot_path(dir);
        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(tmp, path)?;
        Ok(n)
    }

    /// Replace the in-memory contents with the snapshot on disk, if any.
    /// Returns the number of entries loaded.
    pub fn load_snapshot(&self) -> anyhow::Result<usize> {
        let Some(dir) = self.dir.as_ref() else { return Ok(0) };
        let path = Self::snapshot_path(dir);
        if !path.exists() { return Ok(0); }
        let bytes = std::fs::read(&path)?;
        let snap: Snapshot = bincode::deserialize(&bytes)?;
        if snap.version != SNAPSHOT_VERSION {
            anyhow::bail!("unsupported snapshot version {} in {}", snap.version, path.display());
        }
        let mut w = self.state.write();
        w.values.clear();
        w.listed.clear();
        for e in snap.entries {
            w.listed.insert(e.key.clone());
            w.values.insert(e.key, Bytes::from(e.value));
        }
        Ok(w.values.len())
    }

    /// Drop listing entries whose value is gone. Returns number removed.
    pub fn sweep(&self) -> usize {
        let mut w = self.state.write();
        let State { values, listed } = &mut *w;
        let before = listed.len();
        listed.retain(|k| values.contains_key(k));
        before - listed.len()
    }

    pub fn len(&self) -> usize { self.state.read().values.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Spawn the background sweeper (and snapshot loop when persistence is on).
    pub fn spawn_maintenance(&self, sweep_interval: Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut sweep_tick = tokio::time::interval(sweep_interval.max(Duration::from_millis(1)));
            let mut snap_tick = tokio::time::interval(this.snapshot_interval());
            loop {
                tokio::select! {
                    _ = sweep_tick.tick() => {
                        let removed = this.sweep();
                        if removed > 0 { tracing::debug!(removed = removed, "kv_sweep"); }
                    }
                    _ = snap_tick.tick(), if this.persistence_enabled() => {
                        if let Err(e) = this.save_snapshot() {
                            tracing::warn!("memory store snapshot failed: {}", e);
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    fn name(&self) -> &str { &self.settings.name }

    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let mut w = self.state.write();
        w.values.insert(key.to_string(), value);
        w.listed.insert(key.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        Ok(self.state.read().values.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.state.write().values.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let r = self.state.read();
        Ok(r.listed.range(prefix.to_string()..)
            .take_while(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
