use {
    super::backend::{glob_match, CacheBackend},
    crate::BackendError,
    parking_lot::RwLock,
    std::{
        collections::HashMap,
        time::{Duration, Instant},
    },
};

/// Number of writes between two sweeps of expired entries.
pub const SWEEP_INTERVAL: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, Entry>,
    /// Writes since the last sweep.
    writes: usize,
}

impl Entries {
    /// Counts `n` writes, sweeping expired entries once every
    /// [`SWEEP_INTERVAL`] of them.
    fn record_writes(&mut self, n: usize) {
        self.writes += n;
        if self.writes >= SWEEP_INTERVAL {
            self.writes = 0;
            let now = Instant::now();
            self.map.retain(|_, entry| entry.is_live(now));
        }
    }
}

/// In-process backend.
///
/// Expired entries are invisible to reads. They stay in memory until they
/// are overwritten or deleted, or until the sweep run every
/// [`SWEEP_INTERVAL`] writes.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<Entries>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, key: &str, value: &str, expires_at: Option<Instant>) {
        let mut entries = self.entries.write();
        entries.map.insert(key.to_owned(), Entry {
            value: value.to_owned(),
            expires_at,
        });
        entries.record_writes(1);
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .map
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.insert(key, value, None);
        Ok(())
    }

    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError> {
        self.insert(key, value, Some(Instant::now() + ttl));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), BackendError> {
        let mut entries = self.entries.write();
        entries.map.remove(key);
        entries.record_writes(1);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.get(key)?.is_some())
    }

    fn set_batch(&self, entries: &HashMap<String, String>) -> Result<(), BackendError> {
        let mut stored = self.entries.write();
        for (key, value) in entries {
            stored.map.insert(key.clone(), Entry {
                value: value.clone(),
                expires_at: None,
            });
        }
        stored.record_writes(entries.len());
        Ok(())
    }

    fn delete_batch(&self, keys: &[String]) -> Result<(), BackendError> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.map.remove(key);
        }
        entries.record_writes(keys.len());
        Ok(())
    }

    fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        let now = Instant::now();
        let entries = self.entries.read();
        let mut keys = Vec::new();
        for (key, entry) in entries.map.iter() {
            if entry.is_live(now) && glob_match(pattern, key)? {
                keys.push(key.clone());
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }

    fn flush(&self) -> Result<(), BackendError> {
        *self.entries.write() = Entries::default();
        Ok(())
    }
}
