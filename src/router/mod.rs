//! Routes key operations to the backend of the owning ring member.
//!
//! Every operation resolves the key with [`HashRing::node`] and forwards it
//! to the backend attached to that node. Batch operations are split by owner.
//! Backend failures are reported to the caller as they are, nothing is
//! retried here.

mod backend;
mod memory;

use {
    crate::{
        BackendError, DefaultHasher, HashRing, KeyHasher, Rebalance, RingNode, RingPosition,
        RingSnapshot, RouterError,
    },
    parking_lot::RwLock,
    serde::{Deserialize, Serialize},
    std::{
        collections::{BTreeMap, HashMap},
        sync::Arc,
        time::Duration,
    },
    tracing::{debug, trace, warn},
};
pub use {
    backend::{glob_match, CacheBackend},
    memory::{MemoryBackend, SWEEP_INTERVAL},
};

/// Body of a put request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutRequest {
    pub key: String,
    pub value: String,
    /// Expiration in seconds; the entry never expires when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

/// Outcome of a put request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResponse {
    pub success: bool,
    pub message: String,
}

impl PutResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// A ring together with the backend of each member.
pub struct Router<N: RingNode, B: CacheBackend, H: KeyHasher = DefaultHasher> {
    ring: HashRing<N, H>,
    backends: RwLock<BTreeMap<N, Arc<B>>>,
}

impl<N: RingNode, B: CacheBackend, H: KeyHasher> Router<N, B, H> {
    /// Creates a router over an empty ring.
    ///
    /// Members must be added through [`attach`](Self::attach) so that each one
    /// has a backend.
    pub fn new(ring: HashRing<N, H>) -> Result<Self, RouterError> {
        if let Some(node) = ring.nodes().into_iter().next() {
            return Err(RouterError::MissingBackend(node.to_string()));
        }
        Ok(Self {
            ring,
            backends: RwLock::new(BTreeMap::new()),
        })
    }

    /// Returns the current state of the ring.
    ///
    /// Membership only changes through [`attach`](Self::attach) and
    /// [`detach`](Self::detach).
    pub fn snapshot(&self) -> Arc<RingSnapshot<N>> {
        self.ring.snapshot()
    }

    /// Returns the ring position of `key`.
    pub fn position(&self, key: &str) -> RingPosition {
        self.ring.position(key)
    }

    /// Adds `node` to the ring, served by `backend`.
    ///
    /// Returns the ranges moving to the new node.
    pub fn attach(&self, node: N, backend: B) -> Result<Rebalance<N>, RouterError> {
        let mut backends = self.backends.write();
        let rebalance = self.ring.add(node.clone())?;
        backends.insert(node.clone(), Arc::new(backend));
        debug!(%node, transfers = rebalance.len(), "attached backend");
        Ok(rebalance)
    }

    /// Removes `node` from the ring and returns its backend, so that the
    /// ranges listed in the rebalance can still be read from it.
    pub fn detach(&self, node: &N) -> Result<(Arc<B>, Rebalance<N>), RouterError> {
        let mut backends = self.backends.write();
        let rebalance = self.ring.remove(node)?;
        let backend = backends
            .remove(node)
            .ok_or_else(|| RouterError::MissingBackend(node.to_string()))?;
        debug!(%node, transfers = rebalance.len(), "detached backend");
        Ok((backend, rebalance))
    }

    /// Returns the owner of `key` and its backend.
    pub fn route(&self, key: &str) -> Result<(N, Arc<B>), RouterError> {
        let backends = self.backends.read();
        self.resolve(&backends, key)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, RouterError> {
        self.with_backend(key, |backend| backend.get(key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), RouterError> {
        self.with_backend(key, |backend| backend.set(key, value))
    }

    pub fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RouterError> {
        self.with_backend(key, |backend| backend.set_with_ttl(key, value, ttl))
    }

    pub fn delete(&self, key: &str) -> Result<(), RouterError> {
        self.with_backend(key, |backend| backend.delete(key))
    }

    pub fn exists(&self, key: &str) -> Result<bool, RouterError> {
        self.with_backend(key, |backend| backend.exists(key))
    }

    /// Reads several keys, one batch per owning backend.
    pub fn get_batch(&self, keys: &[String]) -> Result<HashMap<String, String>, RouterError> {
        let mut found = HashMap::with_capacity(keys.len());
        for (node, (backend, keys)) in self.group(keys.iter().cloned())? {
            let values = backend
                .get_batch(&keys)
                .map_err(|source| backend_error(&node, source))?;
            found.extend(values);
        }
        Ok(found)
    }

    /// Writes several entries, one batch per owning backend.
    pub fn set_batch(&self, entries: &HashMap<String, String>) -> Result<(), RouterError> {
        for (node, (backend, keys)) in self.group(entries.keys().cloned())? {
            let batch = keys
                .into_iter()
                .filter_map(|key| entries.get(&key).map(|value| (key, value.clone())))
                .collect::<HashMap<_, _>>();
            backend
                .set_batch(&batch)
                .map_err(|source| backend_error(&node, source))?;
        }
        Ok(())
    }

    /// Deletes several keys, one batch per owning backend.
    pub fn delete_batch(&self, keys: &[String]) -> Result<(), RouterError> {
        for (node, (backend, keys)) in self.group(keys.iter().cloned())? {
            backend
                .delete_batch(&keys)
                .map_err(|source| backend_error(&node, source))?;
        }
        Ok(())
    }

    /// Pings every backend, returning the outcome per node.
    pub fn ping(&self) -> Vec<(N, Result<(), BackendError>)> {
        self.backends()
            .into_iter()
            .map(|(node, backend)| (node, backend.ping()))
            .collect()
    }

    /// Returns the keys matching `pattern` across all backends, sorted.
    pub fn keys(&self, pattern: &str) -> Result<Vec<String>, RouterError> {
        let mut keys = Vec::new();
        for (node, backend) in self.backends() {
            keys.extend(
                backend
                    .keys(pattern)
                    .map_err(|source| backend_error(&node, source))?,
            );
        }
        keys.sort_unstable();
        Ok(keys)
    }

    /// Removes every key from every backend.
    pub fn flush(&self) -> Result<(), RouterError> {
        for (node, backend) in self.backends() {
            backend
                .flush()
                .map_err(|source| backend_error(&node, source))?;
        }
        Ok(())
    }

    /// Handles a put request, reporting failures in the response body.
    pub fn put(&self, request: &PutRequest) -> PutResponse {
        if request.key.is_empty() {
            return PutResponse::failed("invalid request: empty key");
        }
        let result = self.route(&request.key).and_then(|(node, backend)| {
            let stored = match request.ttl_secs {
                Some(secs) => {
                    backend.set_with_ttl(&request.key, &request.value, Duration::from_secs(secs))
                }
                None => backend.set(&request.key, &request.value),
            };
            stored
                .map_err(|source| backend_error(&node, source))
                .map(|()| node)
        });
        match result {
            Ok(node) => PutResponse::ok(format!("stored on {node}")),
            Err(err) => PutResponse::failed(format!("failed to upload: {err}")),
        }
    }

    fn with_backend<T>(
        &self,
        key: &str,
        op: impl FnOnce(&B) -> Result<T, BackendError>,
    ) -> Result<T, RouterError> {
        let (node, backend) = self.route(key)?;
        op(&backend).map_err(|source| backend_error(&node, source))
    }

    fn backends(&self) -> Vec<(N, Arc<B>)> {
        self.backends
            .read()
            .iter()
            .map(|(node, backend)| (node.clone(), Arc::clone(backend)))
            .collect()
    }

    /// Looks up the owner of `key` and its backend.
    ///
    /// The ring must be read while `backends` is locked: `attach` and `detach`
    /// change both under the write lock, so the owner is always attached.
    fn resolve(
        &self,
        backends: &BTreeMap<N, Arc<B>>,
        key: &str,
    ) -> Result<(N, Arc<B>), RouterError> {
        let node = self.ring.node(key)?;
        let backend = backends
            .get(&node)
            .cloned()
            .ok_or_else(|| RouterError::MissingBackend(node.to_string()))?;
        trace!(key, %node, "routed key");
        Ok((node, backend))
    }

    /// Splits keys by owning node, all resolved against the same ring state.
    #[allow(clippy::type_complexity)]
    fn group(
        &self,
        keys: impl Iterator<Item = String>,
    ) -> Result<BTreeMap<N, (Arc<B>, Vec<String>)>, RouterError> {
        let backends = self.backends.read();
        let mut groups: BTreeMap<N, (Arc<B>, Vec<String>)> = BTreeMap::new();
        for key in keys {
            let (node, backend) = self.resolve(&backends, &key)?;
            groups
                .entry(node)
                .or_insert_with(|| (backend, Vec::new()))
                .1
                .push(key);
        }
        Ok(groups)
    }
}

fn backend_error<N: RingNode>(node: &N, source: BackendError) -> RouterError {
    warn!(%node, error = %source, "backend operation failed");
    RouterError::Backend {
        node: node.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::{
            sync::atomic::{AtomicBool, Ordering},
            thread,
        },
    };

    /// Backend that is always down.
    struct DownBackend;

    impl CacheBackend for DownBackend {
        fn get(&self, _key: &str) -> Result<Option<String>, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        fn set_with_ttl(&self, _key: &str, _value: &str, ttl: Duration) -> Result<(), BackendError> {
            Err(BackendError::Timeout(ttl))
        }

        fn delete(&self, _key: &str) -> Result<(), BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        fn exists(&self, _key: &str) -> Result<bool, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        fn ping(&self) -> Result<(), BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        fn keys(&self, _pattern: &str) -> Result<Vec<String>, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        fn flush(&self) -> Result<(), BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }
    }

    fn router(nodes: &[&str]) -> Router<String, MemoryBackend> {
        let router = Router::new(HashRing::new()).unwrap();
        for node in nodes {
            router.attach(node.to_string(), MemoryBackend::new()).unwrap();
        }
        router
    }

    #[test]
    fn empty_ring_is_surfaced() {
        let router = router(&[]);
        assert!(matches!(
            router.get("k"),
            Err(RouterError::Ring(crate::RingError::EmptyRing))
        ));
        assert!(!router.put(&PutRequest {
            key: "k".into(),
            value: "v".into(),
            ttl_secs: None,
        })
        .success);
    }

    #[test]
    fn rejects_pre_populated_ring() {
        let ring = HashRing::new();
        ring.add("server:1".to_string()).unwrap();
        assert!(matches!(
            Router::<String, MemoryBackend>::new(ring),
            Err(RouterError::MissingBackend(_))
        ));
    }

    #[test]
    fn stores_on_owner_only() {
        let router = router(&["server:1", "server:2", "server:3"]);
        for i in 0..100 {
            router.set(&format!("key:{i}"), "v").unwrap();
        }
        for i in 0..100 {
            let key = format!("key:{i}");
            let (_, owner) = router.route(&key).unwrap();
            assert!(owner.exists(&key).unwrap());
            let holders = router
                .backends()
                .iter()
                .filter(|(_, backend)| backend.exists(&key).unwrap())
                .count();
            assert_eq!(holders, 1);
        }
        assert_eq!(router.keys("key:*").unwrap().len(), 100);
    }

    #[test]
    fn batch_operations_span_backends() {
        let router = router(&["server:1", "server:2", "server:3"]);
        let entries = (0..50)
            .map(|i| (format!("key:{i}"), format!("value:{i}")))
            .collect::<HashMap<_, _>>();
        router.set_batch(&entries).unwrap();

        let keys = entries.keys().cloned().collect::<Vec<_>>();
        assert_eq!(router.get_batch(&keys).unwrap(), entries);

        router.delete_batch(&keys[..10]).unwrap();
        assert_eq!(router.get_batch(&keys).unwrap().len(), 40);

        router.flush().unwrap();
        assert!(router.keys("*").unwrap().is_empty());
    }

    #[test]
    fn put_request() {
        let router = router(&["server:1"]);
        let request: PutRequest =
            serde_json::from_str(r#"{"key": "user:1", "value": "alice"}"#).unwrap();
        let response = router.put(&request);
        assert!(response.success);
        assert_eq!(response.message, "stored on server:1");
        assert_eq!(router.get("user:1").unwrap().as_deref(), Some("alice"));

        let empty = PutRequest {
            key: String::new(),
            value: "v".into(),
            ttl_secs: None,
        };
        assert!(!router.put(&empty).success);
    }

    #[test]
    fn backend_errors_are_surfaced() {
        let router = Router::<String, DownBackend>::new(HashRing::new()).unwrap();
        router.attach("server:1".into(), DownBackend).unwrap();

        assert!(matches!(
            router.get("k"),
            Err(RouterError::Backend { ref node, .. }) if node == "server:1"
        ));
        let response = router.put(&PutRequest {
            key: "k".into(),
            value: "v".into(),
            ttl_secs: Some(5),
        });
        assert!(!response.success);
        assert!(router.ping().iter().all(|(_, result)| result.is_err()));
    }

    #[test]
    fn detach_returns_backend_with_its_data() {
        let router = router(&["server:1", "server:2"]);
        for i in 0..100 {
            router.set(&format!("key:{i}"), "v").unwrap();
        }
        let (backend, rebalance) = router.detach(&"server:2".to_string()).unwrap();
        assert!(rebalance
            .transfers()
            .iter()
            .all(|t| t.from == "server:2" && t.to == "server:1"));

        // Everything the detached backend holds falls into a listed range.
        for key in backend.keys("*").unwrap() {
            assert!(rebalance.is_affected(router.position(&key)));
        }
        assert!(matches!(
            router.detach(&"server:2".to_string()),
            Err(RouterError::Ring(crate::RingError::NotFound(_)))
        ));
    }

    #[test]
    fn reads_always_find_a_backend_during_membership_changes() {
        let router = router(&["server:1", "server:3"]);
        let keys = (0..200).map(|i| format!("key:{i}")).collect::<Vec<_>>();
        let done = AtomicBool::new(false);

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    while !done.load(Ordering::Relaxed) {
                        for key in &keys {
                            router.get(key).unwrap();
                        }
                        router.get_batch(&keys).unwrap();
                    }
                });
            }
            s.spawn(|| {
                let node = "server:2".to_string();
                for _ in 0..500 {
                    router.attach(node.clone(), MemoryBackend::new()).unwrap();
                    router.detach(&node).unwrap();
                }
                done.store(true, Ordering::Relaxed);
            });
        });

        assert_eq!(router.snapshot().len(), 2);
    }
}
