#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod config;
mod error;
mod hasher;
pub mod plan;
mod range;
pub mod router;
mod snapshot;
mod vnode;

use {
    arc_swap::ArcSwap,
    parking_lot::Mutex,
    std::{fmt::Display, sync::Arc},
    tracing::{debug, trace},
};
pub use {
    config::*,
    error::*,
    hasher::*,
    plan::{Rebalance, Transfer},
    range::*,
    snapshot::RingSnapshot,
    vnode::VirtualNode,
};

/// Physical node identifier.
///
/// The `Display` form is hashed (together with the virtual index) to place the
/// node's virtual nodes, and the `Ord` implementation breaks ties between
/// virtual nodes landing on the same position.
pub trait RingNode: Display + Ord + Clone + Send + Sync + 'static {}

impl<T> RingNode for T where T: Display + Ord + Clone + Send + Sync + 'static {}

/// Position on the ring.
pub type RingPosition = u32;

/// Consistent hash ring with virtual nodes.
///
/// Each member is placed on the ring as a fixed number of virtual nodes. A key
/// belongs to the first virtual node at or after its hash, moving clockwise
/// and wrapping around past the largest position.
///
/// The ring can be shared between threads. Lookups read an immutable snapshot
/// and never wait for membership changes; `add` and `remove` are serialized
/// and publish a fully built snapshot, so a lookup sees the ring either
/// entirely before or entirely after a change.
pub struct HashRing<N: RingNode = String, H: KeyHasher = DefaultHasher> {
    /// Hasher used for both keys and virtual node labels.
    hasher: H,

    /// Number of virtual nodes per member.
    virtual_nodes: u32,

    /// Current state of the ring.
    snapshot: ArcSwap<RingSnapshot<N>>,

    /// Serializes membership changes.
    writer: Mutex<()>,
}

impl<N: RingNode> Default for HashRing<N> {
    fn default() -> Self {
        Self {
            hasher: DefaultHasher::new(),
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
            snapshot: ArcSwap::from_pointee(RingSnapshot::default()),
            writer: Mutex::new(()),
        }
    }
}

impl<N: RingNode> HashRing<N> {
    /// Creates an empty ring with default settings: XXH3 hashing and
    /// [`DEFAULT_VIRTUAL_NODES`] virtual nodes per member.
    ///
    /// # Examples
    ///
    /// ```
    /// let ring = vnring::HashRing::<String>::new();
    /// ring.add("server:1".to_string()).unwrap();
    /// ring.add("server:2".to_string()).unwrap();
    /// assert_eq!(ring.vnode_count(), 200);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty ring from configuration.
    ///
    /// ```
    /// use vnring::{HashRing, RingConfig};
    ///
    /// let config = RingConfig {
    ///     virtual_nodes: 200,
    ///     seed: 7,
    /// };
    /// let ring = HashRing::<u64>::with_config(&config).unwrap();
    /// assert_eq!(ring.virtual_nodes(), 200);
    /// ```
    pub fn with_config(config: &RingConfig) -> Result<Self, RingError> {
        Self::with_hasher(Xxh3Hasher::with_seed(config.seed), config.virtual_nodes)
    }
}

impl<N: RingNode, H: KeyHasher> HashRing<N, H> {
    /// Creates an empty ring using a custom hasher.
    ///
    /// Fails with [`RingError::InvalidConfig`] if `virtual_nodes` is zero.
    pub fn with_hasher(hasher: H, virtual_nodes: u32) -> Result<Self, RingError> {
        RingConfig {
            virtual_nodes,
            ..Default::default()
        }
        .validate()?;
        Ok(Self {
            hasher,
            virtual_nodes,
            snapshot: ArcSwap::from_pointee(RingSnapshot::default()),
            writer: Mutex::new(()),
        })
    }

    /// Adds a node to the ring.
    ///
    /// Returns the ranges the new node takes over, so that the data they hold
    /// can be copied from the previous owners. Adding a node that is already a
    /// member fails with [`RingError::AlreadyMember`] and leaves the ring as is.
    ///
    /// # Examples
    ///
    /// ```
    /// let ring = vnring::HashRing::<u64>::new();
    /// assert!(ring.add(1).unwrap().is_empty());
    ///
    /// // Everything the second node takes over comes from the first one.
    /// let rebalance = ring.add(2).unwrap();
    /// assert!(rebalance.transfers().iter().all(|t| t.from == 1 && t.to == 2));
    ///
    /// assert!(ring.add(2).is_err());
    /// ```
    pub fn add(&self, node: N) -> Result<Rebalance<N>, RingError> {
        let _guard = self.writer.lock();
        let before = self.snapshot.load_full();
        if before.contains(&node) {
            return Err(RingError::AlreadyMember(node.to_string()));
        }

        let vnodes = (0..self.virtual_nodes)
            .map(|index| VirtualNode::new(&self.hasher, node.clone(), index))
            .collect();
        let after = Arc::new(before.with_node(node.clone(), vnodes));
        let rebalance = plan::transfers(&before, &after);
        self.snapshot.store(after);

        debug!(
            %node,
            vnodes = self.virtual_nodes,
            transfers = rebalance.len(),
            "added node to ring"
        );
        Ok(rebalance)
    }

    /// Removes a node from the ring.
    ///
    /// Returns the ranges the node served, each paired with the member that
    /// serves it now. Removing a node that is not a member fails with
    /// [`RingError::NotFound`].
    ///
    /// # Examples
    ///
    /// ```
    /// let ring = vnring::HashRing::<u64>::new();
    /// ring.add(1).unwrap();
    /// ring.add(2).unwrap();
    ///
    /// let rebalance = ring.remove(&2).unwrap();
    /// assert!(rebalance.transfers().iter().all(|t| t.from == 2 && t.to == 1));
    /// assert!(ring.remove(&2).is_err());
    /// ```
    pub fn remove(&self, node: &N) -> Result<Rebalance<N>, RingError> {
        let _guard = self.writer.lock();
        let before = self.snapshot.load_full();
        if !before.contains(node) {
            return Err(RingError::NotFound(node.to_string()));
        }

        let after = Arc::new(before.without_node(node));
        let rebalance = plan::transfers(&before, &after);
        self.snapshot.store(after);

        debug!(%node, transfers = rebalance.len(), "removed node from ring");
        Ok(rebalance)
    }

    /// Returns the node responsible for the given key.
    ///
    /// Fails with [`RingError::EmptyRing`] if the ring has no members.
    ///
    /// # Examples
    ///
    /// ```
    /// use vnring::{HashRing, RingError};
    ///
    /// let ring = HashRing::<String>::new();
    /// assert_eq!(ring.node("k"), Err(RingError::EmptyRing));
    ///
    /// ring.add("server:1".to_string()).unwrap();
    /// assert_eq!(ring.node("k").unwrap(), "server:1");
    /// ```
    pub fn node(&self, key: &str) -> Result<N, RingError> {
        let pos = self.position(key);
        let snapshot = self.snapshot.load();
        let owner = snapshot.owner_of(pos).ok_or(RingError::EmptyRing)?;
        trace!(key, pos, vnode = %owner, "resolved key");
        Ok(owner.node().clone())
    }

    /// Returns ring position to which a given key is assigned.
    pub fn position(&self, key: &str) -> RingPosition {
        self.hasher.hash(key)
    }

    /// Returns the ranges of positions currently served by `node`, or `None`
    /// if it is not a member.
    pub fn intervals(&self, node: &N) -> Option<Vec<KeyRange>> {
        self.snapshot.load().intervals(node)
    }

    /// Returns `true` if `node` is a member of the ring.
    pub fn contains(&self, node: &N) -> bool {
        self.snapshot.load().contains(node)
    }

    /// Returns all members, in node order.
    pub fn nodes(&self) -> Vec<N> {
        self.snapshot.load().members().cloned().collect()
    }

    /// Returns the current state of the ring.
    ///
    /// The snapshot is not affected by later membership changes, which makes
    /// it suitable for computing [`plan::transfers`] between two points in time.
    pub fn snapshot(&self) -> Arc<RingSnapshot<N>> {
        self.snapshot.load_full()
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    /// Returns `true` if the ring has no members.
    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    /// Returns the number of virtual nodes on the ring.
    pub fn vnode_count(&self) -> usize {
        self.snapshot.load().vnode_count()
    }

    /// Returns the number of virtual nodes generated per member.
    pub fn virtual_nodes(&self) -> u32 {
        self.virtual_nodes
    }

    /// Returns the hasher placing keys and virtual nodes.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }
}
