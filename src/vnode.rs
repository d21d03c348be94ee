use {
    crate::{KeyHasher, RingNode, RingPosition},
    std::{cmp::Ordering, fmt},
};

/// One position on the ring, representing a slice of a physical node's
/// ownership.
///
/// The position is a pure function of `(node, index)`: the hash of the label
/// `"{node}:{index}"`. Re-adding the same node therefore reproduces exactly
/// the same virtual nodes.
///
/// Virtual nodes are ordered by position, then by node, then by index. The
/// secondary keys only matter when two virtual nodes collide on the same
/// position, and make the outcome independent of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualNode<N> {
    node: N,
    index: u32,
    position: RingPosition,
}

impl<N: RingNode> VirtualNode<N> {
    /// Creates the `index`-th virtual node of `node`.
    pub fn new<H: KeyHasher + ?Sized>(hasher: &H, node: N, index: u32) -> Self {
        let position = hasher.hash(&label(&node, index));
        Self {
            node,
            index,
            position,
        }
    }

    /// Physical node owning this virtual node.
    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn position(&self) -> RingPosition {
        self.position
    }

    /// The string hashed to obtain the position.
    pub fn label(&self) -> String {
        label(&self.node, self.index)
    }
}

fn label<N: fmt::Display>(node: &N, index: u32) -> String {
    format!("{node}:{index}")
}

impl<N: RingNode> PartialOrd for VirtualNode<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<N: RingNode> Ord for VirtualNode<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.position
            .cmp(&other.position)
            .then_with(|| self.node.cmp(&other.node))
            .then_with(|| self.index.cmp(&other.index))
    }
}

impl<N: RingNode> fmt::Display for VirtualNode<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.label(), self.position)
    }
}
