use {
    crate::{KeyRange, RingNode, RingPosition, VirtualNode},
    std::collections::BTreeSet,
};

/// Immutable state of the ring at one point in time.
///
/// Virtual nodes are kept sorted ascending by `(position, node, index)`.
/// Every member contributes the same number of virtual nodes. Snapshots are
/// never modified in place: a membership change builds a new snapshot and
/// swaps it in, so readers always observe a complete ring.
#[derive(Debug, Clone)]
pub struct RingSnapshot<N> {
    vnodes: Vec<VirtualNode<N>>,
    members: BTreeSet<N>,
}

impl<N: RingNode> Default for RingSnapshot<N> {
    fn default() -> Self {
        Self {
            vnodes: Vec::new(),
            members: BTreeSet::new(),
        }
    }
}

impl<N: RingNode> RingSnapshot<N> {
    /// Returns a copy of this snapshot with `node` and its virtual nodes added.
    pub(crate) fn with_node(&self, node: N, vnodes: Vec<VirtualNode<N>>) -> Self {
        let mut next = self.clone();
        next.vnodes.extend(vnodes);
        // Keys are unique per (node, index), so the order is total.
        next.vnodes.sort_unstable();
        next.members.insert(node);
        next
    }

    /// Returns a copy of this snapshot with every virtual node of `node` removed.
    pub(crate) fn without_node(&self, node: &N) -> Self {
        let mut members = self.members.clone();
        members.remove(node);
        Self {
            vnodes: self
                .vnodes
                .iter()
                .filter(|vnode| vnode.node() != node)
                .cloned()
                .collect(),
            members,
        }
    }

    /// Virtual nodes in ring order.
    pub fn vnodes(&self) -> &[VirtualNode<N>] {
        &self.vnodes
    }

    /// Physical members, in node order.
    pub fn members(&self) -> impl Iterator<Item = &N> {
        self.members.iter()
    }

    /// Returns `true` if `node` is a member.
    pub fn contains(&self, node: &N) -> bool {
        self.members.contains(node)
    }

    /// Number of physical members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if there are no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of virtual nodes across all members.
    pub fn vnode_count(&self) -> usize {
        self.vnodes.len()
    }

    /// Index of the virtual node serving `pos`: the first one at or after
    /// `pos`, wrapping around to the smallest position past the end.
    pub fn owner_index(&self, pos: RingPosition) -> Option<usize> {
        if self.vnodes.is_empty() {
            return None;
        }
        let idx = self.vnodes.partition_point(|vnode| vnode.position() < pos);
        Some(if idx == self.vnodes.len() { 0 } else { idx })
    }

    /// Virtual node serving `pos`, `None` on an empty ring.
    pub fn owner_of(&self, pos: RingPosition) -> Option<&VirtualNode<N>> {
        self.owner_index(pos).map(|idx| &self.vnodes[idx])
    }

    /// Range of positions served by the virtual node at `idx`.
    ///
    /// The range runs from the closest distinct position counter-clockwise up
    /// to and including the node's own position. A virtual node sharing its
    /// position with one ordered before it serves nothing, and `None` is
    /// returned. When every virtual node sits on the same position, the first
    /// one serves the whole ring.
    pub fn arc(&self, idx: usize) -> Option<KeyRange> {
        let pos = self.vnodes.get(idx)?.position();
        if idx > 0 {
            let prev = self.vnodes[idx - 1].position();
            return (prev != pos).then(|| KeyRange::new(prev, pos));
        }
        let last = self.vnodes.last()?.position();
        Some(KeyRange::new(last, pos))
    }

    /// Ranges of positions served by `node`, with adjacent ranges merged.
    ///
    /// Returns `None` if the node is not a member.
    pub fn intervals(&self, node: &N) -> Option<Vec<KeyRange>> {
        if !self.contains(node) {
            return None;
        }
        let arcs = self
            .vnodes
            .iter()
            .enumerate()
            .filter(|(_, vnode)| vnode.node() == node)
            .filter_map(|(idx, _)| self.arc(idx));
        Some(coalesce(arcs, |a, b| a.merged(b)))
    }
}

/// Merges neighbouring items of a sequence walked in ring order, including
/// the last item with the first one.
pub(crate) fn coalesce<T, I, F>(items: I, merge: F) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T, &T) -> Option<T>,
{
    let mut merged: Vec<T> = Vec::new();
    for item in items {
        match merged.last().and_then(|last| merge(last, &item)) {
            Some(joined) => {
                let last = merged.len() - 1;
                merged[last] = joined;
            }
            None => merged.push(item),
        }
    }
    if merged.len() > 1 {
        let last = merged.len() - 1;
        if let Some(joined) = merge(&merged[last], &merged[0]) {
            merged[0] = joined;
            merged.truncate(last);
        }
    }
    merged
}
