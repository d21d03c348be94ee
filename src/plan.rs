//! Ownership changes between two states of the ring.
//!
//! When a node joins, each of its virtual nodes takes over the range
//! `(predecessor, position]` from whichever node served `position` before.
//! When a node leaves, each of its ranges `(predecessor, position]` goes to
//! the node now serving `position`. Everything else keeps its owner, so only
//! keys hashing into the listed ranges need to be copied.

use {
    crate::{snapshot::coalesce, KeyRange, RingNode, RingPosition, RingSnapshot},
    std::fmt,
};

/// A range of positions changing hands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer<N> {
    /// Affected positions.
    pub range: KeyRange,
    /// Node serving the range before the change.
    pub from: N,
    /// Node serving the range after the change.
    pub to: N,
}

impl<N: RingNode> fmt::Display for Transfer<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}] {} -> {}",
            self.range.start, self.range.end, self.from, self.to
        )
    }
}

/// Every range that changed owner during a membership change.
///
/// Empty when nothing has to move, including the first node joining an empty
/// ring (there is no data yet) and the last node leaving (there is nowhere to
/// move it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebalance<N> {
    transfers: Vec<Transfer<N>>,
}

impl<N> Default for Rebalance<N> {
    fn default() -> Self {
        Self {
            transfers: Vec::new(),
        }
    }
}

impl<N: RingNode> Rebalance<N> {
    pub fn transfers(&self) -> &[Transfer<N>] {
        &self.transfers
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// The transfer covering `pos`, if that position changed owner.
    pub fn transfer_for(&self, pos: RingPosition) -> Option<&Transfer<N>> {
        self.transfers
            .iter()
            .find(|transfer| transfer.range.contains(&pos))
    }

    /// Returns `true` if keys hashing to `pos` must move.
    pub fn is_affected(&self, pos: RingPosition) -> bool {
        self.transfer_for(pos).is_some()
    }

    /// Total number of positions changing owner.
    pub fn moved_positions(&self) -> u64 {
        self.transfers
            .iter()
            .map(|transfer| transfer.range.size())
            .sum()
    }
}

impl<N> IntoIterator for Rebalance<N> {
    type Item = Transfer<N>;
    type IntoIter = std::vec::IntoIter<Transfer<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.transfers.into_iter()
    }
}

/// Computes the ranges whose owner differs between `before` and `after`.
///
/// Both snapshots must have been built with the same hasher. The positions of
/// both rings split the hash space into segments on which each ring has a
/// single owner; segments with differing owners are reported, and adjacent
/// ones moving between the same pair of nodes are merged.
pub fn transfers<N: RingNode>(before: &RingSnapshot<N>, after: &RingSnapshot<N>) -> Rebalance<N> {
    if before.is_empty() || after.is_empty() {
        return Rebalance::default();
    }

    let mut bounds = before
        .vnodes()
        .iter()
        .chain(after.vnodes())
        .map(|vnode| vnode.position())
        .collect::<Vec<_>>();
    bounds.sort_unstable();
    bounds.dedup();

    let segments = bounds.iter().enumerate().filter_map(|(i, &end)| {
        let start = if i == 0 { bounds[bounds.len() - 1] } else { bounds[i - 1] };
        let from = before.owner_of(end)?.node();
        let to = after.owner_of(end)?.node();
        (from != to).then(|| Transfer {
            range: KeyRange::new(start, end),
            from: from.clone(),
            to: to.clone(),
        })
    });

    let transfers = coalesce(segments, |a, b| {
        if a.from != b.from || a.to != b.to || !a.range.is_continuous(&b.range) {
            return None;
        }
        a.range.merged(&b.range).map(|range| Transfer {
            range,
            from: a.from.clone(),
            to: a.to.clone(),
        })
    });

    Rebalance { transfers }
}
