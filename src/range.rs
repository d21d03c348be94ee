use {crate::RingPosition, num_traits::Bounded, std::fmt::Debug};

/// A range of ring positions, open below and closed above i.e.
/// `(start..end]`.
///
/// This matches how keys are owned: a virtual node at `end` serves every key
/// hashing past its counter-clockwise neighbour at `start`, up to and including
/// its own position.
///
/// If `start > end`, the range is wrapping and is equivalent to the union of
/// `(start..MAX_VALUE]` and `[0..end]`. If `start == end`, the range covers the
/// whole ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyRange<Idx = RingPosition>
where
    Idx: Bounded,
{
    pub start: Idx,
    pub end: Idx,
}

impl<Idx: Bounded> KeyRange<Idx> {
    /// Creates a new range.
    pub fn new(start: Idx, end: Idx) -> Self {
        Self { start, end }
    }

    /// Creates a range covering every position.
    pub fn whole() -> Self {
        Self::new(Idx::min_value(), Idx::min_value())
    }
}

impl<Idx> KeyRange<Idx>
where
    Idx: Copy + Debug + Bounded + Ord,
{
    /// Returns `true` if the range crosses the origin.
    ///
    /// A range starting at `MAX_VALUE` is inverted but does not wrap: it is
    /// exactly `[0..end]`.
    pub fn is_wrapping(&self) -> bool {
        self.start > self.end && self.start != Idx::max_value()
    }

    /// Returns `true` if the range covers the whole ring.
    pub fn covers_whole_ring(&self) -> bool {
        self.start == self.end
    }

    /// Returns `true` if `item` is contained in the range.
    pub fn contains(&self, item: &Idx) -> bool {
        match self.start.cmp(&self.end) {
            std::cmp::Ordering::Equal => true,
            std::cmp::Ordering::Less => self.start < *item && *item <= self.end,
            std::cmp::Ordering::Greater => self.start < *item || *item <= self.end,
        }
    }

    /// Returns `true` if the range overlaps with `other`.
    pub fn is_overlapping(&self, other: &Self) -> bool {
        self.contains(&other.end) || other.contains(&self.end)
    }

    /// Returns `true` if one range is a continuation of the other.
    ///
    /// That's intervals do not intersect, but can be merged i.e. for given
    /// intervals (a, b] and (b, c] the union is (a, c].
    pub fn is_continuous(&self, other: &Self) -> bool {
        if self.covers_whole_ring() || other.covers_whole_ring() {
            return false;
        }
        self.end == other.start || other.end == self.start
    }

    /// Returns the union of `self` and `other` if they form a single interval,
    /// `None` otherwise.
    ///
    /// A union spanning every position is always returned as `(0..0]`.
    pub fn merged(&self, other: &Self) -> Option<Self> {
        if self.covers_whole_ring() || other.covers_whole_ring() {
            return Some(Self::whole());
        }
        if !(self.is_overlapping(other) || self.is_continuous(other)) {
            return None;
        }

        // Each start lies inside the other range: nothing is left uncovered.
        if self.contains(&other.start) && other.contains(&self.start) {
            return Some(Self::whole());
        }

        let start = if other.contains(&self.start) || self.start == other.end {
            other.start
        } else {
            self.start
        };
        let end = if (other.contains(&self.end) || self.end == other.start)
            && self.end != other.end
        {
            other.end
        } else {
            self.end
        };

        if start == end {
            Some(Self::whole())
        } else {
            Some(Self::new(start, end))
        }
    }
}

impl KeyRange<RingPosition> {
    /// Number of positions in the range.
    pub fn size(&self) -> u64 {
        if self.covers_whole_ring() {
            u64::from(RingPosition::MAX) + 1
        } else {
            u64::from(self.end.wrapping_sub(self.start))
        }
    }
}
