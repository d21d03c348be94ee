use {crate::RingPosition, xxhash_rust::xxh3::xxh3_64_with_seed};

/// A hash function mapping string keys onto the ring.
///
/// Implementations must be deterministic across processes and restarts: the
/// same key (and seed) always lands on the same position. Both methods are
/// total, there is no input they can fail on.
pub trait KeyHasher: Send + Sync + 'static {
    /// Returns ring position for a given key.
    fn hash(&self, key: &str) -> RingPosition;

    /// Returns ring position for a given key, using an explicit seed.
    ///
    /// Different seeds yield, with overwhelming probability, different
    /// positions for the same key.
    fn hash_seeded(&self, key: &str, seed: u64) -> RingPosition;
}

/// Seed used when none is configured.
///
/// XXH3 with seed `0` is the plain, unseeded XXH3 digest.
pub const DEFAULT_SEED: u64 = 0;

/// Hasher backed by 64-bit XXH3, truncated to the low 32 bits.
///
/// Truncation bounds the digest to the ring's position type. The price is a
/// higher collision rate: across `n` distinct keys the expected number of
/// colliding pairs is about `n^2 / 2^33` (roughly 0.012 for 10,000 keys).
/// Colliding virtual nodes are not an error, the ring orders them by node id
/// and virtual index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Xxh3Hasher {
    seed: u64,
}

impl Default for Xxh3Hasher {
    fn default() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }
}

impl Xxh3Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a hasher whose `hash` uses the given seed.
    pub const fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    pub const fn seed(&self) -> u64 {
        self.seed
    }
}

impl KeyHasher for Xxh3Hasher {
    fn hash(&self, key: &str) -> RingPosition {
        self.hash_seeded(key, self.seed)
    }

    fn hash_seeded(&self, key: &str, seed: u64) -> RingPosition {
        // Low 32 bits only.
        xxh3_64_with_seed(key.as_bytes(), seed) as RingPosition
    }
}

/// Default hasher.
pub type DefaultHasher = Xxh3Hasher;

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashSet};

    #[test]
    fn deterministic() {
        let hasher = Xxh3Hasher::new();
        let key = "test:deterministic:key";
        assert_eq!(hasher.hash(key), hasher.hash(key));
        assert_eq!(Xxh3Hasher::new().hash(key), hasher.hash(key));
    }

    #[test]
    fn zero_seed_is_unseeded_digest() {
        let hasher = Xxh3Hasher::new();
        let key = "server:1:0";
        let unseeded = xxhash_rust::xxh3::xxh3_64(key.as_bytes()) as u32;
        assert_eq!(hasher.hash(key), unseeded);
        assert_eq!(hasher.hash_seeded(key, 0), unseeded);
    }

    #[test]
    fn seed_changes_output() {
        let hasher = Xxh3Hasher::new();
        let key = "server:1";
        let positions = (0..64u64)
            .map(|seed| hasher.hash_seeded(key, seed))
            .collect::<HashSet<_>>();
        assert_eq!(positions.len(), 64);

        let seeded = Xxh3Hasher::with_seed(42);
        assert_eq!(seeded.hash(key), hasher.hash_seeded(key, 42));
        assert_ne!(seeded.hash(key), hasher.hash(key));
    }

    #[test]
    fn empty_key() {
        let hasher = Xxh3Hasher::new();
        assert_eq!(hasher.hash(""), hasher.hash(""));
    }
}
