use {
    crate::{RingError, DEFAULT_SEED},
    serde::{Deserialize, Serialize},
};

/// Default number of virtual nodes per physical node.
///
/// With 100 virtual nodes the share of any physical node stays within about
/// 10% of `1/N`; 200 brings it to about 5%.
pub const DEFAULT_VIRTUAL_NODES: u32 = 100;

/// Ring settings, typically loaded from the service configuration file.
///
/// Every field has a default, so an empty document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RingConfig {
    /// Virtual nodes generated for each physical node.
    pub virtual_nodes: u32,

    /// Seed of the key hasher. Every process sharing a ring must agree on it.
    pub seed: u64,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
            seed: DEFAULT_SEED,
        }
    }
}

impl RingConfig {
    pub fn validate(&self) -> Result<(), RingError> {
        if self.virtual_nodes == 0 {
            return Err(RingError::InvalidConfig(
                "virtual_nodes must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
