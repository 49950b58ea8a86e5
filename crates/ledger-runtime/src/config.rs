//! Ledger Configuration

use crate::{error::ConfigError, Amount};
use serde::{Deserialize, Serialize};

/// Tunables of a ledger instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Transactions a node holds before it subdivides (`C`)
    pub node_capacity: usize,
    /// Credited to the foundational wallet by founder onboarding
    pub founder_grant: Amount,
    /// Credited to each wallet created by standard onboarding
    pub standard_grant: Amount,
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !self.founder_grant.is_positive() {
            return Err(ConfigError::FounderGrant(self.founder_grant));
        }
        if !self.standard_grant.is_positive() {
            return Err(ConfigError::StandardGrant(self.standard_grant));
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            node_capacity: crate::DEFAULT_NODE_CAPACITY,
            founder_grant: Amount::from_units(crate::FOUNDER_GRANT),
            standard_grant: Amount::from_units(crate::STANDARD_GRANT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.node_capacity, 3);
        assert_eq!(config.founder_grant, Amount::from_units(100));
        assert_eq!(config.standard_grant, Amount::from_units(10));
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = LedgerConfig {
            node_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));

        let config = LedgerConfig {
            standard_grant: Amount::ZERO,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::StandardGrant(Amount::ZERO)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LedgerConfig = serde_json::from_str(r#"{"node_capacity": 9}"#).unwrap();
        assert_eq!(config.node_capacity, 9);
        assert_eq!(config.founder_grant, Amount::from_units(100));
    }
}
