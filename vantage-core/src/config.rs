//! Centralized configuration for Vantage.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

/// Central configuration for all Vantage core components.
///
/// Groups related configuration settings into logical sections. Constructed
/// explicitly by process startup and passed to the components that need it;
/// there is no process-wide configuration singleton.
#[derive(Debug, Clone, Default)]
pub struct VantageConfig {
    pub pool: PoolConfig,
    pub protocol: ProtocolConfig,
}

/// Worker pool sizing and backpressure configuration.
///
/// Controls eager startup size, the soft growth cap, idle-worker
/// reclamation, and the queue-depth backpressure threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Workers started eagerly at construction; the pool never shrinks
    /// below this count except during shutdown
    pub min_workers: usize,
    /// Soft cap on pool growth, enforced by the growth routine itself
    pub max_workers: usize,
    /// Idle duration after which a worker becomes a reclamation candidate
    pub max_idle: Duration,
    /// Queue length at which submissions are rejected with backpressure
    pub max_queue_depth: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_workers: 8,
            max_workers: 16,
            max_idle: Duration::from_millis(60_000),
            max_queue_depth: 256,
        }
    }
}

impl PoolConfig {
    /// Creates a small, fast-reclaiming configuration for deterministic tests.
    ///
    /// Two eager workers, growth capped at four, 50 ms idle reclamation and
    /// a two-deep queue make growth, shrink, and backpressure all observable
    /// within a few milliseconds.
    pub fn for_testing() -> Self {
        Self {
            min_workers: 2,
            max_workers: 4,
            max_idle: Duration::from_millis(50),
            max_queue_depth: 2,
        }
    }
}

/// Packet dispatch registry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Dispatch table capacity; every registered opcode must be below this
    pub dispatch_capacity: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            // Full single-byte opcode space
            dispatch_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_config_matches_documented_defaults() {
        let config = PoolConfig::default();

        assert_eq!(config.min_workers, 8);
        assert_eq!(config.max_workers, 16);
        assert_eq!(config.max_idle, Duration::from_millis(60_000));
        assert_eq!(config.max_queue_depth, 256);
    }

    #[test]
    fn test_testing_config_is_smaller_than_defaults() {
        let config = PoolConfig::for_testing();

        assert!(config.min_workers < PoolConfig::default().min_workers);
        assert!(config.max_idle < PoolConfig::default().max_idle);
        assert!(config.max_queue_depth < PoolConfig::default().max_queue_depth);
    }
}
