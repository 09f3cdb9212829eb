//! Configuration module for affinity-router
//!
//! This module provides configuration types and loading utilities.
//!
//! # Example
//!
//! ```no_run
//! use affinity_router::config::load_config;
//! use affinity_router::rules::{AffinityEngine, RuleIdSequence};
//!
//! let config = load_config("/etc/affinity-router/config.json").unwrap();
//! let snapshot = config.build_snapshot(&RuleIdSequence::new(), 1).unwrap();
//! let engine = AffinityEngine::new(snapshot);
//! println!("Loaded {} rules", engine.stats().rules);
//! ```

mod loader;
mod types;

pub use loader::{
    apply_env_overrides, create_default_config, load_config, load_config_str,
    load_config_with_env, ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_PRIORITY,
};
pub use types::{Config, LogConfig, PoolConfig, RuleConfig, ValueConfig};
