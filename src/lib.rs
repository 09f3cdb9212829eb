//! affinity-router: packet-to-rule affinity resolution
//!
//! Given a set of routing rules and an IPv4 packet description, this crate
//! picks the single rule the packet has the strongest affinity to.
//!
//! # Features
//!
//! - **Graded matching**: every attribute scores a packet as a miss, a
//!   wildcard hit or an exact hit
//! - **Configurable tie-breaking**: attributes are compared in the order of
//!   an [`AttributePriority`], with rules allowed to carry their own
//! - **Network specificity**: ties on address attributes go to the most
//!   specific matching network
//! - **Hot reload**: [`AffinityEngine`] swaps rule snapshots without
//!   blocking concurrent lookups
//!
//! # Resolution
//!
//! ```text
//! rules ──► discard any rule with a zero score
//!             │
//!             ▼
//!        for each key in priority:
//!            keep the highest scorers
//!            narrow strong address ties by network specificity
//!             │
//!             ▼
//!        lowest rule id wins
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use affinity_router::config::load_config;
//! use affinity_router::rules::{AffinityEngine, Packet, RuleIdSequence};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("/etc/affinity-router/config.json")?;
//! let snapshot = config.build_snapshot(&RuleIdSequence::new(), 1)?;
//! let engine = AffinityEngine::new(snapshot);
//!
//! let packet: Packet = "192.168.1.1,10.2.1.1,53,UDP".parse()?;
//! println!("{packet} => {}", engine.resolve(&packet));
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration types and loading
//! - [`error`]: Error types
//! - [`rules`]: Rule values, matching, resolution and the snapshot engine

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod rules;

// Re-export commonly used types at the crate root
pub use config::{Config, LogConfig, RuleConfig};
pub use error::{AffinityError, ConfigError, ResolveError, RuleError};
pub use rules::{
    AffinityEngine, AffinityResolver, AttributeKey, AttributeMatcher, AttributeOperator,
    AttributePriority, MatchResult, NetworkPrefix, Packet, PortRange, ResolveRequest,
    RoutingRule, RuleIdSequence, RuleSnapshot,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
