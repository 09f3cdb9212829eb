//! Affinity rule engine
//!
//! This module provides:
//! - Value types: [`NetworkPrefix`], [`PortRange`], [`Packet`]
//! - Per-attribute scoring: [`AttributeMatcher`]
//! - Rules and their identity: [`RoutingRule`], [`RuleIdSequence`]
//! - The resolution algorithm: [`AffinityResolver`]
//! - A hot-reloadable holder for rule sets: [`engine::AffinityEngine`]
//!
//! # Scoring
//!
//! Each rule scores a packet on four attributes. A wildcard (`Any`) match
//! scores 1, an exact match scores 2 and a miss scores 0. A rule with any
//! zero score is discarded; survivors are ranked key by key in the order of
//! an [`AttributePriority`], with network specificity deciding ties on the
//! address keys and the lowest rule id deciding whatever is left.
//!
//! # Example
//!
//! ```
//! use affinity_router::rules::{AffinityResolver, AttributePriority, Packet, RoutingRule, RuleIdSequence};
//!
//! let ids = RuleIdSequence::new();
//! let rules = vec![
//!     RoutingRule::builder()
//!         .src_addresses(["192.168.1.0/24", "10.1.0.0/16", "172.0.0.0/8", "8.8.8.8/32"])
//!         .dst_address("10.2.1.1/32")
//!         .protocol("UDP")
//!         .dst_port("1-1024")
//!         .build(&ids)
//!         .unwrap(),
//! ];
//!
//! let resolver = AffinityResolver::new();
//! let priority = AttributePriority::default();
//!
//! let hit: Packet = "192.168.1.1,10.2.1.1,21,UDP".parse().unwrap();
//! assert_eq!(resolver.resolve(&rules, &priority, &hit).map(RoutingRule::id), Some(1));
//!
//! let miss: Packet = "192.168.1.1,10.2.1.2,21,UDP".parse().unwrap();
//! assert!(resolver.resolve(&rules, &priority, &miss).is_none());
//! ```

pub mod engine;
pub mod matcher;
pub mod packet;
pub mod ports;
pub mod prefix;
pub mod resolver;
pub mod rule;
pub mod types;

pub use engine::{AffinityEngine, MatchResult, RuleSnapshot, RuleSnapshotBuilder, SnapshotStats};
pub use matcher::{AttributeMatcher, AttributeValue};
pub use packet::Packet;
pub use ports::{PortRange, PortRangeDifference};
pub use prefix::{is_address_in_network, parse_cidr, NetworkPrefix, MAX_PREFIX_LEN};
pub use resolver::{AffinityResolver, ResolveRequest};
pub use rule::{RoutingRule, RoutingRuleBuilder, RuleIdSequence};
pub use types::{
    AttributeKey, AttributeOperator, AttributePriority, Score, NO_MATCH_SCORE, STRONG_MATCH_SCORE,
    WEAK_MATCH_SCORE,
};
