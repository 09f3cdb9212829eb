//! Hot-reloadable affinity engine.
//!
//! The engine holds an immutable [`RuleSnapshot`] behind `ArcSwap`, so
//! resolutions never block and a new rule set can be swapped in while
//! resolutions are in flight. Matchers are never mutated once a snapshot is
//! built; updates always go through a new snapshot.
//!
//! ```text
//! Packet -> AffinityEngine::resolve() -> ArcSwap::load() -> RuleSnapshot -> AffinityResolver
//!                                              |
//!                                       (lock-free read)
//!
//! Reload -> AffinityEngine::reload() -> ArcSwap::store() -> old snapshot dropped
//!                                             |                when readers finish
//!                                       (atomic swap)
//! ```
//!
//! # Example
//!
//! ```
//! use affinity_router::rules::engine::{AffinityEngine, RuleSnapshotBuilder};
//! use affinity_router::rules::{Packet, RoutingRule, RuleIdSequence};
//!
//! let ids = RuleIdSequence::new();
//! let rule = RoutingRule::builder()
//!     .src_addresses(["192.168.1.0/24"])
//!     .dst_address("10.2.1.1/32")
//!     .protocol("UDP")
//!     .dst_port("1-1024")
//!     .tag("office")
//!     .build(&ids)
//!     .unwrap();
//!
//! let mut builder = RuleSnapshotBuilder::new();
//! builder.add_rule(rule);
//! let engine = AffinityEngine::new(builder.version(1).build().unwrap());
//!
//! let packet: Packet = "192.168.1.1,10.2.1.1,21,UDP".parse().unwrap();
//! let result = engine.resolve(&packet);
//! assert_eq!(result.tag.as_deref(), Some("office"));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use tracing::{debug, info};

use super::packet::Packet;
use super::prefix::NetworkPrefix;
use super::resolver::AffinityResolver;
use super::rule::RoutingRule;
use super::types::AttributePriority;
use crate::error::RuleError;

/// Hot-reloadable affinity engine.
pub struct AffinityEngine {
    /// Current rule set (lock-free reads via `ArcSwap`).
    snapshot: ArcSwap<RuleSnapshot>,
}

impl AffinityEngine {
    /// Create a new engine with an initial snapshot.
    #[must_use]
    pub fn new(snapshot: RuleSnapshot) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(snapshot),
        }
    }

    /// Get the current snapshot (lock-free read).
    ///
    /// The returned `Guard` keeps the snapshot alive, which gives a batch
    /// of resolutions a consistent rule set.
    pub fn load(&self) -> Guard<Arc<RuleSnapshot>> {
        self.snapshot.load()
    }

    /// Swap in a new snapshot.
    ///
    /// The old snapshot is dropped when all readers finish using it.
    ///
    /// # Example
    ///
    /// ```
    /// use affinity_router::rules::engine::{AffinityEngine, RuleSnapshot, RuleSnapshotBuilder};
    ///
    /// let engine = AffinityEngine::new(RuleSnapshot::empty());
    /// engine.reload(RuleSnapshotBuilder::new().version(2).build().unwrap());
    /// assert_eq!(engine.version(), 2);
    /// ```
    pub fn reload(&self, new_snapshot: RuleSnapshot) {
        let old = self.snapshot.swap(Arc::new(new_snapshot));
        let current = self.snapshot.load();
        info!(
            old_version = old.version,
            new_version = current.version,
            rules = current.rules.len(),
            "rule snapshot reloaded"
        );
    }

    /// Resolve a packet against the current snapshot.
    ///
    /// Lock-free and safe to call from multiple threads.
    #[must_use]
    pub fn resolve(&self, packet: &Packet) -> MatchResult {
        let snapshot = self.snapshot.load();
        Self::resolve_with_snapshot(&snapshot, packet)
    }

    /// Resolve using a specific snapshot (for batch processing).
    #[must_use]
    pub fn resolve_with_snapshot(snapshot: &RuleSnapshot, packet: &Packet) -> MatchResult {
        if snapshot.rules.is_empty() {
            debug!(packet = %packet, version = snapshot.version, "empty snapshot, no match");
            return MatchResult::no_match(snapshot.version);
        }

        AffinityResolver::new()
            .resolve(&snapshot.rules, &snapshot.priority, packet)
            .map_or_else(
                || MatchResult::no_match(snapshot.version),
                |rule| MatchResult::matched(rule, snapshot.version),
            )
    }

    /// Get current snapshot version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.snapshot.load().version
    }

    /// Get statistics about the current snapshot.
    #[must_use]
    pub fn stats(&self) -> SnapshotStats {
        self.snapshot.load().stats()
    }
}

impl fmt::Debug for AffinityEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot.load();
        f.debug_struct("AffinityEngine")
            .field("version", &snapshot.version)
            .field("rules", &snapshot.rules.len())
            .field("priority", &snapshot.priority.to_string())
            .finish()
    }
}

/// Outcome of resolving one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Id of the winning rule; `None` means no rule matched.
    pub rule_id: Option<u64>,

    /// Tag of the winning rule, if it has one.
    pub tag: Option<String>,

    /// Destination network of the winning rule.
    pub destination: Option<NetworkPrefix>,

    /// Version of the snapshot that produced this result.
    pub version: u64,
}

impl MatchResult {
    fn matched(rule: &RoutingRule, version: u64) -> Self {
        Self {
            rule_id: Some(rule.id()),
            tag: rule.tag().map(str::to_string),
            destination: Some(rule.destination()),
            version,
        }
    }

    fn no_match(version: u64) -> Self {
        Self {
            rule_id: None,
            tag: None,
            destination: None,
            version,
        }
    }

    /// Check if no rule matched.
    #[must_use]
    pub const fn is_no_match(&self) -> bool {
        self.rule_id.is_none()
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.rule_id, &self.destination) {
            (Some(id), Some(destination)) => {
                write!(f, "rule #{id}")?;
                if let Some(tag) = &self.tag {
                    write!(f, " ({tag})")?;
                }
                write!(f, " -> {destination}")
            }
            _ => write!(f, "no match"),
        }
    }
}

/// Immutable rule set used for resolution.
///
/// Designed to be wrapped in `Arc` and swapped atomically.
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    /// Candidate rules, in id order.
    pub rules: Vec<RoutingRule>,

    /// Ranking order applied to every resolution.
    pub priority: AttributePriority,

    /// Snapshot version (for debugging/logging).
    pub version: u64,
}

impl RuleSnapshot {
    /// Create a snapshot without rules and with the default priority.
    ///
    /// ```
    /// use affinity_router::rules::engine::RuleSnapshot;
    ///
    /// let snapshot = RuleSnapshot::empty();
    /// assert!(snapshot.rules.is_empty());
    /// assert_eq!(snapshot.version, 0);
    /// ```
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            priority: AttributePriority::default_order(),
            version: 0,
        }
    }

    /// Get summary statistics about this snapshot.
    #[must_use]
    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            rules: self.rules.len(),
            rules_with_priority_override: self
                .rules
                .iter()
                .filter(|rule| rule.priority_override().is_some())
                .count(),
            tagged_rules: self.rules.iter().filter(|rule| rule.tag().is_some()).count(),
            version: self.version,
        }
    }
}

/// Statistics about a rule snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotStats {
    /// Number of rules.
    pub rules: usize,

    /// Rules carrying their own priority ordering.
    pub rules_with_priority_override: usize,

    /// Rules with a tag.
    pub tagged_rules: usize,

    /// Snapshot version.
    pub version: u64,
}

/// Builder for [`RuleSnapshot`].
#[derive(Debug, Default)]
pub struct RuleSnapshotBuilder {
    rules: Vec<RoutingRule>,
    priority: AttributePriority,
    version: u64,
}

impl RuleSnapshotBuilder {
    /// Create a builder with the default priority and version 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ranking order.
    #[must_use]
    pub fn priority(mut self, priority: AttributePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the snapshot version.
    #[must_use]
    pub fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Add a rule.
    pub fn add_rule(&mut self, rule: RoutingRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// Add several rules.
    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = RoutingRule>) -> &mut Self {
        self.rules.extend(rules);
        self
    }

    /// Build the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RuleError::EmptyPriority` if the priority has no keys and
    /// `RuleError::DuplicateRuleId` if two rules share an id.
    pub fn build(mut self) -> Result<RuleSnapshot, RuleError> {
        if self.priority.is_empty() {
            return Err(RuleError::EmptyPriority);
        }

        let mut seen = HashSet::with_capacity(self.rules.len());
        for rule in &self.rules {
            if !seen.insert(rule.id()) {
                return Err(RuleError::DuplicateRuleId(rule.id()));
            }
        }
        self.rules.sort_by_key(RoutingRule::id);

        Ok(RuleSnapshot {
            rules: self.rules,
            priority: self.priority,
            version: self.version,
        })
    }
}
