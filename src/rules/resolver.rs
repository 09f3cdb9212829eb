//! Affinity resolution
//!
//! [`AffinityResolver::resolve`] picks the rule a packet has the strongest
//! affinity with:
//!
//! 1. **Discard**: every rule scoring 0 on any attribute is dropped. If none
//!    survive the packet has no match.
//! 2. **Rank**: survivors are narrowed one priority key at a time to those
//!    with the best score on that key. For the two address keys, rules tied
//!    on a strong match are further narrowed by the network that matched:
//!    highest raw network address first, then shortest prefix length among
//!    those. Ranking stops as soon as one rule is left.
//! 3. **Tie-break**: if keys run out with several rules still tied, the rule
//!    with the lowest id wins.
//!
//! The resolver holds no state; concurrent calls over shared rules are safe.

use tracing::{debug, trace};

use super::packet::Packet;
use super::rule::RoutingRule;
use super::types::{AttributeKey, AttributePriority, Score, STRONG_MATCH_SCORE};
use crate::error::ResolveError;

/// Stateless affinity resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct AffinityResolver;

impl AffinityResolver {
    /// Create a resolver
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Pick the rule `packet` has the strongest affinity with
    ///
    /// Returns `None` when no rule matches every attribute at least weakly.
    ///
    /// # Panics
    ///
    /// Panics if `rules` or `priority` is empty. Both are caller bugs, not
    /// runtime conditions.
    ///
    /// # Examples
    ///
    /// ```
    /// use affinity_router::rules::{AffinityResolver, AttributePriority, Packet, RoutingRule, RuleIdSequence};
    ///
    /// let ids = RuleIdSequence::new();
    /// let rules = vec![
    ///     RoutingRule::builder()
    ///         .src_addresses(["10.0.0.0/8"])
    ///         .dst_address("10.2.1.0/31")
    ///         .protocol("TCP")
    ///         .dst_port("1-1024")
    ///         .build(&ids)
    ///         .unwrap(),
    ///     RoutingRule::builder()
    ///         .src_addresses(["10.0.0.0/8"])
    ///         .dst_address("10.2.1.1/32")
    ///         .protocol("TCP")
    ///         .dst_port("1-1024")
    ///         .build(&ids)
    ///         .unwrap(),
    /// ];
    ///
    /// let packet: Packet = "10.1.1.1,10.2.1.1,22,TCP".parse().unwrap();
    /// let winner = AffinityResolver::new()
    ///     .resolve(&rules, &AttributePriority::default(), &packet)
    ///     .unwrap();
    /// assert_eq!(winner.id(), 2);
    /// ```
    #[must_use]
    pub fn resolve<'r>(
        &self,
        rules: &'r [RoutingRule],
        priority: &AttributePriority,
        packet: &Packet,
    ) -> Option<&'r RoutingRule> {
        assert!(!rules.is_empty(), "affinity resolution requires at least one rule");
        assert!(
            !priority.is_empty(),
            "affinity resolution requires a non-empty attribute priority"
        );

        let survivors: Vec<&RoutingRule> = rules
            .iter()
            .filter(|rule| rule.matches_all(packet))
            .collect();

        debug!(
            packet = %packet,
            total = rules.len(),
            survivors = survivors.len(),
            "discard phase complete"
        );

        let winner = rank(survivors, priority.keys(), packet);
        match winner {
            Some(rule) => debug!(packet = %packet, rule_id = rule.id(), "resolved"),
            None => debug!(packet = %packet, "no matching rule"),
        }
        winner
    }
}

fn rank<'r>(
    mut candidates: Vec<&'r RoutingRule>,
    keys: &[AttributeKey],
    packet: &Packet,
) -> Option<&'r RoutingRule> {
    for &key in keys {
        if candidates.len() <= 1 {
            break;
        }
        candidates = leaders(candidates, key, packet);
        trace!(key = %key, remaining = candidates.len(), "ranked by attribute");
    }

    // lowest id settles whatever is still tied
    candidates.into_iter().min_by_key(|rule| rule.id())
}

/// Candidates with the best score on `key`
fn leaders<'r>(
    candidates: Vec<&'r RoutingRule>,
    key: AttributeKey,
    packet: &Packet,
) -> Vec<&'r RoutingRule> {
    let scored: Vec<(&RoutingRule, Score)> = candidates
        .into_iter()
        .map(|rule| (rule, rule.match_score(key, packet)))
        .collect();
    let Some(top) = scored.iter().map(|&(_, score)| score).max() else {
        return Vec::new();
    };

    let best: Vec<&RoutingRule> = scored
        .into_iter()
        .filter(|&(_, score)| score == top)
        .map(|(rule, _)| rule)
        .collect();

    if key.is_address() && top == STRONG_MATCH_SCORE && best.len() > 1 {
        most_specific(best, key, packet)
    } else {
        best
    }
}

/// Narrow address-tied candidates by the network that matched
///
/// Highest raw network address wins; among equal addresses the shortest
/// prefix length wins.
fn most_specific<'r>(
    candidates: Vec<&'r RoutingRule>,
    key: AttributeKey,
    packet: &Packet,
) -> Vec<&'r RoutingRule> {
    let Some(networks) = candidates
        .iter()
        .map(|rule| rule.matcher(key).matching_network(packet))
        .collect::<Option<Vec<_>>>()
    else {
        return candidates;
    };

    let Some(top_address) = networks.iter().map(|net| net.address).max() else {
        return candidates;
    };
    let Some(min_prefix) = networks
        .iter()
        .filter(|net| net.address == top_address)
        .map(|net| net.prefix_len)
        .min()
    else {
        return candidates;
    };

    candidates
        .into_iter()
        .zip(networks)
        .filter(|(_, net)| net.address == top_address && net.prefix_len == min_prefix)
        .map(|(rule, _)| rule)
        .collect()
}

/// Resolution call whose inputs may be left unset
///
/// Mirrors [`AffinityResolver::resolve`] but reports a missing rule set or
/// priority as [`ResolveError::InvalidArgument`] instead of requiring both
/// at compile time.
///
/// # Examples
///
/// ```
/// use affinity_router::error::ResolveError;
/// use affinity_router::rules::{Packet, ResolveRequest};
///
/// let packet: Packet = "1.1.1.1,2.2.2.2,53,UDP".parse().unwrap();
/// let err = ResolveRequest::new(&packet).resolve().unwrap_err();
/// assert_eq!(err, ResolveError::InvalidArgument("rules"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    packet: &'a Packet,
    rules: Option<&'a [RoutingRule]>,
    priority: Option<&'a AttributePriority>,
    resolver: AffinityResolver,
}

impl<'a> ResolveRequest<'a> {
    /// Start a request for `packet`
    #[must_use]
    pub const fn new(packet: &'a Packet) -> Self {
        Self {
            packet,
            rules: None,
            priority: None,
            resolver: AffinityResolver,
        }
    }

    /// Candidate rules
    #[must_use]
    pub const fn rules(mut self, rules: &'a [RoutingRule]) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Ranking order
    #[must_use]
    pub const fn priority(mut self, priority: &'a AttributePriority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Run the resolution
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::InvalidArgument` if the rules or the priority
    /// were never set.
    ///
    /// # Panics
    ///
    /// Panics if either was set but is empty.
    pub fn resolve(self) -> Result<Option<&'a RoutingRule>, ResolveError> {
        let rules = self.rules.ok_or(ResolveError::InvalidArgument("rules"))?;
        let priority = self
            .priority
            .ok_or(ResolveError::InvalidArgument("priority"))?;
        Ok(self.resolver.resolve(rules, priority, self.packet))
    }
}
