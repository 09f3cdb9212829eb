//! Routing rules
//!
//! A [`RoutingRule`] owns one [`AttributeMatcher`] per [`AttributeKey`], an id
//! drawn from a [`RuleIdSequence`] and an optional priority override. Rules
//! are assembled with [`RoutingRuleBuilder`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::matcher::{AttributeMatcher, AttributeValue};
use super::packet::Packet;
use super::prefix::NetworkPrefix;
use super::types::{AttributeKey, AttributeOperator, AttributePriority, Score, NO_MATCH_SCORE};
use crate::error::RuleError;

/// Monotonic rule id generator
///
/// Ids start at 1 and increase by one per rule. Increments are atomic, so
/// rules may be built from several threads without losing uniqueness.
#[derive(Debug)]
pub struct RuleIdSequence {
    next: AtomicU64,
}

impl RuleIdSequence {
    /// Create a sequence starting at 1
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a sequence whose first id is `first`
    #[must_use]
    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Take the next id
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Id the next call will return
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for RuleIdSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// A routing rule: four matchers, an identity and a ranking order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRule {
    id: u64,
    src_addresses: AttributeMatcher,
    dst_address: AttributeMatcher,
    protocol: AttributeMatcher,
    dst_port: AttributeMatcher,
    priority: Option<AttributePriority>,
    tag: Option<String>,
}

impl RoutingRule {
    /// Start building a rule
    #[must_use]
    pub fn builder() -> RoutingRuleBuilder {
        RoutingRuleBuilder::new()
    }

    /// Creation-order identity; lower ids win the final tie-break
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Optional human-readable label
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Matcher for `key`
    #[must_use]
    pub const fn matcher(&self, key: AttributeKey) -> &AttributeMatcher {
        match key {
            AttributeKey::SourceAddresses => &self.src_addresses,
            AttributeKey::DestinationAddress => &self.dst_address,
            AttributeKey::Protocol => &self.protocol,
            AttributeKey::DestinationPort => &self.dst_port,
        }
    }

    fn matcher_mut(&mut self, key: AttributeKey) -> &mut AttributeMatcher {
        match key {
            AttributeKey::SourceAddresses => &mut self.src_addresses,
            AttributeKey::DestinationAddress => &mut self.dst_address,
            AttributeKey::Protocol => &mut self.protocol,
            AttributeKey::DestinationPort => &mut self.dst_port,
        }
    }

    /// Score of `packet` on one attribute
    #[must_use]
    pub fn match_score(&self, key: AttributeKey, packet: &Packet) -> Score {
        self.matcher(key).score(packet)
    }

    /// Check that every attribute scores above zero
    #[must_use]
    pub fn matches_all(&self, packet: &Packet) -> bool {
        AttributeKey::ALL
            .iter()
            .all(|&key| self.match_score(key, packet) != NO_MATCH_SCORE)
    }

    /// The rule's override if set, else the global default ordering
    #[must_use]
    pub fn default_priority(&self) -> AttributePriority {
        self.priority
            .clone()
            .unwrap_or_else(AttributePriority::default_order)
    }

    /// The per-rule override, if any
    #[must_use]
    pub const fn priority_override(&self) -> Option<&AttributePriority> {
        self.priority.as_ref()
    }

    /// Destination network this rule routes to
    ///
    /// # Panics
    ///
    /// Never: the builder only accepts a single network for the destination.
    #[must_use]
    pub fn destination(&self) -> NetworkPrefix {
        match self.dst_address.value() {
            AttributeValue::Network(prefix) => *prefix,
            other => unreachable!("destination holds a {} value", other.kind()),
        }
    }

    /// Change the operator of one attribute before the rule is used
    ///
    /// # Errors
    ///
    /// See [`AttributeMatcher::set_operator`].
    pub fn set_operator(
        &mut self,
        key: AttributeKey,
        operator: AttributeOperator,
    ) -> Result<(), RuleError> {
        self.matcher_mut(key).set_operator(operator)
    }

    /// Change the value of one attribute before the rule is used
    ///
    /// # Errors
    ///
    /// See [`AttributeMatcher::set_value`].
    pub fn set_value(&mut self, key: AttributeKey, value: AttributeValue) -> Result<(), RuleError> {
        self.matcher_mut(key).set_value(value)
    }

    /// Replace the per-rule priority override
    pub fn set_priority(&mut self, priority: Option<AttributePriority>) {
        self.priority = priority;
    }
}

impl fmt::Display for RoutingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule #{}", self.id)?;
        if let Some(tag) = &self.tag {
            write!(f, " ({tag})")?;
        }
        write!(
            f,
            ": {}; {}; {}; {}",
            self.src_addresses, self.dst_address, self.protocol, self.dst_port
        )
    }
}

/// Builder for [`RoutingRule`]
///
/// Source addresses default to `Contains` over the given pool; the other
/// three attributes default to `Matches`. Use [`RoutingRuleBuilder::operator`]
/// to relax any of them to `Any`.
///
/// # Examples
///
/// ```
/// use affinity_router::rules::{AttributeKey, AttributeOperator, Packet, RoutingRule, RuleIdSequence};
///
/// let ids = RuleIdSequence::new();
/// let rule = RoutingRule::builder()
///     .src_addresses(["192.168.1.0/24", "10.1.0.0/16"])
///     .dst_address("10.2.1.1/32")
///     .protocol("UDP")
///     .dst_port("1-1024")
///     .operator(AttributeKey::DestinationAddress, AttributeOperator::Any)
///     .build(&ids)
///     .unwrap();
///
/// assert_eq!(rule.id(), 1);
/// let packet: Packet = "192.168.1.1,10.2.1.2,21,UDP".parse().unwrap();
/// assert!(rule.matches_all(&packet));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RoutingRuleBuilder {
    src_addresses: Option<Vec<String>>,
    dst_address: Option<String>,
    protocol: Option<String>,
    dst_port: Option<String>,
    operators: Vec<(AttributeKey, AttributeOperator)>,
    priority: Option<AttributePriority>,
    tag: Option<String>,
}

impl RoutingRuleBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Source networks in CIDR form
    #[must_use]
    pub fn src_addresses<I, S>(mut self, networks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.src_addresses = Some(networks.into_iter().map(Into::into).collect());
        self
    }

    /// Destination network in CIDR form
    #[must_use]
    pub fn dst_address(mut self, network: impl Into<String>) -> Self {
        self.dst_address = Some(network.into());
        self
    }

    /// Protocol token
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Destination port or `begin-end` range
    #[must_use]
    pub fn dst_port(mut self, ports: impl Into<String>) -> Self {
        self.dst_port = Some(ports.into());
        self
    }

    /// Override the operator for one attribute
    #[must_use]
    pub fn operator(mut self, key: AttributeKey, operator: AttributeOperator) -> Self {
        self.operators.retain(|(k, _)| *k != key);
        self.operators.push((key, operator));
        self
    }

    /// Per-rule priority override
    #[must_use]
    pub fn priority(mut self, priority: AttributePriority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Human-readable label
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Assemble the rule, taking its id from `ids`
    ///
    /// An id is drawn only when every attribute is valid.
    ///
    /// # Errors
    ///
    /// - `RuleError::MissingAttribute` if a value was never set
    /// - parsing errors for malformed CIDR, port or protocol text
    /// - `RuleError::OperatorMismatch` for operators the value cannot take
    pub fn build(self, ids: &RuleIdSequence) -> Result<RoutingRule, RuleError> {
        let src_addresses = self.build_src_addresses()?;
        let dst_address = self.build_scalar(AttributeKey::DestinationAddress, self.dst_address.as_deref())?;
        let protocol = self.build_scalar(AttributeKey::Protocol, self.protocol.as_deref())?;
        let dst_port = self.build_scalar(AttributeKey::DestinationPort, self.dst_port.as_deref())?;

        Ok(RoutingRule {
            id: ids.next_id(),
            src_addresses,
            dst_address,
            protocol,
            dst_port,
            priority: self.priority,
            tag: self.tag,
        })
    }

    fn operator_for(&self, key: AttributeKey, default: AttributeOperator) -> AttributeOperator {
        self.operators
            .iter()
            .find(|(k, _)| *k == key)
            .map_or(default, |(_, op)| *op)
    }

    fn build_src_addresses(&self) -> Result<AttributeMatcher, RuleError> {
        let key = AttributeKey::SourceAddresses;
        let networks = self
            .src_addresses
            .as_ref()
            .ok_or(RuleError::MissingAttribute(key))?;
        let operator = self.operator_for(key, AttributeOperator::Contains);

        // a single network may be matched directly
        if operator == AttributeOperator::Matches {
            if let [network] = networks.as_slice() {
                return AttributeMatcher::matches(key, AttributeValue::parse(key, network)?);
            }
        }

        let values = networks
            .iter()
            .map(|network| AttributeValue::parse(key, network))
            .collect::<Result<Vec<_>, _>>()?;
        let mut matcher = AttributeMatcher::pool(key, values)?;
        matcher.set_operator(operator)?;
        Ok(matcher)
    }

    fn build_scalar(
        &self,
        key: AttributeKey,
        text: Option<&str>,
    ) -> Result<AttributeMatcher, RuleError> {
        let text = text.ok_or(RuleError::MissingAttribute(key))?;
        let value = AttributeValue::parse(key, text)?;
        AttributeMatcher::new(key, self.operator_for(key, AttributeOperator::Matches), value)
    }
}
