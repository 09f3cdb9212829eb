//! Attribute matchers
//!
//! An [`AttributeMatcher`] binds one rule field (key, operator, value) to a
//! scoring function over a [`Packet`]. Values are a tagged variant; which
//! variant a key accepts is checked when the matcher is built or updated, so
//! scoring itself never fails.
//!
//! | operator   | score                                                    |
//! |------------|----------------------------------------------------------|
//! | `Any`      | [`WEAK_MATCH_SCORE`]                                     |
//! | `Matches`  | [`STRONG_MATCH_SCORE`] if the value matches, else 0      |
//! | `Contains` | best `Matches` score over the pool items, 0 if empty     |

use std::fmt;

use super::packet::Packet;
use super::ports::PortRange;
use super::prefix::NetworkPrefix;
use super::types::{
    AttributeKey, AttributeOperator, Score, NO_MATCH_SCORE, STRONG_MATCH_SCORE, WEAK_MATCH_SCORE,
};
use crate::error::RuleError;

/// Value held by a matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// IPv4 network for address keys
    Network(NetworkPrefix),
    /// Port range for the destination port
    Ports(PortRange),
    /// Protocol token, compared case-insensitively
    Protocol(String),
    /// Items scored by `Contains`
    Pool(Vec<AttributeMatcher>),
}

impl AttributeValue {
    /// Parse a scalar value for `key` from text
    ///
    /// # Errors
    ///
    /// Returns the CIDR or port parsing error for address and port keys and
    /// `RuleError::InvalidProtocol` for an empty protocol.
    pub fn parse(key: AttributeKey, s: &str) -> Result<Self, RuleError> {
        match key {
            AttributeKey::SourceAddresses | AttributeKey::DestinationAddress => {
                NetworkPrefix::parse(s).map(Self::Network)
            }
            AttributeKey::DestinationPort => PortRange::parse(s, false).map(Self::Ports),
            AttributeKey::Protocol => {
                let s = s.trim();
                if s.is_empty() {
                    return Err(RuleError::InvalidProtocol(s.to_string()));
                }
                Ok(Self::Protocol(s.to_string()))
            }
        }
    }

    /// Short name of the variant
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Ports(_) => "port range",
            Self::Protocol(_) => "protocol",
            Self::Pool(_) => "pool",
        }
    }

    /// Check if the value is a pool
    #[must_use]
    pub const fn is_pool(&self) -> bool {
        matches!(self, Self::Pool(_))
    }

    const fn fits(&self, key: AttributeKey) -> bool {
        matches!(
            (key, self),
            (
                AttributeKey::SourceAddresses | AttributeKey::DestinationAddress,
                Self::Network(_)
            ) | (AttributeKey::DestinationPort, Self::Ports(_))
                | (AttributeKey::Protocol, Self::Protocol(_))
        )
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(prefix) => write!(f, "{prefix}"),
            Self::Ports(range) => write!(f, "{range}"),
            Self::Protocol(protocol) => write!(f, "{protocol}"),
            Self::Pool(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.value)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Scoring unit for one attribute of a rule
///
/// # Examples
///
/// ```
/// use affinity_router::rules::{AttributeKey, AttributeMatcher, AttributeValue, Packet};
///
/// let pool = AttributeMatcher::pool(
///     AttributeKey::SourceAddresses,
///     vec![
///         AttributeValue::parse(AttributeKey::SourceAddresses, "192.168.1.0/24").unwrap(),
///         AttributeValue::parse(AttributeKey::SourceAddresses, "8.8.8.8/32").unwrap(),
///     ],
/// )
/// .unwrap();
///
/// let packet: Packet = "8.8.8.8,10.2.1.1,21,TCP".parse().unwrap();
/// assert_eq!(pool.score(&packet), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMatcher {
    key: AttributeKey,
    operator: AttributeOperator,
    value: AttributeValue,
}

impl AttributeMatcher {
    /// Create a matcher
    ///
    /// # Errors
    ///
    /// - `RuleError::ValueMismatch` if the value kind does not fit the key
    ///   (the destination address never takes a pool)
    /// - `RuleError::OperatorMismatch` for `Contains` over a scalar, `Matches`
    ///   over a pool, or pool items that are not scalar `Matches` matchers of
    ///   the same key
    /// - `RuleError::InvalidProtocol` for an empty protocol token
    pub fn new(
        key: AttributeKey,
        operator: AttributeOperator,
        value: AttributeValue,
    ) -> Result<Self, RuleError> {
        validate(key, operator, &value)?;
        Ok(Self {
            key,
            operator,
            value,
        })
    }

    /// Single-value matcher with the `Matches` operator
    ///
    /// # Errors
    ///
    /// Same as [`AttributeMatcher::new`].
    pub fn matches(key: AttributeKey, value: AttributeValue) -> Result<Self, RuleError> {
        Self::new(key, AttributeOperator::Matches, value)
    }

    /// Wildcard matcher keeping `value` for later use
    ///
    /// # Errors
    ///
    /// Same as [`AttributeMatcher::new`].
    pub fn any(key: AttributeKey, value: AttributeValue) -> Result<Self, RuleError> {
        Self::new(key, AttributeOperator::Any, value)
    }

    /// `Contains` matcher over scalar values
    ///
    /// # Errors
    ///
    /// Same as [`AttributeMatcher::new`].
    pub fn pool(key: AttributeKey, values: Vec<AttributeValue>) -> Result<Self, RuleError> {
        let items = values
            .into_iter()
            .map(|value| Self::matches(key, value))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(key, AttributeOperator::Contains, AttributeValue::Pool(items))
    }

    /// Attribute this matcher scores
    #[must_use]
    pub const fn key(&self) -> AttributeKey {
        self.key
    }

    /// Current operator
    #[must_use]
    pub const fn operator(&self) -> AttributeOperator {
        self.operator
    }

    /// Current value
    #[must_use]
    pub const fn value(&self) -> &AttributeValue {
        &self.value
    }

    /// Replace the operator
    ///
    /// # Errors
    ///
    /// Fails under the same rules as [`AttributeMatcher::new`]; the matcher is
    /// left unchanged on error.
    pub fn set_operator(&mut self, operator: AttributeOperator) -> Result<(), RuleError> {
        validate(self.key, operator, &self.value)?;
        self.operator = operator;
        Ok(())
    }

    /// Replace the value
    ///
    /// # Errors
    ///
    /// Fails under the same rules as [`AttributeMatcher::new`]; the matcher is
    /// left unchanged on error.
    pub fn set_value(&mut self, value: AttributeValue) -> Result<(), RuleError> {
        validate(self.key, self.operator, &value)?;
        self.value = value;
        Ok(())
    }

    /// Affinity score of `packet` for this attribute
    #[must_use]
    pub fn score(&self, packet: &Packet) -> Score {
        match self.operator {
            AttributeOperator::Any => WEAK_MATCH_SCORE,
            AttributeOperator::Matches | AttributeOperator::Contains => {
                self.equality_score(packet)
            }
        }
    }

    /// Score of the stored value ignoring the operator
    ///
    /// Pools report the best item score.
    #[must_use]
    pub fn equality_score(&self, packet: &Packet) -> Score {
        let matched = match &self.value {
            AttributeValue::Network(prefix) => {
                prefix.contains_address(packet_address(self.key, packet))
            }
            AttributeValue::Ports(range) => range.contains(packet.dst_port()),
            AttributeValue::Protocol(protocol) => protocol.eq_ignore_ascii_case(packet.protocol()),
            AttributeValue::Pool(items) => {
                return items
                    .iter()
                    .map(|item| item.equality_score(packet))
                    .max()
                    .unwrap_or(NO_MATCH_SCORE);
            }
        };
        if matched {
            STRONG_MATCH_SCORE
        } else {
            NO_MATCH_SCORE
        }
    }

    /// Stored network containing the packet's address for this key
    ///
    /// For a pool this is the first item, in pool order, that contains the
    /// address. `None` for non-address keys or when nothing contains it.
    #[must_use]
    pub fn matching_network(&self, packet: &Packet) -> Option<NetworkPrefix> {
        if !self.key.is_address() {
            return None;
        }
        let address = packet_address(self.key, packet);
        match &self.value {
            AttributeValue::Network(prefix) => {
                prefix.contains_address(address).then_some(*prefix)
            }
            AttributeValue::Pool(items) => items.iter().find_map(|item| match item.value {
                AttributeValue::Network(prefix) if prefix.contains_address(address) => Some(prefix),
                _ => None,
            }),
            AttributeValue::Ports(_) | AttributeValue::Protocol(_) => None,
        }
    }
}

impl fmt::Display for AttributeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key, self.operator, self.value)
    }
}

const fn packet_address(key: AttributeKey, packet: &Packet) -> u32 {
    match key {
        AttributeKey::SourceAddresses => packet.src_addr(),
        _ => packet.dst_addr(),
    }
}

fn validate(
    key: AttributeKey,
    operator: AttributeOperator,
    value: &AttributeValue,
) -> Result<(), RuleError> {
    match value {
        AttributeValue::Pool(items) => {
            if key == AttributeKey::DestinationAddress {
                return Err(RuleError::ValueMismatch {
                    key,
                    found: value.kind(),
                });
            }
            if operator == AttributeOperator::Matches {
                return Err(RuleError::OperatorMismatch {
                    key,
                    operator,
                    reason: "a pool is scored with contains or any",
                });
            }
            for item in items {
                if item.key != key || item.operator != AttributeOperator::Matches || item.value.is_pool()
                {
                    return Err(RuleError::OperatorMismatch {
                        key,
                        operator,
                        reason: "pool items must be single values of the same key using matches",
                    });
                }
            }
        }
        scalar => {
            if !scalar.fits(key) {
                return Err(RuleError::ValueMismatch {
                    key,
                    found: scalar.kind(),
                });
            }
            if let AttributeValue::Protocol(protocol) = scalar {
                if protocol.trim().is_empty() {
                    return Err(RuleError::InvalidProtocol(protocol.clone()));
                }
            }
            if operator == AttributeOperator::Contains {
                return Err(RuleError::OperatorMismatch {
                    key,
                    operator,
                    reason: "contains requires a pool",
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(key: AttributeKey, s: &str) -> AttributeValue {
        AttributeValue::parse(key, s).unwrap()
    }

    fn packet(s: &str) -> Packet {
        s.parse().unwrap()
    }

    fn source_pool() -> AttributeMatcher {
        let key = AttributeKey::SourceAddresses;
        AttributeMatcher::pool(
            key,
            ["192.168.1.0/24", "10.1.0.0/16", "172.0.0.0/8", "8.8.8.8/32"]
                .iter()
                .map(|s| value(key, s))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_any_is_weak() {
        let key = AttributeKey::DestinationAddress;
        let matcher = AttributeMatcher::any(key, value(key, "10.2.1.1/32")).unwrap();
        assert_eq!(matcher.score(&packet("1.1.1.1,10.2.1.1,21,UDP")), WEAK_MATCH_SCORE);
        assert_eq!(matcher.score(&packet("1.1.1.1,99.9.9.9,21,UDP")), WEAK_MATCH_SCORE);
    }

    #[test]
    fn test_matches_address() {
        let key = AttributeKey::DestinationAddress;
        let matcher = AttributeMatcher::matches(key, value(key, "10.2.1.0/31")).unwrap();
        assert_eq!(matcher.score(&packet("1.1.1.1,10.2.1.1,21,UDP")), STRONG_MATCH_SCORE);
        assert_eq!(matcher.score(&packet("1.1.1.1,10.2.1.2,21,UDP")), NO_MATCH_SCORE);

        // source key looks at the source address
        let key = AttributeKey::SourceAddresses;
        let matcher = AttributeMatcher::matches(key, value(key, "10.2.1.0/31")).unwrap();
        assert_eq!(matcher.score(&packet("10.2.1.1,1.1.1.1,21,UDP")), STRONG_MATCH_SCORE);
        assert_eq!(matcher.score(&packet("1.1.1.1,10.2.1.1,21,UDP")), NO_MATCH_SCORE);
    }

    #[test]
    fn test_matches_port_and_protocol() {
        let key = AttributeKey::DestinationPort;
        let ports = AttributeMatcher::matches(key, value(key, "512-1024")).unwrap();
        assert_eq!(ports.score(&packet("1.1.1.1,2.2.2.2,512,UDP")), STRONG_MATCH_SCORE);
        assert_eq!(ports.score(&packet("1.1.1.1,2.2.2.2,21,UDP")), NO_MATCH_SCORE);

        let key = AttributeKey::Protocol;
        let proto = AttributeMatcher::matches(key, value(key, "TCP")).unwrap();
        assert_eq!(proto.score(&packet("1.1.1.1,2.2.2.2,21,tcp")), STRONG_MATCH_SCORE);
        assert_eq!(proto.score(&packet("1.1.1.1,2.2.2.2,21,UDP")), NO_MATCH_SCORE);
    }

    #[test]
    fn test_contains_takes_best_item() {
        let pool = source_pool();
        assert_eq!(pool.score(&packet("10.1.1.1,2.2.2.2,21,UDP")), STRONG_MATCH_SCORE);
        assert_eq!(pool.score(&packet("8.8.8.8,2.2.2.2,21,UDP")), STRONG_MATCH_SCORE);
        assert_eq!(pool.score(&packet("8.8.4.4,2.2.2.2,21,UDP")), NO_MATCH_SCORE);
    }

    #[test]
    fn test_empty_pool_scores_zero() {
        let pool = AttributeMatcher::pool(AttributeKey::Protocol, Vec::new()).unwrap();
        assert_eq!(pool.score(&packet("1.1.1.1,2.2.2.2,21,UDP")), NO_MATCH_SCORE);
    }

    #[test]
    fn test_matching_network() {
        let pool = source_pool();
        let hit = pool.matching_network(&packet("172.16.0.1,2.2.2.2,21,UDP")).unwrap();
        assert_eq!(hit.to_string(), "172.0.0.0/8");
        assert!(pool.matching_network(&packet("9.9.9.9,2.2.2.2,21,UDP")).is_none());

        let key = AttributeKey::DestinationAddress;
        let dst = AttributeMatcher::matches(key, value(key, "10.2.1.1/32")).unwrap();
        assert_eq!(
            dst.matching_network(&packet("1.1.1.1,10.2.1.1,21,UDP")),
            Some(NetworkPrefix::parse("10.2.1.1/32").unwrap())
        );

        let key = AttributeKey::Protocol;
        let proto = AttributeMatcher::matches(key, value(key, "UDP")).unwrap();
        assert!(proto.matching_network(&packet("1.1.1.1,10.2.1.1,21,UDP")).is_none());
    }

    #[test]
    fn test_matching_network_prefers_pool_order() {
        let key = AttributeKey::SourceAddresses;
        let pool = AttributeMatcher::pool(
            key,
            vec![value(key, "10.0.0.0/8"), value(key, "10.1.0.0/16")],
        )
        .unwrap();
        let hit = pool.matching_network(&packet("10.1.1.1,2.2.2.2,21,UDP")).unwrap();
        assert_eq!(hit.prefix_len, 8);
    }

    #[test]
    fn test_value_kind_must_fit_key() {
        let err = AttributeMatcher::matches(
            AttributeKey::DestinationPort,
            value(AttributeKey::Protocol, "UDP"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RuleError::ValueMismatch {
                key: AttributeKey::DestinationPort,
                found: "protocol"
            }
        ));
    }

    #[test]
    fn test_destination_rejects_pool() {
        let key = AttributeKey::DestinationAddress;
        let err = AttributeMatcher::pool(key, vec![value(key, "10.0.0.0/8")]).unwrap_err();
        assert!(matches!(err, RuleError::ValueMismatch { found: "pool", .. }));
    }

    #[test]
    fn test_operator_validation() {
        let key = AttributeKey::Protocol;
        let err = AttributeMatcher::new(key, AttributeOperator::Contains, value(key, "UDP"))
            .unwrap_err();
        assert!(matches!(err, RuleError::OperatorMismatch { .. }));

        let err = AttributeMatcher::new(
            AttributeKey::SourceAddresses,
            AttributeOperator::Matches,
            AttributeValue::Pool(Vec::new()),
        )
        .unwrap_err();
        assert!(matches!(err, RuleError::OperatorMismatch { .. }));

        let stray = AttributeMatcher::matches(key, value(key, "UDP")).unwrap();
        let err = AttributeMatcher::new(
            AttributeKey::SourceAddresses,
            AttributeOperator::Contains,
            AttributeValue::Pool(vec![stray]),
        )
        .unwrap_err();
        assert!(matches!(err, RuleError::OperatorMismatch { .. }));
    }

    #[test]
    fn test_empty_protocol_rejected() {
        assert!(AttributeValue::parse(AttributeKey::Protocol, "  ").is_err());
        let err = AttributeMatcher::matches(
            AttributeKey::Protocol,
            AttributeValue::Protocol(String::new()),
        )
        .unwrap_err();
        assert!(matches!(err, RuleError::InvalidProtocol(_)));
    }

    #[test]
    fn test_set_operator() {
        let key = AttributeKey::DestinationAddress;
        let mut matcher = AttributeMatcher::matches(key, value(key, "10.2.1.1/32")).unwrap();
        let miss = packet("1.1.1.1,10.2.1.2,21,UDP");
        assert_eq!(matcher.score(&miss), NO_MATCH_SCORE);

        matcher.set_operator(AttributeOperator::Any).unwrap();
        assert_eq!(matcher.score(&miss), WEAK_MATCH_SCORE);

        assert!(matcher.set_operator(AttributeOperator::Contains).is_err());
        assert_eq!(matcher.operator(), AttributeOperator::Any);
    }

    #[test]
    fn test_set_value() {
        let key = AttributeKey::DestinationPort;
        let mut matcher = AttributeMatcher::matches(key, value(key, "21")).unwrap();
        let p = packet("1.1.1.1,2.2.2.2,80,TCP");
        assert_eq!(matcher.score(&p), NO_MATCH_SCORE);

        matcher.set_value(value(key, "1-1024")).unwrap();
        assert_eq!(matcher.score(&p), STRONG_MATCH_SCORE);

        assert!(matcher
            .set_value(AttributeValue::Protocol("TCP".into()))
            .is_err());
        assert_eq!(matcher.value(), &value(key, "1-1024"));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            source_pool().to_string(),
            "src_addresses contains [192.168.1.0/24, 10.1.0.0/16, 172.0.0.0/8, 8.8.8.8/32]"
        );
    }
}
