//! Core attribute types for the affinity engine
//!
//! This module defines the vocabulary shared by matchers, rules and the resolver:
//! - [`AttributeKey`]: The four scoring dimensions of a rule
//! - [`AttributeOperator`]: How a matcher compares its value with a packet
//! - [`AttributePriority`]: Ordered, duplicate-free key sequence used for ranking
//! - Score constants ([`NO_MATCH_SCORE`], [`WEAK_MATCH_SCORE`], [`STRONG_MATCH_SCORE`])

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Affinity score produced by a matcher for one attribute
pub type Score = u32;

/// Score of an attribute that does not match at all; disqualifies the rule
pub const NO_MATCH_SCORE: Score = 0;

/// Score of a wildcard (`Any`) match
pub const WEAK_MATCH_SCORE: Score = 1;

/// Score of an exact (`Matches`/`Contains`) match
pub const STRONG_MATCH_SCORE: Score = 2;

/// Attribute identity
///
/// Every rule carries exactly one matcher per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeKey {
    /// Pool of source networks (e.g., ["10.1.0.0/16", "8.8.8.8/32"])
    #[serde(rename = "src_addresses")]
    SourceAddresses,

    /// Destination network (e.g., "10.2.1.1/32")
    #[serde(rename = "dst_address")]
    DestinationAddress,

    /// Transport protocol token, compared case-insensitively (e.g., "UDP")
    #[serde(rename = "protocol")]
    Protocol,

    /// Destination port or port range (e.g., "1-1024")
    #[serde(rename = "dst_port")]
    DestinationPort,
}

impl AttributeKey {
    /// All keys in declaration order
    pub const ALL: [Self; 4] = [
        Self::SourceAddresses,
        Self::DestinationAddress,
        Self::Protocol,
        Self::DestinationPort,
    ];

    /// Parse attribute key from string
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidAttributeKey` if the string is not a known key.
    pub fn parse(s: &str) -> Result<Self, RuleError> {
        match s.trim().to_lowercase().as_str() {
            "src_addresses" | "src" | "source" | "source_addresses" => Ok(Self::SourceAddresses),
            "dst_address" | "dst" | "destination" | "destination_address" => {
                Ok(Self::DestinationAddress)
            }
            "protocol" | "proto" => Ok(Self::Protocol),
            "dst_port" | "port" | "destination_port" => Ok(Self::DestinationPort),
            _ => Err(RuleError::InvalidAttributeKey(s.to_string())),
        }
    }

    /// Check if this key is ranked by network specificity
    #[must_use]
    pub const fn is_address(&self) -> bool {
        matches!(self, Self::SourceAddresses | Self::DestinationAddress)
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceAddresses => write!(f, "src_addresses"),
            Self::DestinationAddress => write!(f, "dst_address"),
            Self::Protocol => write!(f, "protocol"),
            Self::DestinationPort => write!(f, "dst_port"),
        }
    }
}

/// Comparison operator of a matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeOperator {
    /// Wildcard; always scores [`WEAK_MATCH_SCORE`]
    Any,

    /// Single-value comparison (containment or case-insensitive equality)
    Matches,

    /// Best score over a pool of `Matches` items
    Contains,
}

impl AttributeOperator {
    /// Parse operator from string
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidOperator` if the string is not a known operator.
    pub fn parse(s: &str) -> Result<Self, RuleError> {
        match s.trim().to_lowercase().as_str() {
            "any" | "*" => Ok(Self::Any),
            "matches" | "match" | "eq" => Ok(Self::Matches),
            "contains" | "in" => Ok(Self::Contains),
            _ => Err(RuleError::InvalidOperator(s.to_string())),
        }
    }
}

impl fmt::Display for AttributeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Matches => write!(f, "matches"),
            Self::Contains => write!(f, "contains"),
        }
    }
}

/// Ordered, duplicate-free sequence of attribute keys
///
/// The resolver ranks tied candidates one key at a time in this order.
///
/// # Examples
///
/// ```
/// use affinity_router::rules::{AttributeKey, AttributePriority};
///
/// let priority = AttributePriority::parse("src,dst,port,protocol").unwrap();
/// assert_eq!(priority.keys()[0], AttributeKey::SourceAddresses);
///
/// assert!(AttributePriority::parse("dst,dst").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AttributePriority(Vec<AttributeKey>);

impl AttributePriority {
    /// Create a priority ordering from keys
    ///
    /// # Errors
    ///
    /// Returns `RuleError::DuplicatePriorityKey` if a key appears more than once.
    pub fn new(keys: Vec<AttributeKey>) -> Result<Self, RuleError> {
        for (i, key) in keys.iter().enumerate() {
            if keys[..i].contains(key) {
                return Err(RuleError::DuplicatePriorityKey(*key));
            }
        }
        Ok(Self(keys))
    }

    /// Default ordering: destination address, destination port, source addresses, protocol
    #[must_use]
    pub fn default_order() -> Self {
        Self(vec![
            AttributeKey::DestinationAddress,
            AttributeKey::DestinationPort,
            AttributeKey::SourceAddresses,
            AttributeKey::Protocol,
        ])
    }

    /// Parse a comma-separated list of key names
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidAttributeKey` for unknown names and
    /// `RuleError::DuplicatePriorityKey` for repeated keys.
    pub fn parse(s: &str) -> Result<Self, RuleError> {
        let keys = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(AttributeKey::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(keys)
    }

    /// Keys in ranking order
    #[must_use]
    pub fn keys(&self) -> &[AttributeKey] {
        &self.0
    }

    /// Iterate keys in ranking order
    pub fn iter(&self) -> impl Iterator<Item = AttributeKey> + '_ {
        self.0.iter().copied()
    }

    /// Number of keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the ordering has no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for AttributePriority {
    fn default() -> Self {
        Self::default_order()
    }
}

impl<'a> IntoIterator for &'a AttributePriority {
    type Item = AttributeKey;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, AttributeKey>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

impl fmt::Display for AttributePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for AttributePriority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let keys = Vec::<AttributeKey>::deserialize(deserializer)?;
        Self::new(keys).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_constants() {
        assert_eq!(NO_MATCH_SCORE, 0);
        assert!(WEAK_MATCH_SCORE > NO_MATCH_SCORE);
        assert!(STRONG_MATCH_SCORE > WEAK_MATCH_SCORE);
    }

    #[test]
    fn test_attribute_key_serialization() {
        let json = serde_json::to_string(&AttributeKey::SourceAddresses).unwrap();
        assert_eq!(json, "\"src_addresses\"");

        let parsed: AttributeKey = serde_json::from_str("\"dst_port\"").unwrap();
        assert_eq!(parsed, AttributeKey::DestinationPort);
    }

    #[test]
    fn test_attribute_key_parse() {
        assert_eq!(AttributeKey::parse("src").unwrap(), AttributeKey::SourceAddresses);
        assert_eq!(
            AttributeKey::parse("DST_ADDRESS").unwrap(),
            AttributeKey::DestinationAddress
        );
        assert_eq!(AttributeKey::parse("proto").unwrap(), AttributeKey::Protocol);
        assert_eq!(AttributeKey::parse(" port ").unwrap(), AttributeKey::DestinationPort);
        assert!(AttributeKey::parse("domain").is_err());
    }

    #[test]
    fn test_attribute_key_display_matches_serde() {
        for key in AttributeKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{key}\""));
        }
    }

    #[test]
    fn test_attribute_key_is_address() {
        assert!(AttributeKey::SourceAddresses.is_address());
        assert!(AttributeKey::DestinationAddress.is_address());
        assert!(!AttributeKey::Protocol.is_address());
        assert!(!AttributeKey::DestinationPort.is_address());
    }

    #[test]
    fn test_operator_parse_and_serde() {
        assert_eq!(AttributeOperator::parse("ANY").unwrap(), AttributeOperator::Any);
        assert_eq!(AttributeOperator::parse("matches").unwrap(), AttributeOperator::Matches);
        assert_eq!(AttributeOperator::parse("in").unwrap(), AttributeOperator::Contains);
        assert!(AttributeOperator::parse("like").is_err());

        let json = serde_json::to_string(&AttributeOperator::Contains).unwrap();
        assert_eq!(json, "\"contains\"");
        let parsed: AttributeOperator = serde_json::from_str("\"any\"").unwrap();
        assert_eq!(parsed, AttributeOperator::Any);
    }

    #[test]
    fn test_priority_default_order() {
        let priority = AttributePriority::default();
        assert_eq!(
            priority.keys(),
            &[
                AttributeKey::DestinationAddress,
                AttributeKey::DestinationPort,
                AttributeKey::SourceAddresses,
                AttributeKey::Protocol,
            ]
        );
        assert_eq!(priority.to_string(), "dst_address,dst_port,src_addresses,protocol");
    }

    #[test]
    fn test_priority_rejects_duplicates() {
        let result = AttributePriority::new(vec![
            AttributeKey::Protocol,
            AttributeKey::SourceAddresses,
            AttributeKey::Protocol,
        ]);
        assert!(matches!(
            result,
            Err(RuleError::DuplicatePriorityKey(AttributeKey::Protocol))
        ));
    }

    #[test]
    fn test_priority_parse() {
        let priority = AttributePriority::parse("src, dst, port, protocol").unwrap();
        assert_eq!(priority.len(), 4);
        assert_eq!(
            priority.iter().collect::<Vec<_>>(),
            vec![
                AttributeKey::SourceAddresses,
                AttributeKey::DestinationAddress,
                AttributeKey::DestinationPort,
                AttributeKey::Protocol,
            ]
        );

        let partial = AttributePriority::parse("protocol").unwrap();
        assert_eq!(partial.len(), 1);

        assert!(AttributePriority::parse("").unwrap().is_empty());
        assert!(AttributePriority::parse("src,bogus").is_err());
    }

    #[test]
    fn test_priority_serde() {
        let priority = AttributePriority::default();
        let json = serde_json::to_string(&priority).unwrap();
        assert_eq!(
            json,
            r#"["dst_address","dst_port","src_addresses","protocol"]"#
        );

        let parsed: AttributePriority = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, priority);

        let dup: Result<AttributePriority, _> =
            serde_json::from_str(r#"["protocol","protocol"]"#);
        assert!(dup.is_err());
    }
}
