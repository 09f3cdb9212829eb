//! IPv4 network prefixes
//!
//! [`NetworkPrefix`] keeps the address exactly as written: `10.2.1.1/24` stays
//! `10.2.1.1` and is only masked when tested for containment. Address ranking
//! in the resolver depends on the unmasked value.
//!
//! The free functions [`parse_cidr`] and [`is_address_in_network`] are the
//! text-level services used when rules are assembled from strings.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Longest valid IPv4 prefix length
pub const MAX_PREFIX_LEN: u8 = 32;

/// IPv4 address plus prefix length
///
/// # Examples
///
/// ```
/// use affinity_router::rules::NetworkPrefix;
///
/// let net: NetworkPrefix = "10.1.0.0/16".parse().unwrap();
/// assert!(net.contains_address(u32::from_be_bytes([10, 1, 200, 7])));
/// assert!(!net.contains_address(u32::from_be_bytes([10, 2, 0, 1])));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkPrefix {
    /// Address as supplied (host bits are kept)
    pub address: u32,
    /// Prefix length in `0..=32`
    pub prefix_len: u8,
}

impl NetworkPrefix {
    /// Create a prefix
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidCidr` if `prefix_len` exceeds 32.
    pub fn new(address: u32, prefix_len: u8) -> Result<Self, RuleError> {
        if prefix_len > MAX_PREFIX_LEN {
            return Err(RuleError::invalid_cidr(
                format!("{}/{prefix_len}", Ipv4Addr::from(address)),
                "prefix length must be between 0 and 32",
            ));
        }
        Ok(Self {
            address,
            prefix_len,
        })
    }

    /// Prefix covering exactly one address
    #[must_use]
    pub const fn host(address: u32) -> Self {
        Self {
            address,
            prefix_len: MAX_PREFIX_LEN,
        }
    }

    /// Netmask for the prefix length; `/0` yields an all-zero mask
    #[must_use]
    pub const fn mask(&self) -> u32 {
        if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (MAX_PREFIX_LEN - self.prefix_len)
        }
    }

    /// Masked network address
    #[must_use]
    pub const fn network(&self) -> u32 {
        self.address & self.mask()
    }

    /// Check if `address` shares the top `prefix_len` bits with this prefix
    #[must_use]
    pub const fn contains_address(&self, address: u32) -> bool {
        let mask = self.mask();
        address & mask == self.address & mask
    }

    /// Parse `a.b.c.d/n`
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidCidr` if the slash is missing, an octet is
    /// not a number in `0..=255`, or the prefix length is outside `0..=32`.
    pub fn parse(s: &str) -> Result<Self, RuleError> {
        let s = s.trim();
        if !s.contains('/') {
            return Err(RuleError::invalid_cidr(s, "missing '/' prefix length"));
        }
        let net = Ipv4Net::from_str(s).map_err(|e| RuleError::invalid_cidr(s, e.to_string()))?;
        Ok(Self::from(net))
    }

    /// Address as [`Ipv4Addr`]
    #[must_use]
    pub fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.address)
    }
}

impl From<Ipv4Net> for NetworkPrefix {
    fn from(net: Ipv4Net) -> Self {
        Self {
            address: u32::from(net.addr()),
            prefix_len: net.prefix_len(),
        }
    }
}

impl FromStr for NetworkPrefix {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NetworkPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip(), self.prefix_len)
    }
}

impl Serialize for NetworkPrefix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NetworkPrefix {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Split CIDR text into `(address, prefix_len)`
///
/// # Errors
///
/// Same conditions as [`NetworkPrefix::parse`].
pub fn parse_cidr(s: &str) -> Result<(u32, u8), RuleError> {
    let prefix = NetworkPrefix::parse(s)?;
    Ok((prefix.address, prefix.prefix_len))
}

/// Check if `address` falls inside `network`
///
/// `network` may be CIDR text or a bare dotted quad, which matches only that
/// exact address. Malformed text never matches.
///
/// # Examples
///
/// ```
/// use affinity_router::rules::is_address_in_network;
///
/// let addr = u32::from_be_bytes([8, 8, 8, 8]);
/// assert!(is_address_in_network(addr, "8.8.0.0/16"));
/// assert!(is_address_in_network(addr, "8.8.8.8"));
/// assert!(!is_address_in_network(addr, "garbage"));
/// ```
#[must_use]
pub fn is_address_in_network(address: u32, network: &str) -> bool {
    let network = network.trim();
    if network.contains('/') {
        NetworkPrefix::parse(network).is_ok_and(|prefix| prefix.contains_address(address))
    } else {
        network
            .parse::<Ipv4Addr>()
            .is_ok_and(|ip| u32::from(ip) == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(a: u8, b: u8, c: u8, d: u8) -> u32 {
        u32::from_be_bytes([a, b, c, d])
    }

    #[test]
    fn test_parse_keeps_host_bits() {
        let prefix = NetworkPrefix::parse("10.2.1.1/24").unwrap();
        assert_eq!(prefix.address, ip(10, 2, 1, 1));
        assert_eq!(prefix.prefix_len, 24);
        assert_eq!(prefix.network(), ip(10, 2, 1, 0));
        assert_eq!(prefix.to_string(), "10.2.1.1/24");
    }

    #[test]
    fn test_parse_errors() {
        assert!(NetworkPrefix::parse("10.2.1.1").is_err());
        assert!(NetworkPrefix::parse("10.2.1.256/24").is_err());
        assert!(NetworkPrefix::parse("10.2.1.1/33").is_err());
        assert!(NetworkPrefix::parse("10.2.1.1/").is_err());
        assert!(NetworkPrefix::parse("10.2.1/24").is_err());
        assert!(NetworkPrefix::parse("a.b.c.d/8").is_err());
        assert!(NetworkPrefix::parse("10.2.1.1/-1").is_err());

        let err = NetworkPrefix::parse("10.2.1.1").unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_new_validates_prefix_len() {
        assert!(NetworkPrefix::new(ip(10, 0, 0, 0), 32).is_ok());
        assert!(NetworkPrefix::new(ip(10, 0, 0, 0), 0).is_ok());
        assert!(NetworkPrefix::new(ip(10, 0, 0, 0), 33).is_err());
    }

    #[test]
    fn test_mask() {
        assert_eq!(NetworkPrefix::new(0, 0).unwrap().mask(), 0);
        assert_eq!(NetworkPrefix::new(0, 8).unwrap().mask(), 0xFF00_0000);
        assert_eq!(NetworkPrefix::new(0, 31).unwrap().mask(), 0xFFFF_FFFE);
        assert_eq!(NetworkPrefix::host(0).mask(), u32::MAX);
    }

    #[test]
    fn test_contains_address() {
        let net = NetworkPrefix::parse("192.168.1.0/24").unwrap();
        assert!(net.contains_address(ip(192, 168, 1, 1)));
        assert!(net.contains_address(ip(192, 168, 1, 255)));
        assert!(!net.contains_address(ip(192, 168, 2, 1)));

        let pair = NetworkPrefix::parse("10.2.1.0/31").unwrap();
        assert!(pair.contains_address(ip(10, 2, 1, 0)));
        assert!(pair.contains_address(ip(10, 2, 1, 1)));
        assert!(!pair.contains_address(ip(10, 2, 1, 2)));

        let host = NetworkPrefix::host(ip(8, 8, 8, 8));
        assert!(host.contains_address(ip(8, 8, 8, 8)));
        assert!(!host.contains_address(ip(8, 8, 8, 9)));
    }

    #[test]
    fn test_zero_prefix_matches_everything() {
        let all = NetworkPrefix::parse("0.0.0.0/0").unwrap();
        assert!(all.contains_address(0));
        assert!(all.contains_address(u32::MAX));
        assert!(all.contains_address(ip(172, 16, 0, 1)));
    }

    #[test]
    fn test_parse_cidr() {
        assert_eq!(parse_cidr("172.0.0.0/8").unwrap(), (ip(172, 0, 0, 0), 8));
        assert!(parse_cidr("172.0.0.0").is_err());
    }

    #[test]
    fn test_is_address_in_network() {
        let addr = ip(10, 1, 1, 1);
        assert!(is_address_in_network(addr, "10.1.0.0/16"));
        assert!(is_address_in_network(addr, " 10.1.1.0/24 "));
        assert!(!is_address_in_network(addr, "10.2.0.0/16"));
        assert!(is_address_in_network(addr, "10.1.1.1"));
        assert!(!is_address_in_network(addr, "10.1.1.2"));
        assert!(!is_address_in_network(addr, "10.1.1.1/40"));
        assert!(!is_address_in_network(addr, ""));
    }

    #[test]
    fn test_ipnet_conversion() {
        let net: Ipv4Net = "10.9.8.7/12".parse().unwrap();
        let prefix = NetworkPrefix::from(net);
        assert_eq!(prefix.address, ip(10, 9, 8, 7));
        assert_eq!(prefix.prefix_len, 12);
    }

    #[test]
    fn test_serde() {
        let prefix = NetworkPrefix::parse("10.2.1.0/31").unwrap();
        let json = serde_json::to_string(&prefix).unwrap();
        assert_eq!(json, "\"10.2.1.0/31\"");

        let parsed: NetworkPrefix = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, prefix);

        let bad: Result<NetworkPrefix, _> = serde_json::from_str("\"10.2.1.0\"");
        assert!(bad.is_err());
    }
}
