//! Decoded packet descriptor
//!
//! A [`Packet`] carries the four fields the resolver scores against. It is
//! built once per decision and never mutated.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Packet fields relevant to affinity scoring
///
/// # Examples
///
/// ```
/// use affinity_router::rules::Packet;
///
/// let packet: Packet = "192.168.1.1,10.2.1.1,21,UDP".parse().unwrap();
/// assert_eq!(packet.dst_port(), 21);
/// assert_eq!(packet.protocol(), "UDP");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "PacketRepr", into = "PacketRepr")]
pub struct Packet {
    src_addr: u32,
    dst_addr: u32,
    dst_port: u16,
    protocol: String,
}

impl Packet {
    /// Create a packet from host-order addresses
    pub fn new(src_addr: u32, dst_addr: u32, dst_port: u16, protocol: impl Into<String>) -> Self {
        Self {
            src_addr,
            dst_addr,
            dst_port,
            protocol: protocol.into(),
        }
    }

    /// Create a packet from IPv4 addresses
    pub fn from_ipv4(
        src: Ipv4Addr,
        dst: Ipv4Addr,
        dst_port: u16,
        protocol: impl Into<String>,
    ) -> Self {
        Self::new(u32::from(src), u32::from(dst), dst_port, protocol)
    }

    /// Source address (host order)
    #[must_use]
    pub const fn src_addr(&self) -> u32 {
        self.src_addr
    }

    /// Destination address (host order)
    #[must_use]
    pub const fn dst_addr(&self) -> u32 {
        self.dst_addr
    }

    /// Destination port
    #[must_use]
    pub const fn dst_port(&self) -> u16 {
        self.dst_port
    }

    /// Protocol token as supplied
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Source address as [`Ipv4Addr`]
    #[must_use]
    pub fn src_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.src_addr)
    }

    /// Destination address as [`Ipv4Addr`]
    #[must_use]
    pub fn dst_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dst_addr)
    }
}

impl FromStr for Packet {
    type Err = RuleError;

    /// Parse `src,dst,port,protocol`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        let [src, dst, port, protocol] = fields.as_slice() else {
            return Err(RuleError::InvalidPacket(format!(
                "expected 'src,dst,port,protocol', got '{s}'"
            )));
        };

        let src: Ipv4Addr = src
            .parse()
            .map_err(|_| RuleError::InvalidPacket(format!("invalid source address: {src}")))?;
        let dst: Ipv4Addr = dst
            .parse()
            .map_err(|_| RuleError::InvalidPacket(format!("invalid destination address: {dst}")))?;
        let port: u16 = port
            .parse()
            .map_err(|_| RuleError::InvalidPacket(format!("invalid destination port: {port}")))?;
        if protocol.is_empty() {
            return Err(RuleError::InvalidPacket("empty protocol".into()));
        }

        Ok(Self::from_ipv4(src, dst, port, *protocol))
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}:{} {}",
            self.src_ip(),
            self.dst_ip(),
            self.dst_port,
            self.protocol
        )
    }
}

/// Wire form with dotted-quad addresses
#[derive(Serialize, Deserialize)]
struct PacketRepr {
    src: Ipv4Addr,
    dst: Ipv4Addr,
    port: u16,
    protocol: String,
}

impl From<PacketRepr> for Packet {
    fn from(repr: PacketRepr) -> Self {
        Self::from_ipv4(repr.src, repr.dst, repr.port, repr.protocol)
    }
}

impl From<Packet> for PacketRepr {
    fn from(packet: Packet) -> Self {
        Self {
            src: packet.src_ip(),
            dst: packet.dst_ip(),
            port: packet.dst_port,
            protocol: packet.protocol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_accessors() {
        let packet = Packet::from_ipv4(
            Ipv4Addr::new(10, 1, 1, 1),
            Ipv4Addr::new(10, 2, 1, 1),
            512,
            "udp",
        );
        assert_eq!(packet.src_addr(), u32::from_be_bytes([10, 1, 1, 1]));
        assert_eq!(packet.dst_addr(), u32::from_be_bytes([10, 2, 1, 1]));
        assert_eq!(packet.dst_port(), 512);
        assert_eq!(packet.protocol(), "udp");
        assert_eq!(packet.to_string(), "10.1.1.1 -> 10.2.1.1:512 udp");
    }

    #[test]
    fn test_packet_parse() {
        let packet: Packet = " 8.8.8.8 , 10.2.1.1 , 21 , TCP ".parse().unwrap();
        assert_eq!(packet.src_ip(), Ipv4Addr::new(8, 8, 8, 8));
        assert_eq!(packet.dst_ip(), Ipv4Addr::new(10, 2, 1, 1));
        assert_eq!(packet.dst_port(), 21);
        assert_eq!(packet.protocol(), "TCP");
    }

    #[test]
    fn test_packet_parse_errors() {
        assert!("8.8.8.8,10.2.1.1,21".parse::<Packet>().is_err());
        assert!("8.8.8.8,10.2.1.1,21,TCP,extra".parse::<Packet>().is_err());
        assert!("8.8.8,10.2.1.1,21,TCP".parse::<Packet>().is_err());
        assert!("8.8.8.8,10.2.1.1,70000,TCP".parse::<Packet>().is_err());
        assert!("8.8.8.8,10.2.1.1,21,".parse::<Packet>().is_err());
    }

    #[test]
    fn test_packet_serde() {
        let packet: Packet = "192.168.1.1,10.2.1.2,21,UDP".parse().unwrap();
        let json = serde_json::to_string(&packet).unwrap();
        assert_eq!(
            json,
            r#"{"src":"192.168.1.1","dst":"10.2.1.2","port":21,"protocol":"UDP"}"#
        );

        let parsed: Packet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, packet);
    }
}
