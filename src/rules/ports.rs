//! Inclusive destination port ranges

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Inclusive port interval `begin..=end`
///
/// Ordering follows [`PortRange::compare_specificity`]: narrower ranges sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRange {
    /// Start of the range (inclusive)
    pub begin: u16,
    /// End of the range (inclusive)
    pub end: u16,
}

/// Result of [`PortRange::subtract`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRangeDifference {
    /// Nothing is left
    Empty,
    /// One contiguous range is left
    One(PortRange),
    /// The subtrahend split the range into a lower and an upper part
    Two(PortRange, PortRange),
}

impl PortRangeDifference {
    /// Remaining ranges in ascending order
    #[must_use]
    pub fn ranges(&self) -> Vec<PortRange> {
        match *self {
            Self::Empty => Vec::new(),
            Self::One(range) => vec![range],
            Self::Two(low, high) => vec![low, high],
        }
    }
}

impl PortRange {
    /// Create a new port range
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidPortRange` if begin > end.
    ///
    /// # Examples
    ///
    /// ```
    /// use affinity_router::rules::PortRange;
    ///
    /// let range = PortRange::new(1, 1024).unwrap();
    /// assert!(range.contains(21));
    /// assert!(!range.contains(8080));
    /// assert!(PortRange::new(443, 80).is_err());
    /// ```
    pub fn new(begin: u16, end: u16) -> Result<Self, RuleError> {
        if begin > end {
            return Err(RuleError::invalid_port_range(
                format!("{begin}-{end}"),
                "begin must not exceed end",
            ));
        }
        Ok(Self { begin, end })
    }

    /// Create a range for a single port
    #[must_use]
    pub const fn single(port: u16) -> Self {
        Self {
            begin: port,
            end: port,
        }
    }

    /// Check if a port is within this range
    #[must_use]
    pub const fn contains(&self, port: u16) -> bool {
        port >= self.begin && port <= self.end
    }

    /// Check if the two ranges share at least one port
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !(other.begin > self.end || self.begin > other.end)
    }

    /// Check if `other` lies entirely inside this range
    #[must_use]
    pub const fn covers(&self, other: &Self) -> bool {
        self.begin <= other.begin && self.end >= other.end
    }

    /// Number of ports in the range
    #[must_use]
    pub fn size(&self) -> u32 {
        u32::from(self.end - self.begin) + 1
    }

    /// Check if this is a single-port range
    #[must_use]
    pub const fn is_single(&self) -> bool {
        self.begin == self.end
    }

    /// Parse a port or a `begin-end` range
    ///
    /// A bare port (`"21"`) is always accepted. For the range form, `end`
    /// must be greater than `begin`; with `accept_single_point` an equal pair
    /// such as `"21-21"` is accepted too.
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidPortRange` on malformed text, ports above
    /// 65535 or a reversed range.
    ///
    /// # Examples
    ///
    /// ```
    /// use affinity_router::rules::PortRange;
    ///
    /// let range = PortRange::parse("512-1024", false).unwrap();
    /// assert_eq!((range.begin, range.end), (512, 1024));
    ///
    /// assert!(PortRange::parse("21-21", false).is_err());
    /// assert!(PortRange::parse("21-21", true).unwrap().is_single());
    /// ```
    pub fn parse(s: &str, accept_single_point: bool) -> Result<Self, RuleError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RuleError::invalid_port_range(s, "empty value"));
        }

        match s.split_once('-') {
            None => Ok(Self::single(parse_port(s, s)?)),
            Some((begin_str, end_str)) => {
                let begin = parse_port(s, begin_str)?;
                let end = parse_port(s, end_str)?;
                let ordered = if accept_single_point {
                    end >= begin
                } else {
                    end > begin
                };
                if !ordered {
                    return Err(RuleError::invalid_port_range(
                        s,
                        "end must be greater than begin",
                    ));
                }
                Ok(Self { begin, end })
            }
        }
    }

    /// Order by size (narrower first), then begin, then end
    #[must_use]
    pub fn compare_specificity(&self, other: &Self) -> Ordering {
        self.size()
            .cmp(&other.size())
            .then(self.begin.cmp(&other.begin))
            .then(self.end.cmp(&other.end))
    }

    /// Ports of `self` that are not in `other`
    ///
    /// # Examples
    ///
    /// ```
    /// use affinity_router::rules::{PortRange, PortRangeDifference};
    ///
    /// let all = PortRange::new(1, 1024).unwrap();
    /// let hole = PortRange::new(100, 200).unwrap();
    /// assert_eq!(
    ///     all.subtract(&hole),
    ///     PortRangeDifference::Two(PortRange::new(1, 99).unwrap(), PortRange::new(201, 1024).unwrap())
    /// );
    /// ```
    #[must_use]
    pub fn subtract(&self, other: &Self) -> PortRangeDifference {
        if !self.overlaps(other) {
            return PortRangeDifference::One(*self);
        }

        // begin < other.begin implies other.begin >= 1, and the mirror case for end
        let low = (self.begin < other.begin).then(|| Self {
            begin: self.begin,
            end: other.begin - 1,
        });
        let high = (self.end > other.end).then(|| Self {
            begin: other.end + 1,
            end: self.end,
        });

        match (low, high) {
            (Some(low), Some(high)) => PortRangeDifference::Two(low, high),
            (Some(only), None) | (None, Some(only)) => PortRangeDifference::One(only),
            (None, None) => PortRangeDifference::Empty,
        }
    }
}

fn parse_port(whole: &str, part: &str) -> Result<u16, RuleError> {
    let part = part.trim();
    if part.is_empty() || part.len() > 5 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RuleError::invalid_port_range(
            whole,
            format!("invalid port number: '{part}'"),
        ));
    }
    part.parse::<u16>().map_err(|_| {
        RuleError::invalid_port_range(whole, format!("port out of range: {part}"))
    })
}

impl PartialOrd for PortRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PortRange {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare_specificity(other)
    }
}

impl FromStr for PortRange {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, false)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.begin)
        } else {
            write!(f, "{}-{}", self.begin, self.end)
        }
    }
}

impl Serialize for PortRange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PortRange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s, false).map_err(serde::de::Error::custom)
    }
}
