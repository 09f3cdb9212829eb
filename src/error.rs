//! Error types for affinity-router
//!
//! Errors are grouped by the layer that produces them: rule values and rule
//! construction ([`RuleError`]), the resolution entry point ([`ResolveError`])
//! and configuration loading ([`ConfigError`]). [`AffinityError`] wraps all of
//! them for callers that do not care about the origin.

use std::io;

use thiserror::Error;

use crate::rules::AttributeKey;
use crate::rules::AttributeOperator;

/// Top-level error type for affinity-router
#[derive(Debug, Error)]
pub enum AffinityError {
    /// Configuration errors (file parsing, validation)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rule value or rule construction errors
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    /// Resolution call errors
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// I/O errors not covered by other categories
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AffinityError {
    /// Check if this error is recoverable (can retry operation)
    ///
    /// Resolution is deterministic, so only transient I/O failures qualify.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(e) => e.is_recoverable(),
            Self::Rule(_) | Self::Resolve(_) => false,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found or inaccessible
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Validation error (invalid values, missing required fields)
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// Environment variable error
    #[error("Environment variable error: {name}: {reason}")]
    EnvError { name: String, reason: String },

    /// I/O error while reading config
    #[error("I/O error reading configuration: {0}")]
    IoError(#[from] io::Error),
}

impl ConfigError {
    /// Config errors are not recoverable without user intervention
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        false
    }
}

/// Errors raised while parsing rule values or assembling rules
#[derive(Debug, Error)]
pub enum RuleError {
    /// Malformed CIDR text
    #[error("Invalid CIDR '{value}': {reason}")]
    InvalidCidr { value: String, reason: String },

    /// Malformed port or port range text
    #[error("Invalid port range '{value}': {reason}")]
    InvalidPortRange { value: String, reason: String },

    /// Unknown attribute key name
    #[error("Invalid attribute key: {0}")]
    InvalidAttributeKey(String),

    /// Unknown operator name
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    /// Empty or otherwise unusable protocol token
    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),

    /// Packet descriptor text that cannot be decoded
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// The same key appears twice in a priority ordering
    #[error("Duplicate attribute key in priority: {0}")]
    DuplicatePriorityKey(AttributeKey),

    /// Value kind does not fit the attribute key
    #[error("Attribute {key} cannot hold a {found} value")]
    ValueMismatch { key: AttributeKey, found: &'static str },

    /// Operator cannot be applied to the stored value
    #[error("Operator {operator} is not valid for {key}: {reason}")]
    OperatorMismatch {
        key: AttributeKey,
        operator: AttributeOperator,
        reason: &'static str,
    },

    /// A priority ordering used for ranking has no keys
    #[error("Attribute priority must not be empty")]
    EmptyPriority,

    /// Rule builder finished without a value for this key
    #[error("Missing value for attribute {0}")]
    MissingAttribute(AttributeKey),

    /// Two rules in one snapshot share an id
    #[error("Duplicate rule id: {0}")]
    DuplicateRuleId(u64),
}

impl RuleError {
    /// True for the errors produced by CIDR and port text parsing
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(self, Self::InvalidCidr { .. } | Self::InvalidPortRange { .. })
    }

    /// Create an invalid CIDR error
    pub fn invalid_cidr(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCidr {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid port range error
    pub fn invalid_port_range(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPortRange {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Errors returned by the checked resolution entry point
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A required input was never supplied
    #[error("Invalid argument: {0} must be set")]
    InvalidArgument(&'static str),
}

/// Result alias using [`AffinityError`]
pub type Result<T> = std::result::Result<T, AffinityError>;
