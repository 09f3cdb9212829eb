//! Configuration types for affinity-router
//!
//! A configuration file carries logging options, the global attribute
//! priority and the rule list. Rules are kept in their textual form here and
//! turned into [`RoutingRule`]s by [`Config::build_rules`], which assigns ids
//! in file order.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RuleError};
use crate::rules::{
    AttributeKey, AttributeOperator, AttributePriority, RoutingRule, RoutingRuleBuilder,
    RuleIdSequence, RuleSnapshot, RuleSnapshotBuilder,
};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Ranking order used by the resolver
    #[serde(default)]
    pub priority: AttributePriority,

    /// Routing rules, in creation order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Config {
    /// Validate the configuration
    ///
    /// Every enabled rule is built once against a scratch id sequence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log.validate()?;

        if self.priority.is_empty() {
            return Err(ConfigError::ValidationError(
                "priority must list at least one attribute".into(),
            ));
        }

        self.build_rules(&RuleIdSequence::new())?;
        Ok(())
    }

    /// Build the enabled rules, drawing ids from `ids` in file order
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` naming the first rule that
    /// fails to build.
    pub fn build_rules(&self, ids: &RuleIdSequence) -> Result<Vec<RoutingRule>, ConfigError> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.enabled)
            .map(|(index, rule)| {
                rule.build(ids).map_err(|e| {
                    ConfigError::ValidationError(format!("rule {index} ({}): {e}", rule.label()))
                })
            })
            .collect()
    }

    /// Build a snapshot with this configuration's rules and priority
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if a rule fails to build or
    /// the snapshot is inconsistent.
    pub fn build_snapshot(
        &self,
        ids: &RuleIdSequence,
        version: u64,
    ) -> Result<RuleSnapshot, ConfigError> {
        let mut builder = RuleSnapshotBuilder::new();
        builder.add_rules(self.build_rules(ids)?);
        builder
            .priority(self.priority.clone())
            .version(version)
            .build()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Create a minimal default configuration with one example rule
    #[must_use]
    pub fn default_config() -> Self {
        Self {
            log: LogConfig::default(),
            priority: AttributePriority::default_order(),
            rules: vec![RuleConfig {
                tag: Some("branch-office".into()),
                src_addresses: PoolConfig::contains([
                    "192.168.1.0/24",
                    "10.1.0.0/16",
                    "172.0.0.0/8",
                    "8.8.8.8/32",
                ]),
                dst_address: ValueConfig::matches("10.2.1.1/32"),
                protocol: ValueConfig::matches("UDP"),
                dst_port: ValueConfig::matches("1-1024"),
                priority: None,
                enabled: true,
            }],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Include timestamps
    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Include target (module path)
    #[serde(default)]
    pub target: bool,
}

impl LogConfig {
    /// Validate logging options
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for an unknown format.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(ConfigError::ValidationError(format!(
                "log format must be 'json' or 'text', got '{other}'"
            ))),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            timestamps: true,
            target: false,
        }
    }
}

/// One routing rule in textual form
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Optional label reported with decisions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Source networks; `contains` by default
    pub src_addresses: PoolConfig,

    /// Destination network; `matches` by default
    pub dst_address: ValueConfig,

    /// Protocol token; `matches` by default
    pub protocol: ValueConfig,

    /// Destination port or range; `matches` by default
    pub dst_port: ValueConfig,

    /// Per-rule priority override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<AttributePriority>,

    /// Whether this rule is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl RuleConfig {
    /// Builder carrying this rule's values and operators
    #[must_use]
    pub fn to_builder(&self) -> RoutingRuleBuilder {
        let mut builder = RoutingRule::builder()
            .src_addresses(self.src_addresses.values.iter().cloned())
            .dst_address(self.dst_address.value.clone())
            .protocol(self.protocol.value.clone())
            .dst_port(self.dst_port.value.clone())
            .operator(AttributeKey::SourceAddresses, self.src_addresses.operator)
            .operator(AttributeKey::DestinationAddress, self.dst_address.operator)
            .operator(AttributeKey::Protocol, self.protocol.operator)
            .operator(AttributeKey::DestinationPort, self.dst_port.operator);
        if let Some(priority) = &self.priority {
            builder = builder.priority(priority.clone());
        }
        if let Some(tag) = &self.tag {
            builder = builder.tag(tag.clone());
        }
        builder
    }

    /// Build the rule
    ///
    /// # Errors
    ///
    /// Returns the `RuleError` raised by [`RoutingRuleBuilder::build`].
    pub fn build(&self, ids: &RuleIdSequence) -> Result<RoutingRule, RuleError> {
        self.to_builder().build(ids)
    }

    fn label(&self) -> &str {
        self.tag.as_deref().unwrap_or("untagged")
    }
}

/// Source network pool
///
/// Accepts either `{"operator": ..., "values": [...]}` or a bare array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "PoolConfigRepr")]
pub struct PoolConfig {
    /// Operator applied to the pool
    pub operator: AttributeOperator,

    /// Networks in CIDR form
    pub values: Vec<String>,
}

impl PoolConfig {
    /// `contains` over the given networks
    pub fn contains<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operator: AttributeOperator::Contains,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PoolConfigRepr {
    Values(Vec<String>),
    Full {
        #[serde(default = "default_pool_operator")]
        operator: AttributeOperator,
        values: Vec<String>,
    },
}

impl From<PoolConfigRepr> for PoolConfig {
    fn from(repr: PoolConfigRepr) -> Self {
        match repr {
            PoolConfigRepr::Values(values) => Self::contains(values),
            PoolConfigRepr::Full { operator, values } => Self { operator, values },
        }
    }
}

/// Single attribute value
///
/// Accepts either `{"operator": ..., "value": "..."}` or a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "ValueConfigRepr")]
pub struct ValueConfig {
    /// Operator applied to the value
    pub operator: AttributeOperator,

    /// Value text (CIDR, protocol token or port range)
    pub value: String,
}

impl ValueConfig {
    /// `matches` against the given value
    pub fn matches(value: impl Into<String>) -> Self {
        Self {
            operator: AttributeOperator::Matches,
            value: value.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ValueConfigRepr {
    Value(String),
    Full {
        #[serde(default = "default_value_operator")]
        operator: AttributeOperator,
        value: String,
    },
}

impl From<ValueConfigRepr> for ValueConfig {
    fn from(repr: ValueConfigRepr) -> Self {
        match repr {
            ValueConfigRepr::Value(value) => Self::matches(value),
            ValueConfigRepr::Full { operator, value } => Self { operator, value },
        }
    }
}

// Default value functions for serde

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

const fn default_pool_operator() -> AttributeOperator {
    AttributeOperator::Contains
}

const fn default_value_operator() -> AttributeOperator {
    AttributeOperator::Matches
}
