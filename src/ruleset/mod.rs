//! Rule-set control backends.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A blocking rule as written to a rule-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Rule-set the rule belongs to.
    pub rule_set_id: String,

    /// Protocol, "-1" for all protocols.
    pub protocol: String,

    /// Source range, e.g. "203.0.113.7/32".
    pub cidr: String,

    /// Provenance annotation.
    pub description: String,
}

impl RuleSpec {
    /// Create a rule blocking a single host.
    pub fn host(rule_set_id: &str, protocol: &str, ip: &str, description: &str) -> Self {
        Self {
            rule_set_id: rule_set_id.to_string(),
            protocol: protocol.to_string(),
            cidr: host_cidr(ip),
            description: description.to_string(),
        }
    }

    /// Whether `other` targets the same traffic. Descriptions are ignored.
    pub fn matches(&self, other: &RuleSpec) -> bool {
        self.rule_set_id == other.rule_set_id
            && self.protocol == other.protocol
            && self.cidr == other.cidr
    }
}

/// Format an address as a single-host CIDR.
pub fn host_cidr(ip: &str) -> String {
    format!("{}/32", ip)
}

/// Error from a rule-set backend.
#[derive(Debug)]
pub enum RuleSetError {
    /// No rule matched the removal request.
    NotFound,
    /// An identical rule already exists.
    Duplicate,
    /// HTTP request failed.
    Http(reqwest::Error),
    /// Timeout.
    Timeout,
    /// Invalid response.
    InvalidResponse(String),
    /// Other error.
    Other(String),
}

impl RuleSetError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuleSetError::NotFound)
    }
}

impl std::fmt::Display for RuleSetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleSetError::NotFound => write!(f, "Rule not found"),
            RuleSetError::Duplicate => write!(f, "Rule already exists"),
            RuleSetError::Http(e) => write!(f, "HTTP error: {}", e),
            RuleSetError::Timeout => write!(f, "Request timed out"),
            RuleSetError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            RuleSetError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RuleSetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuleSetError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RuleSetError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RuleSetError::Timeout
        } else {
            RuleSetError::Http(e)
        }
    }
}

/// Control capability over an externally owned rule-set.
///
/// Each call is a single attempt; callers decide what a failure means.
#[async_trait]
pub trait RuleSetControl: Send + Sync {
    /// Remove the rule matching `rule` (protocol and cidr).
    async fn remove_rule(&self, rule: &RuleSpec) -> Result<(), RuleSetError>;

    /// Add `rule` to its rule-set.
    async fn add_rule(&self, rule: &RuleSpec) -> Result<(), RuleSetError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
