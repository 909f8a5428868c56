//! Blocking-rule reconciliation.
//!
//! One call takes a finding to a rule-set holding exactly one blocking rule
//! for the finding's remote IP. Existing rules are removed first (any failure
//! there is logged and ignored), then a fresh rule is inserted. Only a failed
//! insertion is an error.

use crate::config::Config;
use crate::finding::Finding;
use crate::ruleset::{RuleSetControl, RuleSetError, RuleSpec};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Message returned when the finding carries no IP.
pub const NO_IP_MESSAGE: &str = "No IP in event.";

/// Status-and-message pair handed back to whatever triggered the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

/// Non-exceptional result of a reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A blocking rule for `ip` is in place.
    Blocked { ip: String },
    /// The finding had no usable IP; the rule-set was not touched.
    RejectedInput { message: String },
}

impl Outcome {
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Blocked { .. } => 200,
            Outcome::RejectedInput { .. } => 400,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Outcome::Blocked { ip } => format!("Blocked IP {}", ip),
            Outcome::RejectedInput { message } => message.clone(),
        }
    }

    pub fn response(&self) -> Response {
        Response {
            status_code: self.status_code(),
            body: self.message(),
        }
    }
}

/// Failure that aborts a reconcile.
#[derive(Debug)]
pub enum ReconcileError {
    /// The blocking rule could not be inserted. A preceding removal is not rolled back.
    Insertion { ip: String, source: RuleSetError },
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::Insertion { ip, source } => {
                write!(f, "Failed to add blocking rule for {}: {}", ip, source)
            }
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Insertion { source, .. } => Some(source),
        }
    }
}

/// Keeps a single rule-set's blocking rules in line with incoming findings.
pub struct RuleReconciler {
    rule_set_id: String,
    protocol: String,
    description: String,
    ip_path: String,
    control: Arc<dyn RuleSetControl>,
}

impl RuleReconciler {
    /// Create a reconciler for the rule-set named in `config`.
    pub fn new(config: &Config, control: Arc<dyn RuleSetControl>) -> Self {
        Self {
            rule_set_id: config.rule_set.id.clone(),
            protocol: config.rule_set.protocol.clone(),
            description: config.rule_set.description.clone(),
            ip_path: config.finding.ip_path.clone(),
            control,
        }
    }

    pub fn rule_set_id(&self) -> &str {
        &self.rule_set_id
    }

    /// Like [`reconcile`](Self::reconcile), for an event still in raw JSON form.
    ///
    /// Text that is not JSON is rejected the same way as a finding without an IP.
    pub async fn reconcile_json(&self, content: &str) -> Result<Outcome, ReconcileError> {
        match Finding::from_json(content) {
            Ok(finding) => self.reconcile(&finding).await,
            Err(e) => {
                info!(error = %e, "Event is not valid JSON");
                Ok(Outcome::RejectedInput {
                    message: NO_IP_MESSAGE.to_string(),
                })
            }
        }
    }

    /// Ensure exactly one blocking rule exists for the finding's remote IP.
    pub async fn reconcile(&self, finding: &Finding) -> Result<Outcome, ReconcileError> {
        let ip = match finding.extract_ip(&self.ip_path) {
            Ok(ip) => ip,
            Err(e) => {
                info!(error = %e, "No IP found in event");
                return Ok(Outcome::RejectedInput {
                    message: NO_IP_MESSAGE.to_string(),
                });
            }
        };

        let rule = RuleSpec::host(&self.rule_set_id, &self.protocol, &ip, &self.description);

        match self.control.remove_rule(&rule).await {
            Ok(()) => {
                debug!(ip = %ip, rule_set = %self.rule_set_id, "Removed existing rule");
            }
            Err(e) if e.is_not_found() => {
                info!(
                    ip = %ip,
                    rule_set = %self.rule_set_id,
                    "IP not present in rule-set, adding fresh rule"
                );
            }
            Err(e) => {
                warn!(
                    ip = %ip,
                    rule_set = %self.rule_set_id,
                    backend = self.control.name(),
                    error = %e,
                    "Failed to remove existing rule, adding fresh rule anyway"
                );
            }
        }

        if let Err(source) = self.control.add_rule(&rule).await {
            return Err(ReconcileError::Insertion { ip, source });
        }

        info!(ip = %ip, rule_set = %self.rule_set_id, cidr = %rule.cidr, "Blocked IP successfully");
        Ok(Outcome::Blocked { ip })
    }
}
