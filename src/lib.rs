//! Automated IP block responder.
//!
//! Takes a security finding that names a malicious remote IP and makes sure
//! the target firewall rule-set carries exactly one rule blocking that host.
//!
//! # Features
//!
//! - **Idempotent reconcile** - Remove any existing rule for the host, then add a fresh one
//! - **Tolerant removal** - A missing rule (first block) never fails the run
//! - **Configurable finding path** - Read the IP from any dotted key path
//! - **Pluggable backends** - In-memory rule-set or a REST control-plane API
//!
//! # Example Configuration
//!
//! ```yaml
//! rule_set:
//!   id: "sg-0123456789abcdef0"
//!   description: "Blocked by automated threat response"
//!
//! backend:
//!   kind: http
//!   endpoint: "https://firewall.internal.example/api/v1"
//!   api_key: "${FIREWALL_API_KEY}"
//! ```

pub mod config;
pub mod finding;
pub mod reconciler;
pub mod ruleset;

pub use config::Config;
pub use finding::Finding;
pub use reconciler::{Outcome, ReconcileError, Response, RuleReconciler};
pub use ruleset::{RuleSetControl, RuleSetError, RuleSpec};

use config::BackendKind;
use ruleset::http::HttpRuleSet;
use ruleset::memory::MemoryRuleSet;
use std::sync::Arc;

/// Build the rule-set backend selected in `config`.
pub fn build_backend(config: &Config) -> Result<Arc<dyn RuleSetControl>, RuleSetError> {
    let backend: Arc<dyn RuleSetControl> = match config.backend.kind {
        BackendKind::Memory => Arc::new(MemoryRuleSet::new()),
        BackendKind::Http => Arc::new(HttpRuleSet::new(&config.backend)?),
    };
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_memory_backend() {
        let config = Config::for_rule_set("sg-1");
        let backend = build_backend(&config).unwrap();
        assert_eq!(backend.name(), "memory");
    }

    #[test]
    fn test_build_http_backend() {
        let mut config = Config::for_rule_set("sg-1");
        config.backend.kind = BackendKind::Http;
        assert!(build_backend(&config).is_err());

        config.backend.endpoint = Some("http://127.0.0.1:9000".to_string());
        let backend = build_backend(&config).unwrap();
        assert_eq!(backend.name(), "http");
    }
}
