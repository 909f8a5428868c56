//! In-process rule-set backend.

use super::{RuleSetControl, RuleSetError, RuleSpec};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Rule-sets held in memory, keyed by rule-set id.
///
/// Follows security-group semantics: removing an absent rule fails with
/// `NotFound` and adding a rule that already exists fails with `Duplicate`.
#[derive(Default)]
pub struct MemoryRuleSet {
    rule_sets: RwLock<HashMap<String, Vec<RuleSpec>>>,
}

impl MemoryRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-populated with `rules`.
    pub fn with_rules(rules: impl IntoIterator<Item = RuleSpec>) -> Self {
        let mut rule_sets: HashMap<String, Vec<RuleSpec>> = HashMap::new();
        for rule in rules {
            rule_sets
                .entry(rule.rule_set_id.clone())
                .or_default()
                .push(rule);
        }
        Self {
            rule_sets: RwLock::new(rule_sets),
        }
    }

    /// Snapshot of the rules in a rule-set, in insertion order.
    pub fn rules(&self, rule_set_id: &str) -> Vec<RuleSpec> {
        self.rule_sets
            .read()
            .map(|sets| sets.get(rule_set_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn poisoned() -> RuleSetError {
        RuleSetError::Other("Rule-set lock poisoned".to_string())
    }
}

#[async_trait]
impl RuleSetControl for MemoryRuleSet {
    async fn remove_rule(&self, rule: &RuleSpec) -> Result<(), RuleSetError> {
        let mut sets = self.rule_sets.write().map_err(|_| Self::poisoned())?;
        let rules = sets
            .get_mut(&rule.rule_set_id)
            .ok_or(RuleSetError::NotFound)?;

        let before = rules.len();
        rules.retain(|existing| !existing.matches(rule));
        if rules.len() == before {
            return Err(RuleSetError::NotFound);
        }

        debug!(rule_set = %rule.rule_set_id, cidr = %rule.cidr, "Rule removed");
        Ok(())
    }

    async fn add_rule(&self, rule: &RuleSpec) -> Result<(), RuleSetError> {
        let mut sets = self.rule_sets.write().map_err(|_| Self::poisoned())?;
        let rules = sets.entry(rule.rule_set_id.clone()).or_default();

        if rules.iter().any(|existing| existing.matches(rule)) {
            return Err(RuleSetError::Duplicate);
        }

        rules.push(rule.clone());
        debug!(rule_set = %rule.rule_set_id, cidr = %rule.cidr, "Rule added");
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
