//! REST control-plane rule-set backend.

use super::{RuleSetControl, RuleSetError, RuleSpec};
use crate::config::BackendConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Body of a removal request.
#[derive(Debug, Serialize)]
struct RuleMatch<'a> {
    protocol: &'a str,
    cidr: &'a str,
}

/// Body of an insertion request.
#[derive(Debug, Serialize)]
struct NewRule<'a> {
    protocol: &'a str,
    cidr: &'a str,
    description: &'a str,
}

/// Which call a response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Remove,
    Add,
}

/// Rule-set backend talking to a firewall control-plane over HTTP.
///
/// Rules live under `{endpoint}/rule-sets/{id}/rules`: `DELETE` with a
/// protocol/cidr match removes, `POST` adds.
pub struct HttpRuleSet {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpRuleSet {
    /// Create a new HTTP backend.
    pub fn new(config: &BackendConfig) -> Result<Self, RuleSetError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| RuleSetError::Other("No control-plane endpoint configured".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            endpoint,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            client,
        })
    }

    fn rules_url(&self, rule_set_id: &str) -> String {
        format!("{}/rule-sets/{}/rules", self.endpoint, rule_set_id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn check_response(
        response: reqwest::Response,
        operation: Operation,
    ) -> Result<(), RuleSetError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body, operation))
    }
}

/// Map a non-success status to the backend error it stands for.
fn classify_failure(status: StatusCode, body: &str, operation: Operation) -> RuleSetError {
    match (operation, status) {
        (Operation::Remove, StatusCode::NOT_FOUND) => RuleSetError::NotFound,
        (Operation::Add, StatusCode::CONFLICT) => RuleSetError::Duplicate,
        (_, StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT) => RuleSetError::Timeout,
        _ => RuleSetError::InvalidResponse(format!("HTTP {}: {}", status, body)),
    }
}

#[async_trait]
impl RuleSetControl for HttpRuleSet {
    async fn remove_rule(&self, rule: &RuleSpec) -> Result<(), RuleSetError> {
        let url = self.rules_url(&rule.rule_set_id);
        debug!(url = %url, cidr = %rule.cidr, "Removing rule");

        let response = self
            .authorize(self.client.delete(&url))
            .json(&RuleMatch {
                protocol: &rule.protocol,
                cidr: &rule.cidr,
            })
            .send()
            .await?;

        Self::check_response(response, Operation::Remove).await
    }

    async fn add_rule(&self, rule: &RuleSpec) -> Result<(), RuleSetError> {
        let url = self.rules_url(&rule.rule_set_id);
        debug!(url = %url, cidr = %rule.cidr, "Adding rule");

        let response = self
            .authorize(self.client.post(&url))
            .json(&NewRule {
                protocol: &rule.protocol,
                cidr: &rule.cidr,
                description: &rule.description,
            })
            .send()
            .await?;

        Self::check_response(response, Operation::Add).await
    }

    fn name(&self) -> &str {
        "http"
    }
}
