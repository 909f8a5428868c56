//! Configuration types for the IP block responder.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location of the remote IP inside a finding event.
pub const DEFAULT_IP_PATH: &str =
    "detail.service.action.networkConnectionAction.remoteIpDetails.ipAddressV4";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Target rule-set.
    pub rule_set: RuleSetConfig,

    /// Finding parsing.
    #[serde(default)]
    pub finding: FindingConfig,

    /// Rule-set control backend. Required: a run only counts as a block
    /// when it reaches the backend named here.
    pub backend: BackendConfig,
}

/// Target rule-set and the shape of the rules written to it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleSetConfig {
    /// Identifier of the rule-set to mutate (e.g. a security group id).
    pub id: String,

    /// Provenance annotation attached to every rule this responder creates.
    #[serde(default = "default_description")]
    pub description: String,

    /// Protocol of the blocking rule. "-1" means all protocols.
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_description() -> String {
    "Blocked by automated threat response".to_string()
}

fn default_protocol() -> String {
    "-1".to_string()
}

/// Finding parsing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FindingConfig {
    /// Dotted key path to the IPv4 address string.
    #[serde(default = "default_ip_path")]
    pub ip_path: String,
}

impl Default for FindingConfig {
    fn default() -> Self {
        Self {
            ip_path: default_ip_path(),
        }
    }
}

fn default_ip_path() -> String {
    DEFAULT_IP_PATH.to_string()
}

/// Which rule-set control backend to use.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process rule-set, nothing leaves the host. Used by dry runs.
    #[default]
    Memory,
    /// REST control-plane API.
    Http,
}

/// Rule-set control backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    pub kind: BackendKind,

    /// Base URL of the control-plane API (required for `http`).
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key (supports ${ENV_VAR} syntax).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            endpoint: None,
            api_key: None,
            timeout_ms: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    5000
}

impl Config {
    /// Build a configuration targeting `rule_set_id` with every other field defaulted.
    pub fn for_rule_set(rule_set_id: impl Into<String>) -> Self {
        Self {
            rule_set: RuleSetConfig {
                id: rule_set_id.into(),
                description: default_description(),
                protocol: default_protocol(),
            },
            finding: FindingConfig::default(),
            backend: BackendConfig::default(),
        }
    }

    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding `${VAR}` references first.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rule_set.id.trim().is_empty() {
            anyhow::bail!("rule_set.id must not be empty");
        }

        if self.rule_set.protocol.trim().is_empty() {
            anyhow::bail!("rule_set.protocol must not be empty");
        }

        if self.finding.ip_path.split('.').any(|segment| segment.is_empty()) {
            anyhow::bail!("Invalid finding.ip_path: {:?}", self.finding.ip_path);
        }

        if self.backend.kind == BackendKind::Http {
            match self.backend.endpoint.as_deref() {
                Some(endpoint) if !endpoint.trim().is_empty() => {}
                _ => anyhow::bail!("backend.kind is http but backend.endpoint is not set"),
            }
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# IP Block Responder Configuration

# Rule-set that receives the blocking rules
rule_set:
  id: "sg-0123456789abcdef0"
  description: "Blocked by automated threat response"
  protocol: "-1"               # -1 = all protocols

# Where the remote IP lives inside the finding event
finding:
  ip_path: "detail.service.action.networkConnectionAction.remoteIpDetails.ipAddressV4"

# Rule-set control backend
backend:
  kind: http                   # memory or http
  endpoint: "https://firewall.internal.example/api/v1"
  api_key: "${FIREWALL_API_KEY}"  # Use environment variable
  timeout_ms: 5000
"#
        .to_string()
    }
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> anyhow::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")?;
    let expanded = re.replace_all(content, |caps: &regex::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_default()
    });
    Ok(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::for_rule_set("sg-1");
        assert_eq!(config.rule_set.id, "sg-1");
        assert_eq!(config.rule_set.protocol, "-1");
        assert_eq!(
            config.rule_set.description,
            "Blocked by automated threat response"
        );
        assert_eq!(config.finding.ip_path, DEFAULT_IP_PATH);
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert_eq!(config.backend.timeout_ms, 5000);
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let config =
            Config::from_yaml("rule_set:\n  id: sg-abc\nbackend:\n  kind: memory\n").unwrap();
        assert_eq!(config.rule_set.id, "sg-abc");
        assert_eq!(config.rule_set.protocol, "-1");
        assert_eq!(config.finding.ip_path, DEFAULT_IP_PATH);
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert_eq!(config.backend.timeout_ms, 5000);
    }

    #[test]
    fn test_missing_backend_is_error() {
        let err = Config::from_yaml("rule_set:\n  id: sg-prod\n").unwrap_err();
        assert!(err.to_string().contains("backend"), "unexpected error: {}", err);
    }

    #[test]
    fn test_missing_backend_kind_is_error() {
        let yaml = "rule_set:\n  id: sg-prod\nbackend:\n  endpoint: http://127.0.0.1:9000\n";
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("kind"), "unexpected error: {}", err);
    }

    #[test]
    fn test_parse_example_config() {
        std::env::set_var("FIREWALL_API_KEY", "example-key");
        let config = Config::from_yaml(&Config::example()).unwrap();
        assert_eq!(config.rule_set.id, "sg-0123456789abcdef0");
        assert_eq!(config.backend.kind, BackendKind::Http);
        assert_eq!(config.backend.api_key.as_deref(), Some("example-key"));
        std::env::remove_var("FIREWALL_API_KEY");
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("IBR_TEST_RULE_SET", "sg-from-env");
        let result = expand_env_vars("id: \"${IBR_TEST_RULE_SET}\"").unwrap();
        assert_eq!(result, "id: \"sg-from-env\"");
        std::env::remove_var("IBR_TEST_RULE_SET");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("api_key: \"${IBR_NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "api_key: \"\"");
    }

    #[test]
    fn test_validate_empty_rule_set_id() {
        let config = Config::for_rule_set("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_ip_path() {
        let mut config = Config::for_rule_set("sg-1");
        config.finding.ip_path = "detail..ipAddressV4".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_http_requires_endpoint() {
        let mut config = Config::for_rule_set("sg-1");
        config.backend.kind = BackendKind::Http;
        assert!(config.validate().is_err());

        config.backend.endpoint = Some("http://localhost:8080".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"rule_set:\n  id: sg-file\nfinding:\n  ip_path: ip\nbackend:\n  kind: memory\n")
            .unwrap();
        file.flush().unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.rule_set.id, "sg-file");
        assert_eq!(config.finding.ip_path, "ip");
    }

    #[test]
    fn test_missing_rule_set_is_error() {
        assert!(Config::from_yaml("finding:\n  ip_path: ip\nbackend:\n  kind: memory\n").is_err());
    }
}
