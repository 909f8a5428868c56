//! Security finding events and remote IP extraction.

use serde_json::Value;

/// A security finding as delivered by the event source.
///
/// The schema belongs to the producer; only the IP address at a configured
/// key path is ever read.
#[derive(Debug, Clone)]
pub struct Finding(Value);

impl Finding {
    pub fn new(event: Value) -> Self {
        Self(event)
    }

    /// Parse a finding from raw JSON text.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content).map(Self)
    }

    /// Walk `path` (dotted keys) and return the string found at its end.
    ///
    /// The value is not validated as an address.
    pub fn extract_ip(&self, path: &str) -> Result<String, FindingError> {
        let mut current = &self.0;
        for segment in path.split('.') {
            current = current
                .get(segment)
                .ok_or_else(|| FindingError::MissingField {
                    segment: segment.to_string(),
                })?;
        }

        current
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| FindingError::NotAString {
                path: path.to_string(),
            })
    }
}

/// Why no IP could be read from a finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingError {
    /// A key along the path is absent (or its parent is not an object).
    MissingField { segment: String },
    /// The path resolved, but not to a string.
    NotAString { path: String },
}

impl std::fmt::Display for FindingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FindingError::MissingField { segment } => {
                write!(f, "Missing field in finding: {}", segment)
            }
            FindingError::NotAString { path } => {
                write!(f, "Value at {} is not a string", path)
            }
        }
    }
}

impl std::error::Error for FindingError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_IP_PATH;
    use serde_json::json;

    fn guardduty_finding(ip: &str) -> Finding {
        Finding::new(json!({
            "detail": {
                "service": {
                    "action": {
                        "networkConnectionAction": {
                            "remoteIpDetails": { "ipAddressV4": ip }
                        }
                    }
                }
            }
        }))
    }

    #[test]
    fn test_extract_ip_default_path() {
        let finding = guardduty_finding("203.0.113.7");
        assert_eq!(finding.extract_ip(DEFAULT_IP_PATH).unwrap(), "203.0.113.7");
    }

    #[test]
    fn test_extract_ip_passes_malformed_through() {
        let finding = guardduty_finding("999.1.2");
        assert_eq!(finding.extract_ip(DEFAULT_IP_PATH).unwrap(), "999.1.2");
    }

    #[test]
    fn test_extract_ip_empty_event() {
        let finding = Finding::new(json!({}));
        assert_eq!(
            finding.extract_ip(DEFAULT_IP_PATH),
            Err(FindingError::MissingField {
                segment: "detail".to_string()
            })
        );
    }

    #[test]
    fn test_extract_ip_partial_path() {
        let finding = Finding::new(json!({ "detail": { "service": { "action": {} } } }));
        assert_eq!(
            finding.extract_ip(DEFAULT_IP_PATH),
            Err(FindingError::MissingField {
                segment: "networkConnectionAction".to_string()
            })
        );
    }

    #[test]
    fn test_extract_ip_through_non_object() {
        let finding = Finding::new(json!({ "detail": "oops" }));
        assert!(matches!(
            finding.extract_ip(DEFAULT_IP_PATH),
            Err(FindingError::MissingField { .. })
        ));
    }

    #[test]
    fn test_extract_ip_not_a_string() {
        let finding = Finding::new(json!({ "ip": 42 }));
        assert_eq!(
            finding.extract_ip("ip"),
            Err(FindingError::NotAString {
                path: "ip".to_string()
            })
        );
    }

    #[test]
    fn test_from_json() {
        let finding = Finding::from_json(r#"{"ip": "198.51.100.1"}"#).unwrap();
        assert_eq!(finding.extract_ip("ip").unwrap(), "198.51.100.1");
        assert!(Finding::from_json("not json").is_err());
    }
}
