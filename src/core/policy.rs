//! Security policy documents
//!
//! A policy is a JSON document with a single `ingress` array:
//!
//! ```json
//! { "ingress": [ { "port": 22, "protocol": "tcp", "action": "allow" } ] }
//! ```
//!
//! Rules are kept exactly as written. A rule whose `action` is anything other
//! than the strings `"allow"` or `"deny"` is skipped, whatever the types of its
//! fields. Recognized rules must have an integer `port` and a string
//! `protocol`; their values are not range-checked here. `iptables` is the
//! authority on what it accepts, and [`crate::core::check`] reports suspicious
//! values ahead of time.
//!
//! # Example
//!
//! ```
//! use vpcfw::core::policy::{Policy, RuleAction};
//!
//! let policy = Policy::from_json(r#"{"ingress":[{"port":22,"protocol":"tcp","action":"allow"}]}"#)?;
//! assert_eq!(policy.ingress[0].recognized_action(), Some(RuleAction::Allow));
//! # Ok::<(), serde_json::Error>(())
//! ```

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use tracing::info;

/// Root policy document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy")]
pub struct Policy {
    /// Inbound rules, applied to the INPUT chain in document order
    pub ingress: Vec<Rule>,
}

#[derive(Deserialize)]
struct RawPolicy {
    ingress: Vec<Rule>,
}

impl TryFrom<RawPolicy> for Policy {
    type Error = String;

    fn try_from(raw: RawPolicy) -> std::result::Result<Self, Self::Error> {
        for (index, rule) in raw.ingress.iter().enumerate() {
            if rule.recognized_action().is_some() {
                rule.filter_match()
                    .map_err(|message| format!("ingress[{index}]: {message}"))?;
            }
        }
        Ok(Policy {
            ingress: raw.ingress,
        })
    }
}

/// One ingress directive
///
/// All three keys are required, but their values are kept as raw JSON: only
/// rules with a recognized action are read further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub port: Value,
    pub protocol: Value,
    pub action: Value,
}

/// Actions the applier acts on
///
/// Matching is exact and case-sensitive: `"Allow"` is not recognized.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
pub enum RuleAction {
    #[strum(serialize = "allow")]
    Allow,
    #[strum(serialize = "deny")]
    Deny,
}

impl Rule {
    pub fn new(port: i64, protocol: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            port: Value::from(port),
            protocol: Value::String(protocol.into()),
            action: Value::String(action.into()),
        }
    }

    /// Returns the action if it is one the applier acts on, `None` if the rule
    /// will be skipped. Non-string actions are never recognized.
    pub fn recognized_action(&self) -> Option<RuleAction> {
        self.action.as_str()?.parse().ok()
    }

    /// The protocol and destination port a filter command matches on.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `protocol` is not a string or `port` is not an integer.
    pub fn filter_match(&self) -> std::result::Result<(&str, i64), String> {
        let protocol = self
            .protocol
            .as_str()
            .ok_or_else(|| format!("protocol must be a string, got {}", self.protocol))?;
        let port = self
            .port
            .as_i64()
            .ok_or_else(|| format!("port must be an integer, got {}", self.port))?;
        Ok((protocol, port))
    }
}

/// Strings without their JSON quotes, everything else as JSON
fn plain(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}",
            plain(&self.action),
            plain(&self.protocol),
            plain(&self.port)
        )
    }
}

impl Policy {
    /// Parses a policy document from a JSON string.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Number of rules that will produce a command when applied
    pub fn recognized_count(&self) -> usize {
        self.ingress
            .iter()
            .filter(|rule| rule.recognized_action().is_some())
            .count()
    }
}

/// A policy together with the digest of the document it came from
#[derive(Debug, Clone)]
pub struct LoadedPolicy {
    pub policy: Policy,
    /// SHA-256 of the raw document bytes, lowercase hex
    pub checksum: String,
}

/// Computes the SHA-256 hex digest of a policy document.
pub fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Reads and parses the policy document at `path`.
///
/// The file is read fully and closed before this returns.
///
/// # Errors
///
/// Returns [`Error::PolicyRead`] if the file cannot be read and
/// [`Error::PolicyParse`] if it is not valid JSON, lacks `ingress`, a rule
/// lacks `port`, `protocol` or `action`, or a recognized rule has a non-integer
/// port or non-string protocol.
pub async fn load_policy(path: &Path) -> Result<LoadedPolicy> {
    let bytes = tokio::fs::read(path).await.map_err(|source| Error::PolicyRead {
        path: path.to_path_buf(),
        source,
    })?;

    let policy: Policy = serde_json::from_slice(&bytes).map_err(|source| Error::PolicyParse {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        "Loaded policy {} with {} ingress rules",
        path.display(),
        policy.ingress.len()
    );

    Ok(LoadedPolicy {
        policy,
        checksum: compute_checksum(&bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_example_policy() {
        let policy = Policy::from_json(
            r#"{"ingress":[{"port":22,"protocol":"tcp","action":"allow"},{"port":23,"protocol":"tcp","action":"deny"}]}"#,
        )
        .unwrap();

        assert_eq!(policy.ingress.len(), 2);
        assert_eq!(policy.ingress[0], Rule::new(22, "tcp", "allow"));
        assert_eq!(policy.ingress[1].recognized_action(), Some(RuleAction::Deny));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let policy = Policy::from_json(
            r#"{"version":2,"ingress":[{"port":80,"protocol":"tcp","action":"allow","comment":"web"}]}"#,
        )
        .unwrap();
        assert_eq!(policy.ingress.len(), 1);
    }

    #[test]
    fn test_missing_ingress_is_rejected() {
        assert!(Policy::from_json(r#"{"egress":[]}"#).is_err());
    }

    #[test]
    fn test_missing_rule_field_is_rejected() {
        assert!(Policy::from_json(r#"{"ingress":[{"port":22,"protocol":"tcp"}]}"#).is_err());
        assert!(Policy::from_json(r#"{"ingress":[{"protocol":"tcp","action":"allow"}]}"#).is_err());
    }

    #[test]
    fn test_out_of_range_port_is_kept() {
        let policy =
            Policy::from_json(r#"{"ingress":[{"port":70000,"protocol":"tcp","action":"allow"}]}"#)
                .unwrap();
        assert_eq!(policy.ingress[0].filter_match(), Ok(("tcp", 70000)));
    }

    #[test]
    fn test_action_matching_is_exact() {
        assert_eq!(Rule::new(1, "tcp", "allow").recognized_action(), Some(RuleAction::Allow));
        assert_eq!(Rule::new(1, "tcp", "Allow").recognized_action(), None);
        assert_eq!(Rule::new(1, "tcp", "reject").recognized_action(), None);
        assert_eq!(Rule::new(1, "tcp", "").recognized_action(), None);
    }

    #[test]
    fn test_non_string_action_is_skipped() {
        let policy = Policy::from_json(
            r#"{"ingress":[
                {"port":22,"protocol":"tcp","action":null},
                {"port":23,"protocol":"tcp","action":1},
                {"port":24,"protocol":"tcp","action":true},
                {"port":25,"protocol":"tcp","action":["allow"]},
                {"port":26,"protocol":"tcp","action":"deny"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(policy.ingress.len(), 5);
        assert!(policy.ingress[..4].iter().all(|r| r.recognized_action().is_none()));
        assert_eq!(policy.ingress[4].recognized_action(), Some(RuleAction::Deny));
        assert_eq!(policy.recognized_count(), 1);
    }

    #[test]
    fn test_skipped_rule_fields_are_not_typed() {
        let policy = Policy::from_json(
            r#"{"ingress":[{"port":"any","protocol":null,"action":"note"},{"port":23,"protocol":"tcp","action":"deny"}]}"#,
        )
        .unwrap();

        assert_eq!(policy.ingress[0].recognized_action(), None);
        assert!(policy.ingress[0].filter_match().is_err());
        assert_eq!(policy.ingress[1].filter_match(), Ok(("tcp", 23)));
    }

    #[test]
    fn test_recognized_rule_needs_integer_port_and_string_protocol() {
        let err = Policy::from_json(r#"{"ingress":[{"port":"22","protocol":"tcp","action":"allow"}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("ingress[0]: port must be an integer"));

        let err = Policy::from_json(
            r#"{"ingress":[{"port":1,"protocol":"tcp","action":"x"},{"port":22,"protocol":6,"action":"deny"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ingress[1]: protocol must be a string"));

        assert!(Policy::from_json(r#"{"ingress":[{"port":22.5,"protocol":"tcp","action":"allow"}]}"#).is_err());
    }

    #[test]
    fn test_missing_field_on_skipped_rule_is_rejected() {
        assert!(Policy::from_json(r#"{"ingress":[{"port":22,"action":null}]}"#).is_err());
    }

    #[test]
    fn test_rule_display() {
        assert_eq!(Rule::new(22, "tcp", "allow").to_string(), "allow tcp/22");

        let rule: Rule = serde_json::from_str(r#"{"port":"any","protocol":"tcp","action":null}"#).unwrap();
        assert_eq!(rule.to_string(), "null tcp/any");
    }

    #[test]
    fn test_recognized_count() {
        let policy = Policy {
            ingress: vec![
                Rule::new(22, "tcp", "allow"),
                Rule::new(25, "tcp", "permit"),
                Rule::new(53, "udp", "deny"),
            ],
        };
        assert_eq!(policy.recognized_count(), 2);
    }

    #[test]
    fn test_checksum_is_stable() {
        let a = compute_checksum(br#"{"ingress":[]}"#);
        let b = compute_checksum(br#"{"ingress":[]}"#);
        let c = compute_checksum(br#"{"ingress": []}"#);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_load_policy_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security_policy.json");
        std::fs::write(&path, r#"{"ingress":[{"port":443,"protocol":"tcp","action":"allow"}]}"#)
            .unwrap();

        let loaded = load_policy(&path).await.unwrap();
        assert_eq!(loaded.policy.ingress, vec![Rule::new(443, "tcp", "allow")]);
        assert_eq!(loaded.checksum.len(), 64);
    }

    #[tokio::test]
    async fn test_load_missing_policy() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_policy(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, Error::PolicyRead { .. }));
    }

    #[tokio::test]
    async fn test_load_malformed_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ingress: [").unwrap();

        let err = load_policy(&path).await.unwrap_err();
        assert!(matches!(err, Error::PolicyParse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }
}
