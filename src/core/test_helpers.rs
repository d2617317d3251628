//! Shared test utilities for core module tests
//!
//! This module is only compiled in test mode.

use crate::config::Settings;
use crate::core::error::{Error, Result};
use crate::core::executor::RuleExecutor;
use crate::core::policy::{Policy, Rule, RuleAction};
use crate::elevation::ElevationMethod;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::sync::Mutex;

/// Mutex for tests that need exclusive access to environment variables.
///
/// Any test that builds a real process command must hold this, since
/// elevation reads `VPCFW_TEST_NO_ELEVATION` and `VPCFW_ELEVATION_METHOD`.
///
/// # Example
///
/// ```ignore
/// let _guard = ENV_VAR_MUTEX.lock().unwrap();
/// unsafe {
///     std::env::set_var("VPCFW_ELEVATION_METHOD", "none");
/// }
/// // ... test with custom env state ...
/// unsafe {
///     std::env::remove_var("VPCFW_ELEVATION_METHOD");
/// }
/// ```
pub static ENV_VAR_MUTEX: Mutex<()> = Mutex::new(());

/// What a [`RecordingExecutor`] was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issued {
    Accept { protocol: String, port: i64 },
    Deny { protocol: String, port: i64 },
    DefaultDrop,
}

impl Issued {
    /// The call a rule is expected to produce, `None` for skipped rules
    pub fn for_rule(rule: &Rule) -> Option<Self> {
        let (protocol, port) = Issued::matched(rule);
        rule.recognized_action().map(|action| match action {
            RuleAction::Allow => Issued::Accept { protocol, port },
            RuleAction::Deny => Issued::Deny { protocol, port },
        })
    }

    fn matched(rule: &Rule) -> (String, i64) {
        rule.filter_match()
            .map(|(protocol, port)| (protocol.to_string(), port))
            .unwrap_or_default()
    }
}

/// Executor that records calls instead of running processes.
///
/// With `fail_at = Some(k)` the call with 0-based index `k` is recorded and
/// then fails like a non-zero exit.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub issued: Vec<Issued>,
    pub fail_at: Option<usize>,
}

impl RecordingExecutor {
    pub fn failing_at(index: usize) -> Self {
        Self {
            issued: Vec::new(),
            fail_at: Some(index),
        }
    }

    fn record(&mut self, issued: Issued) -> Result<()> {
        let index = self.issued.len();
        self.issued.push(issued);
        if self.fail_at == Some(index) {
            return Err(Error::CommandFailed {
                command: format!("recorded command #{index}"),
                exit_code: Some(1),
                stderr: "iptables: Bad rule (does a matching rule exist in that chain?).\n"
                    .to_string(),
            });
        }
        Ok(())
    }
}

impl RuleExecutor for RecordingExecutor {
    async fn apply_accept(&mut self, rule: &Rule) -> Result<()> {
        let (protocol, port) = Issued::matched(rule);
        self.record(Issued::Accept { protocol, port })
    }

    async fn apply_deny(&mut self, rule: &Rule) -> Result<()> {
        let (protocol, port) = Issued::matched(rule);
        self.record(Issued::Deny { protocol, port })
    }

    async fn set_default_drop(&mut self) -> Result<()> {
        self.record(Issued::DefaultDrop)
    }
}

/// Settings pointing at the plain `ip`/`iptables` names with no elevation.
pub fn test_settings(namespace: &str) -> Settings {
    Settings {
        namespace: namespace.to_string(),
        elevation: ElevationMethod::None,
        audit: false,
        ..Settings::default()
    }
}

prop_compose! {
    pub fn arb_rule()(
        port in 1i64..=65535,
        protocol in prop::sample::select(vec!["tcp", "udp", "sctp"]),
        action in prop::sample::select(vec![
            json!("allow"), json!("deny"), json!("allow"), json!("deny"),
            json!("reject"), json!("Allow"), json!(""), Value::Null, json!(1), json!(true),
        ]),
    ) -> Rule {
        Rule {
            action,
            ..Rule::new(port, protocol, "")
        }
    }
}

prop_compose! {
    pub fn arb_policy()(ingress in prop::collection::vec(arb_rule(), 0..24)) -> Policy {
        Policy { ingress }
    }
}
