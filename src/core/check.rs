//! Advisory policy checks
//!
//! `apply` never rejects a parsed policy: unrecognized actions are skipped and
//! odd ports or protocols go to `iptables` as written. This module is how policy
//! authors find those rules before they matter.

use crate::core::policy::{Policy, RuleAction};
use crate::validators::{validate_port, validate_port_protocol};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Applies, but probably not what the author meant
    Warning,
    /// `iptables` will reject it, aborting the run
    Error,
}

/// One problem with one rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// 0-based position in `ingress`
    pub index: usize,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ingress[{}]: {}", self.severity, self.index, self.message)
    }
}

/// Checks a policy and returns findings ordered by rule index.
pub fn check_policy(policy: &Policy) -> Vec<Finding> {
    let mut findings = Vec::new();
    // (protocol, port, action) -> first index
    let mut first: HashMap<(&str, i64, RuleAction), usize> = HashMap::new();

    for (index, rule) in policy.ingress.iter().enumerate() {
        let Some(action) = rule.recognized_action() else {
            findings.push(Finding {
                index,
                severity: Severity::Warning,
                message: format!(
                    "action {} is not \"allow\" or \"deny\"; the rule will be skipped",
                    rule.action
                ),
            });
            continue;
        };

        let (protocol, port) = match rule.filter_match() {
            Ok(matched) => matched,
            Err(message) => {
                findings.push(Finding {
                    index,
                    severity: Severity::Error,
                    message,
                });
                continue;
            }
        };

        if let Err(message) = validate_port(port) {
            findings.push(Finding {
                index,
                severity: Severity::Error,
                message,
            });
        }

        if let Err(message) = validate_port_protocol(protocol) {
            findings.push(Finding {
                index,
                severity: Severity::Error,
                message,
            });
        }

        if let Some(&earlier) = first.get(&(protocol, port, action)) {
            findings.push(Finding {
                index,
                severity: Severity::Warning,
                message: format!("duplicates ingress[{earlier}] ({rule})"),
            });
        }

        let other = opposite(action);
        if let Some(&earlier) = first.get(&(protocol, port, other)) {
            findings.push(Finding {
                index,
                severity: Severity::Warning,
                message: format!(
                    "conflicts with ingress[{earlier}] ({other} {protocol}/{port}); the earlier rule wins"
                ),
            });
        }

        first.entry((protocol, port, action)).or_insert(index);
    }

    findings
}

fn opposite(action: RuleAction) -> RuleAction {
    match action {
        RuleAction::Allow => RuleAction::Deny,
        RuleAction::Deny => RuleAction::Allow,
    }
}
