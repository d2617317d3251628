//! Policy application
//!
//! Walks the ingress rules in document order, hands each recognized rule to a
//! [`RuleExecutor`], then sets the INPUT default policy to DROP.
//!
//! The first failure aborts the run. Rules already applied stay applied and
//! the default policy is left untouched; re-running the whole policy is the
//! recovery path.

use crate::core::error::Result;
use crate::core::executor::RuleExecutor;
use crate::core::policy::{Policy, RuleAction};
use tracing::{debug, info};

/// Outcome of a successful apply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Rules that produced a command
    pub applied: usize,
    /// Rules with an unrecognized action
    pub skipped: usize,
}

impl ApplyReport {
    /// Commands issued, including the default policy
    pub fn commands(&self) -> usize {
        self.applied + 1
    }
}

/// Sequences a policy onto a [`RuleExecutor`]
#[derive(Debug)]
pub struct PolicyApplier<E> {
    executor: E,
}

impl<E: RuleExecutor> PolicyApplier<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Applies every recognized rule, then the default DROP policy.
    ///
    /// Rules whose action is neither `allow` nor `deny` are skipped without
    /// any output; they only show up in the returned report.
    ///
    /// # Errors
    ///
    /// Returns the first executor error. Nothing after the failing command is
    /// issued.
    pub async fn apply(&mut self, policy: &Policy) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        for (index, rule) in policy.ingress.iter().enumerate() {
            match rule.recognized_action() {
                Some(RuleAction::Allow) => self.executor.apply_accept(rule).await?,
                Some(RuleAction::Deny) => self.executor.apply_deny(rule).await?,
                None => {
                    debug!("Skipping rule {index} with unrecognized action {}", rule.action);
                    report.skipped += 1;
                    continue;
                }
            }
            report.applied += 1;
        }

        self.executor.set_default_drop().await?;

        info!(
            "Policy applied: {} rules, {} skipped, default DROP",
            report.applied, report.skipped
        );
        Ok(report)
    }
}
