//! Core policy application
//!
//! - [`policy`]: Policy documents and loading
//! - [`executor`]: The rule execution capability and its `iptables` implementation
//! - [`applier`]: Sequencing a policy onto an executor
//! - [`check`]: Advisory checks for policy authors
//! - [`error`]: Error types

pub mod applier;
pub mod check;
pub mod error;
pub mod executor;
pub mod policy;

#[cfg(test)]
pub mod test_helpers;
