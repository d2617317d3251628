//! vpcfw - VPC namespace firewall
//!
//! Applies a declarative ingress policy to the INPUT chain of a network
//! namespace with `iptables`, then sets the chain's default policy to DROP.
//!
//! # Architecture
//!
//! - [`core`] - Policy model, applier, rule executor, checks
//! - [`elevation`] - Privilege escalation for `ip netns exec`
//! - [`audit`] - Audit logging of apply runs
//! - [`validators`] - Input validation
//! - [`config`] - Settings
//! - [`utils`] - XDG directories
//!
//! # Failure model
//!
//! Every error is fatal. A failing command stops the run where it is: earlier
//! rules stay in the table and the default policy is not changed.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod core;
pub mod elevation;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use core::applier::{ApplyReport, PolicyApplier};
pub use core::error::{Error, Result};
pub use core::policy::{Policy, Rule};
