//! Privilege elevation for namespace firewall commands
//!
//! vpcfw only ever elevates one program: `ip`, invoked as
//! `ip netns exec <namespace> iptables ...`. Entering a namespace and editing
//! its filter table both need root.
//!
//! # Elevation Strategy
//!
//! 1. `VPCFW_TEST_NO_ELEVATION` set: run the program directly (tests only)
//! 2. `VPCFW_ELEVATION_METHOD` set: use that method (`sudo`, `run0`, `pkexec`, `none`)
//! 3. Already root: run the program directly
//! 4. Otherwise: the configured method, `sudo` by default
//!
//! # Security
//!
//! - Commands are constructed without shell interpolation
//! - The elevation binary is checked for availability before use
//! - Audit logging records every apply run (via caller)
//!
//! # Example
//!
//! ```no_run
//! use vpcfw::elevation::{create_elevated_netns_command, ElevationMethod};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut cmd = create_elevated_netns_command(
//!     ElevationMethod::Sudo,
//!     "ip",
//!     "ns-testvpc-private",
//!     "iptables",
//!     &["-S", "INPUT"],
//! )?;
//! let status = cmd.status().await?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use tokio::process::Command;

/// Error type for privilege elevation operations
#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    /// Requested elevation method is not available (binary not found)
    #[error("Elevation method '{0}' is not available (binary not found)")]
    MethodNotAvailable(String),

    /// Invalid value for `VPCFW_ELEVATION_METHOD`
    #[error("Invalid VPCFW_ELEVATION_METHOD '{0}'. Valid options: sudo, run0, pkexec, none")]
    InvalidMethod(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// How to gain root for firewall commands
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ElevationMethod {
    #[default]
    #[strum(serialize = "sudo")]
    Sudo,
    /// systemd v256+ `run0`, no SUID bit
    #[strum(serialize = "run0")]
    Run0,
    /// PolicyKit, for graphical sessions
    #[strum(serialize = "pkexec")]
    Pkexec,
    /// Run the program as-is
    #[strum(serialize = "none")]
    None,
}

impl ElevationMethod {
    /// Binary that performs the elevation, if any
    pub const fn program(self) -> Option<&'static str> {
        match self {
            ElevationMethod::Sudo => Some("sudo"),
            ElevationMethod::Run0 => Some("run0"),
            ElevationMethod::Pkexec => Some("pkexec"),
            ElevationMethod::None => None,
        }
    }
}

/// Checks if a binary exists in PATH
///
/// # Arguments
///
/// * `name` - Binary name to search for (e.g., "sudo", "ip")
fn binary_exists(name: &str) -> bool {
    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths).find_map(|dir| {
                let full_path = dir.join(name);
                if full_path.is_file() {
                    Some(full_path)
                } else {
                    None
                }
            })
        })
        .is_some()
}

/// Decides which elevation method actually applies for this process.
///
/// # Errors
///
/// Returns [`ElevationError::InvalidMethod`] if `VPCFW_ELEVATION_METHOD` holds
/// an unknown value.
pub fn resolve_method(configured: ElevationMethod) -> Result<ElevationMethod, ElevationError> {
    // 1. Strict Test Mode Override (Highest Priority)
    if std::env::var("VPCFW_TEST_NO_ELEVATION").is_ok() {
        return Ok(ElevationMethod::None);
    }

    // 2. Explicit override (for scripts with sudoers NOPASSWD, etc.)
    if let Ok(method) = std::env::var("VPCFW_ELEVATION_METHOD") {
        let method = method.trim().to_string();
        if !method.is_empty() {
            return method
                .parse()
                .map_err(|_| ElevationError::InvalidMethod(method));
        }
    }

    // 3. Direct Root Execution (No prompt needed)
    if nix::unistd::getuid().is_root() {
        return Ok(ElevationMethod::None);
    }

    Ok(configured)
}

/// Internal helper to build an elevated command for a specific program.
///
/// Not exposed publicly - callers go through [`create_elevated_netns_command`]
/// so only namespace execution can be elevated.
fn build_elevated_command(
    method: ElevationMethod,
    program: &str,
    args: &[&str],
) -> Result<Command, ElevationError> {
    let method = resolve_method(method)?;

    match method.program() {
        None => {
            let mut cmd = Command::new(program);
            cmd.args(args);
            Ok(cmd)
        }
        Some(elevator) => {
            if !binary_exists(elevator) {
                return Err(ElevationError::MethodNotAvailable(elevator.into()));
            }
            let mut cmd = Command::new(elevator);
            cmd.arg(program).args(args);
            Ok(cmd)
        }
    }
}

/// Creates an elevated `ip netns exec <namespace> <iptables> <args>` command
///
/// # Arguments
///
/// * `method` - Configured elevation method (may be overridden, see module docs)
/// * `ip` - The `ip` binary (name or path)
/// * `namespace` - Network namespace to enter
/// * `iptables` - The packet-filter binary run inside the namespace
/// * `args` - Arguments passed to the packet-filter binary
///
/// # Security
///
/// Arguments are passed directly without shell interpretation. The namespace
/// name must be validated by the caller (see [`crate::validators`]).
pub fn create_elevated_netns_command(
    method: ElevationMethod,
    ip: &str,
    namespace: &str,
    iptables: &str,
    args: &[&str],
) -> Result<Command, ElevationError> {
    let mut full_args = vec!["netns", "exec", namespace, iptables];
    full_args.extend_from_slice(args);
    build_elevated_command(method, ip, &full_args)
}
