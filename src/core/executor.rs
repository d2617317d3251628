//! Rule execution against the namespace's packet filter
//!
//! [`RuleExecutor`] is the narrow capability the applier needs. The real
//! implementation, [`IptablesExecutor`], runs one elevated
//! `ip netns exec <namespace> iptables ...` process per call, echoing the full
//! command line to stdout before it starts.

use crate::config::Settings;
use crate::core::error::{Error, Result};
use crate::core::policy::Rule;
use crate::elevation::{ElevationMethod, create_elevated_netns_command};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Chain every ingress rule is appended to
pub const INPUT_CHAIN: &str = "INPUT";

/// iptables jump target
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
pub enum Target {
    #[strum(serialize = "ACCEPT")]
    Accept,
    #[strum(serialize = "DROP")]
    Drop,
}

/// A single packet-filter invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCommand {
    /// `-A <chain> -p <protocol> --dport <port> -j <target>`
    Append {
        protocol: String,
        port: i64,
        target: Target,
    },
    /// `-P <chain> <target>`
    SetPolicy { target: Target },
}

impl FilterCommand {
    /// Builds the append command for a rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the rule's protocol or port has the wrong
    /// JSON type. Rules from a parsed [`crate::core::policy::Policy`] with a
    /// recognized action never do.
    pub fn append(rule: &Rule, target: Target) -> Result<Self> {
        let (protocol, port) = rule.filter_match().map_err(|message| Error::Validation {
            field: "rule".to_string(),
            message,
        })?;
        Ok(FilterCommand::Append {
            protocol: protocol.to_string(),
            port,
            target,
        })
    }

    /// Arguments passed to the packet-filter binary
    pub fn to_args(&self) -> Vec<String> {
        match self {
            FilterCommand::Append {
                protocol,
                port,
                target,
            } => vec![
                "-A".to_string(),
                INPUT_CHAIN.to_string(),
                "-p".to_string(),
                protocol.clone(),
                "--dport".to_string(),
                port.to_string(),
                "-j".to_string(),
                target.to_string(),
            ],
            FilterCommand::SetPolicy { target } => vec![
                "-P".to_string(),
                INPUT_CHAIN.to_string(),
                target.to_string(),
            ],
        }
    }
}

/// Renders a command as the single line echoed before it runs.
///
/// Arguments are joined with spaces and not quoted.
pub fn command_line(cmd: &Command) -> String {
    let std_cmd = cmd.as_std();
    std::iter::once(std_cmd.get_program())
        .chain(std_cmd.get_args())
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Capability the policy applier drives
///
/// Each call must have finished (successfully or not) when its future
/// resolves; the applier never overlaps calls.
#[allow(async_fn_in_trait)]
pub trait RuleExecutor {
    /// Appends an ACCEPT rule for the rule's protocol and destination port.
    async fn apply_accept(&mut self, rule: &Rule) -> Result<()>;

    /// Appends a DROP rule for the rule's protocol and destination port.
    async fn apply_deny(&mut self, rule: &Rule) -> Result<()>;

    /// Sets the INPUT chain's default policy to DROP.
    async fn set_default_drop(&mut self) -> Result<()>;
}

/// Runs `iptables` inside a network namespace through `ip netns exec`
#[derive(Debug, Clone)]
pub struct IptablesExecutor {
    namespace: String,
    ip: String,
    iptables: String,
    elevation: ElevationMethod,
    dry_run: bool,
    issued: usize,
}

impl IptablesExecutor {
    pub fn new(settings: &Settings) -> Self {
        Self {
            namespace: settings.namespace.clone(),
            ip: settings.ip.clone(),
            iptables: settings.iptables.clone(),
            elevation: settings.elevation,
            dry_run: false,
            issued: 0,
        }
    }

    /// Echo commands without running them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Number of commands echoed so far
    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Builds the full elevated process command for `filter`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the elevation method cannot be used.
    pub fn build(&self, filter: &FilterCommand) -> Result<Command> {
        let args = filter.to_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let cmd = create_elevated_netns_command(
            self.elevation,
            &self.ip,
            &self.namespace,
            &self.iptables,
            &args,
        )?;
        Ok(cmd)
    }

    async fn run(&mut self, filter: FilterCommand) -> Result<()> {
        let mut cmd = self.build(&filter)?;
        let line = command_line(&cmd);

        println!("+ {line}");
        self.issued += 1;

        if self.dry_run {
            debug!("Dry run, not executing: {line}");
            return Ok(());
        }

        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| {
                error!("Failed to spawn `{line}`: {source}");
                Error::Spawn {
                    command: line.clone(),
                    source,
                }
            })?;

        let output = child.wait_with_output().await?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stderr.is_empty() {
            eprint!("{stderr}");
        }

        if output.status.success() {
            info!("Applied: {line}");
            Ok(())
        } else {
            error!("Command failed with {:?}: {line}", output.status.code());
            Err(Error::CommandFailed {
                command: line,
                exit_code: output.status.code(),
                stderr,
            })
        }
    }
}

impl RuleExecutor for IptablesExecutor {
    async fn apply_accept(&mut self, rule: &Rule) -> Result<()> {
        self.run(FilterCommand::append(rule, Target::Accept)?).await
    }

    async fn apply_deny(&mut self, rule: &Rule) -> Result<()> {
        self.run(FilterCommand::append(rule, Target::Drop)?).await
    }

    async fn set_default_drop(&mut self) -> Result<()> {
        self.run(FilterCommand::SetPolicy {
            target: Target::Drop,
        })
        .await
    }
}
