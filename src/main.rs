//! vpcfw - VPC namespace firewall
//!
//! Applies `/var/lib/vpcctl/security_policy.json` to the INPUT chain of the
//! `ns-testvpc-private` namespace, echoing every command before it runs.
//!
//! # Usage
//!
//! ```bash
//! vpcfw                               # Apply the policy (same as `vpcfw apply`)
//! vpcfw plan                          # Print the commands without running them
//! vpcfw check                         # Report suspicious rules
//! vpcfw check --strict                # ...and fail if there are any
//! vpcfw --namespace ns-blue --policy ./blue.json apply
//! ```

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;
use vpcfw::audit::{ApplyRecord, log_apply};
use vpcfw::config::{Settings, load_settings};
use vpcfw::core::check::check_policy;
use vpcfw::core::executor::IptablesExecutor;
use vpcfw::core::policy::load_policy;
use vpcfw::validators::validate_namespace;
use vpcfw::{Error, PolicyApplier, Result};

shadow_rs::shadow!(build);

#[derive(Parser)]
#[command(name = "vpcfw")]
#[command(about = "Apply an ingress policy to iptables inside a network namespace", long_about = None)]
#[command(version, long_version = build::CLAP_LONG_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file (default: ~/.config/vpcfw/config.json if present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Policy document to apply
    #[arg(short, long, global = true, value_name = "PATH")]
    policy: Option<PathBuf>,

    /// Network namespace to apply the policy in
    #[arg(short, long, global = true, value_name = "NAME")]
    namespace: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Apply the policy to the namespace (default)
    Apply,
    /// Print the commands `apply` would run, without running them
    Plan,
    /// Report rules that would be skipped or rejected
    Check {
        /// Exit with failure if there are any findings
        #[arg(long)]
        strict: bool,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    // stdout carries the command echo only
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to create Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(handle_cli(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn report_error(e: &Error) {
    eprintln!("Error: {e}");
    if let Some(translation) = e.translation() {
        eprintln!("  {}", translation.user_message);
        for suggestion in &translation.suggestions {
            eprintln!("  - {suggestion}");
        }
    }
}

async fn handle_cli(cli: Cli) -> Result<()> {
    let mut settings = load_settings(cli.config.as_deref()).await?;
    if let Some(policy) = cli.policy {
        settings.policy_path = policy;
    }
    if let Some(namespace) = cli.namespace {
        settings.namespace = namespace;
    }

    validate_namespace(&settings.namespace).map_err(|message| Error::Validation {
        field: "namespace".to_string(),
        message,
    })?;

    match cli.command.unwrap_or(Commands::Apply) {
        Commands::Apply => apply(&settings, false).await,
        Commands::Plan => apply(&settings, true).await,
        Commands::Check { strict } => check(&settings, strict).await,
    }
}

async fn apply(settings: &Settings, dry_run: bool) -> Result<()> {
    let audit = settings.audit && !dry_run;
    let mut record = ApplyRecord {
        run_id: Uuid::new_v4(),
        namespace: &settings.namespace,
        policy_path: &settings.policy_path,
        checksum: None,
        rule_count: 0,
        commands_issued: 0,
        skipped: 0,
    };

    let loaded = match load_policy(&settings.policy_path).await {
        Ok(loaded) => loaded,
        Err(e) => {
            if audit {
                log_apply(&record, Some(e.to_string())).await;
            }
            return Err(e);
        }
    };

    let policy = &loaded.policy;
    record.checksum = Some(loaded.checksum.as_str());
    record.rule_count = policy.ingress.len();
    record.skipped = policy.ingress.len() - policy.recognized_count();

    let mut applier = PolicyApplier::new(IptablesExecutor::new(settings).dry_run(dry_run));
    let result = applier.apply(policy).await;
    record.commands_issued = applier.executor().issued();

    if audit {
        log_apply(&record, result.as_ref().err().map(ToString::to_string)).await;
    }

    let report = result?;
    tracing::info!(
        "{} {} commands in {} ({} rules skipped)",
        if dry_run { "Planned" } else { "Ran" },
        report.commands(),
        settings.namespace,
        report.skipped
    );
    Ok(())
}

async fn check(settings: &Settings, strict: bool) -> Result<()> {
    let loaded = load_policy(&settings.policy_path).await?;
    let findings = check_policy(&loaded.policy);

    for finding in &findings {
        println!("{finding}");
    }

    if findings.is_empty() {
        println!(
            "{}: {} rules, no findings",
            settings.policy_path.display(),
            loaded.policy.ingress.len()
        );
        return Ok(());
    }

    println!(
        "{}: {} rules, {} findings",
        settings.policy_path.display(),
        loaded.policy.ingress.len(),
        findings.len()
    );

    if strict {
        return Err(Error::Validation {
            field: "policy".to_string(),
            message: format!("{} findings in strict mode", findings.len()),
        });
    }
    Ok(())
}
