use std::path::PathBuf;
use thiserror::Error;

/// Core error types for vpcfw
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Policy document could not be read
    #[error("Cannot read policy {}: {source}", path.display())]
    PolicyRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Policy document is not valid JSON or has the wrong shape
    #[error("Invalid policy {}: {source}", path.display())]
    PolicyParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Settings file could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input validation failed
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    /// A packet-filter command could not be started
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// A packet-filter command exited with a non-zero status
    #[error("Command `{command}` failed ({})", exit_description(*exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Privilege escalation failed
    #[error("Elevation error: {0}")]
    Elevation(#[from] crate::elevation::ElevationError),
}

fn exit_description(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl Error {
    /// Returns a user-facing translation for command failures, if any.
    pub fn translation(&self) -> Option<ErrorTranslation> {
        match self {
            Error::CommandFailed { stderr, .. } => Some(IptablesErrorPattern::match_error(stderr)),
            Error::Spawn { source, .. } => {
                Some(IptablesErrorPattern::match_error(&source.to_string()))
            }
            _ => None,
        }
    }
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// Known `ip netns` / `iptables` error patterns and their translations
pub struct IptablesErrorPattern;

impl IptablesErrorPattern {
    /// Matches an error message against known patterns and returns a user-friendly translation.
    pub fn match_error(msg: &str) -> ErrorTranslation {
        let lower = msg.to_lowercase();

        // Namespace missing: `ip netns exec` reports the bind mount it could not open
        if lower.contains("cannot open network namespace") {
            return ErrorTranslation::new("Network namespace does not exist")
                .with_suggestion("List namespaces: ip netns list")
                .with_suggestion("Create the VPC namespace before applying its policy")
                .with_suggestion("Check the configured namespace name for typos");
        }

        if lower.contains("permission denied") || lower.contains("operation not permitted") {
            return ErrorTranslation::new("Insufficient permissions to modify firewall rules")
                .with_suggestion("Run as root or allow sudo for `ip netns exec`")
                .with_suggestion("Set VPCFW_ELEVATION_METHOD to sudo, run0 or pkexec")
                .with_suggestion("Check if CAP_NET_ADMIN and CAP_SYS_ADMIN are available");
        }

        if lower.contains("no such file") || lower.contains("command not found") {
            return ErrorTranslation::new("ip or iptables is not installed or not found in PATH")
                .with_suggestion("Install iproute2 and iptables: sudo apt install iproute2 iptables")
                .with_suggestion("Or: sudo dnf install iproute iptables-nft")
                .with_suggestion("Or point the `ip`/`iptables` settings at the binaries");
        }

        if lower.contains("unknown protocol") || lower.contains("unknown option \"--dport\"") {
            return ErrorTranslation::new("Protocol does not support destination ports")
                .with_suggestion("Use tcp, udp, udplite, sctp or dccp with a port")
                .with_suggestion("Run `vpcfw check` to list suspicious rules");
        }

        if lower.contains("invalid port") || (lower.contains("port") && lower.contains("range")) {
            return ErrorTranslation::new("Invalid destination port")
                .with_suggestion("Port numbers must be between 1 and 65535")
                .with_suggestion("Run `vpcfw check` to list suspicious rules");
        }

        if lower.contains("xtables lock") || lower.contains("resource temporarily unavailable") {
            return ErrorTranslation::new("Another process holds the xtables lock")
                .with_suggestion("Wait for other firewall tools to finish and re-run")
                .with_suggestion("Re-running is safe: earlier rules are appended again");
        }

        if lower.contains("bad argument") || lower.contains("try `iptables -h'") {
            return ErrorTranslation::new("iptables rejected the rule arguments")
                .with_suggestion("Check the rule's protocol and port values")
                .with_suggestion("Run `vpcfw plan` to see the exact command line");
        }

        ErrorTranslation::new(format!("Firewall error: {}", msg.trim()))
            .with_suggestion("Check the detailed error message for more information")
            .with_suggestion("Verify iptables works in the namespace: ip netns exec <ns> iptables -S")
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_namespace() {
        let translation = IptablesErrorPattern::match_error(
            "Cannot open network namespace \"ns-x\": No such file or directory",
        );
        assert!(translation.user_message.contains("namespace"));
        assert!(
            translation
                .suggestions
                .iter()
                .any(|s| s.contains("ip netns list"))
        );
    }

    #[test]
    fn test_missing_binary() {
        let translation = IptablesErrorPattern::match_error("No such file or directory (os error 2)");
        assert!(translation.user_message.contains("not installed"));
        assert!(translation.suggestions.len() >= 3);
    }

    #[test]
    fn test_permission_denied() {
        let translation = IptablesErrorPattern::match_error(
            "iptables v1.8.9 (nf_tables): Could not fetch rule set generation id: Permission denied",
        );
        assert!(translation.user_message.contains("permissions"));
    }

    #[test]
    fn test_unknown_protocol() {
        let translation =
            IptablesErrorPattern::match_error("iptables v1.8.9: unknown protocol \"tcpp\" specified");
        assert!(translation.user_message.contains("Protocol"));
    }

    #[test]
    fn test_generic_fallback_keeps_message() {
        let translation = IptablesErrorPattern::match_error("something odd\n");
        assert_eq!(translation.user_message, "Firewall error: something odd");
    }

    #[test]
    fn test_command_failed_display() {
        let err = Error::CommandFailed {
            command: "false".to_string(),
            exit_code: Some(1),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "Command `false` failed (exit status 1)");
        assert!(err.translation().is_some());

        let err = Error::CommandFailed {
            command: "sleep 100".to_string(),
            exit_code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_config_errors_have_no_translation() {
        let err = Error::Config("bad".to_string());
        assert!(err.translation().is_none());
    }
}
