//! Input validation for vpcfw
//!
//! Namespace names are validated before anything is elevated. Port and
//! protocol checks are advisory: the applier passes rule values through
//! untouched and these functions only feed `vpcfw check`.

/// Protocols `iptables` accepts `--dport` for
pub const PORT_PROTOCOLS: &[&str] = &["tcp", "udp", "udplite", "sctp", "dccp"];

/// Validates a network namespace name.
///
/// `ip netns` stores namespaces as files under `/run/netns`, so the name must
/// be a single path component:
/// - Non-empty, max 255 bytes
/// - No `/` and no NUL
/// - Not "." or ".."
/// - Must not start with `-` (would be read as an option by `ip`)
///
/// # Errors
///
/// Returns `Err` with a human-readable reason.
///
/// # Examples
///
/// ```
/// use vpcfw::validators::validate_namespace;
///
/// assert!(validate_namespace("ns-testvpc-private").is_ok());
/// assert!(validate_namespace("../etc").is_err());
/// ```
pub fn validate_namespace(name: &str) -> Result<&str, String> {
    if name.is_empty() {
        return Err("Namespace name cannot be empty".to_string());
    }

    if name.len() > 255 {
        return Err("Namespace name too long (max 255 bytes)".to_string());
    }

    if name == "." || name == ".." {
        return Err("Invalid namespace name".to_string());
    }

    if name.starts_with('-') {
        return Err("Namespace name cannot start with '-'".to_string());
    }

    if name.contains('/') || name.contains('\0') {
        return Err("Namespace name contains invalid characters".to_string());
    }

    Ok(name)
}

/// Validates a destination port number.
///
/// # Errors
///
/// Returns `Err` if the port is outside 1-65535.
pub fn validate_port(port: i64) -> Result<u16, String> {
    match u16::try_from(port) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(format!("Port {port} is outside 1-65535")),
    }
}

/// Validates that a protocol supports destination port matching.
///
/// # Errors
///
/// Returns `Err` if the protocol is not one of [`PORT_PROTOCOLS`].
pub fn validate_port_protocol(protocol: &str) -> Result<&str, String> {
    if PORT_PROTOCOLS.contains(&protocol) {
        Ok(protocol)
    } else {
        Err(format!(
            "Protocol {protocol:?} does not support --dport (use one of: {})",
            PORT_PROTOCOLS.join(", ")
        ))
    }
}
