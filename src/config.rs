use crate::core::error::{Error, Result};
use crate::elevation::ElevationMethod;
use crate::utils::get_config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Policy document applied when nothing else is configured.
///
/// Packagers can bake in a different location with
/// `VPCFW_DEFAULT_POLICY_PATH` at build time.
pub const DEFAULT_POLICY_PATH: &str = match option_env!("VPCFW_DEFAULT_POLICY_PATH") {
    Some(path) => path,
    None => "/var/lib/vpcctl/security_policy.json",
};

/// Namespace of the private subnet created by vpcctl
pub const DEFAULT_NAMESPACE: &str = "ns-testvpc-private";

/// Applier settings
///
/// Every field has a default, so an empty `{}` file (or no file at all) yields
/// the stock vpcctl layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_policy_path")]
    pub policy_path: PathBuf,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// `ip` binary used for `ip netns exec`
    #[serde(default = "default_ip")]
    pub ip: String,
    /// Packet-filter binary run inside the namespace
    #[serde(default = "default_iptables")]
    pub iptables: String,
    #[serde(default)]
    pub elevation: ElevationMethod,
    /// Append each apply run to the audit log
    #[serde(default = "default_true")]
    pub audit: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            policy_path: default_policy_path(),
            namespace: default_namespace(),
            ip: default_ip(),
            iptables: default_iptables(),
            elevation: ElevationMethod::default(),
            audit: true,
        }
    }
}

fn default_policy_path() -> PathBuf {
    PathBuf::from(DEFAULT_POLICY_PATH)
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_ip() -> String {
    "ip".to_string()
}

fn default_iptables() -> String {
    "iptables".to_string()
}

fn default_true() -> bool {
    true
}

/// Location of the per-user settings file, if a config dir exists
pub fn default_settings_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.json"))
}

/// Loads settings.
///
/// An explicit `path` must exist and parse. Without one, the per-user file is
/// used when present; a missing or unreadable default file yields defaults.
///
/// # Errors
///
/// Returns [`Error::Config`] if an explicit file is missing, or any file that
/// exists is not valid settings JSON.
pub async fn load_settings(path: Option<&Path>) -> Result<Settings> {
    if let Some(path) = path {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        return parse_settings(path, &json);
    }

    if let Some(path) = default_settings_path()
        && let Ok(json) = tokio::fs::read_to_string(&path).await
    {
        return parse_settings(&path, &json);
    }

    Ok(Settings::default())
}

fn parse_settings(path: &Path, json: &str) -> Result<Settings> {
    serde_json::from_str(json)
        .map_err(|e| Error::Config(format!("invalid settings in {}: {e}", path.display())))
}
