//! XDG directory helpers
//!
//! - Config: `~/.config/vpcfw/` - settings (`config.json`)
//! - State: `~/.local/state/vpcfw/` - audit log
//!
//! Under `sudo` these resolve to root's directories.

use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "vpcctl", "vpcfw")
}

pub fn get_config_dir() -> Option<PathBuf> {
    project_dirs().map(|pd| pd.config_dir().to_path_buf())
}

pub fn get_state_dir() -> Option<PathBuf> {
    project_dirs().and_then(|pd| pd.state_dir().map(std::path::Path::to_path_buf))
}

/// Creates the state directory with user-only permissions.
pub fn ensure_state_dir() -> std::io::Result<Option<PathBuf>> {
    let Some(dir) = get_state_dir() else {
        return Ok(None);
    };

    #[cfg(unix)]
    {
        use std::fs::DirBuilder;
        use std::os::unix::fs::DirBuilderExt;

        DirBuilder::new()
            .mode(0o700) // User read/write/execute only
            .recursive(true)
            .create(&dir)?;
    }

    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(&dir)?;
    }

    Ok(Some(dir))
}
