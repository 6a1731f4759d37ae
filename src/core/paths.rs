use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base awsops config directory (`~/.config/awsops/`, `%APPDATA%\awsops` on Windows)
pub fn awsops() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected("APPDATA environment variable not set on Windows".to_string())
        })?;
        Ok(PathBuf::from(appdata).join("awsops"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("awsops"))
    }
}

/// Global awsops.json config file path
pub fn awsops_json() -> Result<PathBuf> {
    Ok(awsops()?.join("awsops.json"))
}

/// Expand a leading `~` in a configured path.
pub fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}
