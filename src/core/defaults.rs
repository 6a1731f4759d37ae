use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths;
use crate::utils::io;

/// Root configuration structure for awsops.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AwsopsConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// Values used when a flag is not given on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,

    /// AWS CLI profile applied when `--profile` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,

    #[serde(default = "default_deploy")]
    pub deploy: DeployDefaults,

    #[serde(default = "default_params")]
    pub params: ParamsDefaults,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            region: default_region(),
            environment: default_environment(),
            image: default_image(),
            prefix: default_prefix(),
            dockerfile: default_dockerfile(),
            profile: None,
            ledger_path: default_ledger_path(),
            deploy: default_deploy(),
            params: default_params(),
        }
    }
}

impl Defaults {
    pub fn ledger_path(&self) -> PathBuf {
        paths::expand(&self.ledger_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployDefaults {
    #[serde(default = "default_deploy_script")]
    pub script: String,

    #[serde(default = "default_deploy_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsDefaults {
    #[serde(default = "default_key_id")]
    pub key_id: String,

    #[serde(default = "default_location")]
    pub location: String,

    /// Pause between reads, in milliseconds.
    #[serde(default = "default_get_interval_ms")]
    pub get_interval_ms: u64,

    /// Pause between writes, in milliseconds.
    #[serde(default = "default_put_interval_ms")]
    pub put_interval_ms: u64,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_environment() -> String {
    "staging".to_string()
}

fn default_image() -> String {
    "api".to_string()
}

fn default_prefix() -> String {
    "default".to_string()
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

fn default_ledger_path() -> String {
    ".versions".to_string()
}

fn default_deploy() -> DeployDefaults {
    DeployDefaults {
        script: default_deploy_script(),
        timeout_seconds: default_deploy_timeout(),
    }
}

fn default_deploy_script() -> String {
    "ecs-deploy".to_string()
}

fn default_deploy_timeout() -> u64 {
    300
}

fn default_params() -> ParamsDefaults {
    ParamsDefaults {
        key_id: default_key_id(),
        location: default_location(),
        get_interval_ms: default_get_interval_ms(),
        put_interval_ms: default_put_interval_ms(),
    }
}

fn default_key_id() -> String {
    "default".to_string()
}

fn default_location() -> String {
    "/etc/profile.d/env.sh".to_string()
}

fn default_get_interval_ms() -> u64 {
    200
}

fn default_put_interval_ms() -> u64 {
    500
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load defaults, merging file config with built-in defaults.
/// If awsops.json is missing or invalid, silently returns built-in defaults.
pub fn load_defaults() -> Defaults {
    load_config().defaults
}

/// Load the full awsops.json config, falling back to defaults on any error.
pub fn load_config() -> AwsopsConfig {
    paths::awsops_json()
        .and_then(|path| load_config_from_path(&path))
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Read a config file. `Ok(None)` when the file does not exist.
pub fn load_config_from_path(path: &Path) -> Result<Option<AwsopsConfig>> {
    let Some(content) = io::read_file_optional(path, &format!("read {}", path.display()))? else {
        return Ok(None);
    };

    let config = serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;

    Ok(Some(config))
}

/// Get built-in defaults (ignoring any file config)
pub fn builtin_defaults() -> Defaults {
    Defaults::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn builtin_values() {
        let defaults = builtin_defaults();
        assert_eq!(defaults.region, "us-east-1");
        assert_eq!(defaults.environment, "staging");
        assert_eq!(defaults.deploy.timeout_seconds, 300);
        assert_eq!(defaults.params.get_interval_ms, 200);
        assert_eq!(defaults.params.put_interval_ms, 500);
        assert_eq!(defaults.ledger_path(), PathBuf::from(".versions"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("awsops.json");
        fs::write(
            &path,
            r#"{"defaults":{"region":"eu-west-1","params":{"key_id":"alias/app"}}}"#,
        )
        .unwrap();

        let config = load_config_from_path(&path).unwrap().unwrap();

        assert_eq!(config.defaults.region, "eu-west-1");
        assert_eq!(config.defaults.params.key_id, "alias/app");
        assert_eq!(config.defaults.params.location, "/etc/profile.d/env.sh");
        assert_eq!(config.defaults.image, "api");
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(load_config_from_path(&dir.path().join("awsops.json")).unwrap().is_none());
    }

    #[test]
    fn invalid_json_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("awsops.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_config_from_path(&path).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidJson);
    }
}
