//! Sync environment variables with SSM Parameter Store.
//!
//! Parameters live under `{environment}.{KEY}`; the ordered list of keys is
//! stored as a JSON array in `{environment}.environment_keys`. Calls are
//! made one at a time with a fixed pause between them to stay under the
//! Parameter Store request rate.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::aws::AwsCli;
use crate::error::{Error, Result};
use crate::output::{BulkResult, ItemOutcome};
use crate::process::ProcessRunner;
use crate::utils::{io, shell, validation};

#[derive(Debug, Clone)]
pub struct ParamsConfig {
    pub environment: String,
    pub region: String,
    pub profile: Option<String>,
    /// KMS key id or alias used to encrypt uploaded values.
    pub key_id: String,
    /// Profile script that fetched variables are appended to.
    pub location: PathBuf,
    /// Report values instead of writing them to `location`.
    pub debug: bool,
    pub interval: Duration,
    /// Overrides the `.env` / `.env.{environment}` convention for uploads.
    pub env_file: Option<PathBuf>,
}

impl ParamsConfig {
    pub fn keys_parameter(&self) -> String {
        format!("{}.environment_keys", self.environment)
    }

    pub fn parameter_name(&self, key: &str) -> String {
        format!("{}.{}", self.environment, key)
    }

    /// `.env` for development, `.env.{environment}` otherwise.
    pub fn env_file_path(&self) -> PathBuf {
        match &self.env_file {
            Some(path) => path.clone(),
            None if self.environment == "development" => PathBuf::from(".env"),
            None => PathBuf::from(format!(".env.{}", self.environment)),
        }
    }

    fn aws(&self) -> AwsCli {
        AwsCli::new(&self.region, self.profile.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

/// Parse `KEY=value` lines. Blank lines and `#` comments are skipped; the
/// value is everything after the first `=` and may itself contain `=`.
/// Names must be valid shell variable names so `get` can export them later.
pub fn parse_env_file(content: &str) -> Result<Vec<EnvVar>> {
    let mut vars = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').unwrap_or((line, ""));
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::validation_invalid_argument(
                "env_file",
                format!("Line {} has no variable name", idx + 1),
                Some(line.to_string()),
                None,
            ));
        }
        validation::require_env_key(key)?;

        vars.push(EnvVar {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    Ok(vars)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedParameter {
    pub name: String,
    /// Only reported in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_to: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedParameter {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamsGetResult {
    pub environment: String,
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(flatten)]
    pub bulk: BulkResult<FetchedParameter>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamsPutResult {
    pub environment: String,
    pub env_file: String,
    pub keys: Vec<String>,
    #[serde(flatten)]
    pub bulk: BulkResult<UploadedParameter>,
}

fn pace(interval: Duration, index: usize) {
    if index > 0 && !interval.is_zero() {
        thread::sleep(interval);
    }
}

fn fetch_one(
    config: &ParamsConfig,
    aws: &AwsCli,
    runner: &dyn ProcessRunner,
    key: &str,
) -> Result<FetchedParameter> {
    validation::require_env_key(key)?;
    let name = config.parameter_name(key);
    let value = aws.get_parameter(runner, &name)?;

    if config.debug {
        return Ok(FetchedParameter {
            name,
            value: Some(value),
            written_to: None,
        });
    }

    io::append_line(
        &config.location,
        &shell::export_line(key, &value),
        "append environment variable",
    )?;

    Ok(FetchedParameter {
        name,
        value: None,
        written_to: Some(config.location.display().to_string()),
    })
}

/// Download every parameter listed in `{environment}.environment_keys`.
///
/// A failure to read the key list is returned as `Err`; failures on
/// individual keys are recorded and the remaining keys are still fetched.
pub fn get(config: &ParamsConfig, runner: &dyn ProcessRunner) -> Result<ParamsGetResult> {
    validation::require_name(&config.environment, "environment")?;

    let aws = config.aws();
    let keys_parameter = config.keys_parameter();
    crate::log_status!("params", "Fetching [{}] environment keys", config.environment);

    let raw = aws.get_parameter(runner, &keys_parameter)?;
    let keys: Vec<String> = serde_json::from_str(&raw).map_err(|e| {
        Error::config_invalid_value(
            keys_parameter.clone(),
            Some(raw.clone()),
            format!("Expected a JSON array of variable names: {}", e),
        )
    })?;

    let mut outcomes = Vec::with_capacity(keys.len());
    for (idx, key) in keys.iter().enumerate() {
        pace(config.interval, idx);

        match fetch_one(config, &aws, runner, key) {
            Ok(fetched) => {
                crate::log_status!("params", "({}/{}) Downloaded {}", idx + 1, keys.len(), key);
                outcomes.push(ItemOutcome::ok(key.as_str(), fetched));
            }
            Err(err) => {
                crate::log_status!("params", "Failed to fetch {}: {}", key, err.message);
                outcomes.push(ItemOutcome::failed(key.as_str(), &err));
            }
        }
    }

    Ok(ParamsGetResult {
        environment: config.environment.clone(),
        location: (!config.debug).then(|| config.location.display().to_string()),
        keys,
        bulk: BulkResult::new("get", outcomes),
    })
}

/// Upload the local env file: first the key list, then every variable.
///
/// Without a profile nothing is uploaded; this keeps variables from landing
/// in whatever account the default credentials point at.
pub fn put(config: &ParamsConfig, runner: &dyn ProcessRunner) -> Result<ParamsPutResult> {
    validation::require_name(&config.environment, "environment")?;
    validation::require_non_empty(config.profile.clone(), "--profile")?;

    let path = config.env_file_path();
    let vars = read_env_file(&path)?;
    let keys: Vec<String> = vars.iter().map(|v| v.key.clone()).collect();

    let aws = config.aws();
    let keys_json = serde_json::to_string(&keys)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize key list".to_string())))?;

    crate::log_status!("params", "Uploading [{}] environment keys", config.environment);
    aws.put_parameter(runner, &config.keys_parameter(), &keys_json, &config.key_id)?;

    let mut outcomes = Vec::with_capacity(vars.len());
    for var in &vars {
        // The key list upload above counts as the previous call.
        pace(config.interval, 1);

        let name = config.parameter_name(&var.key);
        match aws.put_parameter(runner, &name, &var.value, &config.key_id) {
            Ok(()) => {
                crate::log_status!("params", "Uploaded {}", name);
                outcomes.push(ItemOutcome::ok(var.key.as_str(), UploadedParameter { name }));
            }
            Err(err) => {
                crate::log_status!("params", "Failed to upload {}: {}", name, err.message);
                outcomes.push(ItemOutcome::failed(var.key.as_str(), &err));
            }
        }
    }

    Ok(ParamsPutResult {
        environment: config.environment.clone(),
        env_file: path.display().to_string(),
        keys,
        bulk: BulkResult::new("put", outcomes),
    })
}

fn read_env_file(path: &Path) -> Result<Vec<EnvVar>> {
    let content = io::read_file_optional(path, "read env file")?.ok_or_else(|| {
        Error::validation_invalid_argument(
            "env_file",
            format!("Env file not found: {}", path.display()),
            Some(path.display().to_string()),
            None,
        )
    })?;
    parse_env_file(&content)
}
