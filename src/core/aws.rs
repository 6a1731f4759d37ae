//! Thin wrappers over the `aws` CLI.
//!
//! Every call is a buffered subprocess whose JSON stdout is decoded into a
//! small typed response. Like the CLI itself, any text on stderr for a JSON
//! query is treated as a failure.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CommandFailedDetails, Error, Result};
use crate::process::{CommandSpec, ProcessResult, ProcessRunner};
use crate::utils::shell;

/// Stderr lines `docker login` prints on success.
static LOGIN_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(WARNING!|configure a credential helper|https?://|$)").unwrap()
});

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallerIdentity {
    pub account: String,
    #[serde(default)]
    pub arn: String,
    #[serde(default)]
    pub user_id: String,
}

/// Temporary credentials from `sts get-session-token`.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    #[serde(default)]
    pub expiration: Option<String>,
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SessionTokenResponse {
    credentials: SessionCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListImagesResponse {
    #[serde(default)]
    image_ids: Vec<ImageId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageId {
    #[serde(default)]
    image_tag: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetParameterResponse {
    parameter: Parameter,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Parameter {
    value: String,
}

pub fn registry_host(account_id: &str, region: &str) -> String {
    format!("{}.dkr.ecr.{}.amazonaws.com", account_id, region)
}

pub fn repository_uri(account_id: &str, region: &str, repository: &str) -> String {
    format!("{}/{}", registry_host(account_id, region), repository)
}

/// Region and profile scoping shared by every `aws` invocation.
#[derive(Debug, Clone)]
pub struct AwsCli {
    pub region: String,
    pub profile: Option<String>,
}

impl AwsCli {
    pub fn new(region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            region: region.into(),
            profile,
        }
    }

    fn command(&self, service: &str, operation: &str) -> CommandSpec {
        CommandSpec::new("aws")
            .arg(service)
            .arg(operation)
            .arg("--region")
            .arg(&self.region)
            .opt_arg("--profile", self.profile.as_deref())
    }

    fn query<T: DeserializeOwned>(&self, runner: &dyn ProcessRunner, spec: CommandSpec) -> Result<T> {
        let spec = spec.arg("--output").arg("json");
        let result = runner.buffered(&spec)?;
        require_clean_stderr(&spec, &result)?;
        parse_json(&spec, &result.stdout)
    }

    pub fn caller_identity(&self, runner: &dyn ProcessRunner) -> Result<CallerIdentity> {
        self.query(runner, self.command("sts", "get-caller-identity"))
    }

    pub fn session_credentials(
        &self,
        runner: &dyn ProcessRunner,
        duration_seconds: u32,
    ) -> Result<SessionCredentials> {
        let spec = self
            .command("sts", "get-session-token")
            .arg("--duration-seconds")
            .arg(duration_seconds.to_string());
        let response: SessionTokenResponse = self.query(runner, spec)?;
        Ok(response.credentials)
    }

    /// Tags of every image in an ECR repository; untagged images are dropped.
    pub fn list_image_tags(&self, runner: &dyn ProcessRunner, repository: &str) -> Result<Vec<String>> {
        let spec = self
            .command("ecr", "list-images")
            .arg("--repository-name")
            .arg(repository);
        let response: ListImagesResponse = self.query(runner, spec)?;

        Ok(response
            .image_ids
            .into_iter()
            .filter_map(|id| id.image_tag)
            .collect())
    }

    /// Log docker in to the account's ECR registry.
    pub fn ecr_login(&self, runner: &dyn ProcessRunner, account_id: &str) -> Result<ProcessResult> {
        let mut password = vec![
            "aws".to_string(),
            "ecr".to_string(),
            "get-login-password".to_string(),
            "--region".to_string(),
            self.region.clone(),
        ];
        if let Some(profile) = &self.profile {
            password.push("--profile".to_string());
            password.push(profile.clone());
        }

        let script = format!(
            "{} | docker login --username AWS --password-stdin {}",
            shell::quote_args(&password),
            shell::quote_arg(&registry_host(account_id, &self.region))
        );
        let spec = CommandSpec::shell(script);
        let result = runner.buffered(&spec)?;

        let unexpected: Vec<&str> = result
            .stderr
            .lines()
            .filter(|line| !LOGIN_NOISE.is_match(line))
            .collect();
        if !unexpected.is_empty() {
            return Err(stderr_failure(&spec, &result));
        }

        Ok(result)
    }

    pub fn get_parameter(&self, runner: &dyn ProcessRunner, name: &str) -> Result<String> {
        let spec = self
            .command("ssm", "get-parameter")
            .arg("--name")
            .arg(name)
            .arg("--with-decryption");
        let response: GetParameterResponse = self.query(runner, spec)?;
        Ok(response.parameter.value)
    }

    pub fn put_parameter(
        &self,
        runner: &dyn ProcessRunner,
        name: &str,
        value: &str,
        key_id: &str,
    ) -> Result<()> {
        let spec = self
            .command("ssm", "put-parameter")
            .arg("--name")
            .arg(name)
            .arg("--value")
            .arg(value)
            .arg("--type")
            .arg("SecureString")
            .arg("--overwrite")
            .arg("--key-id")
            .arg(key_id)
            .redact(value);
        let _: serde_json::Value = self.query(runner, spec)?;
        Ok(())
    }

    /// `aws s3 cp`, optionally with server-side encryption.
    pub fn s3_copy(
        &self,
        runner: &dyn ProcessRunner,
        source: &str,
        destination: &str,
        sse: bool,
    ) -> Result<ProcessResult> {
        let mut spec = self.command("s3", "cp").arg(source).arg(destination);
        if sse {
            spec = spec.arg("--sse");
        }

        let result = runner.buffered(&spec)?;
        require_clean_stderr(&spec, &result)?;
        Ok(result)
    }
}

fn require_clean_stderr(spec: &CommandSpec, result: &ProcessResult) -> Result<()> {
    if result.stderr.trim().is_empty() {
        Ok(())
    } else {
        Err(stderr_failure(spec, result))
    }
}

fn stderr_failure(spec: &CommandSpec, result: &ProcessResult) -> Error {
    Error::process_command_failed(CommandFailedDetails {
        command: spec.display(),
        exit_code: result.exit_code,
        signal: result.signal,
        stdout: result.stdout.trim().to_string(),
        stderr: result.stderr.trim().to_string(),
    })
}

fn parse_json<T: DeserializeOwned>(spec: &CommandSpec, stdout: &str) -> Result<T> {
    serde_json::from_str(stdout)
        .map_err(|e| Error::process_invalid_output(spec.display(), e.to_string(), stdout))
}
