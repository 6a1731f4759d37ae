//! Sync a `.env.{environment}` secrets file with an encrypted S3 bucket.

use std::path::PathBuf;

use serde::Serialize;

use crate::aws::AwsCli;
use crate::error::{Error, Result};
use crate::process::ProcessRunner;
use crate::utils::validation;

#[derive(Debug, Clone)]
pub struct SecretsConfig {
    pub bucket: String,
    pub environment: String,
    pub profile: String,
    pub region: String,
    /// Directory holding the local env files.
    pub directory: PathBuf,
}

impl SecretsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(Error::validation_missing_argument(vec!["--bucket".to_string()]));
        }
        if self.profile.trim().is_empty() {
            return Err(Error::validation_missing_argument(vec!["--profile".to_string()]));
        }
        validation::require_name(&self.environment, "environment")?;
        Ok(())
    }

    pub fn object_uri(&self) -> String {
        format!("s3://{}/.env.{}", self.bucket, self.environment)
    }

    /// Local file uploaded by `put`.
    pub fn local_file(&self) -> PathBuf {
        self.directory.join(format!(".env.{}", self.environment))
    }

    /// Download target. Kept apart from the upload source so a fetch never
    /// clobbers local edits.
    pub fn download_file(&self) -> PathBuf {
        self.directory.join(format!("s3.env.{}", self.environment))
    }

    fn aws(&self) -> AwsCli {
        AwsCli::new(&self.region, Some(self.profile.clone()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsTransfer {
    pub action: String,
    pub source: String,
    pub destination: String,
    pub encrypted: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
}

pub fn get(config: &SecretsConfig, runner: &dyn ProcessRunner) -> Result<SecretsTransfer> {
    config.validate()?;

    let source = config.object_uri();
    let destination = config.download_file().display().to_string();
    crate::log_status!("secrets", "Fetching {} to {}", source, destination);

    let result = config.aws().s3_copy(runner, &source, &destination, false)?;

    Ok(SecretsTransfer {
        action: "get".to_string(),
        source,
        destination,
        encrypted: false,
        output: result.stdout.trim().to_string(),
    })
}

pub fn put(config: &SecretsConfig, runner: &dyn ProcessRunner) -> Result<SecretsTransfer> {
    config.validate()?;

    let local = config.local_file();
    if !local.is_file() {
        return Err(Error::validation_invalid_argument(
            "environment",
            format!("Secrets file not found: {}", local.display()),
            Some(local.display().to_string()),
            None,
        ));
    }

    let source = local.display().to_string();
    let destination = config.object_uri();
    crate::log_status!("secrets", "Pushing {} to {}", source, destination);

    let result = config.aws().s3_copy(runner, &source, &destination, true)?;

    Ok(SecretsTransfer {
        action: "put".to_string(),
        source,
        destination,
        encrypted: true,
        output: result.stdout.trim().to_string(),
    })
}
