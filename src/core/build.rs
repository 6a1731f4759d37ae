//! Image build pipeline: log in to ECR, fetch session credentials, derive
//! the next version, build, tag, optionally push, and record the version.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::json;

use crate::aws::{self, AwsCli};
use crate::context::StepContext;
use crate::docker::{self, BuildRequest};
use crate::error::{Error, Result};
use crate::ledger::VersionLedger;
use crate::pipeline::{Pipeline, PipelineRunResult, StepOutput};
use crate::process::ProcessRunner;
use crate::utils::validation;
use crate::version::{self, DerivedVersion, VersionSource};

/// Lifetime of the temporary credentials handed to `docker build`.
pub const SESSION_DURATION_SECONDS: u32 = 3600;

#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub account_id: String,
    pub environment: String,
    pub image: String,
    pub prefix: String,
    pub region: String,
    pub profile: Option<String>,
    pub dockerfile: String,
    pub context: String,
    /// Explicit tag; skips version derivation and recording.
    pub tag: Option<String>,
    pub version_source: VersionSource,
    pub push: bool,
    pub no_cache: bool,
    pub record: bool,
    pub ledger_path: PathBuf,
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(Error::validation_missing_argument(vec!["--account-id".to_string()]));
        }
        validation::require_name(&self.environment, "environment")?;
        validation::require_name(&self.image, "image")?;
        validation::require_name(&self.prefix, "prefix")?;
        if let Some(tag) = &self.tag {
            validation::require_name(tag, "tag")?;
        }
        Ok(())
    }

    /// Registry path, `{environment}/{image}`.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.environment, self.image)
    }

    pub fn repository_uri(&self) -> String {
        aws::repository_uri(&self.account_id, &self.region, &self.repository())
    }

    pub fn local_image(&self, tag: &str) -> String {
        format!("{}/{}/{}:{}", self.prefix, self.environment, self.image, tag)
    }

    pub fn remote_image(&self, tag: &str) -> String {
        format!("{}:{}", self.repository_uri(), tag)
    }

    fn aws(&self) -> AwsCli {
        AwsCli::new(&self.region, self.profile.clone())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub environment: String,
    pub image: String,
    pub repository: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<DerivedVersion>,
    pub pushed: bool,
    #[serde(flatten)]
    pub run: PipelineRunResult,
}

/// Shared by build and deploy: log docker in to the account's registry.
pub(crate) fn ecr_login_step(
    aws: &AwsCli,
    runner: &dyn ProcessRunner,
    account_id: &str,
) -> Result<StepOutput> {
    aws.ecr_login(runner, account_id)?;
    Ok(StepOutput::with_data(json!({
        "registry": aws::registry_host(account_id, &aws.region),
    })))
}

/// Shared by build and deploy: the caller identity must match `--account-id`.
pub(crate) fn verify_account_step(
    aws: &AwsCli,
    runner: &dyn ProcessRunner,
    expected: &str,
    ctx: &mut StepContext,
) -> Result<StepOutput> {
    let identity = aws.caller_identity(runner)?;
    if identity.account != expected {
        return Err(Error::aws_account_mismatch(expected, identity.account));
    }
    ctx.set_account_id(&identity.account)?;
    Ok(StepOutput::with_data(identity))
}

fn build_pipeline<'a>(
    config: &'a BuildConfig,
    aws: &'a AwsCli,
    runner: &'a dyn ProcessRunner,
) -> Pipeline<'a, StepContext> {
    let derive = config.tag.is_none();

    Pipeline::<'a, StepContext>::new("build")
        .step("ecr-login", "Logging in to ECR", move |_| {
            ecr_login_step(aws, runner, &config.account_id)
        })
        .step("verify-account", "Verifying AWS account", move |ctx| {
            verify_account_step(aws, runner, &config.account_id, ctx)
        })
        .step(
            "session-credentials",
            "Fetching session credentials",
            move |ctx| {
                let creds = aws.session_credentials(runner, SESSION_DURATION_SECONDS)?;
                let data = json!({
                    "accessKeyId": creds.access_key_id,
                    "expiration": creds.expiration,
                });
                ctx.set_credentials(creds)?;
                Ok(StepOutput::with_data(data))
            },
        )
        .step_if(derive, "derive-version", "Deriving next version", move |ctx| {
            let ledger = VersionLedger::load(&config.ledger_path)?;
            let derived = version::derive(
                config.version_source,
                &ledger,
                aws,
                runner,
                &config.environment,
                &config.image,
            )?;
            crate::log_status!(
                "build",
                "Next version for {} is {} (from {})",
                derived.key,
                derived.version,
                derived.source.as_str()
            );
            let output = StepOutput::with_data(&derived);
            ctx.set_version(derived)?;
            Ok(output)
        })
        .step("build-image", "Building image", move |ctx| {
            let tag = ctx.image_tag()?;
            let local = config.local_image(tag);
            docker::build(
                runner,
                &BuildRequest {
                    image: &local,
                    dockerfile: &config.dockerfile,
                    context: &config.context,
                    environment: &config.environment,
                    credentials: ctx.credentials()?,
                    no_cache: config.no_cache,
                },
            )?;
            Ok(StepOutput::with_data(json!({ "image": local })))
        })
        .step("tag-image", "Tagging image", move |ctx| {
            let tag = ctx.image_tag()?;
            let source = config.local_image(tag);
            let target = config.remote_image(tag);
            docker::tag(runner, &source, &target)?;
            Ok(StepOutput::with_data(json!({ "source": source, "target": target })))
        })
        .step_if(config.push, "push-image", "Pushing image", move |ctx| {
            let target = config.remote_image(ctx.image_tag()?);
            docker::push(runner, &target)?;
            Ok(StepOutput::with_data(json!({ "target": target })))
        })
        .step_if(
            derive && config.record,
            "record-version",
            "Recording version",
            move |ctx| {
                let version = ctx
                    .version()
                    .map(|v| v.version)
                    .ok_or_else(|| Error::internal_unexpected("No derived version to record"))?;
                let mut ledger = VersionLedger::load(&config.ledger_path)?;
                let outcome = ledger.record(&config.environment, &config.image, version)?;
                Ok(StepOutput::with_data(json!({
                    "ledger": ledger.path().display().to_string(),
                    "version": version,
                    "outcome": outcome,
                })))
            },
        )
}

/// Run the build pipeline. Configuration problems are returned as `Err`
/// before any subprocess is started; step failures are reported in the
/// returned run result.
pub fn run(config: &BuildConfig, runner: &dyn ProcessRunner) -> Result<BuildResult> {
    config.validate()?;

    let aws = config.aws();
    let mut ctx = match &config.tag {
        Some(tag) => StepContext::with_image_tag(tag),
        None => StepContext::new(),
    };

    let run = build_pipeline(config, &aws, runner).run(&mut ctx);

    Ok(BuildResult {
        environment: config.environment.clone(),
        image: config.image.clone(),
        repository: config.repository_uri(),
        tag: ctx.image_tag().ok().map(str::to_string),
        version: ctx.version().cloned(),
        pushed: config.push && run.is_success(),
        run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::pipeline::{PipelineRunStatus, StepStatus};
    use crate::testing::ScriptedRunner;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    const IDENTITY: &str =
        r#"{"UserId":"AIDA","Account":"123456789012","Arn":"arn:aws:iam::123456789012:user/ci"}"#;
    const CREDENTIALS: &str = r#"{"Credentials":{"AccessKeyId":"ASIA1","SecretAccessKey":"s3cr3t","SessionToken":"tok","Expiration":"2030-01-01T00:00:00Z"}}"#;

    fn config(dir: &TempDir) -> BuildConfig {
        BuildConfig {
            account_id: "123456789012".to_string(),
            environment: "staging".to_string(),
            image: "api".to_string(),
            prefix: "default".to_string(),
            region: "us-east-1".to_string(),
            profile: None,
            dockerfile: "Dockerfile".to_string(),
            context: ".".to_string(),
            tag: None,
            version_source: VersionSource::Ledger,
            push: true,
            no_cache: false,
            record: true,
            ledger_path: dir.path().join(".versions"),
        }
    }

    #[test]
    fn invalid_config_spawns_nothing() {
        let dir = tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let mut config = config(&dir);
        config.account_id = String::new();

        let err = run(&config, &runner).unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn invalid_name_spawns_nothing() {
        let dir = tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let mut config = config(&dir);
        config.environment = "staging/eu".to_string();

        let err = run(&config, &runner).unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn full_build_derives_pushes_and_records() {
        let dir = tempdir().unwrap();
        let config = config(&dir);
        fs::write(&config.ledger_path, "production/api:9\nstaging/api:4\n").unwrap();

        let runner = ScriptedRunner::new()
            .stdout("Login Succeeded")
            .stdout(IDENTITY)
            .stdout(CREDENTIALS);

        let result = run(&config, &runner).unwrap();

        assert_eq!(result.run.status, PipelineRunStatus::Success);
        assert_eq!(result.tag.as_deref(), Some("5"));
        assert!(result.pushed);

        let calls = runner.calls();
        assert_eq!(calls.len(), 6);
        assert!(calls[3].starts_with("docker build -t default/staging/api:5"));
        assert!(!calls[3].contains("s3cr3t"));
        assert_eq!(
            calls[4],
            "docker tag default/staging/api:5 123456789012.dkr.ecr.us-east-1.amazonaws.com/staging/api:5"
        );
        assert_eq!(
            calls[5],
            "docker push 123456789012.dkr.ecr.us-east-1.amazonaws.com/staging/api:5"
        );
        assert_eq!(
            fs::read_to_string(&config.ledger_path).unwrap(),
            "production/api:9\nstaging/api:5\n"
        );
    }

    #[test]
    fn explicit_tag_skips_derivation_and_recording() {
        let dir = tempdir().unwrap();
        let mut config = config(&dir);
        config.tag = Some("42".to_string());
        config.push = false;

        let runner = ScriptedRunner::new()
            .stdout("Login Succeeded")
            .stdout(IDENTITY)
            .stdout(CREDENTIALS);

        let result = run(&config, &runner).unwrap();

        assert!(result.run.is_success());
        assert_eq!(result.tag.as_deref(), Some("42"));
        for id in ["derive-version", "push-image", "record-version"] {
            assert_eq!(result.run.step(id).unwrap().status, StepStatus::Skipped);
        }
        assert!(!config.ledger_path.exists());
        assert_eq!(runner.calls().len(), 5);
    }

    #[test]
    fn account_mismatch_halts_before_build() {
        let dir = tempdir().unwrap();
        let mut config = config(&dir);
        config.account_id = "999999999999".to_string();

        let runner = ScriptedRunner::new()
            .stdout("Login Succeeded")
            .stdout(IDENTITY);

        let result = run(&config, &runner).unwrap();

        assert_eq!(result.run.status, PipelineRunStatus::Failed);
        let failure = result.run.failure.as_ref().unwrap();
        assert_eq!(failure.code, ErrorCode::AwsAccountMismatch);
        assert_eq!(runner.calls().len(), 2);
        assert!(!result.pushed);
    }

    #[test]
    fn failed_build_skips_tag_push_and_record() {
        let dir = tempdir().unwrap();
        let config = config(&dir);
        fs::write(&config.ledger_path, "staging/api:4\n").unwrap();

        let runner = ScriptedRunner::new()
            .stdout("Login Succeeded")
            .stdout(IDENTITY)
            .stdout(CREDENTIALS)
            .fail(1, "failed to solve: dockerfile parse error");

        let result = run(&config, &runner).unwrap();

        assert_eq!(result.run.step("build-image").unwrap().status, StepStatus::Failed);
        for id in ["tag-image", "push-image", "record-version"] {
            assert_eq!(result.run.step(id).unwrap().status, StepStatus::Skipped);
        }
        assert_eq!(runner.calls().len(), 4);
        assert_eq!(fs::read_to_string(&config.ledger_path).unwrap(), "staging/api:4\n");
    }

    #[test]
    fn registry_source_uses_highest_tag() {
        let dir = tempdir().unwrap();
        let mut config = config(&dir);
        config.version_source = VersionSource::Registry;
        config.push = false;
        config.record = false;

        let runner = ScriptedRunner::new()
            .stdout("Login Succeeded")
            .stdout(IDENTITY)
            .stdout(CREDENTIALS)
            .stdout(r#"{"imageIds":[{"imageTag":"3"},{"imageTag":"7"},{"imageTag":"latest"}]}"#);

        let result = run(&config, &runner).unwrap();

        assert_eq!(result.tag.as_deref(), Some("8"));
        assert_eq!(result.version.unwrap().source, VersionSource::Registry);
        assert!(!config.ledger_path.exists());
    }
}
