//! Deploy an existing image tag to an ECS service or task definition.
//!
//! The rollout itself is delegated to an external deploy script
//! (`ecs-deploy` by default) which polls until the new task set is stable or
//! its timeout expires.

use std::cmp::Reverse;

use serde::Serialize;
use serde_json::json;

use crate::aws::{self, AwsCli};
use crate::build::{ecr_login_step, verify_account_step};
use crate::context::StepContext;
use crate::error::{Error, Result};
use crate::pipeline::{Pipeline, PipelineRunResult, StepOutput};
use crate::process::{CommandSpec, ProcessRunner};
use crate::utils::validation;
use crate::version::tag_number;

/// What the deploy script updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "name")]
pub enum DeployTarget {
    Service(String),
    TaskDefinition(String),
}

impl DeployTarget {
    /// Exactly one of `--service-name` / `--task-definition` must be given.
    pub fn from_flags(service: Option<String>, task_definition: Option<String>) -> Result<Self> {
        match (service, task_definition) {
            (Some(service), None) => Ok(DeployTarget::Service(service)),
            (None, Some(task)) => Ok(DeployTarget::TaskDefinition(task)),
            (Some(_), Some(_)) => Err(Error::validation_invalid_argument(
                "target",
                "--service-name and --task-definition are mutually exclusive",
                None,
                None,
            )),
            (None, None) => Err(Error::validation_missing_argument(vec![
                "--service-name".to_string(),
                "--task-definition".to_string(),
            ])
            .with_hint("Pass --service-name to update a service or --task-definition to register a task")),
        }
    }

    fn step_id(&self) -> &'static str {
        match self {
            DeployTarget::Service(_) => "deploy-service",
            DeployTarget::TaskDefinition(_) => "deploy-task",
        }
    }

    fn flag(&self) -> (&'static str, &str) {
        match self {
            DeployTarget::Service(name) => ("--service-name", name),
            DeployTarget::TaskDefinition(name) => ("--task-definition", name),
        }
    }
}

/// Interactive tag picker used when no tag was given on a terminal.
pub trait TagChooser {
    /// `tags` are ordered newest first. `Ok(None)` means the operator
    /// cancelled.
    fn choose(&self, repository: &str, tags: &[String]) -> Result<Option<String>>;
}

#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub account_id: String,
    pub environment: String,
    pub image: String,
    pub region: String,
    pub profile: Option<String>,
    pub cluster: String,
    pub target: DeployTarget,
    pub tag: Option<String>,
    /// Without a tag or a terminal, pick the highest numeric tag.
    pub latest: bool,
    pub timeout_seconds: u64,
    pub deploy_script: String,
}

impl DeployConfig {
    pub fn validate(&self, interactive: bool) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(Error::validation_missing_argument(vec!["--account-id".to_string()]));
        }
        if self.cluster.trim().is_empty() {
            return Err(Error::validation_missing_argument(vec!["--cluster".to_string()]));
        }
        validation::require_name(&self.environment, "environment")?;
        validation::require_name(&self.image, "image")?;
        if let Some(tag) = &self.tag {
            validation::require_name(tag, "tag")?;
        }
        if self.tag.is_none() && !self.latest && !interactive {
            return Err(Error::validation_missing_argument(vec!["--tag".to_string()])
                .with_hint("Pass --latest to deploy the highest numeric tag without prompting"));
        }
        Ok(())
    }

    pub fn repository(&self) -> String {
        format!("{}/{}", self.environment, self.image)
    }

    pub fn repository_uri(&self) -> String {
        aws::repository_uri(&self.account_id, &self.region, &self.repository())
    }

    pub fn deploy_command(&self, tag: &str) -> CommandSpec {
        let (flag, name) = self.target.flag();
        CommandSpec::new(&self.deploy_script)
            .arg("--cluster")
            .arg(&self.cluster)
            .arg(flag)
            .arg(name)
            .arg("--image")
            .arg(format!("{}:{}", self.repository_uri(), tag))
            .arg("--timeout")
            .arg(self.timeout_seconds.to_string())
    }
}

/// Newest first: descending numeric value, then descending text.
pub fn order_tags(mut tags: Vec<String>) -> Vec<String> {
    tags.sort_by_key(|t| Reverse((tag_number(t), t.clone())));
    tags.dedup();
    tags
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    pub environment: String,
    pub image: String,
    pub cluster: String,
    pub target: DeployTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    #[serde(flatten)]
    pub run: PipelineRunResult,
}

fn select_tag(
    config: &DeployConfig,
    aws: &AwsCli,
    runner: &dyn ProcessRunner,
    chooser: Option<&dyn TagChooser>,
) -> Result<String> {
    let repository = config.repository();
    let tags = order_tags(aws.list_image_tags(runner, &repository)?);
    if tags.is_empty() {
        return Err(Error::validation_invalid_argument(
            "image",
            format!("Repository '{}' has no tagged images", repository),
            Some(repository),
            None,
        ));
    }

    match chooser {
        Some(chooser) if !config.latest => chooser
            .choose(&repository, &tags)?
            .ok_or_else(|| Error::validation_missing_argument(vec!["--tag".to_string()])),
        _ if config.latest => Ok(tags[0].clone()),
        _ => Err(Error::validation_missing_argument(vec!["--tag".to_string()])),
    }
}

fn deploy_pipeline<'a>(
    config: &'a DeployConfig,
    aws: &'a AwsCli,
    runner: &'a dyn ProcessRunner,
    chooser: Option<&'a dyn TagChooser>,
) -> Pipeline<'a, StepContext> {
    let target = &config.target;

    Pipeline::<'a, StepContext>::new("deploy")
        .step("ecr-login", "Logging in to ECR", move |_| {
            ecr_login_step(aws, runner, &config.account_id)
        })
        .step("verify-account", "Verifying AWS account", move |ctx| {
            verify_account_step(aws, runner, &config.account_id, ctx)
        })
        .step_if(config.tag.is_none(), "select-tag", "Selecting image tag", move |ctx| {
            let tag = select_tag(config, aws, runner, chooser)?;
            crate::log_status!("deploy", "Deploying tag {}", tag);
            let output = StepOutput::with_data(json!({ "tag": tag }));
            ctx.set_image_tag(tag)?;
            Ok(output)
        })
        .step_if(
            matches!(target, DeployTarget::Service(_)),
            "deploy-service",
            "Deploying service",
            move |ctx| deploy_step(config, runner, ctx),
        )
        .step_if(
            matches!(target, DeployTarget::TaskDefinition(_)),
            "deploy-task",
            "Deploying task definition",
            move |ctx| deploy_step(config, runner, ctx),
        )
}

fn deploy_step(
    config: &DeployConfig,
    runner: &dyn ProcessRunner,
    ctx: &mut StepContext,
) -> Result<StepOutput> {
    let tag = ctx.image_tag()?;
    runner.streamed(&config.deploy_command(tag))?;
    Ok(StepOutput::with_data(json!({
        "step": config.target.step_id(),
        "image": format!("{}:{}", config.repository_uri(), tag),
        "timeoutSeconds": config.timeout_seconds,
    })))
}

/// Run the deploy pipeline. `chooser` is only consulted when no tag was
/// given and `--latest` is off.
pub fn run(
    config: &DeployConfig,
    runner: &dyn ProcessRunner,
    chooser: Option<&dyn TagChooser>,
) -> Result<DeployResult> {
    config.validate(chooser.is_some())?;

    let aws = AwsCli::new(&config.region, config.profile.clone());
    let mut ctx = match &config.tag {
        Some(tag) => StepContext::with_image_tag(tag),
        None => StepContext::new(),
    };

    let run = deploy_pipeline(config, &aws, runner, chooser).run(&mut ctx);
    let tag = ctx.image_tag().ok().map(str::to_string);

    Ok(DeployResult {
        environment: config.environment.clone(),
        image: config.image.clone(),
        cluster: config.cluster.clone(),
        target: config.target.clone(),
        image_uri: tag.as_ref().map(|t| format!("{}:{}", config.repository_uri(), t)),
        tag,
        run,
    })
}
