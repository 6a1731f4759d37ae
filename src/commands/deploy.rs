use clap::Args;

use awsops::deploy::{self, DeployConfig, DeployResult, DeployTarget, TagChooser};
use awsops::process::SystemRunner;
use awsops::utils::validation;

use super::{pipeline_exit_code, CmdResult, GlobalArgs};
use crate::tty::{self, PromptChooser};

#[derive(Args)]
pub struct DeployArgs {
    /// AWS account to deploy to; must match the active credentials
    #[arg(short = 'a', long)]
    pub account_id: Option<String>,

    /// ECS cluster name
    #[arg(short = 'c', long)]
    pub cluster: Option<String>,

    /// Service to update (exclusive with --task-definition)
    #[arg(short = 'n', long)]
    pub service_name: Option<String>,

    /// Task definition to deploy (exclusive with --service-name)
    #[arg(short = 'd', long)]
    pub task_definition: Option<String>,

    /// Environment part of the repository name
    #[arg(short = 'e', long)]
    pub environment: Option<String>,

    /// Image name, also the ECR repository suffix
    #[arg(short = 'i', long)]
    pub image: Option<String>,

    /// AWS region of the cluster and registry
    #[arg(short = 'r', long)]
    pub region: Option<String>,

    /// AWS CLI profile
    #[arg(long)]
    pub profile: Option<String>,

    /// Image tag to deploy; prompts on a terminal when omitted
    #[arg(short = 't', long)]
    pub tag: Option<String>,

    /// Deploy the highest numeric tag without prompting
    #[arg(long, conflicts_with = "tag")]
    pub latest: bool,

    /// Seconds the deploy script waits for the rollout
    #[arg(short = 'o', long)]
    pub timeout: Option<u64>,

    /// Deploy script to run
    #[arg(long)]
    pub deploy_script: Option<String>,
}

pub fn run(args: DeployArgs, global: &GlobalArgs) -> CmdResult<DeployResult> {
    let account_id = validation::require_non_empty(args.account_id, "--account-id")?;
    let cluster = validation::require_non_empty(args.cluster, "--cluster")?;
    let target = DeployTarget::from_flags(args.service_name, args.task_definition)?;

    let config = DeployConfig {
        account_id,
        environment: global.or_default(args.environment, |d| &d.environment),
        image: global.or_default(args.image, |d| &d.image),
        region: global.or_default(args.region, |d| &d.region),
        profile: global.profile(args.profile),
        cluster,
        target,
        tag: args.tag,
        latest: args.latest,
        timeout_seconds: args.timeout.unwrap_or(global.defaults.deploy.timeout_seconds),
        deploy_script: global.or_default(args.deploy_script, |d| &d.deploy.script),
    };

    let prompt = PromptChooser;
    let chooser: Option<&dyn TagChooser> = if tty::can_prompt() {
        Some(&prompt)
    } else {
        None
    };

    let result = deploy::run(&config, &SystemRunner, chooser)?;
    let exit_code = pipeline_exit_code(&result.run);
    Ok((result, exit_code))
}
