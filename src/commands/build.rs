use clap::Args;
use std::path::PathBuf;

use awsops::build::{self, BuildConfig, BuildResult};
use awsops::process::SystemRunner;
use awsops::utils::validation;
use awsops::version::VersionSource;

use super::{pipeline_exit_code, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct BuildArgs {
    /// AWS account the image is built for; must match the active credentials
    #[arg(short = 'a', long)]
    pub account_id: Option<String>,

    /// Dockerfile used for the build
    #[arg(short = 'f', long)]
    pub dockerfile: Option<String>,

    /// Environment passed to the build (e.g., staging or production)
    #[arg(short = 'e', long)]
    pub environment: Option<String>,

    /// Image name, also the ECR repository suffix
    #[arg(short = 'i', long)]
    pub image: Option<String>,

    /// Project prefix for the local image name
    #[arg(short = 'p', long)]
    pub prefix: Option<String>,

    /// AWS region of the registry
    #[arg(short = 'r', long)]
    pub region: Option<String>,

    /// AWS CLI profile
    #[arg(long)]
    pub profile: Option<String>,

    /// Docker build context
    #[arg(long, default_value = ".")]
    pub context: String,

    /// Use this tag instead of deriving the next version
    #[arg(short = 't', long)]
    pub tag: Option<String>,

    /// Where the next version comes from: ledger, registry or auto
    #[arg(long, default_value = "auto")]
    pub source: String,

    /// Push the image after tagging
    #[arg(long)]
    pub push: bool,

    /// Build without the docker layer cache
    #[arg(long, visible_alias = "noCache")]
    pub no_cache: bool,

    /// Do not write the derived version to the ledger
    #[arg(long)]
    pub no_record: bool,

    /// Version ledger file
    #[arg(long)]
    pub ledger: Option<PathBuf>,
}

pub fn run(args: BuildArgs, global: &GlobalArgs) -> CmdResult<BuildResult> {
    let account_id = validation::require_non_empty(args.account_id, "--account-id")?;
    let version_source: VersionSource = args.source.parse()?;

    let config = BuildConfig {
        account_id,
        environment: global.or_default(args.environment, |d| &d.environment),
        image: global.or_default(args.image, |d| &d.image),
        prefix: global.or_default(args.prefix, |d| &d.prefix),
        region: global.or_default(args.region, |d| &d.region),
        profile: global.profile(args.profile),
        dockerfile: global.or_default(args.dockerfile, |d| &d.dockerfile),
        context: args.context,
        tag: args.tag,
        version_source,
        push: args.push,
        no_cache: args.no_cache,
        record: !args.no_record,
        ledger_path: args.ledger.unwrap_or_else(|| global.defaults.ledger_path()),
    };

    let result = build::run(&config, &SystemRunner)?;
    let exit_code = pipeline_exit_code(&result.run);
    Ok((result, exit_code))
}
