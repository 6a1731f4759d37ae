use clap::{Args, Subcommand};
use std::path::PathBuf;

use awsops::process::SystemRunner;
use awsops::secrets::{self, SecretsConfig, SecretsTransfer};
use awsops::utils::validation;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct SecretsArgs {
    #[command(subcommand)]
    command: SecretsCommand,

    /// S3 bucket holding the env files
    #[arg(short = 'b', long, global = true)]
    bucket: Option<String>,

    /// Environment whose `.env.<environment>` file is synced
    #[arg(short = 'e', long, global = true)]
    environment: Option<String>,

    /// AWS CLI profile (required)
    #[arg(short = 'p', long, global = true)]
    profile: Option<String>,

    /// AWS region
    #[arg(short = 'r', long, global = true)]
    region: Option<String>,

    /// Directory containing the local env files
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,
}

#[derive(Subcommand)]
enum SecretsCommand {
    /// Download `.env.<environment>` to `s3.env.<environment>`
    Get,
    /// Upload `.env.<environment>` with server-side encryption
    Put,
}

pub fn run(args: SecretsArgs, global: &GlobalArgs) -> CmdResult<SecretsTransfer> {
    let config = SecretsConfig {
        bucket: validation::require_non_empty(args.bucket, "--bucket")?,
        profile: validation::require_non_empty(global.profile(args.profile), "--profile")?,
        environment: global.or_default(args.environment, |d| &d.environment),
        region: global.or_default(args.region, |d| &d.region),
        directory: args.dir,
    };

    let transfer = match args.command {
        SecretsCommand::Get => secrets::get(&config, &SystemRunner)?,
        SecretsCommand::Put => secrets::put(&config, &SystemRunner)?,
    };

    Ok((transfer, 0))
}
