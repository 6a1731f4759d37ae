use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use awsops::params::{self, ParamsConfig, ParamsGetResult, ParamsPutResult};
use awsops::process::SystemRunner;

use super::{bulk_exit_code, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct ParamsArgs {
    #[command(subcommand)]
    command: ParamsCommand,
}

#[derive(Args)]
struct CommonParamsArgs {
    /// Environment prefix of the parameter names
    #[arg(short = 'e', long)]
    environment: Option<String>,

    /// AWS region
    #[arg(short = 'r', long)]
    region: Option<String>,

    /// AWS CLI profile
    #[arg(short = 'p', long)]
    profile: Option<String>,

    /// Milliseconds to wait between Parameter Store calls
    #[arg(long)]
    interval_ms: Option<u64>,
}

#[derive(Subcommand)]
enum ParamsCommand {
    /// Download parameters and append them as exports to a profile script
    Get {
        #[command(flatten)]
        common: CommonParamsArgs,

        /// Profile script to append `export KEY='value'` lines to
        #[arg(short = 'l', long)]
        location: Option<String>,

        /// Report values instead of writing them
        #[arg(long)]
        debug: bool,
    },
    /// Upload a local env file as SecureString parameters
    Put {
        #[command(flatten)]
        common: CommonParamsArgs,

        /// KMS key id or alias used for encryption
        #[arg(short = 'k', long = "key")]
        key_id: Option<String>,

        /// Env file to upload instead of `.env` / `.env.<environment>`
        #[arg(long)]
        env_file: Option<PathBuf>,
    },
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum ParamsOutput {
    Get(ParamsGetResult),
    Put(ParamsPutResult),
}

fn base_config(common: CommonParamsArgs, default_interval_ms: u64, global: &GlobalArgs) -> ParamsConfig {
    let params = &global.defaults.params;
    ParamsConfig {
        environment: global.or_default(common.environment, |d| &d.environment),
        region: global.or_default(common.region, |d| &d.region),
        profile: global.profile(common.profile),
        key_id: params.key_id.clone(),
        location: awsops::paths::expand(&params.location),
        debug: false,
        interval: Duration::from_millis(common.interval_ms.unwrap_or(default_interval_ms)),
        env_file: None,
    }
}

pub fn run(args: ParamsArgs, global: &GlobalArgs) -> CmdResult<ParamsOutput> {
    match args.command {
        ParamsCommand::Get {
            common,
            location,
            debug,
        } => {
            let mut config = base_config(common, global.defaults.params.get_interval_ms, global);
            if let Some(location) = location {
                config.location = awsops::paths::expand(&location);
            }
            config.debug = debug;

            let result = params::get(&config, &SystemRunner)?;
            let exit_code = bulk_exit_code(result.bulk.has_failures());
            Ok((ParamsOutput::Get(result), exit_code))
        }
        ParamsCommand::Put {
            common,
            key_id,
            env_file,
        } => {
            let mut config = base_config(common, global.defaults.params.put_interval_ms, global);
            if let Some(key_id) = key_id {
                config.key_id = key_id;
            }
            config.env_file = env_file;

            let result = params::put(&config, &SystemRunner)?;
            let exit_code = bulk_exit_code(result.bulk.has_failures());
            Ok((ParamsOutput::Put(result), exit_code))
        }
    }
}
