use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{build, deploy, params, secrets, version};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "awsops")]
#[command(version = VERSION)]
#[command(about = "Build, push and deploy container images and sync secrets on AWS")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, tag and optionally push an image to ECR
    Build(build::BuildArgs),
    /// Deploy an image tag to an ECS service or task definition
    Deploy(deploy::DeployArgs),
    /// Sync environment variables with SSM Parameter Store
    Params(params::ParamsArgs),
    /// Sync a .env file with an encrypted S3 bucket
    Secrets(secrets::SecretsArgs),
    /// Inspect and edit the version ledger
    Version(version::VersionArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs::load();

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    output::print_json_result(json_result, exit_code);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
