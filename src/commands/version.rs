use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use awsops::aws::AwsCli;
use awsops::ledger::{ledger_key, LedgerEntry, RecordOutcome, VersionLedger};
use awsops::process::SystemRunner;
use awsops::utils::validation;
use awsops::version::{self, DerivedVersion, VersionSource};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct VersionArgs {
    #[command(subcommand)]
    command: VersionCommand,

    /// Version ledger file
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,
}

#[derive(Subcommand)]
enum VersionCommand {
    /// Show the version the next build would get
    Next {
        #[arg(short = 'e', long)]
        environment: Option<String>,

        #[arg(short = 'i', long)]
        image: Option<String>,

        /// ledger, registry or auto
        #[arg(long, default_value = "auto")]
        source: String,

        /// AWS region (registry source only)
        #[arg(short = 'r', long)]
        region: Option<String>,

        /// AWS CLI profile (registry source only)
        #[arg(long)]
        profile: Option<String>,
    },
    /// Set the recorded version for an environment/image
    Record {
        environment: String,
        image: String,
        version: u64,
    },
    /// List recorded versions
    List,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecordOutput {
    pub key: String,
    pub version: u64,
    pub outcome: RecordOutcome,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionListOutput {
    pub entries: Vec<LedgerEntry>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum VersionOutput {
    Next(DerivedVersion),
    Record(VersionRecordOutput),
    List(VersionListOutput),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub ledger: String,
    #[serde(flatten)]
    pub output: VersionOutput,
}

pub fn run(args: VersionArgs, global: &GlobalArgs) -> CmdResult<VersionResponse> {
    let path = args
        .ledger
        .unwrap_or_else(|| global.defaults.ledger_path());
    let mut ledger = VersionLedger::load(&path)?;

    let output = match args.command {
        VersionCommand::Next {
            environment,
            image,
            source,
            region,
            profile,
        } => {
            let environment = global.or_default(environment, |d| &d.environment);
            let image = global.or_default(image, |d| &d.image);
            validation::require_name(&environment, "environment")?;
            validation::require_name(&image, "image")?;
            let source: VersionSource = source.parse()?;

            let aws = AwsCli::new(global.or_default(region, |d| &d.region), global.profile(profile));
            let derived = version::derive(source, &ledger, &aws, &SystemRunner, &environment, &image)?;
            VersionOutput::Next(derived)
        }
        VersionCommand::Record {
            environment,
            image,
            version,
        } => {
            validation::require_name(&environment, "environment")?;
            validation::require_name(&image, "image")?;
            let outcome = ledger.record(&environment, &image, version)?;
            VersionOutput::Record(VersionRecordOutput {
                key: ledger_key(&environment, &image),
                version,
                outcome,
            })
        }
        VersionCommand::List => VersionOutput::List(VersionListOutput {
            entries: ledger.entries(),
        }),
    };

    Ok((
        VersionResponse {
            ledger: path.display().to_string(),
            output,
        },
        0,
    ))
}
