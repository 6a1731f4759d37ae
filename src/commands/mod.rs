use awsops::defaults::Defaults;
use awsops::pipeline::PipelineRunResult;

pub type CmdResult<T> = awsops::Result<(T, i32)>;

/// State shared by every subcommand.
pub(crate) struct GlobalArgs {
    pub defaults: Defaults,
}

impl GlobalArgs {
    pub fn load() -> Self {
        Self {
            defaults: awsops::defaults::load_defaults(),
        }
    }

    /// Flag value, else configured default.
    pub fn or_default(&self, flag: Option<String>, pick: impl Fn(&Defaults) -> &String) -> String {
        flag.unwrap_or_else(|| pick(&self.defaults).clone())
    }

    pub fn profile(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| self.defaults.profile.clone())
    }
}

/// Exit code for a finished pipeline: 0, or the code of the error that
/// halted it.
pub(crate) fn pipeline_exit_code(run: &PipelineRunResult) -> i32 {
    run.failure
        .as_ref()
        .map(|err| crate::output::exit_code_for_error(err.code))
        .unwrap_or(0)
}

/// Exit code for a bulk run that keeps going past item failures.
pub(crate) fn bulk_exit_code(has_failures: bool) -> i32 {
    if has_failures {
        1
    } else {
        0
    }
}

pub mod build;
pub mod deploy;
pub mod params;
pub mod secrets;
pub mod version;

macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (awsops::Result<serde_json::Value>, i32) {
    crate::tty::status("awsops is working...");

    match command {
        crate::Commands::Build(args) => dispatch!(args, global, build),
        crate::Commands::Deploy(args) => dispatch!(args, global, deploy),
        crate::Commands::Params(args) => dispatch!(args, global, params),
        crate::Commands::Secrets(args) => dispatch!(args, global, secrets),
        crate::Commands::Version(args) => dispatch!(args, global, version),
    }
}
