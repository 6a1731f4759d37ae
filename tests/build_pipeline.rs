use std::cell::RefCell;
use std::fs;

use awsops::build::{self, BuildConfig};
use awsops::deploy::{self, DeployConfig, DeployTarget};
use awsops::error::{CommandFailedDetails, ErrorCode};
use awsops::pipeline::StepStatus;
use awsops::process::{CommandSpec, ProcessResult, ProcessRunner};
use awsops::version::VersionSource;
use awsops::Error;
use tempfile::{tempdir, TempDir};

/// Fake `aws`/`docker` that answers by program and subcommand and can be
/// told to fail one of them.
#[derive(Default)]
struct FakeTools {
    fail_on: Option<&'static str>,
    calls: RefCell<Vec<String>>,
}

impl FakeTools {
    fn failing(subcommand: &'static str) -> Self {
        Self {
            fail_on: Some(subcommand),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn answer(&self, spec: &CommandSpec) -> awsops::Result<ProcessResult> {
        let key = format!("{} {}", spec.program, spec.args.first().cloned().unwrap_or_default());
        self.calls.borrow_mut().push(key.clone());

        if self.fail_on.is_some_and(|f| key.ends_with(f)) {
            return Err(Error::process_command_failed(CommandFailedDetails {
                command: spec.display(),
                exit_code: Some(1),
                signal: None,
                stdout: String::new(),
                stderr: "simulated failure".to_string(),
            }));
        }

        let stdout = match spec.args.get(1).map(String::as_str) {
            Some("get-caller-identity") => r#"{"Account":"123456789012"}"#,
            Some("get-session-token") => {
                r#"{"Credentials":{"AccessKeyId":"A","SecretAccessKey":"S","SessionToken":"T"}}"#
            }
            Some("list-images") => r#"{"imageIds":[{"imageTag":"4"}]}"#,
            _ => "",
        };

        Ok(ProcessResult {
            stdout: stdout.to_string(),
            exit_code: Some(0),
            ..Default::default()
        })
    }
}

impl ProcessRunner for FakeTools {
    fn buffered(&self, spec: &CommandSpec) -> awsops::Result<ProcessResult> {
        self.answer(spec)
    }

    fn streamed(&self, spec: &CommandSpec) -> awsops::Result<ProcessResult> {
        self.answer(spec)
    }
}

fn build_config(dir: &TempDir) -> BuildConfig {
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
        version_source: VersionSource::Auto,
        push: true,
        no_cache: false,
        record: true,
        ledger_path: dir.path().join(".versions"),
    }
}

#[test]
fn build_without_account_runs_no_tools() {
    let dir = tempdir().unwrap();
    let mut config = build_config(&dir);
    config.account_id = "  ".to_string();
    let tools = FakeTools::default();

    let err = build::run(&config, &tools).unwrap_err();

    assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
    assert!(tools.calls().is_empty());
}

#[test]
fn deploy_without_target_tag_or_terminal_runs_no_tools() {
    let tools = FakeTools::default();
    let config = DeployConfig {
        account_id: "123456789012".to_string(),
        environment: "staging".to_string(),
        image: "api".to_string(),
        region: "us-east-1".to_string(),
        profile: None,
        cluster: String::new(),
        target: DeployTarget::Service("api".to_string()),
        tag: None,
        latest: false,
        timeout_seconds: 300,
        deploy_script: "ecs-deploy".to_string(),
    };

    let err = deploy::run(&config, &tools, None).unwrap_err();

    assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
    assert!(tools.calls().is_empty());
}

#[test]
fn build_with_empty_ledger_falls_back_to_registry() {
    let dir = tempdir().unwrap();
    let config = build_config(&dir);
    let tools = FakeTools::default();

    let result = build::run(&config, &tools).unwrap();

    assert!(result.run.is_success());
    assert_eq!(result.tag.as_deref(), Some("5"));
    assert_eq!(
        tools.calls(),
        vec![
            "sh -c",
            "aws sts",
            "aws sts",
            "aws ecr",
            "docker build",
            "docker tag",
            "docker push",
        ]
    );
    assert_eq!(
        fs::read_to_string(&config.ledger_path).unwrap(),
        "staging/api:5\n"
    );
}

#[test]
fn failing_docker_build_stops_the_pipeline() {
    let dir = tempdir().unwrap();
    let config = build_config(&dir);
    fs::write(&config.ledger_path, "staging/api:4\n").unwrap();
    let tools = FakeTools::failing("docker build");

    let result = build::run(&config, &tools).unwrap();

    assert!(!result.run.is_success());
    assert_eq!(result.run.step("build-image").unwrap().status, StepStatus::Failed);
    for id in ["tag-image", "push-image", "record-version"] {
        assert_eq!(result.run.step(id).unwrap().status, StepStatus::Skipped, "{}", id);
    }
    assert!(!tools.calls().iter().any(|c| c == "docker tag" || c == "docker push"));
    assert_eq!(fs::read_to_string(&config.ledger_path).unwrap(), "staging/api:4\n");
    assert_eq!(
        result.run.failure.map(|e| e.code),
        Some(ErrorCode::ProcessCommandFailed)
    );
}
