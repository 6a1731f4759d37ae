//! `docker` build, tag and push invocations (streamed).

use crate::aws::SessionCredentials;
use crate::error::Result;
use crate::process::{CommandSpec, ProcessResult, ProcessRunner, StderrPolicy};

#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    pub image: &'a str,
    pub dockerfile: &'a str,
    pub context: &'a str,
    pub environment: &'a str,
    pub credentials: &'a SessionCredentials,
    pub no_cache: bool,
}

/// Build command with the session credentials passed as build args.
///
/// The secret values are redacted from anything that gets displayed.
pub fn build_command(request: &BuildRequest<'_>) -> CommandSpec {
    let creds = request.credentials;
    let mut spec = CommandSpec::new("docker")
        .arg("build")
        .arg("-t")
        .arg(request.image)
        .arg("--build-arg")
        .arg(format!("AWS_ACCESS_KEY_ID={}", creds.access_key_id))
        .arg("--build-arg")
        .arg(format!("AWS_SECRET_ACCESS_KEY={}", creds.secret_access_key))
        .arg("--build-arg")
        .arg(format!("AWS_SESSION_TOKEN={}", creds.session_token))
        .arg("--build-arg")
        .arg(format!("ENVIRONMENT={}", request.environment))
        .arg("-f")
        .arg(request.dockerfile);

    if request.no_cache {
        spec = spec.arg("--no-cache");
    }

    // BuildKit reports progress on stderr, so only the exit status counts.
    spec.arg(request.context)
        .stderr_policy(StderrPolicy::ExitStatus)
        .redact(creds.secret_access_key.clone())
        .redact(creds.session_token.clone())
}

pub fn build(runner: &dyn ProcessRunner, request: &BuildRequest<'_>) -> Result<ProcessResult> {
    runner.streamed(&build_command(request))
}

pub fn tag(runner: &dyn ProcessRunner, source: &str, target: &str) -> Result<ProcessResult> {
    let spec = CommandSpec::new("docker").arg("tag").arg(source).arg(target);
    runner.streamed(&spec)
}

pub fn push(runner: &dyn ProcessRunner, target: &str) -> Result<ProcessResult> {
    let spec = CommandSpec::new("docker").arg("push").arg(target);
    runner.streamed(&spec)
}
