use std::cell::RefCell;
use std::fs;

use awsops::aws::AwsCli;
use awsops::ledger::{RecordOutcome, VersionLedger};
use awsops::process::{CommandSpec, ProcessResult, ProcessRunner};
use awsops::version::{self, VersionSource};
use tempfile::tempdir;

/// Answers every command with the same stdout.
struct FixedRunner {
    stdout: String,
    calls: RefCell<usize>,
}

impl FixedRunner {
    fn new(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            calls: RefCell::new(0),
        }
    }
}

impl ProcessRunner for FixedRunner {
    fn buffered(&self, _spec: &CommandSpec) -> awsops::Result<ProcessResult> {
        *self.calls.borrow_mut() += 1;
        Ok(ProcessResult {
            stdout: self.stdout.clone(),
            exit_code: Some(0),
            ..Default::default()
        })
    }

    fn streamed(&self, spec: &CommandSpec) -> awsops::Result<ProcessResult> {
        self.buffered(spec)
    }
}

fn aws() -> AwsCli {
    AwsCli::new("us-east-1", None)
}

#[test]
fn derive_then_record_replaces_existing_line() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".versions");
    fs::write(&path, "production/api:11\nstaging/api:4\nstaging/worker:2\n").unwrap();
    let runner = FixedRunner::new("{}");

    let ledger = VersionLedger::load(&path).unwrap();
    let derived =
        version::derive(VersionSource::Ledger, &ledger, &aws(), &runner, "staging", "api").unwrap();
    assert_eq!(derived.version, 5);
    assert_eq!(derived.previous, Some(4));

    let mut ledger = VersionLedger::load(&path).unwrap();
    let outcome = ledger.record("staging", "api", derived.version).unwrap();

    assert_eq!(outcome, RecordOutcome::Replaced { previous: 4 });
    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content, "production/api:11\nstaging/api:5\nstaging/worker:2\n");
    assert_eq!(content.matches("staging/api:").count(), 1);
    assert_eq!(*runner.calls.borrow(), 0);
}

#[test]
fn missing_ledger_starts_new_image_at_one() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".versions");
    let runner = FixedRunner::new("{}");

    let ledger = VersionLedger::load(&path).unwrap();
    let derived =
        version::derive(VersionSource::Ledger, &ledger, &aws(), &runner, "staging", "worker").unwrap();

    assert_eq!(derived.version, 1);
    assert_eq!(derived.previous, None);
    assert!(!path.exists());
}

#[test]
fn registry_tags_ignore_non_numeric_entries() {
    let dir = tempdir().unwrap();
    let ledger = VersionLedger::load(&dir.path().join(".versions")).unwrap();
    let runner = FixedRunner::new(
        r#"{"imageIds":[{"imageTag":"3"},{"imageTag":"7"},{"imageTag":"latest"}]}"#,
    );

    let derived =
        version::derive(VersionSource::Registry, &ledger, &aws(), &runner, "staging", "api").unwrap();

    assert_eq!(derived.version, 8);
    assert_eq!(derived.source, VersionSource::Registry);
}

#[test]
fn auto_source_prefers_ledger_then_registry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".versions");
    fs::write(&path, "staging/api:4\n").unwrap();
    let ledger = VersionLedger::load(&path).unwrap();
    let runner = FixedRunner::new(r#"{"imageIds":[{"imageTag":"20"}]}"#);

    let known = version::derive(VersionSource::Auto, &ledger, &aws(), &runner, "staging", "api").unwrap();
    assert_eq!(known.version, 5);
    assert_eq!(known.source, VersionSource::Ledger);
    assert_eq!(*runner.calls.borrow(), 0);

    let unknown =
        version::derive(VersionSource::Auto, &ledger, &aws(), &runner, "staging", "worker").unwrap();
    assert_eq!(unknown.version, 21);
    assert_eq!(unknown.source, VersionSource::Registry);
    assert_eq!(*runner.calls.borrow(), 1);
}

#[test]
fn recording_many_keys_leaves_others_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".versions");
    let mut ledger = VersionLedger::load(&path).unwrap();

    for (env, image, v) in [
        ("staging", "api", 1),
        ("staging", "worker", 1),
        ("production", "api", 3),
        ("staging", "api", 2),
        ("production", "api", 4),
    ] {
        ledger.record(env, image, v).unwrap();
    }

    let reloaded = VersionLedger::load(&path).unwrap();
    assert_eq!(reloaded.line_count(), 3);
    assert_eq!(reloaded.get("staging", "api"), Some(2));
    assert_eq!(reloaded.get("staging", "worker"), Some(1));
    assert_eq!(reloaded.get("production", "api"), Some(4));
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "staging/api:2\nstaging/worker:1\nproduction/api:4\n"
    );
}
