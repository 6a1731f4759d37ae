//! Scripted process runner for exercising pipelines without subprocesses.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::error::Result;
use crate::process::{check_buffered, check_streamed, CommandSpec, ProcessResult, ProcessRunner};

#[derive(Default)]
pub struct ScriptedRunner {
    replies: RefCell<VecDeque<ProcessResult>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply with the given stdout.
    pub fn stdout(self, stdout: &str) -> Self {
        self.reply(ProcessResult {
            stdout: stdout.to_string(),
            exit_code: Some(0),
            ..Default::default()
        })
    }

    /// Queue a reply exiting with `code` and the given stderr.
    pub fn fail(self, code: i32, stderr: &str) -> Self {
        self.reply(ProcessResult {
            stderr: stderr.to_string(),
            exit_code: Some(code),
            ..Default::default()
        })
    }

    pub fn reply(self, result: ProcessResult) -> Self {
        self.replies.borrow_mut().push_back(result);
        self
    }

    /// Display strings of every command run so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn next(&self, spec: &CommandSpec) -> ProcessResult {
        self.calls.borrow_mut().push(spec.display());
        self.replies.borrow_mut().pop_front().unwrap_or(ProcessResult {
            exit_code: Some(0),
            ..Default::default()
        })
    }
}

impl ProcessRunner for ScriptedRunner {
    fn buffered(&self, spec: &CommandSpec) -> Result<ProcessResult> {
        let reply = self.next(spec);
        check_buffered(spec, reply)
    }

    fn streamed(&self, spec: &CommandSpec) -> Result<ProcessResult> {
        let reply = self.next(spec);
        check_streamed(spec, reply)
    }
}
