//! Strictly sequential step driver.
//!
//! Steps are declared in order and included or excluded before the run
//! starts. Each step gets `&mut` access to the shared context and returns a
//! `Result`; the first error stops the run and every later step is reported
//! as skipped without being invoked.

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Hint, Result};

type StepFn<'a, C> = Box<dyn FnMut(&mut C) -> Result<StepOutput> + 'a>;

struct PipelineStep<'a, C> {
    id: String,
    label: String,
    included: bool,
    run: StepFn<'a, C>,
}

/// What a successful step hands back to the driver for reporting.
#[derive(Debug, Default)]
pub struct StepOutput {
    pub data: Option<Value>,
    pub warnings: Vec<String>,
}

impl StepOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_data<T: Serialize>(data: T) -> Self {
        Self {
            data: serde_json::to_value(data).ok(),
            warnings: Vec::new(),
        }
    }

    pub fn warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub id: String,
    pub label: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl StepResult {
    fn skipped(id: String, label: String, reason: String) -> Self {
        Self {
            id,
            label,
            status: StepStatus::Skipped,
            started_at: None,
            duration_ms: None,
            warnings: vec![reason],
            hints: Vec::new(),
            data: None,
            error: None,
            error_code: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineRunStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSummary {
    pub total_steps: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunResult {
    pub pipeline: String,
    pub status: PipelineRunStatus,
    pub steps: Vec<StepResult>,
    pub summary: PipelineRunSummary,
    /// The error that halted the run, kept for exit code mapping.
    #[serde(skip)]
    pub failure: Option<Error>,
}

impl PipelineRunResult {
    pub fn is_success(&self) -> bool {
        self.status == PipelineRunStatus::Success
    }

    pub fn step(&self, id: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.id == id)
    }
}

pub struct Pipeline<'a, C> {
    name: String,
    steps: Vec<PipelineStep<'a, C>>,
}

impl<'a, C> Pipeline<'a, C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step<F>(self, id: &str, label: &str, run: F) -> Self
    where
        F: FnMut(&mut C) -> Result<StepOutput> + 'a,
    {
        self.step_if(true, id, label, run)
    }

    /// Declare a step that only runs when `included` is true.
    pub fn step_if<F>(mut self, included: bool, id: &str, label: &str, run: F) -> Self
    where
        F: FnMut(&mut C) -> Result<StepOutput> + 'a,
    {
        self.steps.push(PipelineStep {
            id: id.to_string(),
            label: label.to_string(),
            included,
            run: Box::new(run),
        });
        self
    }

    /// Ids of the steps that will execute, in order.
    pub fn planned_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.included)
            .map(|s| s.id.as_str())
            .collect()
    }

    pub fn run(self, ctx: &mut C) -> PipelineRunResult {
        let mut results = Vec::with_capacity(self.steps.len());
        let mut failure: Option<(String, Error)> = None;

        for mut step in self.steps {
            if !step.included {
                results.push(StepResult::skipped(
                    step.id,
                    step.label,
                    "Condition not met".to_string(),
                ));
                continue;
            }

            if let Some((failed_id, _)) = &failure {
                results.push(StepResult::skipped(
                    step.id,
                    step.label,
                    format!("Skipped because '{}' did not succeed", failed_id),
                ));
                continue;
            }

            crate::log_status!("pipeline", "{}", step.label);

            let started_at = chrono::Local::now().to_rfc3339();
            let clock = Instant::now();
            let outcome = (step.run)(ctx);
            let duration_ms = clock.elapsed().as_millis() as u64;

            match outcome {
                Ok(output) => results.push(StepResult {
                    id: step.id,
                    label: step.label,
                    status: StepStatus::Success,
                    started_at: Some(started_at),
                    duration_ms: Some(duration_ms),
                    warnings: output.warnings,
                    hints: Vec::new(),
                    data: output.data,
                    error: None,
                    error_code: None,
                }),
                Err(err) => {
                    crate::log_status!("pipeline", "{} failed: {}", step.id, err.message);
                    results.push(StepResult {
                        id: step.id.clone(),
                        label: step.label,
                        status: StepStatus::Failed,
                        started_at: Some(started_at),
                        duration_ms: Some(duration_ms),
                        warnings: Vec::new(),
                        hints: err.hints.clone(),
                        data: Some(err.details.clone()),
                        error: Some(err.message.clone()),
                        error_code: Some(err.code.as_str().to_string()),
                    });
                    failure = Some((step.id, err));
                }
            }
        }

        let status = if failure.is_some() {
            PipelineRunStatus::Failed
        } else {
            PipelineRunStatus::Success
        };
        let summary = build_summary(&results, status);

        PipelineRunResult {
            pipeline: self.name,
            status,
            steps: results,
            summary,
            failure: failure.map(|(_, err)| err),
        }
    }
}

fn build_summary(results: &[StepResult], status: PipelineRunStatus) -> PipelineRunSummary {
    let count = |wanted: StepStatus| results.iter().filter(|r| r.status == wanted).count();

    let next_actions = match status {
        PipelineRunStatus::Failed => vec![
            "Fix the failing step and re-run; completed steps are safe to repeat".to_string(),
        ],
        PipelineRunStatus::Success => Vec::new(),
    };

    PipelineRunSummary {
        total_steps: results.len(),
        succeeded: count(StepStatus::Success),
        failed: count(StepStatus::Failed),
        skipped: count(StepStatus::Skipped),
        next_actions,
    }
}
