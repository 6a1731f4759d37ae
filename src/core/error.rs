use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,

    ProcessSpawnFailed,
    ProcessCommandFailed,
    ProcessInvalidOutput,

    AwsAccountMismatch,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::ProcessSpawnFailed => "process.spawn_failed",
            ErrorCode::ProcessCommandFailed => "process.command_failed",
            ErrorCode::ProcessInvalidOutput => "process.invalid_output",

            ErrorCode::AwsAccountMismatch => "aws.account_mismatch",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Captured outcome of an external command that did not succeed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnFailedDetails {
    pub command: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidOutputDetails {
    pub command: String,
    pub error: String,
    pub output: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMismatchDetails {
    pub expected: String,
    pub actual: String,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        let message = format!("Missing required argument: {}", args.join(", "));
        Self::new(
            ErrorCode::ValidationMissingArgument,
            message,
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.clone(),
            id,
            tried,
        });

        Self::new(ErrorCode::ValidationInvalidArgument, problem, details)
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let details = to_details(ConfigInvalidJsonDetails {
            path: path.into(),
            error: err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn process_spawn_failed(command: impl Into<String>, error: impl Into<String>) -> Self {
        let command = command.into();
        let details = to_details(SpawnFailedDetails {
            command: command.clone(),
            error: error.into(),
        });

        Self::new(
            ErrorCode::ProcessSpawnFailed,
            format!("Failed to start '{}'", command),
            details,
        )
    }

    pub fn process_command_failed(details: CommandFailedDetails) -> Self {
        let message = match (details.exit_code, details.signal) {
            (Some(code), _) => format!("Command failed with exit code {}: {}", code, details.command),
            (None, Some(signal)) => {
                format!("Command terminated by signal {}: {}", signal, details.command)
            }
            (None, None) => format!("Command failed: {}", details.command),
        };

        Self::new(ErrorCode::ProcessCommandFailed, message, to_details(details))
    }

    pub fn process_invalid_output(
        command: impl Into<String>,
        error: impl Into<String>,
        output: &str,
    ) -> Self {
        let command = command.into();
        let details = to_details(InvalidOutputDetails {
            command: command.clone(),
            error: error.into(),
            output: output.chars().take(500).collect(),
        });

        Self::new(
            ErrorCode::ProcessInvalidOutput,
            format!("Unexpected output from '{}'", command),
            details,
        )
    }

    pub fn aws_account_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        let expected = expected.into();
        let actual = actual.into();
        let message = format!(
            "Active AWS credentials belong to account {}, expected {}",
            actual, expected
        );

        Self::new(
            ErrorCode::AwsAccountMismatch,
            message,
            to_details(AccountMismatchDetails { expected, actual }),
        )
        .with_hint("Switch AWS credentials (AWS_PROFILE or --profile) and run again")
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::InternalUnexpected,
            error.clone(),
            serde_json::json!({ "error": error }),
        )
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::internal_unexpected(message)
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_carries_field_and_problem() {
        let err = Error::validation_invalid_argument("image", "must not be empty", None, None);
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
        assert_eq!(err.details["field"], "image");
        assert_eq!(err.details["problem"], "must not be empty");
        assert!(err.details.get("id").is_none());
    }

    #[test]
    fn command_failed_message_prefers_exit_code() {
        let err = Error::process_command_failed(CommandFailedDetails {
            command: "docker push repo:3".to_string(),
            exit_code: Some(1),
            signal: None,
            stdout: String::new(),
            stderr: "denied".to_string(),
        });
        assert_eq!(err.code, ErrorCode::ProcessCommandFailed);
        assert!(err.message.contains("exit code 1"));
        assert_eq!(err.details["stderr"], "denied");
        assert_eq!(err.details["exitCode"], 1);
    }

    #[test]
    fn command_failed_message_reports_signal() {
        let err = Error::process_command_failed(CommandFailedDetails {
            command: "docker build .".to_string(),
            exit_code: None,
            signal: Some(9),
            stdout: String::new(),
            stderr: String::new(),
        });
        assert!(err.message.contains("signal 9"));
        assert!(err.details.get("exitCode").is_none());
    }

    #[test]
    fn account_mismatch_has_hint() {
        let err = Error::aws_account_mismatch("111", "222");
        assert_eq!(err.code.as_str(), "aws.account_mismatch");
        assert_eq!(err.hints.len(), 1);
        assert!(err.message.contains("222"));
    }

    #[test]
    fn invalid_output_truncates_captured_text() {
        let long = "x".repeat(2000);
        let err = Error::process_invalid_output("aws sts get-caller-identity", "eof", &long);
        assert_eq!(err.details["output"].as_str().map(str::len), Some(500));
    }
}
