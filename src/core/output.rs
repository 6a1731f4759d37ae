//! Result shapes for commands that process many items one after another
//! (parameter keys, for instance) and keep going past individual failures.

use serde::Serialize;

use crate::error::Error;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult<T: Serialize> {
    pub action: String,
    pub results: Vec<ItemOutcome<T>>,
    pub summary: BulkSummary,
}

impl<T: Serialize> BulkResult<T> {
    pub fn new(action: impl Into<String>, results: Vec<ItemOutcome<T>>) -> Self {
        let failed = results.iter().filter(|r| r.error.is_some()).count();
        let summary = BulkSummary {
            total: results.len(),
            succeeded: results.len() - failed,
            failed,
        };

        Self {
            action: action.into(),
            results,
            summary,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome<T: Serialize> {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(flatten)]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl<T: Serialize> ItemOutcome<T> {
    pub fn ok(id: impl Into<String>, result: T) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
            error_code: None,
        }
    }

    pub fn failed(id: impl Into<String>, err: &Error) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(err.message.clone()),
            error_code: Some(err.code.as_str().to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Written {
        bytes: usize,
    }

    #[test]
    fn summary_counts_failures() {
        let err = Error::internal_unexpected("boom");
        let result = BulkResult::new(
            "get",
            vec![
                ItemOutcome::ok("A", Written { bytes: 3 }),
                ItemOutcome::failed("B", &err),
                ItemOutcome::ok("C", Written { bytes: 1 }),
            ],
        );

        assert_eq!(result.summary.total, 3);
        assert_eq!(result.summary.succeeded, 2);
        assert_eq!(result.summary.failed, 1);
        assert!(result.has_failures());
    }

    #[test]
    fn outcome_flattens_result() {
        let json = serde_json::to_value(ItemOutcome::ok("A", Written { bytes: 3 })).unwrap();
        assert_eq!(json["id"], "A");
        assert_eq!(json["bytes"], 3);
        assert!(json.get("error").is_none());
    }
}
