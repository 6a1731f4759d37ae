//! Input validation primitives.
//!
//! These replace verbose ok_or_else + Error chains in the command layer.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Require a string option to be present and non-blank.
pub fn require_non_empty(opt: Option<String>, flag: &str) -> Result<String> {
    match opt {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(Error::validation_missing_argument(vec![flag.to_string()])),
    }
}

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap());

/// Validate an environment, image or prefix name.
///
/// Names end up in ledger keys (`env/image:n`) and registry paths, so `/`,
/// `:` and whitespace are rejected.
pub fn require_name<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    if NAME_PATTERN.is_match(value) {
        Ok(value)
    } else {
        Err(Error::validation_invalid_argument(
            field,
            format!(
                "'{}' is not a valid {} (letters, digits, '.', '_' and '-' only)",
                value, field
            ),
            Some(value.to_string()),
            None,
        ))
    }
}

static ENV_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Validate an environment variable name before it is written to a
/// sourced shell script.
pub fn require_env_key(key: &str) -> Result<&str> {
    if ENV_KEY_PATTERN.is_match(key) {
        Ok(key)
    } else {
        Err(Error::validation_invalid_argument(
            "key",
            format!("'{}' is not a valid environment variable name", key),
            Some(key.to_string()),
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_non_empty_names_the_missing_flag() {
        let err = require_non_empty(None, "--account-id").unwrap_err();
        assert_eq!(err.code.as_str(), "validation.missing_argument");
        assert_eq!(err.details["args"][0], "--account-id");
    }

    #[test]
    fn require_non_empty_trims() {
        let value = require_non_empty(Some("  my-bucket ".to_string()), "--bucket").unwrap();
        assert_eq!(value, "my-bucket");
    }

    #[test]
    fn require_non_empty_rejects_blank() {
        assert!(require_non_empty(Some("   ".to_string()), "--bucket").is_err());
        assert!(require_non_empty(None, "--bucket").is_err());
    }

    #[test]
    fn require_name_accepts_typical_names() {
        for name in ["staging", "api", "web-worker", "v2.api", "my_app"] {
            assert!(require_name(name, "image").is_ok(), "{}", name);
        }
    }

    #[test]
    fn require_name_rejects_separators() {
        for name in ["staging/api", "api:3", "has space", "", "-lead"] {
            assert!(require_name(name, "image").is_err(), "{}", name);
        }
    }

    #[test]
    fn require_env_key_rejects_shell_syntax() {
        assert!(require_env_key("DATABASE_URL").is_ok());
        assert!(require_env_key("_PRIVATE").is_ok());
        for key in ["1ST", "FOO BAR", "A;rm", "", "X-Y"] {
            assert!(require_env_key(key).is_err(), "{}", key);
        }
    }
}
