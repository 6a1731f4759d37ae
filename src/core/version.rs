//! Next image version derivation.
//!
//! Versions are plain positive integers used directly as image tags.

use serde::{Deserialize, Serialize};

use crate::aws::AwsCli;
use crate::error::{Error, Result};
use crate::ledger::{ledger_key, VersionLedger};
use crate::process::ProcessRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    /// Last recorded version in the local ledger file.
    Ledger,
    /// Highest numeric tag in the remote registry.
    Registry,
    /// Ledger when it knows the image, registry otherwise.
    #[default]
    Auto,
}

impl VersionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionSource::Ledger => "ledger",
            VersionSource::Registry => "registry",
            VersionSource::Auto => "auto",
        }
    }
}

impl std::str::FromStr for VersionSource {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "ledger" => Ok(VersionSource::Ledger),
            "registry" => Ok(VersionSource::Registry),
            "auto" => Ok(VersionSource::Auto),
            other => Err(Error::validation_invalid_argument(
                "source",
                format!("Unknown version source '{}'", other),
                Some(other.to_string()),
                Some(vec!["ledger".into(), "registry".into(), "auto".into()]),
            )),
        }
    }
}

/// Numeric value of a registry tag; anything that is not an unsigned
/// integer counts as 0.
pub fn tag_number(tag: &str) -> u64 {
    tag.trim().parse().unwrap_or(0)
}

/// Ledger strategy: recorded version + 1, or 1 when the key is absent.
pub fn next_from_ledger(ledger: &VersionLedger, environment: &str, image: &str) -> u64 {
    ledger
        .get(environment, image)
        .map(|v| v.saturating_add(1))
        .unwrap_or(1)
}

/// Registry strategy: `max(numeric tags, 0) + 1`. No tags yields 1.
pub fn next_from_tags<S: AsRef<str>>(tags: &[S]) -> u64 {
    tags.iter()
        .map(|t| tag_number(t.as_ref()))
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedVersion {
    pub key: String,
    pub version: u64,
    pub source: VersionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<u64>,
}

impl DerivedVersion {
    pub fn tag(&self) -> String {
        self.version.to_string()
    }
}

/// Derive the next version for `{environment}/{image}`.
///
/// `Auto` resolves to `Ledger` when the ledger already holds the key and to
/// `Registry` otherwise. The returned source is the one actually used.
pub fn derive(
    source: VersionSource,
    ledger: &VersionLedger,
    aws: &AwsCli,
    runner: &dyn ProcessRunner,
    environment: &str,
    image: &str,
) -> Result<DerivedVersion> {
    let key = ledger_key(environment, image);

    let resolved = match source {
        VersionSource::Auto if ledger.get(environment, image).is_some() => VersionSource::Ledger,
        VersionSource::Auto => VersionSource::Registry,
        explicit => explicit,
    };

    match resolved {
        VersionSource::Registry => {
            let tags = aws.list_image_tags(runner, &key)?;
            let version = next_from_tags(&tags);
            Ok(DerivedVersion {
                key,
                version,
                source: VersionSource::Registry,
                previous: (version > 1).then_some(version - 1),
            })
        }
        _ => Ok(DerivedVersion {
            version: next_from_ledger(ledger, environment, image),
            previous: ledger.get(environment, image),
            key,
            source: VersionSource::Ledger,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn ledger_hit_increments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".versions");
        fs::write(&path, "staging/api:4\n").unwrap();
        let ledger = VersionLedger::load(&path).unwrap();

        assert_eq!(next_from_ledger(&ledger, "staging", "api"), 5);
    }

    #[test]
    fn ledger_miss_starts_at_one() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".versions");
        fs::write(&path, "staging/api:4\n").unwrap();
        let ledger = VersionLedger::load(&path).unwrap();

        assert_eq!(next_from_ledger(&ledger, "staging", "worker"), 1);
        assert_eq!(next_from_ledger(&ledger, "production", "api"), 1);
    }

    #[test]
    fn tags_take_max_numeric_plus_one() {
        assert_eq!(next_from_tags(&["3", "7", "latest"]), 8);
        assert_eq!(next_from_tags(&["10", "9", "2"]), 11);
    }

    #[test]
    fn non_numeric_tags_count_as_zero() {
        assert_eq!(next_from_tags(&["latest", "v2", "-1", "1.5"]), 1);
    }

    #[test]
    fn empty_tag_list_starts_at_one() {
        let tags: Vec<String> = Vec::new();
        assert_eq!(next_from_tags(&tags), 1);
    }

    #[test]
    fn tag_number_trims_whitespace() {
        assert_eq!(tag_number(" 12 "), 12);
        assert_eq!(tag_number(""), 0);
    }

    #[test]
    fn source_parses_known_names() {
        assert_eq!("ledger".parse::<VersionSource>().unwrap(), VersionSource::Ledger);
        assert_eq!("registry".parse::<VersionSource>().unwrap(), VersionSource::Registry);
        assert!("git".parse::<VersionSource>().is_err());
    }
}
