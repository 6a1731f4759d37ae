//! Flat-file record of the last version built per environment/image.
//!
//! One `{environment}/{image}:{version}` record per line. The file is always
//! read and rewritten whole; there is no locking, so two concurrent writers
//! race and the last one wins.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::utils::io;

pub fn ledger_key(environment: &str, image: &str) -> String {
    format!("{}/{}", environment, image)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub key: String,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum RecordOutcome {
    Replaced { previous: u64 },
    Appended,
}

/// Split a `name:version` line. Non-numeric versions read as 0.
fn parse_line(line: &str) -> Option<(&str, u64)> {
    let (name, version) = line.rsplit_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, version.trim().parse().unwrap_or(0)))
}

#[derive(Debug, Clone)]
pub struct VersionLedger {
    path: PathBuf,
    lines: Vec<String>,
}

impl VersionLedger {
    /// Load the ledger; a missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        let content = io::read_file_optional(path, "read version ledger")?.unwrap_or_default();
        let lines = content.lines().map(str::to_string).collect();

        Ok(Self {
            path: path.to_path_buf(),
            lines,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, environment: &str, image: &str) -> Option<u64> {
        let key = ledger_key(environment, image);
        self.lines
            .iter()
            .filter_map(|line| parse_line(line))
            .find(|(name, _)| *name == key)
            .map(|(_, version)| version)
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.lines
            .iter()
            .filter_map(|line| parse_line(line))
            .map(|(key, version)| LedgerEntry {
                key: key.to_string(),
                version,
            })
            .collect()
    }

    /// Set the version for `{environment}/{image}` and persist the file.
    ///
    /// An existing line is replaced in place; otherwise one line is appended.
    /// All other lines keep their content and order.
    pub fn record(&mut self, environment: &str, image: &str, version: u64) -> Result<RecordOutcome> {
        let outcome = self.apply(environment, image, version);
        self.save()?;
        Ok(outcome)
    }

    fn apply(&mut self, environment: &str, image: &str, version: u64) -> RecordOutcome {
        let key = ledger_key(environment, image);
        let line = format!("{}:{}", key, version);

        let existing = self.lines.iter().position(|candidate| {
            parse_line(candidate).is_some_and(|(name, _)| name == key)
        });

        match existing {
            Some(idx) => {
                let previous = parse_line(&self.lines[idx]).map(|(_, v)| v).unwrap_or(0);
                self.lines[idx] = line;
                RecordOutcome::Replaced { previous }
            }
            None => {
                self.lines.push(line);
                RecordOutcome::Appended
            }
        }
    }

    fn save(&self) -> Result<()> {
        let mut content = self.lines.join("\n");
        content.push('\n');
        io::write_file_atomic(&self.path, &content, "write version ledger")
    }
}
