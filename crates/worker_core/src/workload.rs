//! Typed workload schema.
//!
//! The coordinator answers a workload request with a JSON document. It is
//! decoded into these structs and then validated, so that everything the
//! pipeline later turns into file names or command lines is known to be
//! well-formed before any work starts.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ProtocolParseError;
use crate::time_control::TimeControl;

/// One coordinator-issued unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub machine: Assignment,
    pub result: Assignment,
    pub test: TestSpec,
}

/// A coordinator-side record the worker refers back to by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
}

/// The test being run: which engines, which book, which time control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    /// Engine family, e.g. `Ethereal`. Selects build flags and names players.
    pub engine: String,
    /// Baseline speed the time control was calibrated for, in nodes/sec
    #[serde(rename = "nps", deserialize_with = "u64_from_any")]
    pub baseline_nps: u64,
    #[serde(rename = "timecontrol")]
    pub time_control: String,
    pub book: OpeningBook,
    pub dev: EngineDescriptor,
    pub base: EngineDescriptor,
}

/// One side of the match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineDescriptor {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub name: String,
    /// Cache key and on-disk name of the built binary
    #[serde(rename = "sha")]
    pub commit: String,
    pub source: String,
    #[serde(rename = "bench", deserialize_with = "u64_from_any")]
    pub expected_bench: u64,
    pub protocol: String,
    /// Space separated `Key=Value` list; the first entry is always `Threads`
    pub options: String,
}

/// Opening book reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningBook {
    pub name: String,
    #[serde(rename = "sha")]
    pub sha256: String,
    pub source: String,
}

impl Workload {
    /// Decode and validate a workload document.
    pub fn decode(text: &str) -> Result<Self, ProtocolParseError> {
        let workload: Workload = serde_json::from_str(text)?;
        workload.validate()?;
        Ok(workload)
    }

    pub fn validate(&self) -> Result<(), ProtocolParseError> {
        let test = &self.test;
        require_plain("test.engine", &test.engine)?;
        require_plain("test.book.name", &test.book.name)?;
        if test.baseline_nps == 0 {
            return Err(field_error("test.nps", "must be positive"));
        }
        test.time_control
            .parse::<TimeControl>()
            .map_err(|e| field_error("test.timecontrol", e.to_string()))?;
        test.dev.validate("test.dev")?;
        test.base.validate("test.base")?;
        Ok(())
    }
}

impl EngineDescriptor {
    fn validate(&self, side: &'static str) -> Result<(), ProtocolParseError> {
        require_plain(side, &self.name)?;
        if self.commit.is_empty() || !self.commit.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(field_error(side, format!("bad commit {:?}", self.commit)));
        }
        if self.threads().is_none() {
            return Err(field_error(
                side,
                format!("options {:?} must start with Threads=<n>", self.options),
            ));
        }
        Ok(())
    }

    /// `Key=Value` pairs from the option string, in order.
    pub fn options(&self) -> impl Iterator<Item = &str> {
        self.options.split_whitespace()
    }

    /// Threads used by one instance, taken from the leading `Threads=<n>`.
    pub fn threads(&self) -> Option<u32> {
        let first = self.options().next()?;
        let (key, value) = first.split_once('=')?;
        if !key.eq_ignore_ascii_case("threads") {
            return None;
        }
        value.parse().ok().filter(|&n| n > 0)
    }

    /// First eight characters of the commit, used in player names.
    pub fn short_commit(&self) -> &str {
        let end = self.commit.len().min(8);
        &self.commit[..end]
    }
}

impl OpeningBook {
    /// Book format as understood by the match runner (the file extension).
    pub fn format(&self) -> &str {
        self.name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
    }

    /// FRC / Chess960 books are detected by name.
    pub fn is_fischer_random(&self) -> bool {
        let upper = self.name.to_uppercase();
        upper.contains("FRC") || upper.contains("960")
    }
}

fn field_error(field: &'static str, reason: impl Into<String>) -> ProtocolParseError {
    ProtocolParseError::Field {
        field,
        reason: reason.into(),
    }
}

/// Names end up in file paths; keep them to a single path component.
fn require_plain(field: &'static str, value: &str) -> Result<(), ProtocolParseError> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.chars().any(char::is_whitespace)
    {
        return Err(field_error(field, format!("bad name {:?}", value)));
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => n.to_string(),
        NumberOrText::Text(s) => s,
    })
}

fn u64_from_any<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod workload_tests;
