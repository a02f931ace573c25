//! The report a validation run produces

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::check::{Check, CheckStatus};
use crate::copc::CopcInfo;
use crate::las::{Header, Vlr};
use crate::scanner::ScanMode;

/// Which stage of the cascade produced the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "COPC")]
    Copc,
    #[serde(rename = "LAS")]
    Las,
    Unknown,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Copc => f.write_str("COPC"),
            Classification::Las => f.write_str("LAS"),
            Classification::Unknown => f.write_str("Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanInfo {
    pub classification: Classification,
    pub mode: ScanMode,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Decoded file metadata, omitted from mini reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParsedMetadata {
    Copc {
        header: Header,
        vlrs: Vec<Vlr>,
        info: CopcInfo,
    },
    Las {
        header: Header,
        vlrs: Vec<Vlr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub name: String,
    pub scan: ScanInfo,
    pub checks: Vec<Check>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copc_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_metadata: Option<ParsedMetadata>,
}

/// Number of checks per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckCounts {
    pub pass: usize,
    pub warn: usize,
    pub fail: usize,
}

impl Report {
    pub fn counts(&self) -> CheckCounts {
        let mut counts = CheckCounts::default();
        for check in &self.checks {
            match check.status {
                CheckStatus::Pass => counts.pass += 1,
                CheckStatus::Warn => counts.warn += 1,
                CheckStatus::Fail => counts.fail += 1,
            }
        }
        counts
    }

    pub fn has_failures(&self) -> bool {
        self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    pub fn check(&self, id: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.id == id)
    }

    /// Drop the decoded metadata
    pub fn into_mini(mut self) -> Self {
        self.parsed_metadata = None;
        self
    }
}
