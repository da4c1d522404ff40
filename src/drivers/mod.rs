//! Batch drivers
//!
//! Each driver iterates named-field records (one per input row) and calls
//! the engine per row. Row-level failures are logged and counted, never
//! fatal; only connection, authentication, or file IO failures abort a run.

pub mod permission_loader;
pub mod permission_syncer;
pub mod project_access;
pub mod user_status;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::utils::error::{Result, SyncError};

/// One input row as named, trimmed fields
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: HashMap<String, String>,
}

impl Record {
    pub fn from_row(header: &[String], values: &[&str]) -> Self {
        let fields = header
            .iter()
            .zip(values.iter())
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();
        Self { fields }
    }

    /// A field's value; `None` when absent or blank.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// A required field's value.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| SyncError::missing_field(name.to_string()))
    }

    /// Names from `names` that are absent or blank on this record.
    pub fn missing<'a>(&self, names: &[&'a str]) -> Vec<&'a str> {
        names
            .iter()
            .copied()
            .filter(|name| self.get(name).is_none())
            .collect()
    }
}

/// Read a delimited input file into records. The first row is the header and
/// is always skipped as data.
pub fn read_records<P: AsRef<Path>>(path: P, delimiter: char) -> Result<Vec<Record>> {
    let content = fs::read_to_string(path)?;
    let mut lines = content.lines();

    let header: Vec<String> = match lines.next() {
        Some(line) => line.split(delimiter).map(|f| f.trim().to_string()).collect(),
        None => return Ok(vec![]),
    };

    Ok(lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let values: Vec<&str> = line.split(delimiter).collect();
            Record::from_row(&header, &values)
        })
        .collect())
}

/// How a container identifier from input should be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    /// All digits: an object identifier
    ObjectId,
    /// Anything else: a container name
    Name,
}

pub fn identifier_kind(value: &str) -> IdentifierKind {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        IdentifierKind::ObjectId
    } else {
        IdentifierKind::Name
    }
}
