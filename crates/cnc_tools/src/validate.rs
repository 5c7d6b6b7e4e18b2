//! Data validation utilities.
//!
//! Every `.ron` file under a directory must parse as either a
//! [`Scenario`] or a [`Rules`] table and pass that type's consistency
//! checks.

use std::fs;
use std::path::{Path, PathBuf};

use cnc_core::config::Rules;
use cnc_core::scenario::Scenario;

use crate::error::{Result, ToolError};

/// What a data file turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// A scenario.
    Scenario,
    /// A rules table.
    Rules,
    /// Neither parsed.
    Unknown,
}

/// Validation outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// File checked.
    pub path: PathBuf,
    /// What it parsed as.
    pub kind: DataKind,
    /// Problems found; empty when the file is valid.
    pub problems: Vec<String>,
}

/// Check one RON document.
#[must_use]
pub fn validate_ron(path: &Path, text: &str) -> FileReport {
    let (kind, problems) = match Scenario::from_ron_str(text) {
        Ok(scenario) => (DataKind::Scenario, scenario.validate()),
        Err(scenario_err) => match Rules::from_ron_str(text) {
            Ok(rules) => (DataKind::Rules, rules.validate()),
            Err(rules_err) => (
                DataKind::Unknown,
                vec![
                    format!("not a scenario: {scenario_err}"),
                    format!("not a rules table: {rules_err}"),
                ],
            ),
        },
    };
    FileReport {
        path: path.to_path_buf(),
        kind,
        problems,
    }
}

/// Check every `.ron` file under `path`, recursively, in name order.
///
/// # Errors
///
/// Returns an IO error if the directory cannot be read.
pub fn scan_data_directory(path: &Path) -> Result<Vec<FileReport>> {
    let mut reports = Vec::new();
    let mut entries: Vec<PathBuf> = fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            reports.extend(scan_data_directory(&entry)?);
        } else if entry.extension().is_some_and(|ext| ext == "ron") {
            let text = fs::read_to_string(&entry)?;
            let report = validate_ron(&entry, &text);
            for problem in &report.problems {
                tracing::warn!(file = %entry.display(), "{problem}");
            }
            tracing::debug!(file = %entry.display(), kind = ?report.kind, "Checked");
            reports.push(report);
        }
    }
    Ok(reports)
}

/// Validate all RON data files in a directory.
///
/// # Errors
///
/// Returns [`ToolError::Invalid`] if any data file fails validation, or
/// an IO error if the directory cannot be read.
pub fn validate_data_directory(path: &Path) -> Result<usize> {
    let reports = scan_data_directory(path)?;
    let count: usize = reports.iter().map(|r| r.problems.len()).sum();
    if count > 0 {
        return Err(ToolError::Invalid { count });
    }
    Ok(reports.len())
}
