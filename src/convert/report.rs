use serde::Serialize;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Counters for one conversion run.
///
/// Skipped files count as successful, so `successful + failed == total_files`
/// once a run has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl fmt::Display for ConversionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} successful, {} failed, {} skipped",
            self.total_files, self.successful, self.failed, self.skipped
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Converted { output: PathBuf, chars: usize },
    Skipped { output: PathBuf },
    Failed { reason: String },
}

/// What happened to one input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    /// Input path, relative to the input root for directory runs
    pub input: PathBuf,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }
}

/// Render the plain-text summary written after a directory run
pub fn render_report(stats: &ConversionStats, outcomes: &[FileOutcome]) -> String {
    let mut report = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(report, "Conversion Report");
    let _ = writeln!(report, "=================");
    let _ = writeln!(report);
    let _ = writeln!(report, "Total files: {}", stats.total_files);
    let _ = writeln!(report, "Successful:  {}", stats.successful);
    let _ = writeln!(report, "Failed:      {}", stats.failed);
    let _ = writeln!(report, "Skipped:     {}", stats.skipped);

    let failures: Vec<&FileOutcome> = outcomes.iter().filter(|o| o.is_failure()).collect();
    if !failures.is_empty() {
        let _ = writeln!(report);
        let _ = writeln!(report, "Failed files:");
        for outcome in failures {
            if let OutcomeStatus::Failed { reason } = &outcome.status {
                let _ = writeln!(report, "  - {}: {}", outcome.input.display(), reason);
            }
        }
    }

    if !outcomes.is_empty() {
        let _ = writeln!(report);
        let _ = writeln!(report, "Files:");
        for outcome in outcomes {
            let line = match &outcome.status {
                OutcomeStatus::Converted { output, chars } => format!(
                    "  [OK]      {} -> {} ({} characters)",
                    outcome.input.display(),
                    output.display(),
                    chars
                ),
                OutcomeStatus::Skipped { output } => format!(
                    "  [SKIPPED] {} -> {} (already exists)",
                    outcome.input.display(),
                    output.display()
                ),
                OutcomeStatus::Failed { .. } => format!("  [FAILED]  {}", outcome.input.display()),
            };
            let _ = writeln!(report, "{}", line);
        }
    }

    report
}

pub fn write_report(path: &Path, stats: &ConversionStats, outcomes: &[FileOutcome]) -> Result<()> {
    fs::write(path, render_report(stats, outcomes))?;
    Ok(())
}
