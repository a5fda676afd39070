//! Suite report
//!
//! Written as `report.json` in the artifacts directory after every suite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stepwise_core::fail_open::fail_open_with_retries;
use stepwise_core::{Result, ScenarioOutcome};
use tracing::info;
use uuid::Uuid;

pub const REPORT_FILE: &str = "report.json";

/// A scenario that ended without an outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbortedScenario {
    pub name: String,
    pub reason: String,
}

/// Everything one suite run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<ScenarioOutcome>,
    pub aborted: Vec<AbortedScenario>,
    /// Scenarios not run because a smoke scenario failed
    pub skipped: Vec<String>,
}

impl SuiteReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
            aborted: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// True when every scenario ran and passed
    pub fn passed(&self) -> bool {
        self.aborted.is_empty()
            && self.skipped.is_empty()
            && self.outcomes.iter().all(|o| o.overall_passed)
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.overall_passed).count()
    }

    /// One line per scenario, for the console
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .outcomes
            .iter()
            .map(|o| {
                format!(
                    "{} {} ({}/{} steps, {:.0}%, {})",
                    if o.overall_passed { "PASS" } else { "FAIL" },
                    o.name,
                    o.succeeded_steps(),
                    o.steps.len(),
                    o.success_ratio * 100.0,
                    o.final_url
                )
            })
            .collect();
        lines.extend(
            self.aborted
                .iter()
                .map(|a| format!("ABORT {} ({})", a.name, a.reason)),
        );
        lines.extend(self.skipped.iter().map(|name| format!("SKIP {}", name)));
        lines
    }

    /// Serialize to `<dir>/report.json`
    pub async fn write(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(REPORT_FILE);
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }

    /// Like [`SuiteReport::write`] but retried and never failing the run
    pub async fn persist(&self, dir: &Path) -> Option<PathBuf> {
        let path = fail_open_with_retries("write report", || self.write(dir), 3).await?;
        info!("Report written to {}", path.display());
        Some(path)
    }
}

impl Default for SuiteReport {
    fn default() -> Self {
        Self::new()
    }
}
