//! Screenshot storage for scenario runs
//!
//! Every scenario gets its own directory under the artifacts root:
//!
//! ```text
//! <artifacts>/<scenario-slug>/
//!   before.png
//!   step_01.png
//!   step_02.png
//!   final.png
//! ```
//!
//! Capturing is fail-open: a screenshot that cannot be taken is logged and
//! never fails the step it belongs to.

use crate::page::Page;
use std::path::{Path, PathBuf};
use stepwise_core::fail_open::fail_open;
use stepwise_core::Result;
use tracing::info;

/// Screenshot paths for one scenario
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    /// Create (if needed) the directory for `scenario_slug`
    pub fn create(artifacts_dir: &Path, scenario_slug: &str) -> Result<Self> {
        let dir = artifacts_dir.join(scenario_slug);
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Page state before the first step
    pub fn before(&self) -> PathBuf {
        self.dir.join("before.png")
    }

    /// After step `index` (zero-based)
    pub fn step(&self, index: usize) -> PathBuf {
        self.dir.join(format!("step_{:02}.png", index + 1))
    }

    /// Page state after the last step
    pub fn final_state(&self) -> PathBuf {
        self.dir.join("final.png")
    }

    /// Capture into `path`, returning it on success
    pub async fn capture(&self, page: &dyn Page, path: PathBuf) -> Option<PathBuf> {
        let saved = fail_open("screenshot", || page.screenshot(&path)).await;
        saved.map(|_| {
            info!("Screenshot stored: {}", path.display());
            path
        })
    }
}
