//! Scenario files and the built-in demo suite
//!
//! A scenario file is TOML with one `[[scenario]]` table per test case:
//!
//! ```toml
//! [[scenario]]
//! name = "Example smoke"
//! url = "https://example.com"
//! steps = ["View the page content"]
//! expected_output = "Example Domain"
//! smoke = true
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stepwise_core::TestCase;

/// Default scenario file under a project root
pub const SCENARIO_FILE: &str = ".stepwise/scenarios.toml";

#[derive(Debug, Serialize, Deserialize)]
struct ScenarioFile {
    #[serde(rename = "scenario", default)]
    scenarios: Vec<TestCase>,
}

/// Load test cases from a scenario file
pub fn load_scenarios(path: &Path) -> Result<Vec<TestCase>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    let file: ScenarioFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario file {}", path.display()))?;

    if file.scenarios.is_empty() {
        bail!("No [[scenario]] entries in {}", path.display());
    }
    for case in &file.scenarios {
        if case.steps.is_empty() {
            tracing::warn!("Scenario '{}' has no steps", case.name);
        }
    }
    Ok(file.scenarios)
}

/// Write the demo suite to `.stepwise/scenarios.toml` under `root`
pub fn write_demo_scenarios(root: &Path) -> Result<PathBuf> {
    let path = root.join(SCENARIO_FILE);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let content = toml::to_string_pretty(&ScenarioFile {
        scenarios: demo_suite(),
    })
    .context("Failed to serialize demo scenarios")?;
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Smoke check on example.com, then a storefront login with a demo-shop fallback
pub fn demo_suite() -> Vec<TestCase> {
    vec![
        TestCase::new("Example smoke", vec!["View the page content".into()])
            .with_url("https://example.com")
            .expecting("Example Domain")
            .smoke(),
        TestCase::new(
            "Farmley sign in",
            vec![
                "Click on the 'Sign in' button".into(),
                "Enter email as 'test@example.com'".into(),
                "Enter password as 'test123'".into(),
                "Click on the 'Sign in' button".into(),
            ],
        )
        .with_url("https://www.farmley.com/")
        .with_fallback("https://demo.opencart.com/index.php?route=account/login")
        .expecting("My account"),
        TestCase::new(
            "OpenCart login",
            vec![
                "Enter email as 'test@example.com'".into(),
                "Enter password as 'test123'".into(),
                "Click the login button".into(),
            ],
        )
        .with_url("https://demo.opencart.com/index.php?route=account/login")
        .expecting("account"),
    ]
}
