//! Configuration management for stepwise
//!
//! Everything example-specific (sites, thresholds, success markers) lives here
//! so components receive it explicitly at construction.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Result;

/// Relative location of the config file under a project root
pub const CONFIG_FILE: &str = ".stepwise/config.toml";

/// Project-level stepwise configuration
///
/// Loaded from `.stepwise/config.toml` in the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepwiseConfig {
    /// Where screenshots and reports are written
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Language-model selection
    #[serde(default)]
    pub model: ModelConfig,

    /// Browser and executor timing
    #[serde(default)]
    pub browser: BrowserSettings,

    /// Pass/fail policy
    #[serde(default)]
    pub outcome: OutcomeSettings,

    /// Default target sites
    #[serde(default)]
    pub sites: SiteSettings,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name sent to the API
    #[serde(default = "default_model")]
    pub name: String,

    /// Environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Messages endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Response budget; one JSON object needs very little
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Browser launch and executor timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Per-attempt navigation timeout
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// Bounded wait per selector strategy
    #[serde(default = "default_selector_wait_ms")]
    pub selector_wait_ms: u64,

    /// Pause between steps so animations settle
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Account/login toggles clicked once to reveal hidden sign-in forms
    #[serde(default = "default_reveal_triggers")]
    pub reveal_triggers: Vec<String>,

    /// Viewport and user agent applied to every fresh page
    #[serde(default)]
    pub device: DeviceProfile,
}

/// Viewport and identity a page presents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Pass/fail policy for a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeSettings {
    /// Minimum fraction of steps that must succeed
    #[serde(default = "default_min_success_ratio")]
    pub min_success_ratio: f64,

    /// Substrings of the final URL that count as success
    #[serde(default = "default_url_indicators")]
    pub url_indicators: Vec<String>,

    /// `url_indicators` apply only to cases whose expected output mentions this
    #[serde(default = "default_url_indicator_keyword")]
    pub url_indicator_keyword: String,

    /// Phrases in the final page text that count as success
    #[serde(default)]
    pub success_phrases: Vec<String>,
}

/// Default target sites
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettings {
    /// Used when a test case names no URL
    #[serde(default = "default_site_url")]
    pub default_url: String,

    /// Switched to once when the primary site cannot be reached
    #[serde(default = "default_fallback_url")]
    pub fallback_url: Option<String>,
}

// Default value providers
fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("stepwise-artifacts")
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_max_tokens() -> usize {
    300
}

fn default_temperature() -> f32 {
    0.2
}

fn default_headless() -> bool {
    true
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_selector_wait_ms() -> u64 {
    2000
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_reveal_triggers() -> Vec<String> {
    [
        "button.account-button",
        ".account-trigger",
        ".icon-account",
        ".header__icon--account",
        ".header__action-item--account",
        ".user-icon",
        ".account-icon",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_min_success_ratio() -> f64 {
    0.5
}

fn default_url_indicators() -> Vec<String> {
    ["account", "profile", "dashboard", "my-account", "customer"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_url_indicator_keyword() -> String {
    "account".to_string()
}

fn default_site_url() -> String {
    "https://example.com".to_string()
}

fn default_fallback_url() -> Option<String> {
    Some("https://demo.opencart.com/index.php?route=account/login".to_string())
}

impl StepwiseConfig {
    /// Load configuration from `.stepwise/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::StepwiseError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write default configuration to `.stepwise/config.toml`
    pub fn write_default(root: &Path) -> Result<PathBuf> {
        let config_path = root.join(CONFIG_FILE);
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(&Self::default()).map_err(|e| {
            crate::StepwiseError::Config(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    /// Reject settings no run could satisfy
    pub fn validate(&self) -> Result<()> {
        let ratio = self.outcome.min_success_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(crate::StepwiseError::Config(format!(
                "outcome.min_success_ratio must be within 0.0..=1.0, got {}",
                ratio
            )));
        }
        if self.browser.navigation_timeout_secs == 0 {
            return Err(crate::StepwiseError::Config(
                "browser.navigation_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl BrowserSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn selector_wait(&self) -> Duration {
        Duration::from_millis(self.selector_wait_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl DeviceProfile {
    /// iPhone-sized viewport; some shops only expose their login form on mobile
    pub fn mobile() -> Self {
        Self {
            name: "iphone".to_string(),
            width: 390,
            height: 844,
            user_agent: Some(
                "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15 \
                 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1"
                    .to_string(),
            ),
        }
    }

    pub fn desktop() -> Self {
        Self {
            name: "desktop".to_string(),
            width: 1920,
            height: 1080,
            user_agent: None,
        }
    }
}

impl Default for StepwiseConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            model: ModelConfig::default(),
            browser: BrowserSettings::default(),
            outcome: OutcomeSettings::default(),
            sites: SiteSettings::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_key_env: default_api_key_env(),
            api_url: default_api_url(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            device: DeviceProfile::default(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            selector_wait_ms: default_selector_wait_ms(),
            settle_ms: default_settle_ms(),
            reveal_triggers: default_reveal_triggers(),
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::mobile()
    }
}

impl Default for OutcomeSettings {
    fn default() -> Self {
        Self {
            min_success_ratio: default_min_success_ratio(),
            url_indicators: default_url_indicators(),
            url_indicator_keyword: default_url_indicator_keyword(),
            success_phrases: Vec::new(),
        }
    }
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            default_url: default_site_url(),
            fallback_url: default_fallback_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = StepwiseConfig::default();
        assert_eq!(config.model.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(config.model.max_tokens, 300);
        assert_eq!(config.browser.device, DeviceProfile::mobile());
        assert_eq!(config.browser.selector_wait(), Duration::from_secs(2));
        assert_eq!(config.outcome.min_success_ratio, 0.5);
        assert!(config.outcome.url_indicators.contains(&"account".to_string()));
        assert!(config.sites.fallback_url.is_some());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = StepwiseConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.browser.navigation_timeout_secs, 30);
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = StepwiseConfig::write_default(dir.path()).unwrap();
        assert!(path.ends_with("config.toml"));

        let config = StepwiseConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.model.name, default_model());
        assert_eq!(config.browser.reveal_triggers, default_reveal_triggers());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".stepwise")).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[outcome]
min_success_ratio = 0.8
success_phrases = ["My account"]

[browser]
headless = false
"#,
        )
        .unwrap();

        let config = StepwiseConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.outcome.min_success_ratio, 0.8);
        assert_eq!(config.outcome.success_phrases, vec!["My account".to_string()]);
        assert_eq!(config.outcome.url_indicators, default_url_indicators());
        assert_eq!(config.outcome.url_indicator_keyword, "account");
        assert!(!config.browser.headless);
        assert_eq!(config.browser.settle_ms, 1000);
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[outcome]\nmin_success_ratio = 1.5\n").unwrap();

        let err = StepwiseConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("min_success_ratio"));
    }
}
