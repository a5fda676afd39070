//! Core type definitions for stepwise

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// A structured, executable instruction derived from one natural-language step
///
/// The wire form is `{"action": "<kind>", ...fields, "description": "..."}`.
/// `view` is accepted on the wire and becomes `Check` with empty text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase", try_from = "WireAction")]
pub enum Action {
    Click {
        selector: String,
        description: String,
    },
    Fill {
        selector: String,
        value: String,
        description: String,
    },
    Navigate {
        url: String,
        description: String,
    },
    Wait {
        time: f64,
        description: String,
    },
    Check {
        text: String,
        description: String,
    },
}

impl Action {
    /// Wire tag of this action
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::Fill { .. } => "fill",
            Action::Navigate { .. } => "navigate",
            Action::Wait { .. } => "wait",
            Action::Check { .. } => "check",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Action::Click { description, .. }
            | Action::Fill { description, .. }
            | Action::Navigate { description, .. }
            | Action::Wait { description, .. }
            | Action::Check { description, .. } => description,
        }
    }

    /// Selector for element-targeting actions
    pub fn selector(&self) -> Option<&str> {
        match self {
            Action::Click { selector, .. } | Action::Fill { selector, .. } => Some(selector),
            _ => None,
        }
    }

    /// The `check` action with empty text that a `view` step becomes
    pub fn view(description: impl Into<String>) -> Self {
        Action::Check {
            text: String::new(),
            description: description.into(),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Click { selector, .. } => write!(f, "click {}", selector),
            Action::Fill { selector, .. } => write!(f, "fill {}", selector),
            Action::Navigate { url, .. } => write!(f, "navigate {}", url),
            Action::Wait { time, .. } => write!(f, "wait {}s", time),
            Action::Check { text, .. } if text.is_empty() => write!(f, "view page"),
            Action::Check { text, .. } => write!(f, "check '{}'", text),
        }
    }
}

/// Deserialization shape of an action, including the `view` alias
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum WireAction {
    Click {
        selector: String,
        #[serde(default)]
        description: Option<String>,
    },
    Fill {
        selector: String,
        value: String,
        #[serde(default)]
        description: Option<String>,
    },
    Navigate {
        url: String,
        #[serde(default)]
        description: Option<String>,
    },
    Wait {
        #[serde(deserialize_with = "seconds")]
        time: f64,
        #[serde(default)]
        description: Option<String>,
    },
    Check {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    View {
        #[serde(default)]
        description: Option<String>,
    },
}

/// Longest pause a `wait` action may request
pub const MAX_WAIT_SECS: f64 = 300.0;

impl TryFrom<WireAction> for Action {
    type Error = String;

    fn try_from(wire: WireAction) -> std::result::Result<Self, Self::Error> {
        let action = match wire {
            WireAction::Click {
                selector,
                description,
            } => Action::Click {
                selector: non_empty("click", "selector", selector)?,
                description: description.unwrap_or_default(),
            },
            WireAction::Fill {
                selector,
                value,
                description,
            } => Action::Fill {
                selector: non_empty("fill", "selector", selector)?,
                value,
                description: description.unwrap_or_default(),
            },
            WireAction::Navigate { url, description } => Action::Navigate {
                url: non_empty("navigate", "url", url)?,
                description: description.unwrap_or_default(),
            },
            WireAction::Wait { time, description } => {
                if !time.is_finite() || time < 0.0 {
                    return Err(format!("wait time must be a non-negative number, got {}", time));
                }
                if time > MAX_WAIT_SECS {
                    return Err(format!(
                        "wait time {}s exceeds the {}s limit",
                        time, MAX_WAIT_SECS
                    ));
                }
                Action::Wait {
                    time,
                    description: description.unwrap_or_default(),
                }
            }
            WireAction::Check { text, description } => Action::Check {
                text: text.unwrap_or_default(),
                description: description.unwrap_or_default(),
            },
            WireAction::View { description } => Action::view(
                description.unwrap_or_else(|| "viewing the page content".to_string()),
            ),
        };
        Ok(action)
    }
}

fn non_empty(kind: &str, field: &str, value: String) -> std::result::Result<String, String> {
    if value.trim().is_empty() {
        Err(format!("{} action requires a non-empty {}", kind, field))
    } else {
        Ok(value)
    }
}

/// Models sometimes quote numbers; accept `3`, `2.5` and `"3"`
fn seconds<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .trim_end_matches('s')
            .trim()
            .parse::<f64>()
            .map_err(serde::de::Error::custom),
    }
}

/// Method of locating a page element, in fixed precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Css,
    XPath,
    Text,
    Aria,
}

impl SelectorKind {
    /// Resolution precedence: first success wins
    pub const ORDER: [SelectorKind; 4] = [
        SelectorKind::Css,
        SelectorKind::XPath,
        SelectorKind::Text,
        SelectorKind::Aria,
    ];
}

impl std::fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css => write!(f, "css"),
            Self::XPath => write!(f, "xpath"),
            Self::Text => write!(f, "text"),
            Self::Aria => write!(f, "aria"),
        }
    }
}

/// One concrete way to find an element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector {
    pub kind: SelectorKind,
    pub value: String,
}

impl Selector {
    pub fn new(kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(SelectorKind::Css, value)
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(SelectorKind::XPath, value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(SelectorKind::Text, value)
    }

    pub fn aria(value: impl Into<String>) -> Self {
        Self::new(SelectorKind::Aria, value)
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Page-load condition a navigation waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitStrategy {
    /// Document loaded and no new network requests for a quiet window
    NetworkIdle,
    /// Document parsed; subresources may still be loading
    DomContentLoaded,
}

impl std::fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkIdle => write!(f, "networkidle"),
            Self::DomContentLoaded => write!(f, "domcontentloaded"),
        }
    }
}

/// Outcome of executing one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Zero-based position in the scenario
    pub index: usize,
    /// The natural-language step as written
    pub step_text: String,
    /// The action attempted; `None` when interpretation failed
    pub action: Option<Action>,
    pub succeeded: bool,
    pub error_message: Option<String>,
    pub screenshot_path: Option<PathBuf>,
    /// Selectors tried in order, the last one being the match on success
    #[serde(default)]
    pub attempted_selectors: Vec<Selector>,
    pub duration_ms: u64,
}

impl StepResult {
    /// Record a step whose text could not be turned into an action
    pub fn uninterpreted(index: usize, step_text: impl Into<String>, error: String) -> Self {
        Self {
            index,
            step_text: step_text.into(),
            action: None,
            succeeded: false,
            error_message: Some(error),
            screenshot_path: None,
            attempted_selectors: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Attach the scenario position and source text
    pub fn for_step(mut self, index: usize, step_text: impl Into<String>) -> Self {
        self.index = index;
        self.step_text = step_text.into();
        self
    }
}

/// Which of the scenario's two sites the steps ran against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteChoice {
    #[default]
    Primary,
    Fallback,
}

impl std::fmt::Display for SiteChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Evidence that a scenario reached its goal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "marker", rename_all = "lowercase")]
pub enum Indicator {
    /// Final URL contained this marker
    Url(String),
    /// Final page text contained this phrase
    Content(String),
}

/// Result of one scenario run, computed once after the last step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub steps: Vec<StepResult>,
    pub final_url: String,
    pub site_used: SiteChoice,
    pub success_ratio: f64,
    pub matched_indicator: Option<Indicator>,
    pub overall_passed: bool,
    /// First 200 characters of the final page text
    pub content_preview: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ScenarioOutcome {
    pub fn succeeded_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.succeeded).count()
    }
}

/// A named list of natural-language steps against a target site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    /// Primary site; the configured default site is used when absent
    #[serde(default)]
    pub url: Option<String>,
    /// Overrides the configured fallback site
    #[serde(default)]
    pub fallback_url: Option<String>,
    pub steps: Vec<String>,
    /// Phrase treated as a positive indicator in the final URL or page text
    #[serde(default)]
    pub expected_output: String,
    /// A failing smoke case stops the rest of the suite
    #[serde(default)]
    pub smoke: bool,
}

impl TestCase {
    pub fn new(name: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            fallback_url: None,
            steps,
            expected_output: String::new(),
            smoke: false,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    pub fn expecting(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = expected.into();
        self
    }

    pub fn smoke(mut self) -> Self {
        self.smoke = true;
        self
    }

    /// Filesystem-safe name used for the artifact directory
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.name.len());
        let mut last_dash = true;
        for c in self.name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
                last_dash = false;
            } else if !last_dash {
                slug.push('-');
                last_dash = true;
            }
        }
        let trimmed = slug.trim_end_matches('-');
        if trimmed.is_empty() {
            "scenario".to_string()
        } else {
            trimmed.to_string()
        }
    }
}
