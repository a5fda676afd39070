//! Static keyword table for steps the model could not interpret
//!
//! Rules are checked in order against the lower-cased step and the first
//! match that can build an action wins.

use regex::Regex;
use std::sync::OnceLock;
use stepwise_core::{Action, MAX_WAIT_SECS};

const DEFAULT_EMAIL: &str = "test@example.com";
const DEFAULT_PASSWORD: &str = "test123";

struct FallbackRule {
    name: &'static str,
    matches: fn(&str) -> bool,
    build: fn(&str) -> Option<Action>,
}

static RULES: &[FallbackRule] = &[
    FallbackRule {
        name: "view",
        matches: mentions_view,
        build: build_view,
    },
    FallbackRule {
        name: "click-sign-in",
        matches: mentions_sign_in_click,
        build: build_sign_in_click,
    },
    FallbackRule {
        name: "enter-email",
        matches: mentions_email_entry,
        build: build_email_fill,
    },
    FallbackRule {
        name: "enter-password",
        matches: mentions_password_entry,
        build: build_password_fill,
    },
    FallbackRule {
        name: "navigate",
        matches: mentions_navigation,
        build: build_navigate,
    },
    FallbackRule {
        name: "wait",
        matches: mentions_wait,
        build: build_wait,
    },
    FallbackRule {
        name: "check",
        matches: mentions_verification,
        build: build_check,
    },
];

/// Map a step to an action using the static keyword table
pub fn fallback_action(step: &str) -> Option<Action> {
    let lower = step.to_lowercase();
    RULES
        .iter()
        .filter(|rule| (rule.matches)(&lower))
        .find_map(|rule| {
            let action = (rule.build)(step)?;
            tracing::info!("Fallback rule '{}' matched step: {}", rule.name, step);
            Some(action)
        })
}

fn word_view() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bview\b").expect("valid regex"))
}

fn value_after_as() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)\bas\s+['"]?([^'"]+?)['"]?\s*\.?$"#).expect("valid regex"))
}

fn url_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s'"<>]+"#).expect("valid regex"))
}

fn seconds_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("valid regex"))
}

fn quoted_phrase() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"['"]([^'"]+)['"]"#).expect("valid regex"))
}

fn mentions_view(lower: &str) -> bool {
    word_view().is_match(lower)
}

fn build_view(_step: &str) -> Option<Action> {
    Some(Action::view("viewing the page content"))
}

fn mentions_sign_in_click(lower: &str) -> bool {
    lower.contains("click")
        && (lower.contains("sign in") || lower.contains("log in") || lower.contains("login"))
}

fn build_sign_in_click(_step: &str) -> Option<Action> {
    Some(Action::Click {
        selector: "text=Sign in".to_string(),
        description: "clicking sign in button".to_string(),
    })
}

fn mentions_email_entry(lower: &str) -> bool {
    lower.contains("enter") && lower.contains("email")
}

fn build_email_fill(step: &str) -> Option<Action> {
    let email = value_after(step)
        .filter(|v| v.contains('@'))
        .unwrap_or_else(|| DEFAULT_EMAIL.to_string());
    Some(Action::Fill {
        selector: "input[type='email']".to_string(),
        value: email,
        description: "entering email".to_string(),
    })
}

fn mentions_password_entry(lower: &str) -> bool {
    lower.contains("enter") && lower.contains("password")
}

fn build_password_fill(step: &str) -> Option<Action> {
    let password = value_after(step).unwrap_or_else(|| DEFAULT_PASSWORD.to_string());
    Some(Action::Fill {
        selector: "input[type='password']".to_string(),
        value: password,
        description: "entering password".to_string(),
    })
}

fn mentions_navigation(lower: &str) -> bool {
    lower.contains("go to") || lower.contains("navigate") || lower.contains("open")
}

fn build_navigate(step: &str) -> Option<Action> {
    let url = url_token().find(step)?.as_str();
    let url = url.trim_end_matches(['.', ',', ')', ';']);
    Some(Action::Navigate {
        url: url.to_string(),
        description: format!("navigating to {}", url),
    })
}

fn mentions_wait(lower: &str) -> bool {
    lower.contains("wait")
}

fn build_wait(step: &str) -> Option<Action> {
    let time = seconds_token()
        .captures(step)?
        .get(1)?
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|t| *t <= MAX_WAIT_SECS)?;
    Some(Action::Wait {
        time,
        description: "waiting".to_string(),
    })
}

fn mentions_verification(lower: &str) -> bool {
    lower.contains("verify") || lower.contains("check") || lower.contains("see")
}

fn build_check(step: &str) -> Option<Action> {
    let text = quoted_phrase().captures(step)?.get(1)?.as_str().trim();
    if text.is_empty() {
        return None;
    }
    Some(Action::Check {
        text: text.to_string(),
        description: format!("verifying '{}' is shown", text),
    })
}

/// The value in "Enter password as 'secret'"
fn value_after(step: &str) -> Option<String> {
    let value = value_after_as().captures(step)?.get(1)?.as_str().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
