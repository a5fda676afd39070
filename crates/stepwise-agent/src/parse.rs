//! Recovering an [`Action`] from free-form model output
//!
//! Models are asked for a bare JSON object but regularly wrap it in prose or
//! markdown fences. Parsing is a pure function over the reply text:
//!
//! 1. Strict parse of the whole (trimmed) reply
//! 2. Greedy `{ ... }` span from the first `{` to the last `}`
//! 3. Every brace-balanced object, in order of its opening brace
//!
//! The first candidate that deserializes into a valid action wins.

use regex::Regex;
use std::sync::OnceLock;
use stepwise_core::Action;
use thiserror::Error;

/// Why no action could be recovered from a reply
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseFailure {
    #[error("model reply was empty")]
    Empty,

    #[error("no JSON object found in model reply")]
    NoObject,

    #[error("no JSON object in model reply is a valid action: {0}")]
    Invalid(String),
}

fn greedy_object() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"))
}

/// Parse model output into an action
pub fn parse_action(text: &str) -> Result<Action, ParseFailure> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseFailure::Empty);
    }

    let strict_error = match serde_json::from_str::<Action>(trimmed) {
        Ok(action) => return Ok(action),
        Err(e) => e.to_string(),
    };

    let candidates = object_candidates(trimmed);
    if candidates.is_empty() {
        return Err(ParseFailure::NoObject);
    }

    let mut last_error = strict_error;
    for candidate in candidates {
        match serde_json::from_str::<Action>(candidate) {
            Ok(action) => {
                tracing::debug!("Recovered action from embedded object");
                return Ok(action);
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(ParseFailure::Invalid(last_error))
}

/// Object-like substrings worth a strict parse, most likely first
fn object_candidates(text: &str) -> Vec<&str> {
    let mut candidates = Vec::new();

    if let Some(m) = greedy_object().find(text) {
        candidates.push(m.as_str());
    }

    for candidate in balanced_objects(text) {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }

    candidates
}

/// Every `{...}` span whose braces balance, ignoring braces inside strings
fn balanced_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();

    for (start, _) in text.match_indices('{') {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, &b) in bytes[start..].iter().enumerate() {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        found.push(&text[start..start + offset + 1]);
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_json() {
        let action = parse_action(
            r#"{"action": "fill", "selector": "input[type='email']", "value": "test@example.com", "description": "email"}"#,
        )
        .unwrap();
        assert_eq!(
            action,
            Action::Fill {
                selector: "input[type='email']".into(),
                value: "test@example.com".into(),
                description: "email".into(),
            }
        );
    }

    #[test]
    fn test_object_in_prose() {
        let reply = "Sure! Here is the action:\n{\"action\": \"click\", \"selector\": \"text=Sign in\", \"description\": \"sign in\"}\nLet me know if you need more.";
        let action = parse_action(reply).unwrap();
        assert_eq!(action.kind(), "click");
        assert_eq!(action.selector(), Some("text=Sign in"));
    }

    #[test]
    fn test_markdown_fence() {
        let reply = "```json\n{\"action\": \"wait\", \"time\": 2, \"description\": \"let it load\"}\n```";
        assert_eq!(parse_action(reply).unwrap().kind(), "wait");
    }

    #[test]
    fn test_first_well_formed_object_wins_over_greedy_span() {
        // Greedy span covers both objects and is not valid JSON
        let reply = r#"Option A: {"action": "view"} or option B: {"action": "check", "text": "Welcome"}"#;
        let action = parse_action(reply).unwrap();
        assert_eq!(action, Action::view("viewing the page content"));
    }

    #[test]
    fn test_nested_wrapper_object() {
        let reply = r#"{"result": {"action": "navigate", "url": "/account/login"}}"#;
        let action = parse_action(reply).unwrap();
        assert_eq!(
            action,
            Action::Navigate {
                url: "/account/login".into(),
                description: String::new()
            }
        );
    }

    #[test]
    fn test_braces_inside_strings() {
        let reply = r#"Here: {"action": "check", "text": "price {total}", "description": "x"} done"#;
        let action = parse_action(reply).unwrap();
        assert_eq!(
            action,
            Action::Check {
                text: "price {total}".into(),
                description: "x".into()
            }
        );
    }

    #[test]
    fn test_view_normalized_through_recovery() {
        let reply = "The step only looks at the page: {\"action\": \"view\", \"description\": \"look\"}";
        assert_eq!(parse_action(reply).unwrap(), Action::view("look"));
    }

    #[test]
    fn test_failures() {
        assert_eq!(parse_action("   "), Err(ParseFailure::Empty));
        assert_eq!(
            parse_action("I cannot help with that."),
            Err(ParseFailure::NoObject)
        );
        assert!(matches!(
            parse_action(r##"{"action": "hover", "selector": "#menu"}"##),
            Err(ParseFailure::Invalid(_))
        ));
        assert!(matches!(
            parse_action(r##"{"action": "click", "selector": "#a""##),
            Err(ParseFailure::NoObject) | Err(ParseFailure::Invalid(_))
        ));
    }
}
