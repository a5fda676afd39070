//! Step interpretation: text in, [`Action`] out

use crate::client::LanguageModel;
use crate::fallback::fallback_action;
use crate::parse::parse_action;
use crate::prompt::build_request;
use std::sync::Arc;
use stepwise_core::{Action, Result, StepwiseError};
use tracing::{info, warn};

/// Interprets natural-language steps through a language model
#[derive(Clone)]
pub struct StepInterpreter {
    model: Arc<dyn LanguageModel>,
}

impl StepInterpreter {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Turn one step into an action
    ///
    /// Model output is parsed strictly, then by recovering an embedded object,
    /// then by the static fallback table. A transport failure also goes to the
    /// fallback table. Returns `StepwiseError::Interpretation` only when none
    /// of these produce an action.
    pub async fn interpret(&self, step_text: &str, site_context: &str) -> Result<Action> {
        let request = build_request(step_text, site_context);

        let reason = match self.model.complete(&request).await {
            Ok(completion) => {
                info!("AI interpretation of step '{}': {}", step_text, completion.text.trim());
                match parse_action(&completion.text) {
                    Ok(action) => return Ok(action),
                    Err(failure) => {
                        warn!(
                            "Could not parse model reply for '{}' ({}); using fallback table",
                            step_text, failure
                        );
                        failure.to_string()
                    }
                }
            }
            Err(e) => {
                warn!(
                    "Language model unavailable for '{}' ({}); using fallback table",
                    step_text, e
                );
                e.to_string()
            }
        };

        fallback_action(step_text).ok_or_else(|| StepwiseError::Interpretation {
            step: step_text.to_string(),
            reason: format!("{}; no fallback rule matched", reason),
        })
    }
}

/// Describe a site for the prompt, e.g. `"farmley.com website"`
pub fn site_context(site_url: &str) -> String {
    url::Url::parse(site_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .filter(|h| !h.is_empty())
        .map(|host| format!("{} website", host))
        .unwrap_or_else(|| "ecommerce website".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScriptedModel;

    fn interpreter(model: ScriptedModel) -> (StepInterpreter, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        (StepInterpreter::new(model.clone()), model)
    }

    #[tokio::test]
    async fn test_well_formed_reply() {
        let (interpreter, model) = interpreter(ScriptedModel::new().with_reply(
            "Click the login button",
            r#"{"action": "click", "selector": "button[type='submit']", "description": "login"}"#,
        ));

        let action = interpreter
            .interpret("Click the login button", "opencart.com website")
            .await
            .unwrap();
        assert_eq!(action.selector(), Some("button[type='submit']"));

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].system_context.contains("opencart.com website"));
    }

    #[tokio::test]
    async fn test_prose_reply_recovered() {
        let (interpreter, _) = interpreter(ScriptedModel::new().with_reply(
            "Check the heading",
            "The action is {\"action\": \"check\", \"text\": \"Example Domain\"} as requested.",
        ));

        let action = interpreter.interpret("Check the heading", "site").await.unwrap();
        assert_eq!(
            action,
            Action::Check {
                text: "Example Domain".into(),
                description: String::new()
            }
        );
    }

    #[tokio::test]
    async fn test_unparseable_reply_uses_fallback() {
        let (interpreter, _) = interpreter(
            ScriptedModel::new().with_reply("Enter email as 'a@b.co'", "I would type the email."),
        );

        let action = interpreter
            .interpret("Enter email as 'a@b.co'", "site")
            .await
            .unwrap();
        assert_eq!(
            action,
            Action::Fill {
                selector: "input[type='email']".into(),
                value: "a@b.co".into(),
                description: "entering email".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_model_failure_uses_fallback() {
        let (interpreter, _) = interpreter(
            ScriptedModel::new().with_failure("View the page content", "connection refused"),
        );

        let action = interpreter
            .interpret("View the page content", "site")
            .await
            .unwrap();
        assert_eq!(action, Action::view("viewing the page content"));
    }

    #[tokio::test]
    async fn test_nothing_usable_is_interpretation_error() {
        let (interpreter, _) =
            interpreter(ScriptedModel::new().with_reply("Do a barrel roll", r#"{"action": "roll"}"#));

        let err = interpreter
            .interpret("Do a barrel roll", "site")
            .await
            .unwrap_err();
        match err {
            StepwiseError::Interpretation { step, reason } => {
                assert_eq!(step, "Do a barrel roll");
                assert!(reason.contains("no fallback rule matched"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_site_context() {
        assert_eq!(site_context("https://www.farmley.com/"), "farmley.com website");
        assert_eq!(
            site_context("https://demo.opencart.com/index.php?route=account/login"),
            "demo.opencart.com website"
        );
        assert_eq!(site_context("not a url"), "ecommerce website");
    }
}
