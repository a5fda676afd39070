//! Prompt builder for step interpretation
//!
//! Every request carries:
//! - The site context (what kind of site the step runs against)
//! - The fixed output format, one example per action
//! - The step text itself
//! - An instruction to answer with the JSON object only

use crate::types::ModelRequest;

/// One example per action variant, in wire format
pub const OUTPUT_FORMAT_SPEC: &str = r#"Output format examples:
For clicks: {"action": "click", "selector": "selector_value", "description": "what is being clicked"}
For typing: {"action": "fill", "selector": "selector_value", "value": "text to type", "description": "what field is being filled"}
For navigation: {"action": "navigate", "url": "url_to_navigate", "description": "navigating to page"}
For waiting: {"action": "wait", "time": seconds_to_wait, "description": "reason for waiting"}
For checking: {"action": "check", "text": "text to verify", "description": "what is being verified"}
For viewing: {"action": "view", "description": "viewing the page content"}

Selectors may be CSS (#id, .class, input[type='email']), XPath (//a[contains(text(), 'Sign in')]),
visible text (text=Sign in) or an accessible label ([aria-label='Sign in']).

Return ONLY the JSON object. No explanation, no markdown, no surrounding text."#;

/// Build the model request for one step
pub fn build_request(step_text: &str, site_context: &str) -> ModelRequest {
    ModelRequest {
        system_context: format!(
            "You convert test steps for a {} into structured browser action commands.",
            site_context
        ),
        step_text: step_text.to_string(),
        output_format_spec: OUTPUT_FORMAT_SPEC.to_string(),
    }
}

/// Render the user turn sent alongside `system_context`
pub fn user_message(request: &ModelRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str("Convert the following test step into a structured browser action command.\n\n");
    prompt.push_str(&format!("Step: \"{}\"\n\n", request.step_text.trim()));
    prompt.push_str(&request.output_format_spec);
    prompt.push('\n');

    prompt
}
