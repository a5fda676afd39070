//! # stepwise-agent
//!
//! Turns one natural-language test step into one [`Action`](stepwise_core::Action).
//!
//! The flow for a step is:
//! - Build a prompt from the site context, the action format and the step text
//! - Ask the language model for a single JSON object
//! - Parse strictly, then recover an object embedded in prose
//! - Fall back to a static keyword table when the model output is unusable
//!
//! Only when all three produce nothing does interpretation fail, and callers
//! record that as a failed step rather than aborting the scenario.

mod auth;
mod circuit_breaker;
mod client;
pub mod fallback;
mod interpreter;
pub mod parse;
pub mod prompt;
mod types;

pub use auth::get_api_key;
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use client::{AgentClient, LanguageModel, ScriptedModel};
pub use fallback::fallback_action;
pub use interpreter::{site_context, StepInterpreter};
pub use parse::{parse_action, ParseFailure};
pub use types::*;
