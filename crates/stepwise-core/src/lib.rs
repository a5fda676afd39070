//! # stepwise-core
//!
//! Core types for stepwise, a runner that turns natural-language test steps
//! into browser actions.
//!
//! ## Pipeline
//!
//! - A scenario is a named list of plain-English steps against a target site
//! - Each step is interpreted into exactly one [`Action`]
//! - Each action is executed once against a live page, yielding a [`StepResult`]
//! - Step results fold into one [`ScenarioOutcome`]

mod config;
mod error;
pub mod fail_open;
pub mod retry;
mod types;

pub use config::*;
pub use error::{Result, StepwiseError};
pub use retry::RetryPolicy;
pub use types::*;
