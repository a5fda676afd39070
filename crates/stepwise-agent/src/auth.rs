//! API credential lookup
//!
//! The credential is read once, by whoever constructs the client, from the
//! environment variable named in `ModelConfig::api_key_env`.

use stepwise_core::{Result, StepwiseError};
use std::env;

/// Get the API key from the named environment variable
pub fn get_api_key(env_var: &str) -> Result<String> {
    match env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => {
            tracing::info!("Using API key from {}", env_var);
            Ok(key.trim().to_string())
        }
        Ok(_) => Err(StepwiseError::Auth(format!("{} is set but empty", env_var))),
        Err(_) => Err(StepwiseError::Auth(format!(
            "No API key found. Set {} in the environment, e.g.\n\
             {}=your-api-key-here",
            env_var, env_var
        ))),
    }
}
