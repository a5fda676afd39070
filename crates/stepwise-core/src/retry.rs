//! Bounded retry over an ordered list of strategies
//!
//! Navigation (`networkidle` then `domcontentloaded`) and selector resolution
//! (CSS, XPath, text, ARIA) share the same shape: try each strategy once, in
//! order, with a bounded wait, and stop at the first success. A fatal error
//! stops the run immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::{Result, StepwiseError};

/// Ordered strategies, each attempted at most once
#[derive(Debug, Clone)]
pub struct RetryPolicy<S> {
    strategies: Vec<S>,
    per_attempt: Duration,
    retry_if: fn(&StepwiseError) -> bool,
}

/// What a policy run tried and how it ended
#[derive(Debug)]
pub struct PolicyRun<S, T> {
    /// Strategies in the order they were attempted; the last one produced `result`
    pub attempted: Vec<S>,
    pub result: Result<T>,
}

impl<S, T> PolicyRun<S, T> {
    /// Strategy that succeeded, if any
    pub fn winner(&self) -> Option<&S> {
        match self.result {
            Ok(_) => self.attempted.last(),
            Err(_) => None,
        }
    }
}

fn any_non_fatal(err: &StepwiseError) -> bool {
    !err.is_fatal()
}

impl<S: Clone + Display> RetryPolicy<S> {
    /// Policy that moves to the next strategy on any non-fatal error
    pub fn new(strategies: Vec<S>, per_attempt: Duration) -> Self {
        Self {
            strategies,
            per_attempt,
            retry_if: any_non_fatal,
        }
    }

    /// Only advance to the next strategy when `retry_if` accepts the error
    pub fn retrying_when(mut self, retry_if: fn(&StepwiseError) -> bool) -> Self {
        self.retry_if = retry_if;
        self
    }

    pub fn strategies(&self) -> &[S] {
        &self.strategies
    }

    pub fn max_attempts(&self) -> usize {
        self.strategies.len()
    }

    pub fn per_attempt(&self) -> Duration {
        self.per_attempt
    }

    /// Run `attempt` once per strategy until one succeeds
    ///
    /// Fatal errors and errors rejected by `retry_if` end the run with that error.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut attempt: F) -> PolicyRun<S, T>
    where
        F: FnMut(S, Duration) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempted = Vec::with_capacity(self.strategies.len());
        let mut last_error = None;

        for (i, strategy) in self.strategies.iter().enumerate() {
            attempted.push(strategy.clone());
            match attempt(strategy.clone(), self.per_attempt).await {
                Ok(value) => {
                    debug!("{} succeeded with {} (attempt {})", operation, strategy, i + 1);
                    return PolicyRun {
                        attempted,
                        result: Ok(value),
                    };
                }
                Err(e) => {
                    debug!(
                        "{} failed with {} (attempt {}/{}): {}",
                        operation,
                        strategy,
                        i + 1,
                        self.strategies.len(),
                        e
                    );
                    let keep_going = !e.is_fatal() && (self.retry_if)(&e);
                    last_error = Some(e);
                    if !keep_going {
                        break;
                    }
                }
            }
        }

        PolicyRun {
            attempted,
            result: Err(last_error.unwrap_or_else(|| {
                StepwiseError::Other(format!("{}: no strategies configured", operation))
            })),
        }
    }
}
