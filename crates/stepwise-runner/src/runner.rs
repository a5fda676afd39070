//! Scenario and suite execution
//!
//! [`ScenarioRunner`] drives one test case through the state machine in
//! [`crate::state_machine`], performing each directive against a fresh page.
//! [`SuiteRunner`] runs test cases one after another and gates the suite on
//! smoke scenarios.

use crate::outcome::{content_preview, evaluate, FinalPage, OutcomeCriteria};
use crate::report::{AbortedScenario, SuiteReport};
use crate::state_machine::{transition, Directive, Event, State};
use chrono::Utc;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stepwise_agent::{site_context, StepInterpreter};
use stepwise_browser::{ActionExecutor, ExecutorSettings, Page, PageFactory, ScreenshotStore};
use stepwise_core::fail_open::fail_open;
use stepwise_core::{
    DeviceProfile, Result, ScenarioOutcome, SiteChoice, SiteSettings, StepResult, StepwiseConfig,
    StepwiseError, TestCase,
};
use tracing::{error, info, warn};

/// Runs one scenario at a time on a fresh page
pub struct ScenarioRunner {
    interpreter: StepInterpreter,
    executor: ActionExecutor,
    pages: Arc<dyn PageFactory>,
    criteria: OutcomeCriteria,
    device: DeviceProfile,
    artifacts_dir: PathBuf,
    settle: Duration,
}

impl ScenarioRunner {
    pub fn new(
        interpreter: StepInterpreter,
        pages: Arc<dyn PageFactory>,
        config: &StepwiseConfig,
    ) -> Self {
        Self {
            interpreter,
            executor: ActionExecutor::new(ExecutorSettings::from(&config.browser)),
            pages,
            criteria: OutcomeCriteria::from(&config.outcome),
            device: config.browser.device.clone(),
            artifacts_dir: config.artifacts_dir.clone(),
            settle: config.browser.settle(),
        }
    }

    /// Replace the executor, e.g. to shorten timeouts
    pub fn with_executor(mut self, executor: ActionExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Run `case` against `primary`, switching to `fallback` at most once
    ///
    /// Returns `Err` only when the page could not be opened or the browser
    /// session was lost; the page is closed on every path.
    pub async fn run(
        &self,
        case: &TestCase,
        primary: &str,
        fallback: Option<&str>,
    ) -> Result<ScenarioOutcome> {
        info!("Running scenario '{}' ({} steps)", case.name, case.steps.len());

        let page = self.pages.open().await?;
        let result = self.drive(case, primary, fallback, page.as_ref()).await;
        fail_open("close page", || page.close()).await;

        result
    }

    async fn drive(
        &self,
        case: &TestCase,
        primary: &str,
        fallback: Option<&str>,
        page: &dyn Page,
    ) -> Result<ScenarioOutcome> {
        let started_at = Utc::now();
        let clock = Instant::now();

        fail_open("set viewport", || page.set_viewport(&self.device)).await;
        let shots = ScreenshotStore::create(&self.artifacts_dir, &case.slug())?;

        let site_url = |site: SiteChoice| match (site, fallback) {
            (SiteChoice::Fallback, Some(url)) => url,
            _ => primary,
        };

        let mut steps: Vec<StepResult> = Vec::with_capacity(case.steps.len());
        let mut start_url: Option<String> = None;
        let mut state = State::start(case.steps.len(), fallback.is_some());
        let mut pending = VecDeque::from([Directive::Navigate {
            site: SiteChoice::Primary,
        }]);

        while let Some(directive) = pending.pop_front() {
            let event = match directive {
                Directive::Navigate { site } => {
                    let url = site_url(site);
                    info!("Opening {} site {}", site, url);
                    match self.executor.navigate(page, url).await {
                        Ok(()) => Some(Event::SiteLoaded),
                        Err(e) if e.is_fatal() => Some(Event::SessionLost {
                            reason: e.to_string(),
                        }),
                        Err(e) => {
                            warn!("Could not load {}: {}", url, e);
                            Some(Event::SiteFailed {
                                reason: e.to_string(),
                            })
                        }
                    }
                }
                Directive::CaptureBefore => {
                    start_url = fail_open("read start URL", || page.current_url()).await;
                    shots.capture(page, shots.before()).await;
                    None
                }
                Directive::RunStep { index } => {
                    let text = case.steps.get(index).map(String::as_str).unwrap_or_default();
                    let context = site_context(site_url(state.site()));
                    match self.run_step(page, &shots, index, text, &context).await {
                        Ok(result) => {
                            log_step(&result, case.steps.len());
                            steps.push(result);
                            Some(Event::StepFinished)
                        }
                        Err(e) => Some(Event::SessionLost {
                            reason: e.to_string(),
                        }),
                    }
                }
                Directive::Settle => {
                    tokio::time::sleep(self.settle).await;
                    None
                }
                Directive::Finish => {
                    shots.capture(page, shots.final_state()).await;
                    None
                }
                Directive::Log { message } => {
                    info!("{}", message);
                    None
                }
            };

            if let Some(event) = event {
                let (next, directives) = transition(state, event);
                state = next;
                pending.extend(directives);
            }
        }

        let site_used = match state {
            State::Done {
                aborted: Some(reason),
                ..
            } => {
                error!("Scenario '{}' aborted: {}", case.name, reason);
                return Err(StepwiseError::SessionFatal(reason));
            }
            State::Done { site, .. } => site,
            other => {
                return Err(StepwiseError::Other(format!(
                    "Scenario '{}' stopped in state {:?}",
                    case.name, other
                )))
            }
        };

        let final_url = fail_open("read final URL", || page.current_url())
            .await
            .unwrap_or_default();
        let page_text = fail_open("read final page text", || page.visible_text())
            .await
            .unwrap_or_default();

        let start_url = start_url.unwrap_or_else(|| site_url(site_used).to_string());
        let verdict = evaluate(
            &self.criteria,
            &steps,
            &case.expected_output,
            FinalPage {
                start_url: &start_url,
                final_url: &final_url,
                text: &page_text,
            },
        );

        let outcome = ScenarioOutcome {
            name: case.name.clone(),
            steps,
            final_url,
            site_used,
            success_ratio: verdict.success_ratio,
            matched_indicator: verdict.matched_indicator,
            overall_passed: verdict.passed,
            content_preview: content_preview(&page_text),
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
        };

        info!(
            "Scenario '{}': {} ({}/{} steps, site: {}, url: {})",
            outcome.name,
            if outcome.overall_passed { "PASSED" } else { "FAILED" },
            outcome.succeeded_steps(),
            outcome.steps.len(),
            outcome.site_used,
            outcome.final_url
        );

        Ok(outcome)
    }

    /// Interpret and execute one step; only a lost session is `Err`
    async fn run_step(
        &self,
        page: &dyn Page,
        shots: &ScreenshotStore,
        index: usize,
        text: &str,
        context: &str,
    ) -> Result<StepResult> {
        info!("Step {}: {}", index + 1, text);

        let action = match self.interpreter.interpret(text, context).await {
            Ok(action) => action,
            Err(e) => {
                warn!("Could not interpret step {}: {}", index + 1, e);
                return Ok(StepResult::uninterpreted(index, text, e.to_string()));
            }
        };

        let result = self
            .executor
            .execute(action, page, &shots.step(index))
            .await?;
        Ok(result.for_step(index, text))
    }
}

fn log_step(result: &StepResult, total: usize) {
    match (&result.error_message, result.succeeded) {
        (_, true) => info!("Step {}/{} succeeded", result.index + 1, total),
        (Some(message), false) => warn!("Step {}/{} failed: {}", result.index + 1, total, message),
        (None, false) => warn!("Step {}/{} failed", result.index + 1, total),
    }
}

/// Runs test cases sequentially, smoke cases first
pub struct SuiteRunner {
    runner: ScenarioRunner,
    sites: SiteSettings,
    smoke_gate: bool,
}

impl SuiteRunner {
    pub fn new(runner: ScenarioRunner, sites: SiteSettings) -> Self {
        Self {
            runner,
            sites,
            smoke_gate: true,
        }
    }

    /// When false, a failing smoke case no longer stops the suite
    pub fn with_smoke_gate(mut self, enabled: bool) -> Self {
        self.smoke_gate = enabled;
        self
    }

    /// Run every case; a fatal session error aborts only its own scenario
    pub async fn run(&self, cases: &[TestCase]) -> SuiteReport {
        let mut report = SuiteReport::new();

        let (smoke, regular): (Vec<&TestCase>, Vec<&TestCase>) =
            cases.iter().partition(|case| case.smoke);
        let ordered: Vec<&TestCase> = smoke.into_iter().chain(regular).collect();

        let mut gate_closed_by: Option<String> = None;

        for case in ordered {
            if let Some(ref blocker) = gate_closed_by {
                info!(
                    "Skipping '{}': smoke scenario '{}' failed",
                    case.name, blocker
                );
                report.skipped.push(case.name.clone());
                continue;
            }

            let primary = case.url.as_deref().unwrap_or(&self.sites.default_url);
            let fallback = case
                .fallback_url
                .as_deref()
                .or(self.sites.fallback_url.as_deref())
                .filter(|url| *url != primary);

            let passed = match self.runner.run(case, primary, fallback).await {
                Ok(outcome) => {
                    let passed = outcome.overall_passed;
                    report.outcomes.push(outcome);
                    passed
                }
                Err(e) => {
                    error!("Scenario '{}' aborted: {}", case.name, e);
                    report.aborted.push(AbortedScenario {
                        name: case.name.clone(),
                        reason: e.to_string(),
                    });
                    false
                }
            };

            if case.smoke && !passed && self.smoke_gate {
                warn!("Smoke scenario '{}' failed; skipping the rest", case.name);
                gate_closed_by = Some(case.name.clone());
            }
        }

        report.finish();
        report
    }
}
