//! # stepwise-runner
//!
//! Runs scenarios end to end: picks the site, interprets and executes each
//! step, and decides pass/fail.
//!
//! - [`state_machine`]: pure scenario control flow
//! - [`outcome`]: success ratio and positive indicators
//! - [`runner`]: `ScenarioRunner` and `SuiteRunner`
//! - [`report`]: `report.json`

pub mod outcome;
pub mod report;
pub mod runner;
pub mod state_machine;

pub use outcome::{evaluate, FinalPage, OutcomeCriteria, Verdict};
pub use report::{AbortedScenario, SuiteReport};
pub use runner::{ScenarioRunner, SuiteRunner};
pub use state_machine::{transition, Directive, Event, State};
