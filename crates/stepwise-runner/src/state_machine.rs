//! Pure state machine for scenario control flow
//!
//! No I/O and no async: `transition(state, event) -> (state, directives)`.
//! The runner performs the directives and feeds the resulting events back.
//!
//! - A scenario starts by navigating to the primary site
//! - A failed primary navigation switches to the fallback exactly once
//! - Steps run in order; a failed step does not stop the loop
//! - A lost session ends the scenario immediately
//! - Nothing leaves `Done`

use stepwise_core::SiteChoice;

/// Scenario state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Loading the site the steps will run against
    Navigating {
        site: SiteChoice,
        total_steps: usize,
        fallback_available: bool,
    },
    /// Running steps against `site`; `next_step` is in flight
    Active {
        site: SiteChoice,
        next_step: usize,
        total_steps: usize,
    },
    /// Finished; `aborted` carries the reason when the session was lost
    Done {
        site: SiteChoice,
        aborted: Option<String>,
    },
}

impl State {
    /// Initial state for a scenario with `total_steps` steps
    pub fn start(total_steps: usize, fallback_available: bool) -> Self {
        Self::Navigating {
            site: SiteChoice::Primary,
            total_steps,
            fallback_available,
        }
    }

    pub fn site(&self) -> SiteChoice {
        match self {
            Self::Navigating { site, .. } | Self::Active { site, .. } | Self::Done { site, .. } => {
                *site
            }
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// Events reported by the runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The current site loaded
    SiteLoaded,
    /// The current site could not be loaded with any wait strategy
    SiteFailed { reason: String },
    /// The step in flight finished, successfully or not
    StepFinished,
    /// The page or browser is gone
    SessionLost { reason: String },
}

/// Side effects for the runner to perform, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Navigate { site: SiteChoice },
    CaptureBefore,
    RunStep { index: usize },
    Settle,
    Finish,
    Log { message: String },
}

/// Pure state transition function
///
/// Invalid combinations end the scenario as aborted; this never panics.
pub fn transition(state: State, event: Event) -> (State, Vec<Directive>) {
    match (state, event) {
        (state @ State::Done { .. }, _) => (state, Vec::new()),

        (
            State::Navigating {
                site, total_steps, ..
            },
            Event::SiteLoaded,
        ) => begin_steps(site, total_steps, None),

        (
            State::Navigating {
                site: SiteChoice::Primary,
                total_steps,
                fallback_available: true,
            },
            Event::SiteFailed { reason },
        ) => (
            State::Navigating {
                site: SiteChoice::Fallback,
                total_steps,
                fallback_available: false,
            },
            vec![
                Directive::Log {
                    message: format!("Primary site unavailable ({}); switching to fallback", reason),
                },
                Directive::Navigate {
                    site: SiteChoice::Fallback,
                },
            ],
        ),

        // No further fallback: run the steps on whatever loaded
        (
            State::Navigating {
                site, total_steps, ..
            },
            Event::SiteFailed { reason },
        ) => begin_steps(
            site,
            total_steps,
            Some(format!(
                "{} site unavailable ({}); running steps anyway",
                site, reason
            )),
        ),

        (
            State::Active {
                site,
                next_step,
                total_steps,
            },
            Event::StepFinished,
        ) => {
            let following = next_step + 1;
            if following < total_steps {
                (
                    State::Active {
                        site,
                        next_step: following,
                        total_steps,
                    },
                    vec![Directive::Settle, Directive::RunStep { index: following }],
                )
            } else {
                (
                    State::Done {
                        site,
                        aborted: None,
                    },
                    vec![Directive::Finish],
                )
            }
        }

        (state, Event::SessionLost { reason }) => (
            State::Done {
                site: state.site(),
                aborted: Some(reason.clone()),
            },
            vec![Directive::Log {
                message: format!("Session lost: {}", reason),
            }],
        ),

        (state, event) => {
            let reason = format!("Invalid transition: {:?} with event {:?}", state, event);
            (
                State::Done {
                    site: state.site(),
                    aborted: Some(reason.clone()),
                },
                vec![Directive::Log { message: reason }],
            )
        }
    }
}

fn begin_steps(
    site: SiteChoice,
    total_steps: usize,
    note: Option<String>,
) -> (State, Vec<Directive>) {
    let mut directives: Vec<Directive> = note
        .into_iter()
        .map(|message| Directive::Log { message })
        .collect();
    directives.push(Directive::CaptureBefore);

    if total_steps == 0 {
        directives.push(Directive::Finish);
        return (
            State::Done {
                site,
                aborted: None,
            },
            directives,
        );
    }

    directives.push(Directive::RunStep { index: 0 });
    (
        State::Active {
            site,
            next_step: 0,
            total_steps,
        },
        directives,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed() -> Event {
        Event::SiteFailed {
            reason: "timeout".to_string(),
        }
    }

    #[test]
    fn test_primary_loads() {
        let (state, directives) = transition(State::start(2, true), Event::SiteLoaded);
        assert_eq!(
            state,
            State::Active {
                site: SiteChoice::Primary,
                next_step: 0,
                total_steps: 2
            }
        );
        assert_eq!(
            directives,
            vec![Directive::CaptureBefore, Directive::RunStep { index: 0 }]
        );
    }

    #[test]
    fn test_fallback_switch_happens_once() {
        let (state, directives) = transition(State::start(1, true), failed());
        assert_eq!(state.site(), SiteChoice::Fallback);
        assert!(directives.contains(&Directive::Navigate {
            site: SiteChoice::Fallback
        }));

        // Fallback also fails: steps run there, no switch back
        let (state, directives) = transition(state, failed());
        assert_eq!(
            state,
            State::Active {
                site: SiteChoice::Fallback,
                next_step: 0,
                total_steps: 1
            }
        );
        assert!(!directives
            .iter()
            .any(|d| matches!(d, Directive::Navigate { .. })));
    }

    #[test]
    fn test_no_fallback_configured() {
        let (state, directives) = transition(State::start(1, false), failed());
        assert_eq!(state.site(), SiteChoice::Primary);
        assert!(directives.contains(&Directive::RunStep { index: 0 }));
    }

    #[test]
    fn test_steps_advance_then_finish() {
        let (state, _) = transition(State::start(2, false), Event::SiteLoaded);
        let (state, directives) = transition(state, Event::StepFinished);
        assert_eq!(
            directives,
            vec![Directive::Settle, Directive::RunStep { index: 1 }]
        );

        let (state, directives) = transition(state, Event::StepFinished);
        assert_eq!(
            state,
            State::Done {
                site: SiteChoice::Primary,
                aborted: None
            }
        );
        assert_eq!(directives, vec![Directive::Finish]);
    }

    #[test]
    fn test_zero_steps_finish_immediately() {
        let (state, directives) = transition(State::start(0, false), Event::SiteLoaded);
        assert!(state.is_done());
        assert_eq!(directives, vec![Directive::CaptureBefore, Directive::Finish]);
    }

    #[test]
    fn test_session_loss_aborts() {
        let (state, _) = transition(State::start(3, true), Event::SiteLoaded);
        let (state, _) = transition(
            state,
            Event::SessionLost {
                reason: "tab crashed".to_string(),
            },
        );
        assert_eq!(
            state,
            State::Done {
                site: SiteChoice::Primary,
                aborted: Some("tab crashed".to_string())
            }
        );
    }

    #[test]
    fn test_done_is_terminal() {
        let done = State::Done {
            site: SiteChoice::Fallback,
            aborted: None,
        };
        for event in [Event::SiteLoaded, Event::StepFinished, failed()] {
            let (state, directives) = transition(done.clone(), event);
            assert_eq!(state, done);
            assert!(directives.is_empty());
        }
    }

    #[test]
    fn test_invalid_transition_aborts() {
        let (state, _) = transition(State::start(1, false), Event::StepFinished);
        assert!(matches!(
            state,
            State::Done {
                aborted: Some(_),
                ..
            }
        ));
    }
}
