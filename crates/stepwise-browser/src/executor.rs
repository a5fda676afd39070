//! Action execution against a [`Page`]
//!
//! One action is performed exactly once per step. Navigation walks the wait
//! strategies `networkidle` then `domcontentloaded`; clicks and fills walk a
//! [`SelectorPlan`]. Both use the same [`RetryPolicy`] shape, so every
//! fallback is bounded and its attempts are recorded.
//!
//! Failures are reported in the returned [`StepResult`]. Only a lost browser
//! session comes back as `Err`, which the runner treats as scenario-fatal.

use crate::page::Page;
use crate::reveal::{needs_reveal, reveal_hidden_login};
use crate::selector::SelectorPlan;
use std::path::Path;
use std::time::{Duration, Instant};
use stepwise_core::fail_open::fail_open;
use stepwise_core::{
    Action, BrowserSettings, Result, RetryPolicy, Selector, StepResult, StepwiseError,
    WaitStrategy, MAX_WAIT_SECS,
};
use tracing::{debug, info, warn};

/// Timing and reveal settings for the executor
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub navigation_timeout: Duration,
    pub selector_wait: Duration,
    pub settle: Duration,
    pub reveal_triggers: Vec<String>,
}

impl From<&BrowserSettings> for ExecutorSettings {
    fn from(settings: &BrowserSettings) -> Self {
        Self {
            navigation_timeout: settings.navigation_timeout(),
            selector_wait: settings.selector_wait(),
            settle: settings.settle(),
            reveal_triggers: settings.reveal_triggers.clone(),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from(&BrowserSettings::default())
    }
}

enum Interaction<'a> {
    Click,
    Fill(&'a str),
}

/// Performs actions on a page
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    settings: ExecutorSettings,
    navigation: RetryPolicy<WaitStrategy>,
}

impl ActionExecutor {
    pub fn new(settings: ExecutorSettings) -> Self {
        let navigation = RetryPolicy::new(
            vec![WaitStrategy::NetworkIdle, WaitStrategy::DomContentLoaded],
            settings.navigation_timeout,
        )
        .retrying_when(StepwiseError::is_timeout);

        Self {
            settings,
            navigation,
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Execute one action and screenshot the page afterwards
    ///
    /// The returned result carries the action but not the step's index or
    /// source text; the caller attaches those with [`StepResult::for_step`].
    pub async fn execute(
        &self,
        action: Action,
        page: &dyn Page,
        screenshot: &Path,
    ) -> Result<StepResult> {
        let started = Instant::now();
        info!("Executing: {}", action);

        let mut attempted = Vec::new();
        let outcome = self.perform(&action, page, &mut attempted).await;

        let screenshot_path = fail_open("screenshot", || page.screenshot(screenshot))
            .await
            .map(|_| screenshot.to_path_buf());

        let (succeeded, error_message) = match outcome {
            Ok(()) => (true, None),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Action '{}' failed: {}", action, e);
                (false, Some(e.to_string()))
            }
        };

        Ok(StepResult {
            index: 0,
            step_text: action.description().to_string(),
            action: Some(action),
            succeeded,
            error_message,
            screenshot_path,
            attempted_selectors: attempted,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Load `url`, trying each wait strategy in turn
    ///
    /// Relative URLs are joined against the page's current URL.
    pub async fn navigate(&self, page: &dyn Page, url: &str) -> Result<()> {
        let target = absolute_url(page, url).await?;
        let target = target.as_str();

        let run = self
            .navigation
            .run("navigate", move |strategy, timeout| {
                page.navigate(target, strategy, timeout)
            })
            .await;

        match run.result {
            Ok(()) => {
                debug!(
                    "Loaded {} with {:?}",
                    target,
                    run.attempted.last().map(|s| s.to_string())
                );
                Ok(())
            }
            Err(e) if e.is_timeout() => {
                let tried: Vec<String> = run.attempted.iter().map(|s| s.to_string()).collect();
                Err(StepwiseError::NavigationTimeout {
                    url: target.to_string(),
                    detail: format!("tried {}", tried.join(", ")),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn perform(
        &self,
        action: &Action,
        page: &dyn Page,
        attempted: &mut Vec<Selector>,
    ) -> Result<()> {
        match action {
            Action::Click {
                selector,
                description,
            } => {
                if needs_reveal(description) {
                    reveal_hidden_login(
                        page,
                        &self.settings.reveal_triggers,
                        self.settings.selector_wait,
                        self.settings.settle,
                    )
                    .await?;
                }
                self.interact(page, selector, description, Interaction::Click, attempted)
                    .await
            }
            Action::Fill {
                selector,
                value,
                description,
            } => {
                self.interact(page, selector, description, Interaction::Fill(value), attempted)
                    .await
            }
            Action::Navigate { url, .. } => self.navigate(page, url).await,
            Action::Wait { time, .. } => {
                let pause = Duration::try_from_secs_f64(*time)
                    .ok()
                    .filter(|pause| pause.as_secs_f64() <= MAX_WAIT_SECS)
                    .ok_or_else(|| {
                        StepwiseError::Other(format!(
                            "Wait of {}s is outside 0..={}s",
                            time, MAX_WAIT_SECS
                        ))
                    })?;
                tokio::time::sleep(pause).await;
                Ok(())
            }
            Action::Check { text, .. } => check_text(page, text).await,
        }
    }

    /// Resolve a target through the selector plan, then act on the first match
    ///
    /// A match that is not visible is forced visible once; if the action then
    /// fails it is retried a single time.
    async fn interact(
        &self,
        page: &dyn Page,
        raw_selector: &str,
        description: &str,
        interaction: Interaction<'_>,
        attempted: &mut Vec<Selector>,
    ) -> Result<()> {
        let plan = SelectorPlan::build(raw_selector, description);
        let policy = RetryPolicy::new(plan.into_candidates(), self.settings.selector_wait);

        let run = policy
            .run("resolve", move |selector, wait| async move {
                page.resolve(&selector, wait).await
            })
            .await;

        let winner = run.winner().cloned();
        attempted.extend(run.attempted.iter().cloned());

        let (element, selector) = match (run.result, winner) {
            (Ok(element), Some(winner)) => (element, winner),
            (Err(e), _) if e.is_fatal() => return Err(e),
            _ => {
                let tried: Vec<String> = run.attempted.iter().map(|s| s.to_string()).collect();
                return Err(StepwiseError::SelectorResolution {
                    attempted: tried.join(", "),
                });
            }
        };

        let forced = !element.visible;
        if forced {
            info!("{} is hidden; forcing it visible", selector);
            if let Err(e) = page.force_visible(&selector).await {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!("Could not force {} visible: {}", selector, e);
            }
        }

        match act(page, &selector, &interaction).await {
            Err(e) if forced && !e.is_fatal() => {
                warn!("Retrying {} after forced reveal: {}", selector, e);
                act(page, &selector, &interaction).await
            }
            other => other,
        }
    }
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new(ExecutorSettings::default())
    }
}

async fn act(page: &dyn Page, selector: &Selector, interaction: &Interaction<'_>) -> Result<()> {
    match interaction {
        Interaction::Click => page.click(selector).await,
        Interaction::Fill(value) => page.fill(selector, value).await,
    }
}

/// Case-insensitive substring match on the page text; empty text always passes
async fn check_text(page: &dyn Page, text: &str) -> Result<()> {
    let wanted = text.trim();
    if wanted.is_empty() {
        return Ok(());
    }
    let content = page.visible_text().await?;
    if content.to_lowercase().contains(&wanted.to_lowercase()) {
        Ok(())
    } else {
        Err(StepwiseError::TextNotFound(wanted.to_string()))
    }
}

async fn absolute_url(page: &dyn Page, url: &str) -> Result<String> {
    match url::Url::parse(url) {
        Ok(parsed) => Ok(parsed.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let current = page.current_url().await?;
            let base = url::Url::parse(&current).map_err(|e| {
                StepwiseError::Browser(format!(
                    "Cannot resolve relative URL {} against {}: {}",
                    url, current, e
                ))
            })?;
            base.join(url)
                .map(|joined| joined.to_string())
                .map_err(|e| StepwiseError::Browser(format!("Invalid URL {}: {}", url, e)))
        }
        Err(e) => Err(StepwiseError::Browser(format!("Invalid URL {}: {}", url, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MockPage;
    use stepwise_core::SelectorKind;
    use tempfile::TempDir;

    fn executor() -> ActionExecutor {
        ActionExecutor::new(ExecutorSettings {
            navigation_timeout: Duration::from_millis(50),
            selector_wait: Duration::ZERO,
            settle: Duration::ZERO,
            reveal_triggers: vec![".account-trigger".to_string()],
        })
    }

    fn click(selector: &str, description: &str) -> Action {
        Action::Click {
            selector: selector.into(),
            description: description.into(),
        }
    }

    #[tokio::test]
    async fn test_check_is_case_insensitive() {
        let temp = TempDir::new().unwrap();
        let shot = temp.path().join("step.png");
        let page = MockPage::new().with_page("https://example.com/", "Example Domain\nMore info");
        page.navigate("https://example.com/", WaitStrategy::NetworkIdle, Duration::ZERO)
            .await
            .unwrap();

        let found = executor()
            .execute(
                Action::Check {
                    text: "example domain".into(),
                    description: String::new(),
                },
                &page,
                &shot,
            )
            .await
            .unwrap();
        assert!(found.succeeded);
        assert_eq!(found.screenshot_path.as_deref(), Some(shot.as_path()));
        assert!(shot.exists());

        let missing = executor()
            .execute(
                Action::Check {
                    text: "My account".into(),
                    description: String::new(),
                },
                &page,
                &shot,
            )
            .await
            .unwrap();
        assert!(!missing.succeeded);
        assert!(missing.error_message.unwrap().contains("My account"));
    }

    #[tokio::test]
    async fn test_view_always_succeeds() {
        let temp = TempDir::new().unwrap();
        let page = MockPage::new();
        let result = executor()
            .execute(Action::view("look"), &page, &temp.path().join("s.png"))
            .await
            .unwrap();
        assert!(result.succeeded);
        assert!(page.calls().iter().all(|c| c != "visible_text"));
    }

    #[tokio::test]
    async fn test_navigation_falls_back_to_domcontentloaded() {
        let temp = TempDir::new().unwrap();
        let page = MockPage::new().timing_out("https://slow.test/", &[WaitStrategy::NetworkIdle]);

        let result = executor()
            .execute(
                Action::Navigate {
                    url: "https://slow.test/".into(),
                    description: String::new(),
                },
                &page,
                &temp.path().join("s.png"),
            )
            .await
            .unwrap();

        assert!(result.succeeded);
        let navigations: Vec<_> = page
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("navigate"))
            .collect();
        assert_eq!(
            navigations,
            vec![
                "navigate https://slow.test/ networkidle".to_string(),
                "navigate https://slow.test/ domcontentloaded".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_navigation_exhausted_is_step_failure() {
        let temp = TempDir::new().unwrap();
        let page = MockPage::new().unreachable("https://down.test/");

        let result = executor()
            .execute(
                Action::Navigate {
                    url: "https://down.test/".into(),
                    description: String::new(),
                },
                &page,
                &temp.path().join("s.png"),
            )
            .await
            .unwrap();

        assert!(!result.succeeded);
        let message = result.error_message.unwrap();
        assert!(message.contains("networkidle, domcontentloaded"));
    }

    #[tokio::test]
    async fn test_relative_navigation_joins_current_url() {
        let page = MockPage::new();
        page.navigate("https://shop.test/home", WaitStrategy::NetworkIdle, Duration::ZERO)
            .await
            .unwrap();

        executor()
            .navigate(&page, "/account/login")
            .await
            .unwrap();
        assert_eq!(
            page.current_url().await.unwrap(),
            "https://shop.test/account/login"
        );
    }

    #[tokio::test]
    async fn test_click_walks_selector_plan() {
        let temp = TempDir::new().unwrap();
        // Only the text alternate exists on the page
        let page = MockPage::new().with_element(Selector::text("Sign in"));

        let result = executor()
            .execute(
                click("#missing-login", "clicking sign in"),
                &page,
                &temp.path().join("s.png"),
            )
            .await
            .unwrap();

        assert!(result.succeeded);
        let attempted = &result.attempted_selectors;
        assert_eq!(attempted[0], Selector::css("#missing-login"));
        assert_eq!(attempted.last(), Some(&Selector::text("Sign in")));

        // CSS, then XPath, then text: each kind exhausted before the next
        let kinds: Vec<SelectorKind> = attempted.iter().map(|s| s.kind).collect();
        assert!(kinds.windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", kinds);
        let first_xpath = kinds
            .iter()
            .position(|k| *k == SelectorKind::XPath)
            .expect("xpath candidate attempted");
        assert!(first_xpath > 0);
        assert!(first_xpath < attempted.len() - 1);
        assert_eq!(
            attempted[first_xpath],
            Selector::xpath("//a[contains(text(), 'Sign in')]")
        );
        // Nothing after the winner was tried
        assert!(!kinds.contains(&SelectorKind::Aria));
    }

    #[tokio::test]
    async fn test_unresolved_selector_lists_attempts() {
        let temp = TempDir::new().unwrap();
        let page = MockPage::new();

        let result = executor()
            .execute(click(".add-to-cart", "add to cart"), &page, &temp.path().join("s.png"))
            .await
            .unwrap();

        assert!(!result.succeeded);
        assert_eq!(result.attempted_selectors, vec![Selector::css(".add-to-cart")]);
        assert!(result.error_message.unwrap().contains("css:.add-to-cart"));
    }

    #[tokio::test]
    async fn test_hidden_field_is_forced_then_filled() {
        let temp = TempDir::new().unwrap();
        let email = Selector::css("#customer_email");
        let page = MockPage::new().with_hidden_element(email.clone());

        let result = executor()
            .execute(
                Action::Fill {
                    selector: "#customer_email".into(),
                    value: "a@b.co".into(),
                    description: "email".into(),
                },
                &page,
                &temp.path().join("s.png"),
            )
            .await
            .unwrap();

        assert!(result.succeeded);
        assert_eq!(page.filled_value(&email).as_deref(), Some("a@b.co"));
        assert!(page
            .calls()
            .contains(&"force_visible css:#customer_email".to_string()));
    }

    #[tokio::test]
    async fn test_forced_action_retried_once() {
        let temp = TempDir::new().unwrap();
        let button = Selector::css("#go");
        let page = MockPage::new()
            .with_hidden_element(button.clone())
            .flaky_click(button.clone());

        let result = executor()
            .execute(click("#go", "go"), &page, &temp.path().join("s.png"))
            .await
            .unwrap();

        assert!(result.succeeded);
        let clicks = page.calls().iter().filter(|c| *c == "click css:#go").count();
        assert_eq!(clicks, 2);
    }

    #[tokio::test]
    async fn test_sign_in_click_reveals_drawer_first() {
        let temp = TempDir::new().unwrap();
        let page = MockPage::new()
            .with_element(Selector::css(".account-trigger"))
            .with_element(Selector::css("#login-button"));

        let result = executor()
            .execute(click("#login-button", "sign in"), &page, &temp.path().join("s.png"))
            .await
            .unwrap();

        assert!(result.succeeded);
        let clicks: Vec<_> = page
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("click"))
            .collect();
        assert_eq!(
            clicks,
            vec![
                "click css:.account-trigger".to_string(),
                "click css:#login-button".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_session_loss_is_err() {
        let temp = TempDir::new().unwrap();
        let page = MockPage::new().crashing_on(Selector::css("#boom"));

        let err = executor()
            .execute(click("#boom", "boom"), &page, &temp.path().join("s.png"))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_wait_sleeps() {
        let temp = TempDir::new().unwrap();
        let page = MockPage::new();
        let started = Instant::now();

        let result = executor()
            .execute(
                Action::Wait {
                    time: 0.05,
                    description: String::new(),
                },
                &page,
                &temp.path().join("s.png"),
            )
            .await
            .unwrap();

        assert!(result.succeeded);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_out_of_range_wait_fails_step() {
        let temp = TempDir::new().unwrap();
        let page = MockPage::new();
        let started = Instant::now();

        let result = executor()
            .execute(
                Action::Wait {
                    time: 1e20,
                    description: String::new(),
                },
                &page,
                &temp.path().join("s.png"),
            )
            .await
            .unwrap();

        assert!(!result.succeeded);
        assert!(result.error_message.unwrap().contains("outside"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
