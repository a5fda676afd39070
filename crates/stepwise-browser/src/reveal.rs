//! Revealing sign-in forms hidden behind account toggles
//!
//! Many storefront themes keep the login form in a drawer that only opens
//! after clicking an account icon. Before a sign-in click the executor tries
//! the configured triggers once, stopping at the first one that is visible.

use crate::page::Page;
use std::time::Duration;
use stepwise_core::{Result, Selector};
use tracing::{debug, info};

/// Upper bound on how long each trigger is looked for
const TRIGGER_WAIT: Duration = Duration::from_millis(500);

/// True when a click description targets a sign-in or account control
pub fn needs_reveal(description: &str) -> bool {
    let lower = description.to_lowercase();
    ["sign in", "log in", "login", "account"]
        .iter()
        .any(|k| lower.contains(k))
}

/// Click the first visible trigger, then wait `settle`
///
/// Returns the trigger that was clicked. Only a fatal error is returned as
/// `Err`; a missing or unclickable trigger just moves on.
pub async fn reveal_hidden_login(
    page: &dyn Page,
    triggers: &[String],
    wait: Duration,
    settle: Duration,
) -> Result<Option<Selector>> {
    let wait = wait.min(TRIGGER_WAIT);

    for trigger in triggers {
        let selector = Selector::css(trigger.as_str());
        match page.resolve(&selector, wait).await {
            Ok(state) if state.visible => {}
            Ok(_) => continue,
            Err(e) if e.is_fatal() => return Err(e),
            Err(_) => continue,
        }

        match page.click(&selector).await {
            Ok(()) => {
                info!("Clicked account trigger {} to reveal sign-in form", selector);
                tokio::time::sleep(settle).await;
                return Ok(Some(selector));
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("Account trigger {} not clickable: {}", selector, e),
        }
    }

    Ok(None)
}
