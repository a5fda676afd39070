//! The page seam between the executor and a live browser
//!
//! [`Page`] is everything the executor and runner need from a browser tab.
//! The Chrome-backed implementation lives in [`crate::browser`];
//! [`MockPage`] is an in-memory page for tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stepwise_core::{DeviceProfile, Result, Selector, StepwiseError, WaitStrategy};

/// What resolving a selector found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementState {
    pub visible: bool,
}

/// Operations on one browser page
#[async_trait]
pub trait Page: Send + Sync {
    /// Load `url` and wait for `wait`, giving up after `timeout`
    async fn navigate(&self, url: &str, wait: WaitStrategy, timeout: Duration) -> Result<()>;

    /// Wait up to `wait` for an element matching `selector`
    async fn resolve(&self, selector: &Selector, wait: Duration) -> Result<ElementState>;

    async fn click(&self, selector: &Selector) -> Result<()>;

    /// Replace the element's current value with `value`
    async fn fill(&self, selector: &Selector, value: &str) -> Result<()>;

    /// Make a resolved but hidden element displayable and interactive
    async fn force_visible(&self, selector: &Selector) -> Result<()>;

    /// Rendered text of the whole document
    async fn visible_text(&self) -> Result<String>;

    async fn current_url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    /// Write a PNG of the viewport to `path`
    async fn screenshot(&self, path: &Path) -> Result<()>;

    async fn set_viewport(&self, device: &DeviceProfile) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Opens a fresh, isolated page per scenario
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Page>>;
}

/// Scripted element on a [`MockPage`]
#[derive(Debug, Clone, Default)]
pub struct MockElement {
    pub visible: bool,
    /// URL the page moves to when the element is clicked
    pub navigates_to: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    url: String,
    text: String,
    closed: bool,
    calls: Vec<String>,
    filled: HashMap<Selector, String>,
    forced: HashSet<Selector>,
    viewport: Option<DeviceProfile>,
}

/// In-memory page for testing
///
/// Elements, page texts and navigation failures are scripted up front;
/// every call is recorded and can be inspected with [`MockPage::calls`].
#[derive(Debug, Default)]
pub struct MockPage {
    elements: HashMap<Selector, MockElement>,
    pages: HashMap<String, String>,
    timeouts: HashMap<String, Vec<WaitStrategy>>,
    unreachable: HashSet<String>,
    crash_on: Option<Selector>,
    /// Clicks that fail the first time even on a visible element
    flaky_once: Mutex<HashSet<Selector>>,
    state: Mutex<MockState>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Visible element
    pub fn with_element(mut self, selector: Selector) -> Self {
        self.elements.insert(
            selector,
            MockElement {
                visible: true,
                navigates_to: None,
            },
        );
        self
    }

    /// Element that resolves but is not displayed
    pub fn with_hidden_element(mut self, selector: Selector) -> Self {
        self.elements.insert(selector, MockElement::default());
        self
    }

    /// Visible element whose click loads another page
    pub fn with_link(mut self, selector: Selector, url: &str) -> Self {
        self.elements.insert(
            selector,
            MockElement {
                visible: true,
                navigates_to: Some(url.to_string()),
            },
        );
        self
    }

    /// Text shown once `url` is loaded
    pub fn with_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }

    /// Navigation to `url` times out under each of `strategies`
    pub fn timing_out(mut self, url: &str, strategies: &[WaitStrategy]) -> Self {
        self.timeouts.insert(url.to_string(), strategies.to_vec());
        self
    }

    /// Navigation to `url` times out under every strategy
    pub fn unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }

    /// Interacting with `selector` kills the session
    pub fn crashing_on(mut self, selector: Selector) -> Self {
        self.crash_on = Some(selector);
        self
    }

    /// The first click on `selector` fails
    pub fn flaky_click(self, selector: Selector) -> Self {
        if let Ok(mut flaky) = self.flaky_once.lock() {
            flaky.insert(selector);
        }
        self
    }

    /// Every call made so far, e.g. `"click css:#login"`
    pub fn calls(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(false)
    }

    pub fn filled_value(&self, selector: &Selector) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.filled.get(selector).cloned())
    }

    pub fn viewport(&self) -> Option<DeviceProfile> {
        self.state.lock().ok().and_then(|s| s.viewport.clone())
    }

    fn record(&self, call: String) -> Result<std::sync::MutexGuard<'_, MockState>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StepwiseError::Browser("mock page state poisoned".to_string()))?;
        if state.closed {
            return Err(StepwiseError::SessionFatal(
                "page already closed".to_string(),
            ));
        }
        state.calls.push(call);
        Ok(state)
    }

    fn check_crash(&self, selector: &Selector) -> Result<()> {
        if self.crash_on.as_ref() == Some(selector) {
            return Err(StepwiseError::SessionFatal(format!(
                "target crashed while handling {}",
                selector
            )));
        }
        Ok(())
    }

    fn interactable(&self, state: &MockState, selector: &Selector) -> Result<&MockElement> {
        let element = self
            .elements
            .get(selector)
            .ok_or_else(|| StepwiseError::SelectorResolution {
                attempted: selector.to_string(),
            })?;
        if !element.visible && !state.forced.contains(selector) {
            return Err(StepwiseError::Browser(format!(
                "element {} is not interactable",
                selector
            )));
        }
        Ok(element)
    }

    fn load(&self, state: &mut MockState, url: &str) {
        state.url = url.to_string();
        state.text = self.pages.get(url).cloned().unwrap_or_default();
        state.forced.clear();
    }
}

#[async_trait]
impl Page for MockPage {
    async fn navigate(&self, url: &str, wait: WaitStrategy, timeout: Duration) -> Result<()> {
        let mut state = self.record(format!("navigate {} {}", url, wait))?;

        let times_out = self.unreachable.contains(url)
            || self
                .timeouts
                .get(url)
                .is_some_and(|strategies| strategies.contains(&wait));
        if times_out {
            return Err(StepwiseError::NavigationTimeout {
                url: url.to_string(),
                detail: format!("{} not reached within {:?}", wait, timeout),
            });
        }

        self.load(&mut state, url);
        Ok(())
    }

    async fn resolve(&self, selector: &Selector, _wait: Duration) -> Result<ElementState> {
        let state = self.record(format!("resolve {}", selector))?;
        self.check_crash(selector)?;
        match self.elements.get(selector) {
            Some(element) => Ok(ElementState {
                visible: element.visible || state.forced.contains(selector),
            }),
            None => Err(StepwiseError::SelectorResolution {
                attempted: selector.to_string(),
            }),
        }
    }

    async fn click(&self, selector: &Selector) -> Result<()> {
        let mut state = self.record(format!("click {}", selector))?;
        self.check_crash(selector)?;
        let target = self.interactable(&state, selector)?.navigates_to.clone();

        let flaked = self
            .flaky_once
            .lock()
            .map(|mut flaky| flaky.remove(selector))
            .unwrap_or(false);
        if flaked {
            return Err(StepwiseError::Browser(format!(
                "click on {} was intercepted",
                selector
            )));
        }

        if let Some(url) = target {
            self.load(&mut state, &url);
        }
        Ok(())
    }

    async fn fill(&self, selector: &Selector, value: &str) -> Result<()> {
        let mut state = self.record(format!("fill {}", selector))?;
        self.check_crash(selector)?;
        self.interactable(&state, selector)?;
        state.filled.insert(selector.clone(), value.to_string());
        Ok(())
    }

    async fn force_visible(&self, selector: &Selector) -> Result<()> {
        let mut state = self.record(format!("force_visible {}", selector))?;
        if !self.elements.contains_key(selector) {
            return Err(StepwiseError::SelectorResolution {
                attempted: selector.to_string(),
            });
        }
        state.forced.insert(selector.clone());
        Ok(())
    }

    async fn visible_text(&self) -> Result<String> {
        let state = self.record("visible_text".to_string())?;
        Ok(state.text.clone())
    }

    async fn current_url(&self) -> Result<String> {
        let state = self.record("current_url".to_string())?;
        Ok(state.url.clone())
    }

    async fn title(&self) -> Result<String> {
        let state = self.record("title".to_string())?;
        Ok(state.text.lines().next().unwrap_or_default().to_string())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        drop(self.record(format!("screenshot {}", path.display()))?);
        tokio::fs::write(path, b"mock-png").await?;
        Ok(())
    }

    async fn set_viewport(&self, device: &DeviceProfile) -> Result<()> {
        let mut state = self.record(format!("set_viewport {}", device.name))?;
        state.viewport = Some(device.clone());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.record("close".to_string())?;
        state.closed = true;
        Ok(())
    }
}

#[async_trait]
impl Page for Arc<MockPage> {
    async fn navigate(&self, url: &str, wait: WaitStrategy, timeout: Duration) -> Result<()> {
        self.as_ref().navigate(url, wait, timeout).await
    }

    async fn resolve(&self, selector: &Selector, wait: Duration) -> Result<ElementState> {
        self.as_ref().resolve(selector, wait).await
    }

    async fn click(&self, selector: &Selector) -> Result<()> {
        self.as_ref().click(selector).await
    }

    async fn fill(&self, selector: &Selector, value: &str) -> Result<()> {
        self.as_ref().fill(selector, value).await
    }

    async fn force_visible(&self, selector: &Selector) -> Result<()> {
        self.as_ref().force_visible(selector).await
    }

    async fn visible_text(&self) -> Result<String> {
        self.as_ref().visible_text().await
    }

    async fn current_url(&self) -> Result<String> {
        self.as_ref().current_url().await
    }

    async fn title(&self) -> Result<String> {
        self.as_ref().title().await
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.as_ref().screenshot(path).await
    }

    async fn set_viewport(&self, device: &DeviceProfile) -> Result<()> {
        self.as_ref().set_viewport(device).await
    }

    async fn close(&self) -> Result<()> {
        self.as_ref().close().await
    }
}

/// Hands out scripted pages in order, one per `open`
#[derive(Default)]
pub struct MockPageFactory {
    pages: Mutex<Vec<Arc<MockPage>>>,
    opened: Mutex<Vec<Arc<MockPage>>>,
}

impl MockPageFactory {
    /// Pages are opened in the order given
    pub fn new(pages: Vec<MockPage>) -> Self {
        let mut pages: Vec<Arc<MockPage>> = pages.into_iter().map(Arc::new).collect();
        pages.reverse();
        Self {
            pages: Mutex::new(pages),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Pages handed out so far, in order
    pub fn opened(&self) -> Vec<Arc<MockPage>> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PageFactory for MockPageFactory {
    async fn open(&self) -> Result<Box<dyn Page>> {
        let page = self
            .pages
            .lock()
            .ok()
            .and_then(|mut pages| pages.pop())
            .ok_or_else(|| StepwiseError::Browser("no scripted pages left".to_string()))?;
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(page.clone());
        }
        Ok(Box::new(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_navigation_loads_scripted_text() {
        let page = MockPage::new().with_page("https://example.com", "Example Domain");
        page.navigate(
            "https://example.com",
            WaitStrategy::NetworkIdle,
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(page.current_url().await.unwrap(), "https://example.com");
        assert_eq!(page.visible_text().await.unwrap(), "Example Domain");
    }

    #[tokio::test]
    async fn test_timeouts_are_per_strategy() {
        let page = MockPage::new().timing_out("https://slow.test", &[WaitStrategy::NetworkIdle]);
        let err = page
            .navigate("https://slow.test", WaitStrategy::NetworkIdle, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        page.navigate(
            "https://slow.test",
            WaitStrategy::DomContentLoaded,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_hidden_element_needs_forcing() {
        let email = Selector::css("#email");
        let page = MockPage::new().with_hidden_element(email.clone());

        let state = page.resolve(&email, Duration::ZERO).await.unwrap();
        assert!(!state.visible);
        assert!(page.fill(&email, "a@b.co").await.is_err());

        page.force_visible(&email).await.unwrap();
        page.fill(&email, "a@b.co").await.unwrap();
        assert_eq!(page.filled_value(&email).as_deref(), Some("a@b.co"));
    }

    #[tokio::test]
    async fn test_closed_page_rejects_calls() {
        let page = MockPage::new();
        page.close().await.unwrap();
        assert!(page.is_closed());
        assert!(page.current_url().await.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_factory_hands_out_pages_in_order() {
        let factory = MockPageFactory::new(vec![
            MockPage::new().with_page("https://a.test", "A"),
            MockPage::new().with_page("https://a.test", "B"),
        ]);

        for expected in ["A", "B"] {
            let page = factory.open().await.unwrap();
            page.navigate("https://a.test", WaitStrategy::NetworkIdle, Duration::ZERO)
                .await
                .unwrap();
            assert_eq!(page.visible_text().await.unwrap(), expected);
        }
        assert!(factory.open().await.is_err());
        assert_eq!(factory.opened().len(), 2);
    }
}
