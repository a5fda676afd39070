//! Browser lifecycle management using Chrome DevTools Protocol

use crate::page::{ElementState, Page, PageFactory};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::protocol::cdp::Runtime::RemoteObject;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stepwise_core::{
    BrowserSettings, DeviceProfile, Result, Selector, SelectorKind, StepwiseError, WaitStrategy,
};
use tracing::{debug, info, warn};

/// Messages headless_chrome produces once the tab or its connection is gone
const SESSION_LOST_MARKERS: &[&str] = &[
    "connection is closed",
    "underlying connection",
    "target closed",
    "target crashed",
    "no target with given id",
    "session closed",
];

/// Quiet window after which the network counts as idle
const NETWORK_QUIET: Duration = Duration::from_millis(500);
const NETWORK_POLL: Duration = Duration::from_millis(100);

/// Keeps the DevTools connection open through long waits between steps
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(300);

const IS_VISIBLE_JS: &str = r#"function() {
    const style = window.getComputedStyle(this);
    const rect = this.getBoundingClientRect();
    return style.display !== 'none'
        && style.visibility !== 'hidden'
        && parseFloat(style.opacity || '1') > 0
        && rect.width > 0 && rect.height > 0;
}"#;

const FORCE_VISIBLE_JS: &str = r#"function() {
    let node = this;
    while (node && node.style) {
        const style = window.getComputedStyle(node);
        if (style.display === 'none') node.style.display = 'block';
        if (style.visibility === 'hidden') node.style.visibility = 'visible';
        if (parseFloat(style.opacity || '1') === 0) node.style.opacity = '1';
        node = node.parentElement;
    }
    this.removeAttribute('disabled');
    this.removeAttribute('aria-hidden');
    this.scrollIntoView({block: 'center'});
    return true;
}"#;

const CLEAR_VALUE_JS: &str = r#"function() { this.value = ''; return true; }"#;

const NETWORK_PROBE_JS: &str =
    "JSON.stringify([document.readyState, performance.getEntriesByType('resource').length])";

const BODY_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode (default: true)
    pub headless: bool,
    /// Initial window size and user agent
    pub device: DeviceProfile,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            device: DeviceProfile::default(),
        }
    }
}

impl From<&BrowserSettings> for BrowserConfig {
    fn from(settings: &BrowserSettings) -> Self {
        Self {
            headless: settings.headless,
            device: settings.device.clone(),
        }
    }
}

/// Map a headless_chrome error, promoting lost sessions to `SessionFatal`
fn classify(err: anyhow::Error, otherwise: impl FnOnce(String) -> StepwiseError) -> StepwiseError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if SESSION_LOST_MARKERS.iter().any(|m| lower.contains(m)) {
        StepwiseError::SessionFatal(message)
    } else {
        otherwise(message)
    }
}

fn browser_error(context: &str) -> impl FnOnce(String) -> StepwiseError + '_ {
    move |message| StepwiseError::Browser(format!("{}: {}", context, message))
}

/// XPath string literal for arbitrary text
fn xpath_literal(text: &str) -> String {
    if !text.contains('"') {
        format!("\"{}\"", text)
    } else if !text.contains('\'') {
        format!("'{}'", text)
    } else {
        let parts: Vec<String> = text.split('"').map(|p| format!("\"{}\"", p)).collect();
        format!("concat({})", parts.join(", '\"', "))
    }
}

/// Deepest element whose rendered text contains `text`
pub(crate) fn text_xpath(text: &str) -> String {
    let literal = xpath_literal(text.trim());
    format!(
        "//*[not(self::script) and not(self::style)][contains(normalize-space(.), {lit})]\
         [not(.//*[contains(normalize-space(.), {lit})])]",
        lit = literal
    )
}

/// Case-insensitive accessible-label match
pub(crate) fn aria_css(label: &str) -> String {
    let escaped = label.trim().replace('\\', "\\\\").replace('"', "\\\"");
    format!("[aria-label=\"{}\" i]", escaped)
}

/// Active browser session with Chrome DevTools Protocol
pub struct BrowserSession {
    /// Underlying browser instance (kept alive for tab lifetime)
    #[allow(dead_code)]
    browser: Browser,
    /// Current active tab
    tab: Arc<Tab>,
}

/// Mirror the page's console output and network traffic into the debug log
fn forward_page_events(tab: &Tab) -> anyhow::Result<()> {
    tab.enable_log()?.enable_runtime()?;

    tab.register_response_handling(
        "stepwise-response-log",
        Box::new(|params, _body| {
            debug!("Response: {} {}", params.response.status, params.response.url);
        }),
    )?;

    tab.add_event_listener(Arc::new(|event: &Event| match event {
        Event::RuntimeConsoleAPICalled(called) => {
            let args: Vec<String> = called.params.args.iter().map(console_arg).collect();
            debug!("Browser console: {}", args.join(" "));
        }
        Event::LogEntryAdded(added) => debug!("Browser log: {}", added.params.entry.text),
        Event::NetworkRequestWillBeSent(sent) => {
            debug!("Request: {} {}", sent.params.request.method, sent.params.request.url);
        }
        _ => {}
    }))?;

    Ok(())
}

/// Console argument as the devtools console would print it
fn console_arg(arg: &RemoteObject) -> String {
    match (&arg.value, &arg.description) {
        (Some(serde_json::Value::String(text)), _) => text.clone(),
        (Some(value), _) => value.to_string(),
        (None, Some(description)) => description.clone(),
        (None, None) => String::new(),
    }
}

impl BrowserSession {
    /// Launch browser with custom configuration
    pub async fn launch_with_config(config: &BrowserConfig) -> Result<Self> {
        info!(
            "Launching browser (headless: {}, device: {} {}x{})",
            config.headless, config.device.name, config.device.width, config.device.height
        );

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.device.width, config.device.height)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| StepwiseError::Browser(format!("Failed to launch browser: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| StepwiseError::Browser(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| StepwiseError::Browser(format!("Failed to create tab: {}", e)))?;

        if let Err(e) = forward_page_events(&tab) {
            warn!("Page console and network logging unavailable: {}", e);
        }

        info!("Browser launched successfully");

        Ok(Self { browser, tab })
    }

    /// Get reference to the active tab
    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    fn find(&self, selector: &Selector, wait: Duration) -> Result<Element<'_>> {
        let found = match selector.kind {
            SelectorKind::Css => self
                .tab
                .wait_for_element_with_custom_timeout(&selector.value, wait),
            SelectorKind::XPath => self
                .tab
                .wait_for_xpath_with_custom_timeout(&selector.value, wait),
            SelectorKind::Text => self
                .tab
                .wait_for_xpath_with_custom_timeout(&text_xpath(&selector.value), wait),
            SelectorKind::Aria => self
                .tab
                .wait_for_element_with_custom_timeout(&aria_css(&selector.value), wait),
        };

        found.map_err(|e| {
            classify(e, |_| StepwiseError::SelectorResolution {
                attempted: selector.to_string(),
            })
        })
    }

    fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| classify(e, browser_error("JavaScript evaluation failed")))?;
        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }

    /// Poll until the document is complete and no new resources arrive
    async fn wait_for_network_idle(&self, url: &str, deadline: Instant) -> Result<()> {
        let mut last_count: Option<u64> = None;
        let mut quiet_since = Instant::now();

        loop {
            let probe = self.evaluate(NETWORK_PROBE_JS)?;
            let (ready, count) = probe
                .as_str()
                .and_then(|s| serde_json::from_str::<(String, u64)>(s).ok())
                .unwrap_or_default();

            if last_count != Some(count) {
                last_count = Some(count);
                quiet_since = Instant::now();
            } else if ready == "complete" && quiet_since.elapsed() >= NETWORK_QUIET {
                debug!("Network idle on {} after {} resources", url, count);
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(StepwiseError::NavigationTimeout {
                    url: url.to_string(),
                    detail: format!("networkidle not reached (readyState {})", ready),
                });
            }
            tokio::time::sleep(NETWORK_POLL).await;
        }
    }
}

#[async_trait]
impl Page for BrowserSession {
    async fn navigate(&self, url: &str, wait: WaitStrategy, timeout: Duration) -> Result<()> {
        debug!("Navigating to {} (wait: {}, timeout: {:?})", url, wait, timeout);
        let deadline = Instant::now() + timeout;

        self.tab.set_default_timeout(timeout);
        self.tab.navigate_to(url).map_err(|e| {
            classify(e, |message| {
                StepwiseError::Browser(format!("Failed to navigate to {}: {}", url, message))
            })
        })?;

        self.tab.wait_until_navigated().map_err(|e| {
            let timed_out = e.downcast_ref::<headless_chrome::util::Timeout>().is_some();
            classify(e, |message| {
                if timed_out {
                    StepwiseError::NavigationTimeout {
                        url: url.to_string(),
                        detail: format!("{} not reached: {}", wait, message),
                    }
                } else {
                    StepwiseError::Browser(format!("Navigation to {} failed: {}", url, message))
                }
            })
        })?;

        if wait == WaitStrategy::NetworkIdle {
            self.wait_for_network_idle(url, deadline).await?;
        }

        info!("Successfully navigated to {}", url);
        Ok(())
    }

    async fn resolve(&self, selector: &Selector, wait: Duration) -> Result<ElementState> {
        let element = self.find(selector, wait)?;
        let visible = element
            .call_js_fn(IS_VISIBLE_JS, vec![], false)
            .map_err(|e| classify(e, browser_error("Visibility check failed")))?
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        debug!("Resolved {} (visible: {})", selector, visible);
        Ok(ElementState { visible })
    }

    async fn click(&self, selector: &Selector) -> Result<()> {
        let element = self.find(selector, Duration::ZERO)?;
        element
            .click()
            .map_err(|e| classify(e, browser_error("Click failed")))?;
        Ok(())
    }

    async fn fill(&self, selector: &Selector, value: &str) -> Result<()> {
        let element = self.find(selector, Duration::ZERO)?;
        element
            .call_js_fn(CLEAR_VALUE_JS, vec![], false)
            .map_err(|e| classify(e, browser_error("Clearing field failed")))?;
        element
            .type_into(value)
            .map_err(|e| classify(e, browser_error("Typing failed")))?;
        Ok(())
    }

    async fn force_visible(&self, selector: &Selector) -> Result<()> {
        let element = self.find(selector, Duration::ZERO)?;
        element
            .call_js_fn(FORCE_VISIBLE_JS, vec![], false)
            .map_err(|e| classify(e, browser_error("Forcing visibility failed")))?;
        Ok(())
    }

    async fn visible_text(&self) -> Result<String> {
        let value = self.evaluate(BODY_TEXT_JS)?;
        Ok(value.as_str().unwrap_or("").to_string())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn title(&self) -> Result<String> {
        self.tab
            .get_title()
            .map_err(|e| classify(e, browser_error("Reading title failed")))
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let data = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| classify(e, browser_error("Screenshot failed")))?;
        tokio::fs::write(path, &data).await?;
        debug!("Screenshot saved: {} ({} bytes)", path.display(), data.len());
        Ok(())
    }

    async fn set_viewport(&self, device: &DeviceProfile) -> Result<()> {
        if let Some(ref user_agent) = device.user_agent {
            self.tab
                .set_user_agent(user_agent, None, None)
                .map_err(|e| classify(e, browser_error("Setting user agent failed")))?;
        }
        self.tab
            .set_bounds(Bounds::Normal {
                left: Some(0),
                top: Some(0),
                width: Some(device.width as f64),
                height: Some(device.height as f64),
            })
            .map_err(|e| classify(e, browser_error("Resizing window failed")))?;
        debug!("Viewport set to {} ({}x{})", device.name, device.width, device.height);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        info!("Closing browser tab");
        if let Err(e) = self.tab.close(true) {
            warn!("Tab close reported an error: {}", e);
        }
        Ok(())
    }
}

/// Launches one Chrome instance per scenario
#[derive(Debug, Clone, Default)]
pub struct BrowserLauncher {
    config: BrowserConfig,
}

impl BrowserLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PageFactory for BrowserLauncher {
    async fn open(&self) -> Result<Box<dyn Page>> {
        let session = BrowserSession::launch_with_config(&self.config).await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let settings = BrowserSettings {
            headless: false,
            device: DeviceProfile::desktop(),
            ..BrowserSettings::default()
        };
        let config = BrowserConfig::from(&settings);

        assert!(!config.headless);
        assert_eq!(config.device.width, 1920);
        assert_eq!(config.device.height, 1080);
    }

    #[test]
    fn test_default_config_is_mobile() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert_eq!(config.device, DeviceProfile::mobile());
    }

    #[test]
    fn test_session_loss_is_fatal() {
        let err = classify(
            anyhow::anyhow!("Unable to make method calls because underlying connection is closed"),
            browser_error("Click failed"),
        );
        assert!(err.is_fatal());

        let err = classify(anyhow::anyhow!("Node is detached"), browser_error("Click failed"));
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("Click failed"));
    }

    #[test]
    fn test_text_xpath_quoting() {
        assert!(text_xpath("Sign in").contains("\"Sign in\""));
        assert!(text_xpath("Say \"hi\"").contains("'Say \"hi\"'"));
        assert!(text_xpath("it's \"x\"").contains("concat("));
    }

    #[test]
    fn test_aria_css() {
        assert_eq!(aria_css("Sign in"), "[aria-label=\"Sign in\" i]");
        assert_eq!(aria_css("a\"b"), "[aria-label=\"a\\\"b\" i]");
    }

    #[test]
    fn test_console_arg_formatting() {
        let object = |json| serde_json::from_value::<RemoteObject>(json).unwrap();

        let text = object(serde_json::json!({"type": "string", "value": "cart updated"}));
        assert_eq!(console_arg(&text), "cart updated");

        let number = object(serde_json::json!({"type": "number", "value": 3}));
        assert_eq!(console_arg(&number), "3");

        let element = object(serde_json::json!({
            "type": "object",
            "subtype": "node",
            "description": "div#login"
        }));
        assert_eq!(console_arg(&element), "div#login");
    }
}
