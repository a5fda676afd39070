//! # stepwise-browser
//!
//! Executes interpreted actions against a browser page.
//!
//! - [`page`]: the `Page`/`PageFactory` seam plus in-memory mocks
//! - [`browser`]: Chrome DevTools Protocol implementation via headless_chrome
//! - [`selector`]: ordered selector candidates (CSS, XPath, text, ARIA)
//! - [`reveal`]: opening account drawers that hide sign-in forms
//! - [`screenshot`]: per-scenario screenshot layout
//! - [`executor`]: performs one action and reports a `StepResult`

pub mod browser;
pub mod executor;
pub mod page;
pub mod reveal;
pub mod screenshot;
pub mod selector;

pub use browser::{BrowserConfig, BrowserLauncher, BrowserSession};
pub use executor::{ActionExecutor, ExecutorSettings};
pub use page::{ElementState, MockElement, MockPage, MockPageFactory, Page, PageFactory};
pub use screenshot::ScreenshotStore;
pub use selector::{parse_selector, SelectorPlan};
