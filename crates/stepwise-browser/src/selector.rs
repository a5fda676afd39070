//! Selector planning
//!
//! A single selector from the model is rarely enough on real storefronts.
//! [`SelectorPlan`] turns it, together with the action's description, into an
//! ordered list of candidates: every CSS candidate first, then XPath, then
//! visible text, then accessible label. Within a kind the model's own
//! selector comes first and keyword alternates follow.

use regex::Regex;
use std::sync::OnceLock;
use stepwise_core::{Selector, SelectorKind};

/// Alternates for one family of targets, keyed by description keywords
struct Alternates {
    name: &'static str,
    applies: fn(&str) -> bool,
    css: &'static [&'static str],
    xpath: &'static [&'static str],
    text: &'static [&'static str],
    aria: &'static [&'static str],
}

static ALTERNATES: &[Alternates] = &[
    Alternates {
        name: "sign-in",
        applies: mentions_sign_in,
        css: &[
            "a.account-link",
            "#customer_login_link",
            ".header__action-item-link",
            ".customer-login-link",
            "button.signin-button",
            ".signin",
            ".login-button",
            "#login-button",
        ],
        xpath: &["//a[contains(text(), 'Sign in')]", "//a[contains(text(), 'Login')]"],
        text: &["Sign in", "Log in", "Login"],
        aria: &["Sign in", "Log in"],
    },
    Alternates {
        name: "submit",
        applies: mentions_submit,
        css: &[
            "button[type='submit']",
            "input[type='submit']",
            "#signin-button",
            "#customer_login_submit",
            ".btn-signin",
        ],
        xpath: &[],
        text: &[],
        aria: &[],
    },
    Alternates {
        name: "email",
        applies: mentions_email,
        css: &[
            "input[type='email']",
            "input[name='email']",
            "#email",
            "#customer_email",
            "input[name='customer[email]']",
            "#input-email",
        ],
        xpath: &[],
        text: &[],
        aria: &["Email"],
    },
    Alternates {
        name: "password",
        applies: mentions_password,
        css: &[
            "input[type='password']",
            "input[name='password']",
            "#password",
            "#customer_password",
            "input[name='customer[password]']",
            "#input-password",
        ],
        xpath: &[],
        text: &[],
        aria: &["Password"],
    },
];

fn mentions_sign_in(context: &str) -> bool {
    context.contains("sign in") || context.contains("log in") || context.contains("login")
}

fn mentions_submit(context: &str) -> bool {
    context.contains("submit")
        || (context.contains("button") && (context.contains("sign in") || context.contains("login")))
}

fn mentions_email(context: &str) -> bool {
    context.contains("email") || context.contains("e-mail")
}

fn mentions_password(context: &str) -> bool {
    context.contains("password")
}

fn aria_label_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\[aria-label\s*=\s*['"]([^'"]+)['"]\s*i?\s*\]$"#).expect("valid regex")
    })
}

fn quoted_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"['"]([^'"]{1,60})['"]"#).expect("valid regex"))
}

/// Classify a raw selector string as written by the model
///
/// `text=`, `xpath=` and `aria=` prefixes pick the kind explicitly; a leading
/// `/` or `(/` means XPath; everything else is CSS.
pub fn parse_selector(raw: &str) -> Selector {
    let raw = raw.trim();
    let unquote = |s: &str| s.trim().trim_matches(['\'', '"']).to_string();

    if let Some(rest) = raw.strip_prefix("text=") {
        Selector::text(unquote(rest))
    } else if let Some(rest) = raw.strip_prefix("xpath=") {
        Selector::xpath(rest.trim())
    } else if let Some(rest) = raw.strip_prefix("aria=") {
        Selector::aria(unquote(rest))
    } else if raw.starts_with('/') || raw.starts_with("(/") {
        Selector::xpath(raw)
    } else {
        Selector::css(raw)
    }
}

/// Ordered selector candidates for one click or fill
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorPlan {
    candidates: Vec<Selector>,
}

impl SelectorPlan {
    /// Plan candidates for `raw` (the model's selector) and `description`
    pub fn build(raw: &str, description: &str) -> Self {
        let primary = parse_selector(raw);
        let context = format!("{} {}", description, raw).to_lowercase();

        let mut candidates = vec![primary.clone()];

        // A human-readable label also works as text and accessible-label lookups
        if let Some(label) = label_for(&primary, description) {
            candidates.push(Selector::xpath(format!(
                "//*[self::a or self::button or @role='button'][contains(normalize-space(.), '{}')]",
                label.replace('\'', "")
            )));
            candidates.push(Selector::text(label.clone()));
            candidates.push(Selector::aria(label));
        }

        for family in ALTERNATES.iter().filter(|f| (f.applies)(&context)) {
            tracing::trace!("Adding {} alternates for '{}'", family.name, description);
            candidates.extend(family.css.iter().map(|s| Selector::css(*s)));
            candidates.extend(family.xpath.iter().map(|s| Selector::xpath(*s)));
            candidates.extend(family.text.iter().map(|s| Selector::text(*s)));
            candidates.extend(family.aria.iter().map(|s| Selector::aria(*s)));
        }

        let mut unique: Vec<Selector> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !candidate.value.is_empty() && !unique.contains(&candidate) {
                unique.push(candidate);
            }
        }
        // Stable: keeps insertion order within each kind
        unique.sort_by_key(|s| s.kind);

        Self { candidates: unique }
    }

    pub fn candidates(&self) -> &[Selector] {
        &self.candidates
    }

    pub fn into_candidates(self) -> Vec<Selector> {
        self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Visible label implied by the selector or quoted in the description
fn label_for(primary: &Selector, description: &str) -> Option<String> {
    match primary.kind {
        SelectorKind::Text | SelectorKind::Aria => return Some(primary.value.clone()),
        SelectorKind::Css => {
            if let Some(caps) = aria_label_attr().captures(&primary.value) {
                return caps.get(1).map(|m| m.as_str().to_string());
            }
        }
        SelectorKind::XPath => {}
    }
    quoted_label()
        .captures(description)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(plan: &SelectorPlan) -> Vec<SelectorKind> {
        plan.candidates().iter().map(|s| s.kind).collect()
    }

    #[test]
    fn test_parse_selector_kinds() {
        assert_eq!(parse_selector("#login"), Selector::css("#login"));
        assert_eq!(parse_selector("text='Sign in'"), Selector::text("Sign in"));
        assert_eq!(
            parse_selector("//a[contains(text(), 'Sign in')]"),
            Selector::xpath("//a[contains(text(), 'Sign in')]")
        );
        assert_eq!(parse_selector("xpath=(//button)[1]"), Selector::xpath("(//button)[1]"));
        assert_eq!(parse_selector("aria=Search"), Selector::aria("Search"));
    }

    #[test]
    fn test_kinds_are_grouped_in_order() {
        let plan = SelectorPlan::build("text=Sign in", "clicking the 'Sign in' link");
        let kinds = kinds(&plan);

        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted);
        assert_eq!(kinds.first(), Some(&SelectorKind::Css));
        assert_eq!(kinds.last(), Some(&SelectorKind::Aria));
    }

    #[test]
    fn test_primary_leads_its_kind() {
        let plan = SelectorPlan::build("#customer_email", "email field");
        assert_eq!(plan.candidates()[0], Selector::css("#customer_email"));
        assert!(plan
            .candidates()
            .contains(&Selector::css("input[type='email']")));
        assert!(plan.candidates().contains(&Selector::aria("Email")));
    }

    #[test]
    fn test_no_duplicates() {
        let plan = SelectorPlan::build("input[type='password']", "password field");
        let count = plan
            .candidates()
            .iter()
            .filter(|s| **s == Selector::css("input[type='password']"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_aria_attribute_becomes_label() {
        let plan = SelectorPlan::build("[aria-label='Open cart']", "cart icon");
        assert!(plan.candidates().contains(&Selector::text("Open cart")));
        assert!(plan.candidates().contains(&Selector::aria("Open cart")));
    }

    #[test]
    fn test_unrelated_target_gets_no_keyword_alternates() {
        let plan = SelectorPlan::build(".add-to-cart", "add to cart");
        assert_eq!(plan.candidates(), &[Selector::css(".add-to-cart")]);
    }

    #[test]
    fn test_sign_in_button_gets_submit_alternates() {
        let plan = SelectorPlan::build("text=Sign in", "click sign in button");
        assert!(plan
            .candidates()
            .contains(&Selector::css("button[type='submit']")));
        assert!(plan
            .candidates()
            .contains(&Selector::css("#customer_login_link")));
    }
}
