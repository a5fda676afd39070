//! Scenario outcome evaluation
//!
//! A scenario passes only when enough steps succeeded AND a positive
//! indicator holds on the final page. Step count alone never passes.

use stepwise_core::{Indicator, OutcomeSettings, StepResult};

/// Characters of final page text kept in the outcome
pub const PREVIEW_CHARS: usize = 200;

/// Pass/fail policy applied to a finished scenario
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeCriteria {
    pub min_success_ratio: f64,
    pub url_indicators: Vec<String>,
    pub url_indicator_keyword: String,
    pub success_phrases: Vec<String>,
}

impl From<&OutcomeSettings> for OutcomeCriteria {
    fn from(settings: &OutcomeSettings) -> Self {
        Self {
            min_success_ratio: settings.min_success_ratio,
            url_indicators: settings.url_indicators.clone(),
            url_indicator_keyword: settings.url_indicator_keyword.clone(),
            success_phrases: settings.success_phrases.clone(),
        }
    }
}

impl Default for OutcomeCriteria {
    fn default() -> Self {
        Self::from(&OutcomeSettings::default())
    }
}

/// Where a scenario started and where it ended up
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalPage<'a> {
    /// URL once the site was opened, before the first step
    pub start_url: &'a str,
    pub final_url: &'a str,
    pub text: &'a str,
}

/// Result of evaluating a finished scenario
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub success_ratio: f64,
    pub matched_indicator: Option<Indicator>,
    pub passed: bool,
}

/// Fraction of steps that succeeded; a scenario with no steps counts as 1.0
pub fn success_ratio(steps: &[StepResult]) -> f64 {
    if steps.is_empty() {
        return 1.0;
    }
    let succeeded = steps.iter().filter(|s| s.succeeded).count();
    succeeded as f64 / steps.len() as f64
}

/// First positive indicator on the final page
///
/// URL markers are checked before page-text phrases. The case's expected
/// output counts as both a URL marker and a phrase. Configured URL markers
/// only apply when the expected output mentions `url_indicator_keyword`.
/// A URL marker must be reached: one already in the start URL never counts.
pub fn find_indicator(
    criteria: &OutcomeCriteria,
    expected_output: &str,
    page: FinalPage<'_>,
) -> Option<Indicator> {
    let expected = expected_output.trim();
    let expected_lower = expected.to_lowercase();
    let start = page.start_url.to_lowercase();
    let url = page.final_url.to_lowercase();
    let text = page.text.to_lowercase();

    let keyword = criteria.url_indicator_keyword.trim().to_lowercase();
    let configured_apply = !keyword.is_empty() && expected_lower.contains(&keyword);

    let url_markers = criteria
        .url_indicators
        .iter()
        .map(String::as_str)
        .filter(|_| configured_apply)
        .chain((!expected.is_empty()).then_some(expected));
    for marker in url_markers {
        let needle = marker.to_lowercase();
        if !needle.is_empty() && url.contains(&needle) && !start.contains(&needle) {
            return Some(Indicator::Url(marker.to_string()));
        }
    }

    let phrases = criteria
        .success_phrases
        .iter()
        .map(String::as_str)
        .chain((!expected.is_empty()).then_some(expected));
    for phrase in phrases {
        if !phrase.is_empty() && text.contains(&phrase.to_lowercase()) {
            return Some(Indicator::Content(phrase.to_string()));
        }
    }

    None
}

/// Evaluate a finished scenario; deterministic over its inputs
pub fn evaluate(
    criteria: &OutcomeCriteria,
    steps: &[StepResult],
    expected_output: &str,
    page: FinalPage<'_>,
) -> Verdict {
    let success_ratio = success_ratio(steps);
    let matched_indicator = find_indicator(criteria, expected_output, page);
    let passed = success_ratio >= criteria.min_success_ratio && matched_indicator.is_some();

    Verdict {
        success_ratio,
        matched_indicator,
        passed,
    }
}

/// Leading characters of the final page text
pub fn content_preview(page_text: &str) -> String {
    page_text.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN: &str = "https://shop.test/index.php?route=account/login";
    const HOME: &str = "https://shop.test/index.php?route=common/home";

    fn steps(succeeded: usize, total: usize) -> Vec<StepResult> {
        (0..total)
            .map(|i| {
                let mut step = StepResult::uninterpreted(i, format!("step {}", i), "x".into());
                step.succeeded = i < succeeded;
                step
            })
            .collect()
    }

    fn criteria(min_success_ratio: f64) -> OutcomeCriteria {
        OutcomeCriteria {
            min_success_ratio,
            ..OutcomeCriteria::default()
        }
    }

    fn page<'a>(start_url: &'a str, final_url: &'a str, text: &'a str) -> FinalPage<'a> {
        FinalPage {
            start_url,
            final_url,
            text,
        }
    }

    #[test]
    fn test_ratio_threshold() {
        let steps = steps(6, 10);
        let landed = page(HOME, "https://shop.test/index.php?route=account/account", "");

        let lenient = evaluate(&criteria(0.5), &steps, "My account page", landed);
        assert!(lenient.passed);
        assert_eq!(lenient.success_ratio, 0.6);
        assert_eq!(
            lenient.matched_indicator,
            Some(Indicator::Url("account".to_string()))
        );

        let strict = evaluate(&criteria(0.8), &steps, "My account page", landed);
        assert!(!strict.passed);
        assert_eq!(strict.matched_indicator, lenient.matched_indicator);
    }

    #[test]
    fn test_all_steps_without_indicator_fails() {
        let verdict = evaluate(
            &criteria(0.5),
            &steps(4, 4),
            "",
            page("https://shop.test/", "https://shop.test/", "Welcome"),
        );
        assert_eq!(verdict.success_ratio, 1.0);
        assert!(!verdict.passed);
    }

    #[test]
    fn test_rejected_login_stays_failed() {
        let verdict = evaluate(
            &criteria(0.5),
            &steps(4, 4),
            "My Account",
            page(
                LOGIN,
                LOGIN,
                "Warning: No match for E-Mail Address and/or Password.",
            ),
        );
        assert_eq!(verdict.matched_indicator, None);
        assert!(!verdict.passed);
    }

    #[test]
    fn test_url_markers_need_account_expectation() {
        let verdict = evaluate(
            &criteria(0.5),
            &steps(1, 1),
            "Order confirmed",
            page(HOME, "https://shop.test/customer/cart", "Your cart is empty"),
        );
        assert_eq!(verdict.matched_indicator, None);
        assert!(!verdict.passed);

        let verdict = evaluate(
            &criteria(0.5),
            &steps(1, 1),
            "Customer account",
            page(HOME, "https://shop.test/customer/cart", "Your cart is empty"),
        );
        assert_eq!(
            verdict.matched_indicator,
            Some(Indicator::Url("customer".to_string()))
        );
    }

    #[test]
    fn test_marker_reached_from_login_counts() {
        // "account" was already in the start URL; "my-account" was not
        let found = find_indicator(
            &criteria(0.5),
            "account",
            page(LOGIN, "https://shop.test/my-account/orders", ""),
        );
        assert_eq!(found, Some(Indicator::Url("my-account".to_string())));
    }

    #[test]
    fn test_disabled_keyword_turns_off_url_markers() {
        let criteria = OutcomeCriteria {
            url_indicator_keyword: String::new(),
            ..criteria(0.5)
        };
        assert_eq!(
            find_indicator(&criteria, "account", page(HOME, "https://shop.test/profile", "")),
            None
        );
    }

    #[test]
    fn test_expected_output_in_page_text() {
        let verdict = evaluate(
            &criteria(0.5),
            &steps(1, 1),
            "Example Domain",
            page(
                "https://example.com/",
                "https://example.com/",
                "EXAMPLE DOMAIN\nThis domain is for use in examples.",
            ),
        );
        assert!(verdict.passed);
        assert_eq!(
            verdict.matched_indicator,
            Some(Indicator::Content("Example Domain".to_string()))
        );
    }

    #[test]
    fn test_configured_phrase() {
        let criteria = OutcomeCriteria {
            success_phrases: vec!["Logout".to_string()],
            ..criteria(0.5)
        };
        assert_eq!(
            find_indicator(
                &criteria,
                "",
                page("https://shop.test/", "https://shop.test/", "Hello | logout")
            ),
            Some(Indicator::Content("Logout".to_string()))
        );
    }

    #[test]
    fn test_empty_scenario_ratio() {
        assert_eq!(success_ratio(&[]), 1.0);
    }

    #[test]
    fn test_deterministic() {
        let steps = steps(3, 5);
        let landed = page(HOME, "https://x.test/me", "my account");
        let first = evaluate(&criteria(0.5), &steps, "My account", landed);
        for _ in 0..10 {
            assert_eq!(evaluate(&criteria(0.5), &steps, "My account", landed), first);
        }
    }

    #[test]
    fn test_preview_is_char_bounded() {
        let text = "é".repeat(300);
        assert_eq!(content_preview(&text).chars().count(), PREVIEW_CHARS);
        assert_eq!(content_preview("short"), "short");
    }
}
