//! Duration text parsing
//!
//! Dashboard durations look like `1h 4m 39s`, `4m 39s` or `45s`. Only the
//! first hour, minute and second component is considered; days are not.

use std::sync::LazyLock;

use regex::Regex;

static HOURS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+)h").unwrap());
// `m` followed by `s` would be a milliseconds unit, not minutes
static MINUTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)m(?:[^s]|$)").unwrap());
static SECONDS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+)s").unwrap());

fn first_component(re: &Regex, text: &str) -> f64 {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Convert duration text to fractional minutes
///
/// Missing components count as zero, so text with no recognisable
/// component (including the empty string) yields `0.0`.
pub fn parse_minutes(text: &str) -> f64 {
    let hours = first_component(&HOURS, text);
    let minutes = first_component(&MINUTES, text);
    let seconds = first_component(&SECONDS, text);
    hours * 60.0 + minutes + seconds / 60.0
}
