//! Inactive test detection.

use crate::config::{InactivitySettings, NotifySettings};
use crate::model::MICROS_PER_DAY;
use crate::notify::html::{self, HtmlBody};
use chrono_tz::Tz;

/// True iff `min ≤ now − last_run < max`.
///
/// The upper bound stops daily reminders for tests that were retired for good.
pub fn is_inactive(last_run_us: i64, now_us: i64, settings: &InactivitySettings) -> bool {
    let diff = now_us.saturating_sub(last_run_us);
    diff >= settings.min_us() && diff < settings.max_us()
}

pub fn subject(test_name: &str, settings: &NotifySettings) -> String {
    html::with_prefix(
        settings.subject_prefix.as_deref(),
        format!("Inactive test: {test_name}"),
    )
}

pub fn html(test_name: &str, last_run_us: i64, now_us: i64, settings: &NotifySettings, tz: Tz) -> String {
    let idle_days = now_us.saturating_sub(last_run_us) / MICROS_PER_DAY;
    let mut body = HtmlBody::new();
    body.heading(&format!("Inactive test: {test_name}"));
    body.paragraph(&format!(
        "No runs have been recorded for {idle_days} day(s). Last run started {}.",
        crate::time::format_us(last_run_us, tz)
    ));
    if let Some(url) = &settings.dashboard_url {
        body.link(&html::test_link(url, test_name), "View on dashboard");
    }
    body.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(days: f64) -> bool {
        let diff = (days * MICROS_PER_DAY as f64) as i64;
        is_inactive(1_000, 1_000 + diff, &InactivitySettings::default())
    }

    #[test]
    fn window_bounds() {
        assert!(at(1.0));
        assert!(at(7.99));
        assert!(!at(0.99));
        assert!(!at(8.0));
    }

    #[test]
    fn future_run_is_active() {
        assert!(!is_inactive(10 * MICROS_PER_DAY, 0, &InactivitySettings::default()));
    }

    #[test]
    fn bounds_follow_settings() {
        let s = InactivitySettings {
            min_days: 2,
            max_days: 3,
        };
        assert!(!is_inactive(0, MICROS_PER_DAY, &s));
        assert!(is_inactive(0, 2 * MICROS_PER_DAY, &s));
        assert!(!is_inactive(0, 3 * MICROS_PER_DAY, &s));
    }
}
