//! Node uptime, from the chassis `last-booted` state leaf or, failing that, the
//! container start time.

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use tracing::debug;

use crate::container::Container;

/// Shown when the boot time cannot be determined.
pub const UNKNOWN: &str = "<Unknown>";

const LAST_BOOTED_QUERY: [&str; 7] = [
    "sr_cli", "info", "from", "state", "/platform", "chassis", "last-booted",
];

const TIMESTAMP: &str = r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})";

/// Find the first RFC 3339 timestamp in command output.
///
/// The zero time Docker reports for containers that never started is rejected.
pub fn extract_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let re = Regex::new(TIMESTAMP).ok()?;
    let found = re.find(text)?;
    let parsed = DateTime::parse_from_rfc3339(found.as_str()).ok()?;
    let utc = parsed.with_timezone(&Utc);
    (utc.year() > 1).then_some(utc)
}

/// `"{days} days {hours} hours {minutes} minutes {seconds} seconds"` since `boot`.
/// A boot time in the future reads as zero.
pub fn format_uptime(boot: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total = (now - boot).num_seconds().max(0);
    let days = total / 86_400;
    let rest = total % 86_400;
    let hours = rest / 3600;
    let minutes = (rest % 3600) / 60;
    let seconds = rest % 60;
    format!("{days} days {hours} hours {minutes} minutes {seconds} seconds")
}

pub fn describe(boot: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match boot {
        Some(boot) => format_uptime(boot, now),
        None => UNKNOWN.to_string(),
    }
}

/// Boot time of the node: the `last-booted` state leaf, else the container start time.
pub fn last_booted(container: &Container) -> Option<DateTime<Utc>> {
    match container.exec_capture(&LAST_BOOTED_QUERY) {
        Ok(out) => {
            if let Some(ts) = extract_timestamp(&out) {
                return Some(ts);
            }
            debug!(container = container.name(), "uptime:no last-booted in state output");
        }
        Err(e) => debug!(container = container.name(), error = %e, "uptime:state query failed"),
    }

    match container.started_at() {
        Ok(out) => extract_timestamp(&out),
        Err(e) => {
            debug!(container = container.name(), error = %e, "uptime:inspect failed");
            None
        }
    }
}
