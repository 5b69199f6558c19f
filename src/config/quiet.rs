//! Quiet-time scheduling windows.
//!
//! The `crawler.quiet_time` config option holds a comma separated list of
//! window specifications. Each one is either a clock-time range that recurs
//! daily (and may wrap past midnight), a single `YYYY.MMDD` calendar date,
//! or a weekday name (any unambiguous fragment of one). A timestamp is
//! "quiet" when it falls inside any window in the list, and the crawler
//! suspends work for quiet timestamps.
//!
//! ```text
//! 17:00-19:00      5pm to 7pm, every day
//! 20:00-03:00      8pm to the following 3am, every day
//! sat              00:00:00 to 23:59:59 every Saturday
//! 2014.0723        00:00:00 to 23:59:59 on 2014.0723
//! 14:00-17:00,fri  2pm to 5pm daily, and all day Friday
//! ```

use std::sync::LazyLock;

use log::warn;
use regex::Regex;

use crate::error_handling::ConfigError;
use crate::util;
use crate::util::DAY;

/// Last second of a day, as an offset from midnight (23:59:59).
const DAY_END: i64 = DAY - 1;

const WEEKDAY_NAMES: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

static CLOCK_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+):(\d+)").expect("valid clock regex"));

/// The recurrence rule for one quiet window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowRule {
    /// A clock-time interval recurring every day. Bounds are seconds into
    /// the day; `low > high` means the window wraps past midnight, and
    /// `low == high` is a degenerate single-instant window.
    DailyRange { low: i64, high: i64 },
    /// One full calendar day, non-recurring. `base` is the epoch of local
    /// midnight on that day.
    OneShotDate { base: i64 },
    /// One full weekday, every week. 0 = Monday .. 6 = Sunday.
    WeeklyDay { wday: u32 },
}

/// One parsed quiet window: the rule plus the text it came from.
#[derive(Debug, Clone)]
pub struct WindowSpec {
    raw: String,
    rule: WindowRule,
}

impl WindowSpec {
    /// Parse one trimmed, comma-free specification token. Grammars are
    /// tried in order -- weekday fragment, calendar date, clock range --
    /// and the first match wins.
    pub fn parse(token: &str) -> Result<Self, ConfigError> {
        let lowered = token.to_lowercase();
        let wday_hits: Vec<u32> = WEEKDAY_NAMES
            .iter()
            .enumerate()
            .filter(|(_, name)| name.contains(&lowered))
            .map(|(idx, _)| idx as u32)
            .collect();
        match wday_hits.len() {
            1 => {
                return Ok(WindowSpec {
                    raw: token.to_string(),
                    rule: WindowRule::WeeklyDay { wday: wday_hits[0] },
                })
            }
            0 => {}
            // fragment like "s" names several days; refuse to guess
            _ => return Err(ConfigError::BadQuietTimeSpec(token.to_string())),
        }

        if let Ok(date) = chrono::NaiveDate::parse_from_str(token, "%Y.%m%d") {
            let base = util::local_epoch(date.and_time(chrono::NaiveTime::MIN));
            return Ok(WindowSpec {
                raw: token.to_string(),
                rule: WindowRule::OneShotDate { base },
            });
        }

        let mut bounds = Vec::new();
        for caps in CLOCK_RX.captures_iter(token) {
            let hh: i64 = caps[1]
                .parse()
                .map_err(|_| ConfigError::BadQuietTimeSpec(token.to_string()))?;
            let mm: i64 = caps[2]
                .parse()
                .map_err(|_| ConfigError::BadQuietTimeSpec(token.to_string()))?;
            bounds.push(hh * 3600 + mm * 60);
        }
        if let [low, high] = bounds[..] {
            return Ok(WindowSpec {
                raw: token.to_string(),
                rule: WindowRule::DailyRange { low, high },
            });
        }

        Err(ConfigError::BadQuietTimeSpec(token.to_string()))
    }

    /// The original specification text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The parsed recurrence rule.
    pub fn rule(&self) -> &WindowRule {
        &self.rule
    }

    /// True when *when* (epoch seconds) falls inside this window. All
    /// boundary comparisons are inclusive on both ends.
    pub fn matches(&self, when: i64) -> bool {
        match self.rule {
            WindowRule::OneShotDate { base } => base <= when && when <= base + DAY_END,

            WindowRule::WeeklyDay { wday } => util::weekday(when) == wday,

            WindowRule::DailyRange { low, high } => {
                let db = util::daybase(when);
                let low_abs = db + low;
                let high_abs = db + high;
                let day_end = db + DAY;
                if low < high {
                    // right side up
                    low_abs <= when && when <= high_abs
                } else if high < low {
                    // wraps past midnight: the head of today's window plus
                    // the tail of yesterday's
                    (db <= when && when <= high_abs) || (low_abs <= when && when <= day_end)
                } else {
                    warn!(
                        "in time spec '{}', the times are equal so the interval \
                         is almost empty; this may not be what you intended",
                        self.raw
                    );
                    when == low_abs
                }
            }
        }
    }
}

/// An immutable, ordered set of quiet windows built from one configuration
/// string. Rebuilding after a config change produces a fresh set; a failed
/// build never leaves a partial one behind.
#[derive(Debug, Clone, Default)]
pub struct QuietWindowSet {
    windows: Vec<WindowSpec>,
    source: String,
}

impl QuietWindowSet {
    /// Parse a comma separated specification string. Empty tokens are
    /// skipped; an empty or all-whitespace string yields an empty set that
    /// is never quiet. Any unparsable token fails the whole build.
    pub fn build(spec_text: &str) -> Result<Self, ConfigError> {
        let mut windows = Vec::new();
        for token in util::csv_list(spec_text) {
            if token.is_empty() {
                continue;
            }
            windows.push(WindowSpec::parse(&token)?);
        }
        Ok(QuietWindowSet {
            windows,
            source: spec_text.to_string(),
        })
    }

    /// True when *when* (epoch seconds) falls inside any window in the set.
    pub fn is_quiet(&self, when: i64) -> bool {
        self.windows.iter().any(|w| w.matches(when))
    }

    /// The specification text this set was built from, used as the cache
    /// key when deciding whether a rebuild is needed.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed windows, in specification order.
    pub fn windows(&self) -> &[WindowSpec] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
