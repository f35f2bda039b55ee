//! Time-of-week gating.
//!
//! A [`WeeklyRanges`] is an ordered set of minute-of-week intervals; a rule
//! tied to one is only active when `WeeklyRanges::match` is true for *now*.
//! Construction is normally done by whatever loads the surrounding
//! configuration (a [`WeeklyRangesCatalog`] handed to the ruleset loader by
//! reference) — this module only owns the representation and the `match`
//! predicate, plus an optional convenience parser for building a catalog
//! from a compact text spec.
//!
//! ## Minute-of-week
//!
//! `minute_of_week = weekday * 1440 + hour * 60 + minute`, with Monday as
//! day 0 and Sunday as day 6, giving a value in `[0, 10080)`.

use crate::error::WeeklyRangesError;
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use std::collections::HashMap;

pub const MINUTES_PER_WEEK: u16 = 10_080;
pub const MINUTES_PER_DAY: u16 = 1_440;

/// A half-open `[start, end)` minute-of-week interval. `start > end` wraps
/// past the Sunday/Monday boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interval {
    start: u16,
    end: u16,
}

impl Interval {
    fn contains(&self, minute: u16) -> bool {
        if self.start <= self.end {
            minute >= self.start && minute < self.end
        } else {
            minute >= self.start || minute < self.end
        }
    }
}

/// A named set of weekly time-of-day windows.
///
/// Intervals are sorted and non-overlapping after construction; `match` is a
/// pure function of the instant passed in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WeeklyRanges {
    intervals: Vec<Interval>,
}

impl WeeklyRanges {
    /// Build from raw `(start_minute, end_minute)` pairs. Intervals are
    /// sorted by start but intentionally left unmerged: overlap collapsing
    /// is not required for `match` correctness and merging would discard
    /// information useful for diagnostics.
    pub fn new(intervals: Vec<(u16, u16)>) -> Self {
        let mut intervals: Vec<Interval> = intervals
            .into_iter()
            .map(|(start, end)| Interval {
                start: start % MINUTES_PER_WEEK,
                end: end % MINUTES_PER_WEEK,
            })
            .collect();
        intervals.sort_by_key(|i| i.start);
        WeeklyRanges { intervals }
    }

    /// Returns whether `now` (interpreted as local time) falls inside any
    /// configured interval.
    pub fn matches(&self, now: NaiveDateTime) -> bool {
        let minute = minute_of_week(now);
        self.intervals.iter().any(|i| i.contains(minute))
    }

    /// Compact text constructor: comma-separated groups of
    /// `"<days> <HH:MM>-<HH:MM>"`, where `<days>` is a dash-range or
    /// comma-list of weekday abbreviations (`mon`..`sun`), e.g.
    /// `"Mon-Fri 09:00-17:00, Sat 10:00-14:00"`. This is a convenience for
    /// the CLI and tests; it is not part of the core contract and the
    /// catalog itself is normally provided by reference from elsewhere.
    pub fn parse(spec: &str) -> Result<Self, WeeklyRangesError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(WeeklyRangesError::Empty);
        }

        let mut intervals = Vec::new();
        for group in spec.split(',') {
            let group = group.trim();
            if group.is_empty() {
                continue;
            }
            let mut parts = group.split_whitespace();
            let days_tok = parts.next().ok_or_else(|| WeeklyRangesError::BadGroup(group.to_string()))?;
            let time_tok = parts.next().ok_or_else(|| WeeklyRangesError::BadGroup(group.to_string()))?;
            if parts.next().is_some() {
                return Err(WeeklyRangesError::BadGroup(group.to_string()));
            }

            let days = parse_days(days_tok)?;
            let (start_time, end_time) = parse_time_range(time_tok)?;

            for day in days {
                let base = day * MINUTES_PER_DAY;
                intervals.push((base + start_time, base + end_time));
            }
        }

        Ok(WeeklyRanges::new(intervals))
    }
}

fn parse_days(tok: &str) -> Result<Vec<u16>, WeeklyRangesError> {
    fn day_index(s: &str) -> Result<u16, WeeklyRangesError> {
        match s.to_ascii_lowercase().as_str() {
            "mon" => Ok(0),
            "tue" => Ok(1),
            "wed" => Ok(2),
            "thu" => Ok(3),
            "fri" => Ok(4),
            "sat" => Ok(5),
            "sun" => Ok(6),
            other => Err(WeeklyRangesError::BadDay(other.to_string())),
        }
    }

    if let Some((lo, hi)) = tok.split_once('-') {
        let lo = day_index(lo)?;
        let hi = day_index(hi)?;
        if lo <= hi {
            Ok((lo..=hi).collect())
        } else {
            Ok((lo..=6).chain(0..=hi).collect())
        }
    } else {
        tok.split(',').map(day_index).collect()
    }
}

fn parse_time_range(tok: &str) -> Result<(u16, u16), WeeklyRangesError> {
    let (start, end) =
        tok.split_once('-').ok_or_else(|| WeeklyRangesError::BadTime(tok.to_string()))?;
    Ok((parse_hhmm(start)?, parse_hhmm(end)?))
}

fn parse_hhmm(s: &str) -> Result<u16, WeeklyRangesError> {
    let (h, m) = s.split_once(':').ok_or_else(|| WeeklyRangesError::BadTime(s.to_string()))?;
    let h: u16 = h.parse().map_err(|_| WeeklyRangesError::BadTime(s.to_string()))?;
    let m: u16 = m.parse().map_err(|_| WeeklyRangesError::BadTime(s.to_string()))?;
    if h >= 24 || m >= 60 {
        return Err(WeeklyRangesError::BadTime(s.to_string()));
    }
    Ok(h * 60 + m)
}

fn minute_of_week(now: NaiveDateTime) -> u16 {
    let weekday = match now.weekday() {
        Weekday::Mon => 0,
        Weekday::Tue => 1,
        Weekday::Wed => 2,
        Weekday::Thu => 3,
        Weekday::Fri => 4,
        Weekday::Sat => 5,
        Weekday::Sun => 6,
    };
    weekday * MINUTES_PER_DAY + now.hour() as u16 * 60 + now.minute() as u16
}

/// A named catalog of [`WeeklyRanges`], looked up by name when a rule
/// references `@<name>`.
#[derive(Debug, Clone, Default)]
pub struct WeeklyRangesCatalog {
    ranges: HashMap<String, WeeklyRanges>,
}

impl WeeklyRangesCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, ranges: WeeklyRanges) {
        self.ranges.insert(name.into(), ranges);
    }

    pub fn get(&self, name: &str) -> Option<&WeeklyRanges> {
        self.ranges.get(name)
    }
}
