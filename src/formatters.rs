use chrono::{Local, NaiveDate};
use std::fmt;

use crate::constants::INDEX_SCALE_MAX;
use crate::models::ForecastPeriod;

const BAR_SLOTS: usize = 12;
const TIER_WIDTH: usize = 4;
const EMPTY_SLOT: &str = "\u{2B1C}\u{FE0F}";
const FILLED_SLOTS: [&str; 3] = ["\u{1F7E9}", "\u{1F7E8}", "\u{1F7E5}"];

/// Source of "today" for the message date
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Wall-clock date in the local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Named ranges over the 0-12 pollen index scale, least severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    MediumLow,
    Medium,
    MediumHigh,
    High,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::MediumLow => "Medium-Low",
            Severity::Medium => "Medium",
            Severity::MediumHigh => "Medium-High",
            Severity::High => "High",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Buckets an index on the 12 point scale. Each breakpoint belongs to the
/// bucket above it; anything from 9.6 up, including out-of-range values, is High.
pub fn classify(index: f64) -> Severity {
    match index {
        v if v < 2.4 => Severity::Low,
        v if v < 4.8 => Severity::MediumLow,
        v if v < 7.2 => Severity::Medium,
        v if v < 9.6 => Severity::MediumHigh,
        _ => Severity::High,
    }
}

/// Renders a 12 slot bar with the first `filled` slots colored green, yellow
/// then red in tiers of four. Values past the end of the scale fill the bar.
pub fn render_emoji_bar(filled: usize) -> String {
    let filled = filled.min(BAR_SLOTS);
    (0..BAR_SLOTS)
        .map(|slot| {
            if slot < filled {
                FILLED_SLOTS[slot / TIER_WIDTH]
            } else {
                EMPTY_SLOT
            }
        })
        .collect()
}

/// Index as printed with two decimals, and its value re-read from that text
fn round_to_hundredths(index: f64) -> (String, f64) {
    let printed = format!("{:.2}", index);
    let value = printed.parse().unwrap_or(index);
    (printed, value)
}

/// Number of filled bar slots for an index: its ceiling, kept on the scale
fn filled_slots(index: f64) -> usize {
    // NaN and negatives saturate to 0 in the cast
    index.ceil().clamp(0.0, INDEX_SCALE_MAX) as usize
}

/// Builds the post for today's period, dated by `clock`.
///
/// The bucket and bar use the index as printed, rounded to two decimals.
pub fn format_message(location_label: &str, today: &ForecastPeriod, clock: &dyn Clock) -> String {
    let date = clock.today();
    let (printed, index) = round_to_hundredths(today.index);

    format!(
        "{} pollen level for {}: {}/12 ({}) - {}\n{}",
        location_label,
        date.format("%B %-d"),
        printed,
        classify(index),
        today.trigger_names().join(", "),
        render_emoji_bar(filled_slots(index))
    )
}
