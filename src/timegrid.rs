use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of weekdays a timetable spans, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

pub const DAYS: [Day; 7] = [
    Day::Mon,
    Day::Tue,
    Day::Wed,
    Day::Thu,
    Day::Fri,
    Day::Sat,
    Day::Sun,
];

impl Day {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "mon" => Some(Self::Mon),
            "tue" => Some(Self::Tue),
            "wed" => Some(Self::Wed),
            "thu" => Some(Self::Thu),
            "fri" => Some(Self::Fri),
            "sat" => Some(Self::Sat),
            "sun" => Some(Self::Sun),
            _ => None,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::Mon => "mon",
            Self::Tue => "tue",
            Self::Wed => "wed",
            Self::Thu => "thu",
            Self::Fri => "fri",
            Self::Sat => "sat",
            Self::Sun => "sun",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Mon => "周一",
            Self::Tue => "周二",
            Self::Wed => "周三",
            Self::Thu => "周四",
            Self::Fri => "周五",
            Self::Sat => "周六",
            Self::Sun => "周日",
        }
    }

    /// Position in the fixed Monday-first order.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Address of one timetable cell. Used directly as the mapping key so that
/// no component ever has to be recovered from a joined string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellKey {
    pub class_id: String,
    pub day: Day,
    pub period_id: String,
}

impl CellKey {
    pub fn new(class_id: impl Into<String>, day: Day, period_id: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            day,
            period_id: period_id.into(),
        }
    }

    pub fn same_slot(&self, day: Day, period_id: &str) -> bool {
        self.day == day && self.period_id == period_id
    }

    /// Parses the legacy `classId-day-periodId` string form. The last two
    /// segments are day and period; the day segment must be a known day id.
    pub fn parse_legacy(key: &str) -> Option<Self> {
        let parts: Vec<&str> = key.split('-').collect();
        if parts.len() < 3 {
            return None;
        }
        let period_id = parts[parts.len() - 1];
        let day = Day::parse(parts[parts.len() - 2])?;
        let class_id = parts[..parts.len() - 2].join("-");
        if class_id.is_empty() || period_id.is_empty() {
            return None;
        }
        Some(Self::new(class_id, day, period_id))
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.class_id, self.day, self.period_id)
    }
}

// ---- HH:MM helpers ----

fn split_hhmm(s: &str) -> Option<(i64, i64)> {
    let (h, m) = s.trim().split_once(':')?;
    let h = h.trim().parse::<i64>().ok()?;
    let m = m.trim().parse::<i64>().ok()?;
    Some((h, m))
}

/// Normalizes a 24-hour `H:MM`, `HH:MM` or `HH:MM:SS` value to `HH:MM`.
/// Anything else collapses to an empty string.
pub fn normalize_hhmm(input: &str) -> String {
    let s = input.trim();
    if s.is_empty() {
        return String::new();
    }
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return String::new();
    }
    let digits = |p: &str, min: usize, max: usize| {
        (min..=max).contains(&p.len()) && p.chars().all(|c| c.is_ascii_digit())
    };
    if !digits(parts[0], 1, 2) || !digits(parts[1], 2, 2) {
        return String::new();
    }
    if parts.len() == 3 && !digits(parts[2], 2, 2) {
        return String::new();
    }
    let (Ok(hh), Ok(mm)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) else {
        return String::new();
    };
    if hh > 23 || mm > 59 {
        return String::new();
    }
    format!("{:02}:{:02}", hh, mm)
}

/// Adds minutes to an `HH:MM` value, wrapping around midnight.
pub fn add_minutes(hhmm: &str, mins: i64) -> String {
    let Some((h, m)) = split_hhmm(hhmm) else {
        return String::new();
    };
    let day = 24 * 60;
    let total = (h * 60 + m + mins).rem_euclid(day);
    format!("{:02}:{:02}", total / 60, total % 60)
}

pub fn diff_minutes(start: &str, end: &str) -> i64 {
    match (split_hhmm(start), split_hhmm(end)) {
        (Some((sh, sm)), Some((eh, em))) => (eh * 60 + em) - (sh * 60 + sm),
        _ => 0,
    }
}

pub fn clamp_duration_minutes(mins: i64) -> i64 {
    if mins <= 0 {
        return 45;
    }
    mins.clamp(5, 240)
}

// ---- Week helpers ----

pub fn format_ymd(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn parse_ymd(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

pub fn week_start_monday(d: NaiveDate) -> NaiveDate {
    let back = d.weekday().num_days_from_monday() as i64;
    d - ChronoDuration::days(back)
}

pub fn day_of(d: NaiveDate) -> Day {
    DAYS[d.weekday().num_days_from_monday() as usize]
}

pub fn week_start_from_ymd(s: &str) -> Option<NaiveDate> {
    parse_ymd(s).map(week_start_monday)
}

pub fn week_range_label(week_start: NaiveDate) -> String {
    let end = week_start + ChronoDuration::days(6);
    format!("{} ~ {}", format_ymd(week_start), format_ymd(end))
}

/// `MM-DD` label for each day of the week starting at `week_start`.
pub fn day_date_labels(week_start: NaiveDate) -> Vec<(Day, String)> {
    DAYS.iter()
        .map(|d| {
            let date = week_start + ChronoDuration::days(d.index() as i64);
            (*d, date.format("%m-%d").to_string())
        })
        .collect()
}
