//! Calendar, cyclical, seasonal, festival and fiscal-year fields for a date.

use chrono::{Datelike, NaiveDate, Weekday};
use std::f64::consts::PI;

/// Numeric calendar features, in model column order.
pub const CALENDAR_FEATURES: [&str; 11] = [
    "day",
    "month",
    "day_of_week",
    "is_weekend",
    "month_sin",
    "month_cos",
    "Season_Winter",
    "Season_Spring",
    "Season_Monsoon",
    "Season_Autumn",
    "is_festival",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Winter,
    Spring,
    Monsoon,
    Autumn,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=9 => Season::Monsoon,
            10 | 11 => Season::Autumn,
            _ => Season::Winter,
        }
    }
}

/// An inclusive month/day window repeated every year. Approximates a lunar
/// festival with fixed solar dates.
#[derive(Debug, Clone, PartialEq)]
pub struct FestivalWindow {
    pub name: String,
    pub start: (u32, u32),
    pub end: (u32, u32),
}

impl FestivalWindow {
    pub fn new(name: &str, start: (u32, u32), end: (u32, u32)) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
        }
    }

    /// Parse `Name:MM-DD..MM-DD`.
    pub fn parse(input: &str) -> Result<Self, String> {
        let (name, range) = input
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("festival '{input}' must be Name:MM-DD..MM-DD"))?;
        let (start, end) = range
            .split_once("..")
            .ok_or_else(|| format!("festival '{input}' is missing '..'"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("festival '{input}' has no name"));
        }
        Ok(Self::new(name, parse_month_day(start)?, parse_month_day(end)?))
    }

    /// A window whose end precedes its start wraps over the new year.
    pub fn contains(&self, date: NaiveDate) -> bool {
        let md = (date.month(), date.day());
        if self.start <= self.end {
            self.start <= md && md <= self.end
        } else {
            md >= self.start || md <= self.end
        }
    }
}

fn parse_month_day(input: &str) -> Result<(u32, u32), String> {
    let (m, d) = input
        .trim()
        .split_once('-')
        .ok_or_else(|| format!("'{input}' is not MM-DD"))?;
    let month: u32 = m.trim().parse().map_err(|_| format!("bad month in '{input}'"))?;
    let day: u32 = d.trim().parse().map_err(|_| format!("bad day in '{input}'"))?;
    // 2024 is a leap year, so Feb 29 is accepted.
    if NaiveDate::from_ymd_opt(2024, month, day).is_none() {
        return Err(format!("'{input}' is not a calendar day"));
    }
    Ok((month, day))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarConfig {
    pub weekend: Weekday,
    pub fiscal_start_month: u32,
    pub festivals: Vec<FestivalWindow>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            weekend: Weekday::Sat,
            fiscal_start_month: 7,
            festivals: vec![
                FestivalWindow::new("Holi", (3, 1), (3, 20)),
                FestivalWindow::new("NewYear", (4, 10), (4, 20)),
                FestivalWindow::new("Dashain", (9, 25), (10, 15)),
                FestivalWindow::new("Tihar", (11, 1), (11, 15)),
            ],
        }
    }
}

impl CalendarConfig {
    pub fn is_festival(&self, date: NaiveDate) -> bool {
        self.festivals.iter().any(|f| f.contains(date))
    }

    /// `FY_<start year>_<last two digits of start year + 1>`.
    pub fn fiscal_year(&self, date: NaiveDate) -> String {
        let start = if date.month() >= self.fiscal_start_month {
            date.year()
        } else {
            date.year() - 1
        };
        format!("FY_{}_{:02}", start, (start + 1).rem_euclid(100))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarFields {
    pub day: u32,
    pub month: u32,
    /// Monday = 0.
    pub day_of_week: u32,
    pub is_weekend: bool,
    pub month_sin: f64,
    pub month_cos: f64,
    pub season: Season,
    pub is_festival: bool,
    pub fiscal_year: String,
}

impl CalendarFields {
    pub fn for_date(date: NaiveDate, config: &CalendarConfig) -> Self {
        let month = date.month();
        let angle = 2.0 * PI * month as f64 / 12.0;
        Self {
            day: date.day(),
            month,
            day_of_week: date.weekday().num_days_from_monday(),
            is_weekend: date.weekday() == config.weekend,
            month_sin: angle.sin(),
            month_cos: angle.cos(),
            season: Season::from_month(month),
            is_festival: config.is_festival(date),
            fiscal_year: config.fiscal_year(date),
        }
    }

    /// Values aligned with [`CALENDAR_FEATURES`].
    pub fn numeric_values(&self) -> Vec<f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        vec![
            self.day as f64,
            self.month as f64,
            self.day_of_week as f64,
            flag(self.is_weekend),
            self.month_sin,
            self.month_cos,
            flag(self.season == Season::Winter),
            flag(self.season == Season::Spring),
            flag(self.season == Season::Monsoon),
            flag(self.season == Season::Autumn),
            flag(self.is_festival),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn festival_inside_and_outside_windows() {
        let config = CalendarConfig::default();
        assert!(config.is_festival(date(2024, 10, 1)));
        assert!(config.is_festival(date(2024, 9, 25)));
        assert!(config.is_festival(date(2024, 10, 15)));
        assert!(!config.is_festival(date(2024, 10, 16)));
        assert!(!config.is_festival(date(2024, 7, 1)));
    }

    #[test]
    fn festival_window_can_wrap_year() {
        let w = FestivalWindow::parse("Yearend:12-28..01-03").unwrap();
        assert!(w.contains(date(2024, 12, 30)));
        assert!(w.contains(date(2025, 1, 2)));
        assert!(!w.contains(date(2025, 1, 4)));
    }

    #[test]
    fn festival_parse_rejects_bad_input() {
        assert!(FestivalWindow::parse("Holi").is_err());
        assert!(FestivalWindow::parse("Holi:03-01").is_err());
        assert!(FestivalWindow::parse("Holi:13-01..13-05").is_err());
        assert!(FestivalWindow::parse(":03-01..03-05").is_err());
    }

    #[test]
    fn seasons_by_month() {
        assert_eq!(Season::from_month(12), Season::Winter);
        assert_eq!(Season::from_month(2), Season::Winter);
        assert_eq!(Season::from_month(4), Season::Spring);
        assert_eq!(Season::from_month(9), Season::Monsoon);
        assert_eq!(Season::from_month(11), Season::Autumn);
    }

    #[test]
    fn fiscal_year_starts_in_july() {
        let config = CalendarConfig::default();
        assert_eq!(config.fiscal_year(date(2024, 7, 1)), "FY_2024_25");
        assert_eq!(config.fiscal_year(date(2024, 6, 30)), "FY_2023_24");
        assert_eq!(config.fiscal_year(date(1999, 8, 1)), "FY_1999_00");
    }

    #[test]
    fn weekend_is_single_configured_day() {
        let config = CalendarConfig::default();
        // 2024-01-06 is a Saturday, 2024-01-07 a Sunday.
        let sat = CalendarFields::for_date(date(2024, 1, 6), &config);
        let sun = CalendarFields::for_date(date(2024, 1, 7), &config);
        assert!(sat.is_weekend);
        assert_eq!(sat.day_of_week, 5);
        assert!(!sun.is_weekend);
    }

    #[test]
    fn cyclical_month_encoding() {
        let fields = CalendarFields::for_date(date(2024, 3, 15), &CalendarConfig::default());
        assert_relative_eq!(fields.month_sin, 1.0, epsilon = 1e-12);
        assert_relative_eq!(fields.month_cos, 0.0, epsilon = 1e-12);
        assert_eq!(fields.numeric_values().len(), CALENDAR_FEATURES.len());
    }
}
