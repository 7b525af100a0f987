use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::datetime::{CalendarDate, add_days, add_months};
use crate::error::ScheduleError;

/// Step used by weekly navigation: one business week.
pub const WEEKLY_STEP_DAYS: i64 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Daily => "Day",
            Self::Weekly => "Week",
            Self::Monthly => "Month",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "daily" | "day" => Some(Self::Daily),
            "weekly" | "week" => Some(Self::Weekly),
            "monthly" | "month" => Some(Self::Monthly),
            _ => None,
        }
    }
}

impl FromStr for Granularity {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(&s.trim().to_ascii_lowercase())
            .ok_or_else(|| ScheduleError::InvalidGranularity(s.to_string()))
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

impl Direction {
    fn delta(self) -> i32 {
        match self {
            Self::Prev => -1,
            Self::Next => 1,
        }
    }
}

/// Which slice of the calendar is on screen. Only `reference_date` moves
/// during navigation; switching granularity always returns to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub granularity: Granularity,
    pub reference_date: CalendarDate,
}

impl ViewState {
    pub fn new(today: CalendarDate) -> Self {
        Self::with_granularity(Granularity::default(), today)
    }

    pub fn with_granularity(granularity: Granularity, today: CalendarDate) -> Self {
        Self {
            granularity,
            reference_date: today,
        }
    }

    pub fn change_granularity(&mut self, granularity: Granularity, today: CalendarDate) {
        tracing::debug!(from = %self.granularity, to = %granularity, "changing granularity");
        self.granularity = granularity;
        self.reference_date = today;
    }

    pub fn navigate(&mut self, direction: Direction) {
        let delta = direction.delta();
        self.reference_date = match self.granularity {
            Granularity::Daily => add_days(self.reference_date, i64::from(delta)),
            Granularity::Weekly => {
                add_days(self.reference_date, i64::from(delta) * WEEKLY_STEP_DAYS)
            }
            Granularity::Monthly => add_months(self.reference_date, delta),
        };
    }

    /// Navigates `|steps|` times, backwards for negative values.
    pub fn step(&mut self, steps: i32) {
        let direction = if steps < 0 {
            Direction::Prev
        } else {
            Direction::Next
        };
        for _ in 0..steps.unsigned_abs() {
            self.navigate(direction);
        }
    }

    pub fn jump_to_today(&mut self, today: CalendarDate) {
        self.reference_date = today;
    }

    /// Moves the view to an arbitrary date, keeping the granularity.
    pub fn focus(&mut self, date: CalendarDate) {
        self.reference_date = date;
    }

    pub fn is_on_today(&self, today: CalendarDate) -> bool {
        self.reference_date == today
    }

    /// Short header for the current view: weekday name, "Week N" of the
    /// month, or month name.
    pub fn heading(&self) -> String {
        match self.granularity {
            Granularity::Daily => self.reference_date.format("%A").to_string(),
            Granularity::Weekly => format!("Week {}", week_of_month(self.reference_date)),
            Granularity::Monthly => self.reference_date.format("%B").to_string(),
        }
    }
}

/// 1-based seven-day block of the month the date falls in (1..=5).
pub fn week_of_month(date: CalendarDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> CalendarDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn starts_daily_at_today() {
        let today = ymd(2026, 10, 16);
        let view = ViewState::new(today);
        assert_eq!(view.granularity, Granularity::Daily);
        assert_eq!(view.reference_date, today);
    }

    #[test]
    fn daily_moves_one_day() {
        let mut view = ViewState::new(ymd(2026, 10, 31));
        view.navigate(Direction::Next);
        assert_eq!(view.reference_date, ymd(2026, 11, 1));
        view.navigate(Direction::Prev);
        view.navigate(Direction::Prev);
        assert_eq!(view.reference_date, ymd(2026, 10, 30));
    }

    #[test]
    fn weekly_moves_five_days() {
        let mut view = ViewState::with_granularity(Granularity::Weekly, ymd(2026, 10, 16));
        view.navigate(Direction::Next);
        assert_eq!(view.reference_date, ymd(2026, 10, 21));
        view.navigate(Direction::Prev);
        assert_eq!(view.reference_date, ymd(2026, 10, 16));
    }

    #[test]
    fn monthly_clamps_to_short_month() {
        let mut view = ViewState::with_granularity(Granularity::Monthly, ymd(2026, 3, 31));
        view.navigate(Direction::Next);
        assert_eq!(view.reference_date, ymd(2026, 4, 30));

        let mut view = ViewState::with_granularity(Granularity::Monthly, ymd(2026, 3, 31));
        view.navigate(Direction::Prev);
        assert_eq!(view.reference_date, ymd(2026, 2, 28));
    }

    #[test]
    fn changing_granularity_resets_to_today() {
        let today = ymd(2026, 10, 16);
        let mut view = ViewState::new(today);
        view.step(-9);
        assert_eq!(view.reference_date, ymd(2026, 10, 7));

        view.change_granularity(Granularity::Monthly, today);
        assert_eq!(view.granularity, Granularity::Monthly);
        assert_eq!(view.reference_date, today);

        view.step(2);
        assert_eq!(view.reference_date, ymd(2026, 12, 16));
        view.jump_to_today(today);
        assert!(view.is_on_today(today));
        assert_eq!(view.granularity, Granularity::Monthly);

        view.focus(ymd(2027, 1, 4));
        assert!(!view.is_on_today(today));
        assert_eq!(view.granularity, Granularity::Monthly);
    }

    #[test]
    fn parses_granularity_keys() {
        assert_eq!("Weekly".parse::<Granularity>(), Ok(Granularity::Weekly));
        assert_eq!("month".parse::<Granularity>(), Ok(Granularity::Monthly));
        assert_eq!(
            "yearly".parse::<Granularity>(),
            Err(ScheduleError::InvalidGranularity("yearly".to_string()))
        );
    }

    #[test]
    fn headings_per_granularity() {
        let today = ymd(2026, 10, 16);
        assert_eq!(ViewState::new(today).heading(), "Friday");
        assert_eq!(
            ViewState::with_granularity(Granularity::Weekly, today).heading(),
            "Week 3"
        );
        assert_eq!(
            ViewState::with_granularity(Granularity::Monthly, today).heading(),
            "October"
        );
        assert_eq!(week_of_month(ymd(2026, 10, 29)), 5);
        assert_eq!(week_of_month(ymd(2026, 10, 7)), 1);
    }
}
