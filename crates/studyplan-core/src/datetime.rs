use std::sync::OnceLock;

use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  TimeZone
};
use regex::Regex;

use crate::error::ScheduleError;

/// A timezone-free calendar day.
pub type CalendarDate = NaiveDate;

pub const ISO_DATE_FORMAT: &str =
  "%Y-%m-%d";

/// Truncates an instant to the calendar
/// day it falls on in its own timezone.
#[must_use]
pub fn to_calendar_date<Tz: TimeZone>(
  instant: &DateTime<Tz>
) -> CalendarDate {
  instant.date_naive()
}

#[must_use]
pub fn is_same_day(
  a: CalendarDate,
  b: CalendarDate
) -> bool {
  a.year() == b.year()
    && a.month() == b.month()
    && a.day() == b.day()
}

#[must_use]
pub fn start_of_month(
  date: CalendarDate
) -> CalendarDate {
  date.with_day(1).unwrap_or(date)
}

#[must_use]
pub fn end_of_month(
  date: CalendarDate
) -> CalendarDate {
  let (next_year, next_month) =
    if date.month() >= 12 {
      (date.year().saturating_add(1), 1_u32)
    } else {
      (date.year(), date.month() + 1)
    };
  NaiveDate::from_ymd_opt(
    next_year, next_month, 1
  )
  .and_then(|first| first.pred_opt())
  .unwrap_or(date)
}

#[must_use]
pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .map(|first| end_of_month(first).day())
  .unwrap_or(31)
}

/// Monday of the ISO week containing
/// `date`. Sunday is day 7 of its week,
/// so it anchors to the previous Monday.
#[must_use]
pub fn week_anchor(
  date: CalendarDate
) -> CalendarDate {
  let offset = match date
    .weekday()
    .num_days_from_sunday()
  {
    | 0 => 6,
    | day => i64::from(day) - 1
  };
  add_days(date, -offset)
}

#[must_use]
pub fn add_days(
  date: CalendarDate,
  days: i64
) -> CalendarDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

/// Moves by whole months keeping the
/// day-of-month, clamped to the last day
/// of the target month.
#[must_use]
pub fn add_months(
  date: CalendarDate,
  months: i32
) -> CalendarDate {
  let mut year = date.year();
  let mut month =
    date.month() as i32 + months;

  while month < 1 {
    month += 12;
    year = year.saturating_sub(1);
  }
  while month > 12 {
    month -= 12;
    year = year.saturating_add(1);
  }

  let month = month as u32;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

#[must_use]
pub fn format_calendar_date(
  date: CalendarDate
) -> String {
  date.format(ISO_DATE_FORMAT).to_string()
}

fn iso_date_regex()
-> Option<&'static Regex> {
  static ISO_DATE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  ISO_DATE
    .get_or_init(|| {
      Regex::new(r"^\d{4}-\d{2}-\d{2}$")
        .ok()
    })
    .as_ref()
}

fn relative_expr_regex()
-> Option<&'static Regex> {
  static RELATIVE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  RELATIVE
    .get_or_init(|| {
      Regex::new(
        r"^([+-]\d{1,4})([dwm])$"
      )
      .ok()
    })
    .as_ref()
}

/// Parses a zero-padded ISO calendar
/// date. Anything else, including dates
/// that do not exist, is `InvalidDate`.
pub fn parse_calendar_date(
  raw: &str
) -> Result<CalendarDate, ScheduleError>
{
  let trimmed = raw.trim();
  if !iso_date_regex()
    .is_some_and(|re| re.is_match(trimmed))
  {
    return Err(
      ScheduleError::InvalidDate(
        raw.to_string()
      )
    );
  }

  NaiveDate::parse_from_str(
    trimmed,
    ISO_DATE_FORMAT
  )
  .map_err(|_| {
    ScheduleError::InvalidDate(
      raw.to_string()
    )
  })
}

/// Resolves a user date expression
/// against `today`: `today`, `tomorrow`,
/// `yesterday`, `+3d`, `-1w`, `+2m`, or
/// an ISO date.
#[tracing::instrument]
pub fn parse_date_expr(
  expr: &str,
  today: CalendarDate
) -> Result<CalendarDate, ScheduleError>
{
  let lowered =
    expr.trim().to_ascii_lowercase();

  match lowered.as_str() {
    | "today" | "now" => {
      return Ok(today);
    }
    | "tomorrow" => {
      return Ok(add_days(today, 1));
    }
    | "yesterday" => {
      return Ok(add_days(today, -1));
    }
    | _ => {}
  }

  if let Some(caps) =
    relative_expr_regex()
      .and_then(|re| re.captures(&lowered))
  {
    let amount = caps[1]
      .parse::<i32>()
      .map_err(|_| {
        ScheduleError::InvalidDate(
          expr.to_string()
        )
      })?;
    let resolved = match &caps[2] {
      | "d" => {
        add_days(today, i64::from(amount))
      }
      | "w" => {
        add_days(
          today,
          i64::from(amount) * 7
        )
      }
      | _ => add_months(today, amount)
    };
    tracing::debug!(
      expr,
      resolved = %resolved,
      "resolved relative date"
    );
    return Ok(resolved);
  }

  parse_calendar_date(&lowered)
}


pub mod calendar_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    date: &NaiveDate,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::format_calendar_date(
        *date
      )
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveDate, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_calendar_date(&raw)
      .map_err(serde::de::Error::custom)
  }
}
