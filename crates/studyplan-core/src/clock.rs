use chrono::{
  Local,
  Utc
};
use chrono_tz::Tz;

use crate::config::Config;
use crate::datetime::{
  CalendarDate,
  to_calendar_date
};

pub const TIMEZONE_ENV_VAR: &str =
  "STUDYPLAN_TIMEZONE";

/// Source of "today". Engine functions
/// never read a clock themselves; callers
/// read it once and pass the date down.
pub trait Clock {
  fn today(&self) -> CalendarDate;
}

/// Wall clock in a configured IANA zone,
/// or the machine's local zone.
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
  timezone: Option<Tz>
}

impl SystemClock {
  pub fn new(
    timezone: Option<Tz>
  ) -> Self {
    Self { timezone }
  }

  /// `$STUDYPLAN_TIMEZONE` wins over the
  /// `timezone` config key.
  #[tracing::instrument(skip(cfg))]
  pub fn from_config(
    cfg: &Config
  ) -> Self {
    let from_env =
      std::env::var(TIMEZONE_ENV_VAR)
        .ok()
        .and_then(|raw| {
          parse_timezone(
            &raw,
            TIMEZONE_ENV_VAR
          )
        });
    let timezone = from_env.or_else(|| {
      cfg.get("timezone").and_then(
        |raw| {
          parse_timezone(
            &raw,
            "config:timezone"
          )
        }
      )
    });

    if timezone.is_none() {
      tracing::debug!(
        "no timezone configured; using \
         local time"
      );
    }

    Self { timezone }
  }

  pub fn timezone(&self) -> Option<Tz> {
    self.timezone
  }
}

impl Clock for SystemClock {
  fn today(&self) -> CalendarDate {
    match self.timezone {
      | Some(tz) => {
        to_calendar_date(
          &Utc::now().with_timezone(&tz)
        )
      }
      | None => {
        to_calendar_date(&Local::now())
      }
    }
  }
}

/// Always answers the same day.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct FixedClock(
  pub CalendarDate
);

impl Clock for FixedClock {
  fn today(&self) -> CalendarDate {
    self.0
  }
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "using configured timezone"
      );
      Some(tz)
    }
    | Err(error) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %error,
        "invalid timezone id"
      );
      None
    }
  }
}
