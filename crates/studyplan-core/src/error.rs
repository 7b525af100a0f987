//! Error taxonomy for the schedule engine.
//!
//! Derivations (classification, metrics, grids) are total and never return
//! these; they come from parsing input and from operations that reference a
//! schedule or task that may not exist.

/// Failures reported by engine operations and the schedule store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// The referenced schedule or task does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A date string is not a zero-padded `YYYY-MM-DD` calendar day.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// The view kind is not one of daily, weekly or monthly.
    #[error("invalid granularity: {0}")]
    InvalidGranularity(String),

    /// A schedule name was empty after trimming.
    #[error("invalid schedule name: {0:?}")]
    InvalidName(String),

    /// A task selector could not be parsed.
    #[error("invalid task selector: {0:?}")]
    InvalidSelector(String),
}

/// Convenience alias for engine results.
pub type Result<T> = std::result::Result<T, ScheduleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_not_found() {
        let err = ScheduleError::NotFound("schedule abc".into());
        assert_eq!(err.to_string(), "not found: schedule abc");
    }

    #[test]
    fn display_invalid_date() {
        let err = ScheduleError::InvalidDate("2026-2-30".into());
        assert_eq!(err.to_string(), "invalid date: 2026-2-30");
    }

    #[test]
    fn display_invalid_granularity() {
        let err = ScheduleError::InvalidGranularity("yearly".into());
        assert_eq!(err.to_string(), "invalid granularity: yearly");
    }

    #[test]
    fn converts_into_anyhow() {
        let err: anyhow::Error = ScheduleError::NotFound("task".into()).into();
        assert!(err.downcast_ref::<ScheduleError>().is_some());
    }
}
