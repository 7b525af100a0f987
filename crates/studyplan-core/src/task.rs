use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::{CalendarDate, calendar_date_serde};

/// Where a task stands relative to the evaluation day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
    Missed,
    Today,
    Upcoming,
}

impl TaskStatus {
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Missed => "missed",
            Self::Today => "today",
            Self::Upcoming => "upcoming",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    #[serde(with = "calendar_date_serde")]
    pub date: CalendarDate,

    pub subject: String,

    #[serde(default)]
    pub completed: bool,
}

impl Task {
    pub fn new(date: CalendarDate, subject: impl Into<String>) -> Self {
        Self {
            date,
            subject: subject.into(),
            completed: false,
        }
    }

    pub fn status(&self, today: CalendarDate) -> TaskStatus {
        classify(self, today)
    }

    pub fn is_reached(&self, today: CalendarDate) -> bool {
        self.date <= today
    }
}

/// Completed wins over any date comparison; otherwise the date decides.
pub fn classify(task: &Task, today: CalendarDate) -> TaskStatus {
    if task.completed {
        TaskStatus::Completed
    } else if task.date < today {
        TaskStatus::Missed
    } else if task.date == today {
        TaskStatus::Today
    } else {
        TaskStatus::Upcoming
    }
}

/// A named, ordered list of study tasks. Order is insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub id: String,
    pub name: String,
    pub tasks: Vec<Task>,
}

impl Schedule {
    pub fn new(name: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            tasks,
        }
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tasks,
        }
    }

    pub fn first_date(&self) -> Option<CalendarDate> {
        self.tasks.iter().map(|t| t.date).min()
    }

    pub fn last_date(&self) -> Option<CalendarDate> {
        self.tasks.iter().map(|t| t.date).max()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> CalendarDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn classify_is_exhaustive_over_date_and_flag() {
        let today = ymd(2026, 10, 16);
        let cases = [
            (ymd(2026, 10, 15), false, TaskStatus::Missed),
            (ymd(2026, 10, 16), false, TaskStatus::Today),
            (ymd(2026, 10, 17), false, TaskStatus::Upcoming),
            (ymd(2026, 10, 15), true, TaskStatus::Completed),
            (ymd(2026, 10, 16), true, TaskStatus::Completed),
            (ymd(2026, 10, 17), true, TaskStatus::Completed),
        ];

        for (date, completed, expected) in cases {
            let mut task = Task::new(date, "Algebra");
            task.completed = completed;
            assert_eq!(classify(&task, today), expected, "{date} completed={completed}");
        }
    }

    #[test]
    fn completed_defaults_to_false_when_absent() {
        let task: Task =
            serde_json::from_str(r#"{"date":"2026-10-16","subject":"History"}"#).expect("parse");
        assert!(!task.completed);
        assert_eq!(task.date, ymd(2026, 10, 16));
    }

    #[test]
    fn rejects_unpadded_dates() {
        let parsed = serde_json::from_str::<Task>(r#"{"date":"2026-1-6","subject":"History"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn schedule_date_span_ignores_insertion_order() {
        let schedule = Schedule::new(
            "Finals",
            vec![
                Task::new(ymd(2026, 10, 20), "Physics"),
                Task::new(ymd(2026, 10, 2), "Chemistry"),
                Task::new(ymd(2026, 10, 9), "Biology"),
            ],
        );
        assert_eq!(schedule.first_date(), Some(ymd(2026, 10, 2)));
        assert_eq!(schedule.last_date(), Some(ymd(2026, 10, 20)));
        assert!(!schedule.id.is_empty());
    }
}
