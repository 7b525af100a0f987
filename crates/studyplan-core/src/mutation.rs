use std::fmt;
use std::str::FromStr;

use crate::datetime::{CalendarDate, format_calendar_date};
use crate::error::{Result, ScheduleError};
use crate::metrics::{Metrics, compute_metrics};
use crate::task::{Schedule, Task};

/// Picks one task among those sharing a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSelector {
    /// Exact subject match.
    Subject(String),
    /// Zero-based position among that date's tasks, in insertion order.
    Index(usize),
}

impl TaskSelector {
    fn locate(&self, tasks: &[Task], date: CalendarDate) -> Option<usize> {
        let mut on_date = tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.date == date);
        match self {
            Self::Subject(subject) => on_date
                .find(|(_, task)| task.subject == *subject)
                .map(|(pos, _)| pos),
            Self::Index(index) => on_date.nth(*index).map(|(pos, _)| pos),
        }
    }
}

/// `#N` selects the N-th task of the day (1-based); anything else is a
/// subject.
impl FromStr for TaskSelector {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ScheduleError::InvalidSelector(s.to_string()));
        }
        if let Some(raw) = trimmed.strip_prefix('#') {
            let position = raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ScheduleError::InvalidSelector(s.to_string()))?;
            return Ok(Self::Index(position - 1));
        }
        Ok(Self::Subject(trimmed.to_string()))
    }
}

impl fmt::Display for TaskSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subject(subject) => f.write_str(subject),
            Self::Index(index) => write!(f, "#{}", index + 1),
        }
    }
}

/// Result of a completion toggle: the new snapshot plus its metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionUpdate {
    pub schedule: Schedule,
    pub task: Task,
    pub metrics: Metrics,
    /// False when the task already had the requested value.
    pub changed: bool,
}

/// Returns a copy of `schedule` with the selected task's flag set.
///
/// The input is left untouched. Errors with `NotFound` when no task on
/// `date` matches the selector.
#[tracing::instrument(skip(schedule), fields(schedule_id = %schedule.id))]
pub fn set_task_completion(
    schedule: &Schedule,
    date: CalendarDate,
    selector: &TaskSelector,
    completed: bool,
    today: CalendarDate,
) -> Result<CompletionUpdate> {
    let position = selector.locate(&schedule.tasks, date).ok_or_else(|| {
        ScheduleError::NotFound(format!(
            "task {selector} on {} in schedule {}",
            format_calendar_date(date),
            schedule.id
        ))
    })?;

    let mut next = schedule.clone();
    let changed = next.tasks[position].completed != completed;
    next.tasks[position].completed = completed;
    let task = next.tasks[position].clone();
    let metrics = compute_metrics(&next.tasks, today);

    tracing::info!(
        subject = %task.subject,
        completed,
        changed,
        "set task completion"
    );

    Ok(CompletionUpdate {
        schedule: next,
        task,
        metrics,
        changed,
    })
}

pub fn rename_schedule(schedule: &Schedule, name: &str) -> Result<Schedule> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ScheduleError::InvalidName(name.to_string()));
    }
    Ok(Schedule {
        name: trimmed.to_string(),
        ..schedule.clone()
    })
}
