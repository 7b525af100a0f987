//! Progress, achievement and streak figures for a task list.
//!
//! Every ratio is in `[0, 1]` and falls back to `0.0` when its denominator is
//! zero. Percentages for display are derived with the `*_percent` helpers.

use serde::Serialize;

use crate::datetime::CalendarDate;
use crate::task::{Task, TaskStatus, classify};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub completed_count: usize,
    pub missed_count: usize,
    pub remaining_count: usize,
    pub total_count: usize,
    /// Tasks dated on or before today, completed or not.
    pub reached_count: usize,
    /// completed / (completed + missed)
    pub completion_rate: f64,
    /// reached / total
    pub progress_ratio: f64,
    /// completed / reached
    pub achievement_ratio: f64,
    pub current_streak: usize,
    pub best_streak: usize,
}

impl Metrics {
    pub fn completion_percent(&self) -> u32 {
        to_percent(self.completion_rate)
    }

    pub fn progress_percent(&self) -> u32 {
        to_percent(self.progress_ratio)
    }

    pub fn achievement_percent(&self) -> u32 {
        to_percent(self.achievement_ratio)
    }

    pub fn feedback_tier(&self) -> FeedbackTier {
        FeedbackTier::for_percent(self.completion_percent())
    }
}

#[tracing::instrument(skip(tasks), fields(count = tasks.len()))]
pub fn compute_metrics(tasks: &[Task], today: CalendarDate) -> Metrics {
    let mut metrics = Metrics {
        total_count: tasks.len(),
        ..Metrics::default()
    };

    for task in tasks {
        match classify(task, today) {
            TaskStatus::Completed => metrics.completed_count += 1,
            TaskStatus::Missed => metrics.missed_count += 1,
            TaskStatus::Today | TaskStatus::Upcoming => metrics.remaining_count += 1,
        }
        if task.is_reached(today) {
            metrics.reached_count += 1;
        }
    }

    metrics.completion_rate = ratio(
        metrics.completed_count,
        metrics.completed_count + metrics.missed_count,
    );
    metrics.progress_ratio = ratio(metrics.reached_count, metrics.total_count);
    // Tasks ticked off ahead of schedule can push completed past reached.
    metrics.achievement_ratio =
        ratio(metrics.completed_count, metrics.reached_count).min(1.0);

    let (current, best) = compute_streaks(tasks);
    metrics.current_streak = current;
    metrics.best_streak = best;

    tracing::debug!(
        completed = metrics.completed_count,
        missed = metrics.missed_count,
        remaining = metrics.remaining_count,
        current_streak = metrics.current_streak,
        best_streak = metrics.best_streak,
        "computed metrics"
    );

    metrics
}

/// Returns `(current, best)` over a date-ascending view of `tasks`.
///
/// The sort is stable, so same-day tasks keep their input order. A day adds
/// at most one to the streak; any incomplete task resets it.
fn compute_streaks(tasks: &[Task]) -> (usize, usize) {
    let mut ordered: Vec<&Task> = tasks.iter().collect();
    ordered.sort_by_key(|task| task.date);

    let mut current = 0usize;
    let mut best = 0usize;
    let mut last_counted: Option<CalendarDate> = None;

    for task in ordered {
        if !task.completed {
            current = 0;
            last_counted = None;
            continue;
        }
        if last_counted == Some(task.date) {
            continue;
        }
        current += 1;
        last_counted = Some(task.date);
        best = best.max(current);
    }

    (current, best)
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn to_percent(value: f64) -> u32 {
    (value.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// Encouragement band for a completion percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeedbackTier {
    NeedsImprovement,
    KeepGoing,
    GreatWork,
    Outstanding,
}

impl FeedbackTier {
    pub fn for_percent(percent: u32) -> Self {
        match percent {
            0..25 => Self::NeedsImprovement,
            25..50 => Self::KeepGoing,
            50..75 => Self::GreatWork,
            _ => Self::Outstanding,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::NeedsImprovement => "Needs Improvement",
            Self::KeepGoing => "Keep Going",
            Self::GreatWork => "Great Work",
            Self::Outstanding => "Outstanding",
        }
    }

    pub fn messages(self) -> &'static [&'static str] {
        match self {
            Self::NeedsImprovement => &[
                "Missed a few sessions? Today is a fresh start.",
                "Progress is about showing up. Pick up where you left off.",
                "Every setback is a lesson. One session at a time.",
            ],
            Self::KeepGoing => &[
                "You're on the right track. A little more consistency goes a long way.",
                "Small steps still reach big goals. Keep pushing.",
                "Every session counts and it is already showing.",
            ],
            Self::GreatWork => &[
                "Great job. A bit more effort and you're at the top of your game.",
                "Consistency is paying off. You're closer than you think.",
                "Stay focused and keep the momentum going.",
            ],
            Self::Outstanding => &[
                "You're on fire. Keep this energy up.",
                "Showing up every day has become a habit. Keep shining.",
                "You're setting the standard. Keep it up.",
            ],
        }
    }

    /// Picks a message by index, wrapping around the tier's message list.
    pub fn message(self, index: usize) -> &'static str {
        let messages = self.messages();
        messages[index % messages.len()]
    }
}
