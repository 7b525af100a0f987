use std::collections::HashMap;

use chrono::Datelike;

use crate::datetime::{
  CalendarDate,
  add_days,
  end_of_month,
  format_calendar_date,
  start_of_month,
  week_anchor
};
use crate::task::Task;

pub const DAYS_PER_WEEK: usize = 7;
pub const BUSINESS_DAYS: usize = 5;

/// A month cell; `None` is a blank
/// before the 1st.
pub type MonthCell =
  Option<CalendarDate>;

#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub struct MonthGrid {
  month_start: CalendarDate,
  cells:       Vec<MonthCell>
}

impl MonthGrid {
  pub fn month_start(
    &self
  ) -> CalendarDate {
    self.month_start
  }

  /// Leading blanks followed by every
  /// day of the month, unpadded at the
  /// end.
  pub fn cells(&self) -> &[MonthCell] {
    &self.cells
  }

  pub fn leading_blanks(&self) -> usize {
    self
      .cells
      .iter()
      .take_while(|cell| cell.is_none())
      .count()
  }

  pub fn dates(
    &self
  ) -> impl Iterator<Item = CalendarDate>
  + '_ {
    self.cells.iter().flatten().copied()
  }

  /// Monday-first rows, the last one
  /// padded with blanks.
  pub fn rows(
    &self
  ) -> Vec<[MonthCell; DAYS_PER_WEEK]> {
    self
      .cells
      .chunks(DAYS_PER_WEEK)
      .map(|chunk| {
        let mut row =
          [None; DAYS_PER_WEEK];
        row[..chunk.len()]
          .copy_from_slice(chunk);
        row
      })
      .collect()
  }
}

/// Blank cells before the 1st so weeks
/// start on Monday: Monday → 0,
/// Sunday → 6.
pub fn leading_blank_count(
  first_of_month: CalendarDate
) -> usize {
  let from_sunday = first_of_month
    .weekday()
    .num_days_from_sunday();
  ((from_sunday + 6) % 7) as usize
}

#[tracing::instrument]
pub fn build_month_grid(
  reference: CalendarDate
) -> MonthGrid {
  let first = start_of_month(reference);
  let last = end_of_month(reference);
  let offset =
    leading_blank_count(first);

  let mut cells = Vec::with_capacity(
    offset + last.day() as usize
  );
  cells.resize(offset, None);

  let mut day = first;
  while day <= last {
    cells.push(Some(day));
    let next = add_days(day, 1);
    if next == day {
      break;
    }
    day = next;
  }

  MonthGrid {
    month_start: first,
    cells
  }
}

/// Monday through Sunday of the week
/// containing `reference`.
pub fn build_week_grid(
  reference: CalendarDate
) -> [CalendarDate; DAYS_PER_WEEK] {
  let anchor = week_anchor(reference);
  std::array::from_fn(|offset| {
    add_days(anchor, offset as i64)
  })
}

/// Monday through Friday of a week
/// grid.
pub fn business_days(
  week: &[CalendarDate; DAYS_PER_WEEK]
) -> &[CalendarDate] {
  &week[..BUSINESS_DAYS]
}

/// Tasks grouped by ISO date string, each
/// bucket in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TaskBuckets<'a> {
  by_date: HashMap<String, Vec<&'a Task>>
}

impl<'a> TaskBuckets<'a> {
  pub fn get(
    &self,
    key: &str
  ) -> &[&'a Task] {
    self
      .by_date
      .get(key)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  pub fn tasks_on(
    &self,
    date: CalendarDate
  ) -> &[&'a Task] {
    self.get(&format_calendar_date(date))
  }

  pub fn len(&self) -> usize {
    self.by_date.len()
  }

  pub fn is_empty(&self) -> bool {
    self.by_date.is_empty()
  }
}

pub fn bucket_tasks_by_date(
  tasks: &[Task]
) -> TaskBuckets<'_> {
  let mut by_date: HashMap<
    String,
    Vec<&Task>
  > = HashMap::new();
  for task in tasks {
    by_date
      .entry(format_calendar_date(
        task.date
      ))
      .or_default()
      .push(task);
  }
  TaskBuckets { by_date }
}

pub fn day_tasks<'a, 'b>(
  buckets: &'b TaskBuckets<'a>,
  date: CalendarDate
) -> &'b [&'a Task] {
  buckets.tasks_on(date)
}

/// Days of the reference month that
/// carry tasks, ascending, with their
/// tasks.
pub fn month_agenda<'a>(
  buckets: &TaskBuckets<'a>,
  reference: CalendarDate
) -> Vec<(CalendarDate, Vec<&'a Task>)>
{
  let grid = build_month_grid(reference);
  grid
    .dates()
    .filter_map(|date| {
      let tasks = buckets.tasks_on(date);
      (!tasks.is_empty())
        .then(|| (date, tasks.to_vec()))
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn ymd(
    y: i32,
    m: u32,
    d: u32
  ) -> CalendarDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn month_starting_sunday_has_six_blanks() {
    // 2026-02-01 is a Sunday.
    let grid =
      build_month_grid(ymd(2026, 2, 14));
    assert_eq!(grid.leading_blanks(), 6);
    assert_eq!(
      grid.cells()[6],
      Some(ymd(2026, 2, 1))
    );
    assert_eq!(grid.cells().len(), 6 + 28);
    assert_eq!(
      grid.cells().len() % DAYS_PER_WEEK,
      6
    );
  }

  #[test]
  fn month_starting_monday_has_no_blanks() {
    // 2026-06-01 is a Monday.
    let grid =
      build_month_grid(ymd(2026, 6, 30));
    assert_eq!(grid.leading_blanks(), 0);
    assert_eq!(
      grid.cells().first(),
      Some(&Some(ymd(2026, 6, 1)))
    );
    assert_eq!(
      grid.cells().last(),
      Some(&Some(ymd(2026, 6, 30)))
    );
  }

  #[test]
  fn rows_pad_final_week() {
    // 2026-10-01 is a Thursday.
    let grid =
      build_month_grid(ymd(2026, 10, 16));
    assert_eq!(grid.leading_blanks(), 3);
    let rows = grid.rows();
    assert_eq!(rows.len(), 5);
    assert_eq!(
      rows[0][3],
      Some(ymd(2026, 10, 1))
    );
    let last = rows
      .last()
      .expect("at least one row");
    assert_eq!(
      last[5],
      Some(ymd(2026, 10, 31))
    );
    assert_eq!(last[6], None);
    assert_eq!(grid.dates().count(), 31);
  }

  #[test]
  fn week_grid_runs_monday_to_sunday() {
    let week =
      build_week_grid(ymd(2026, 10, 18));
    assert_eq!(week[0], ymd(2026, 10, 12));
    assert_eq!(week[6], ymd(2026, 10, 18));
    assert_eq!(
      business_days(&week),
      &[
        ymd(2026, 10, 12),
        ymd(2026, 10, 13),
        ymd(2026, 10, 14),
        ymd(2026, 10, 15),
        ymd(2026, 10, 16)
      ]
    );
  }

  #[test]
  fn buckets_keep_insertion_order() {
    let tasks = vec![
      Task::new(ymd(2026, 10, 16), "Physics"),
      Task::new(ymd(2026, 10, 2), "Art"),
      Task::new(ymd(2026, 10, 16), "Music"),
    ];
    let buckets =
      bucket_tasks_by_date(&tasks);

    assert_eq!(buckets.len(), 2);
    let subjects: Vec<&str> = buckets
      .get("2026-10-16")
      .iter()
      .map(|t| t.subject.as_str())
      .collect();
    assert_eq!(
      subjects,
      vec!["Physics", "Music"]
    );
    assert!(
      day_tasks(&buckets, ymd(2026, 10, 3))
        .is_empty()
    );
  }

  #[test]
  fn agenda_lists_only_days_with_tasks() {
    let tasks = vec![
      Task::new(ymd(2026, 11, 2), "Next month"),
      Task::new(ymd(2026, 10, 20), "Late"),
      Task::new(ymd(2026, 10, 5), "Early"),
      Task::new(ymd(2026, 10, 20), "Late too"),
    ];
    let buckets =
      bucket_tasks_by_date(&tasks);
    let agenda = month_agenda(
      &buckets,
      ymd(2026, 10, 16)
    );

    let dates: Vec<CalendarDate> = agenda
      .iter()
      .map(|(date, _)| *date)
      .collect();
    assert_eq!(
      dates,
      vec![
        ymd(2026, 10, 5),
        ymd(2026, 10, 20)
      ]
    );
    assert_eq!(agenda[1].1.len(), 2);
  }
}
