use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::calendar::{
    DAYS_PER_WEEK, TaskBuckets, build_month_grid, build_week_grid, business_days, day_tasks,
    month_agenda,
};
use crate::config::{Config, parse_bool};
use crate::datastore::ScheduleSummary;
use crate::datetime::{CalendarDate, format_calendar_date};
use crate::metrics::Metrics;
use crate::mutation::CompletionUpdate;
use crate::navigation::{Granularity, ViewState};
use crate::task::{Schedule, Task, TaskStatus, classify};

const WEEKDAY_HEADERS: [&str; DAYS_PER_WEEK] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = match cfg.get("color") {
            Some(raw) => {
                parse_bool(&raw).ok_or_else(|| anyhow!("invalid color setting: {raw}"))?
            }
            None => true,
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, summaries))]
    pub fn print_schedule_list(&mut self, summaries: &[ScheduleSummary]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_schedule_list(&mut out, summaries)
    }

    pub fn write_schedule_list<W: Write>(
        &self,
        out: &mut W,
        summaries: &[ScheduleSummary],
    ) -> anyhow::Result<()> {
        if summaries.is_empty() {
            writeln!(out, "No schedules.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Name".to_string(),
            "Tasks".to_string(),
            "Done".to_string(),
            "From".to_string(),
            "To".to_string(),
        ];

        let rows = summaries
            .iter()
            .map(|summary| {
                vec![
                    self.paint(&summary.id, "33"),
                    summary.name.clone(),
                    summary.task_count.to_string(),
                    summary.completed_count.to_string(),
                    summary
                        .first_date
                        .map(format_calendar_date)
                        .unwrap_or_default(),
                    summary
                        .last_date
                        .map(format_calendar_date)
                        .unwrap_or_default(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, schedule, buckets))]
    pub fn print_view(
        &mut self,
        schedule: &Schedule,
        view: &ViewState,
        buckets: &TaskBuckets<'_>,
        today: CalendarDate,
        agenda: bool,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_view(&mut out, schedule, view, buckets, today, agenda)
    }

    pub fn write_view<W: Write>(
        &self,
        out: &mut W,
        schedule: &Schedule,
        view: &ViewState,
        buckets: &TaskBuckets<'_>,
        today: CalendarDate,
        agenda: bool,
    ) -> anyhow::Result<()> {
        writeln!(
            out,
            "{} ({})",
            self.paint(&schedule.name, "1"),
            view.granularity.label()
        )?;

        match view.granularity {
            Granularity::Daily => self.write_day(out, view, buckets, today),
            Granularity::Weekly => self.write_week(out, view, buckets, today),
            Granularity::Monthly if agenda => self.write_agenda(out, view, buckets, today),
            Granularity::Monthly => self.write_month_grid(out, view, buckets, today),
        }
    }

    fn write_day<W: Write>(
        &self,
        out: &mut W,
        view: &ViewState,
        buckets: &TaskBuckets<'_>,
        today: CalendarDate,
    ) -> anyhow::Result<()> {
        let mut heading = format!(
            "{}, {}",
            view.heading(),
            format_calendar_date(view.reference_date)
        );
        if view.is_on_today(today) {
            heading.push_str(" (today)");
        }
        writeln!(out, "{heading}")?;

        let tasks = day_tasks(buckets, view.reference_date);
        if tasks.is_empty() {
            writeln!(out, "No tasks scheduled.")?;
            return Ok(());
        }

        let headers = vec!["Status".to_string(), "Subject".to_string()];
        let rows = tasks
            .iter()
            .map(|task| {
                let status = classify(task, today);
                vec![
                    self.status_label(status),
                    task.subject.clone(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn write_week<W: Write>(
        &self,
        out: &mut W,
        view: &ViewState,
        buckets: &TaskBuckets<'_>,
        today: CalendarDate,
    ) -> anyhow::Result<()> {
        let week = build_week_grid(view.reference_date);
        let days = business_days(&week);
        let (first, last) = (days[0], days[days.len() - 1]);
        writeln!(
            out,
            "{} ({} .. {})",
            view.heading(),
            format_calendar_date(first),
            format_calendar_date(last)
        )?;

        for date in days {
            let label = date.format("%a %m-%d").to_string();
            let label = if *date == today {
                self.paint(&format!("{label} *"), "35")
            } else {
                label
            };
            writeln!(out, "{label}")?;
            self.write_task_lines(out, day_tasks(buckets, *date), today)?;
        }

        Ok(())
    }

    fn write_month_grid<W: Write>(
        &self,
        out: &mut W,
        view: &ViewState,
        buckets: &TaskBuckets<'_>,
        today: CalendarDate,
    ) -> anyhow::Result<()> {
        let grid = build_month_grid(view.reference_date);
        writeln!(out, "{}", grid.month_start().format("%B %Y"))?;

        let header = WEEKDAY_HEADERS
            .iter()
            .map(|name| format!("{name:<3}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{}", header.trim_end())?;

        for row in grid.rows() {
            let cells = row
                .iter()
                .map(|cell| match cell {
                    Some(date) => self.month_cell(*date, day_tasks(buckets, *date), today),
                    None => "   ".to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(out, "{}", cells.trim_end())?;
        }

        writeln!(
            out,
            "{} completed  {} missed  {} today  {} upcoming",
            status_marker(TaskStatus::Completed),
            status_marker(TaskStatus::Missed),
            status_marker(TaskStatus::Today),
            status_marker(TaskStatus::Upcoming)
        )?;
        Ok(())
    }

    fn write_agenda<W: Write>(
        &self,
        out: &mut W,
        view: &ViewState,
        buckets: &TaskBuckets<'_>,
        today: CalendarDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", view.reference_date.format("%B %Y"))?;

        let agenda = month_agenda(buckets, view.reference_date);
        if agenda.is_empty() {
            writeln!(out, "No tasks this month.")?;
            return Ok(());
        }

        for (date, tasks) in agenda {
            writeln!(out, "{}", date.format("%a %Y-%m-%d"))?;
            self.write_task_lines(out, &tasks, today)?;
        }
        Ok(())
    }

    fn write_task_lines<W: Write>(
        &self,
        out: &mut W,
        tasks: &[&Task],
        today: CalendarDate,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "  -")?;
            return Ok(());
        }
        for task in tasks {
            let status = classify(task, today);
            writeln!(
                out,
                "  {} {}",
                self.paint(status_marker(status), status_color(status)),
                task.subject
            )?;
        }
        Ok(())
    }

    fn month_cell(&self, date: CalendarDate, tasks: &[&Task], today: CalendarDate) -> String {
        let day = date.format("%e").to_string();
        let cell = match day_status(tasks, today) {
            Some(status) => format!(
                "{day}{}",
                self.paint(status_marker(status), status_color(status))
            ),
            None => format!("{day} "),
        };
        if date == today {
            self.paint(&cell, "7")
        } else {
            cell
        }
    }

    #[tracing::instrument(skip(self, schedule, metrics))]
    pub fn print_report(
        &mut self,
        schedule: &Schedule,
        metrics: &Metrics,
        message: usize,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_report(&mut out, schedule, metrics, message)
    }

    pub fn write_report<W: Write>(
        &self,
        out: &mut W,
        schedule: &Schedule,
        metrics: &Metrics,
        message: usize,
    ) -> anyhow::Result<()> {
        writeln!(out, "schedule     {} ({})", schedule.name, schedule.id)?;
        writeln!(out, "completed    {}", metrics.completed_count)?;
        writeln!(out, "missed       {}", metrics.missed_count)?;
        writeln!(out, "remaining    {}", metrics.remaining_count)?;
        writeln!(out, "total        {}", metrics.total_count)?;
        writeln!(out, "completion   {}%", metrics.completion_percent())?;
        writeln!(out, "progress     {}%", metrics.progress_percent())?;
        writeln!(out, "achievement  {}%", metrics.achievement_percent())?;
        writeln!(
            out,
            "streak       {} (best {})",
            metrics.current_streak, metrics.best_streak
        )?;

        let tier = metrics.feedback_tier();
        writeln!(out)?;
        writeln!(out, "{}", self.paint(tier.title(), "1"))?;
        writeln!(out, "{}", tier.message(message))?;
        Ok(())
    }

    /// One-line progress footer shown under calendar views.
    pub fn write_summary_line<W: Write>(&self, out: &mut W, metrics: &Metrics) -> anyhow::Result<()> {
        writeln!(
            out,
            "{}/{} done, {}% completion, streak {} (best {})",
            metrics.completed_count,
            metrics.total_count,
            metrics.completion_percent(),
            metrics.current_streak,
            metrics.best_streak
        )?;
        Ok(())
    }

    pub fn print_summary_line(&mut self, metrics: &Metrics) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_summary_line(&mut out, metrics)
    }

    #[tracing::instrument(skip(self, update))]
    pub fn print_completion(&mut self, update: &CompletionUpdate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let state = if update.task.completed {
            "completed"
        } else {
            "not completed"
        };
        let date = format_calendar_date(update.task.date);

        if update.changed {
            writeln!(out, "Marked {} on {date} as {state}.", update.task.subject)?;
        } else {
            writeln!(out, "{} on {date} was already {state}.", update.task.subject)?;
        }
        self.write_summary_line(&mut out, &update.metrics)
    }

    fn status_label(&self, status: TaskStatus) -> String {
        self.paint(
            &format!("{} {}", status_marker(status), status.as_key()),
            status_color(status),
        )
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Status shown for a whole day: any missed task wins, then an open task
/// due today, then anything still upcoming; a day is completed only when
/// every task is.
fn day_status(tasks: &[&Task], today: CalendarDate) -> Option<TaskStatus> {
    if tasks.is_empty() {
        return None;
    }
    let statuses: Vec<TaskStatus> = tasks.iter().map(|task| task.status(today)).collect();
    [TaskStatus::Missed, TaskStatus::Today, TaskStatus::Upcoming]
        .into_iter()
        .find(|wanted| statuses.contains(wanted))
        .or(Some(TaskStatus::Completed))
}

fn status_marker(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Completed => "✓",
        TaskStatus::Missed => "✗",
        TaskStatus::Today => "•",
        TaskStatus::Upcoming => "○",
    }
}

fn status_color(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Completed => "32",
        TaskStatus::Missed => "31",
        TaskStatus::Today => "35",
        TaskStatus::Upcoming => "36",
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::calendar::bucket_tasks_by_date;
    use crate::metrics::compute_metrics;

    fn ymd(y: i32, m: u32, d: u32) -> CalendarDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn plain() -> Renderer {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "off".to_string())]);
        Renderer::new(&cfg).expect("renderer")
    }

    fn sample() -> Schedule {
        let mut done = Task::new(ymd(2026, 10, 14), "Biology");
        done.completed = true;
        Schedule::with_id(
            "s1",
            "Midterms",
            vec![
                done,
                Task::new(ymd(2026, 10, 15), "Chemistry"),
                Task::new(ymd(2026, 10, 16), "Physics"),
                Task::new(ymd(2026, 10, 19), "Maths"),
            ],
        )
    }

    fn render(view: ViewState, agenda: bool) -> String {
        let schedule = sample();
        let buckets = bucket_tasks_by_date(&schedule.tasks);
        let mut out = Vec::new();
        plain()
            .write_view(&mut out, &schedule, &view, &buckets, ymd(2026, 10, 16), agenda)
            .expect("render");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn rejects_unknown_color_setting() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "sometimes".to_string())]);
        assert!(Renderer::new(&cfg).is_err());
    }

    #[test]
    fn color_setting_uses_config_boolean_spellings() {
        for raw in ["y", "n", "Off", "1"] {
            let mut cfg = Config::default();
            cfg.apply_overrides(vec![("color".to_string(), raw.to_string())]);
            assert!(Renderer::new(&cfg).is_ok(), "{raw}");
        }
    }

    #[test]
    fn month_grid_aligns_first_day_under_weekday() {
        let text = render(
            ViewState::with_granularity(Granularity::Monthly, ymd(2026, 10, 16)),
            false,
        );
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[1], "October 2026");
        assert_eq!(lines[2], "Mo  Tu  We  Th  Fr  Sa  Su");
        // 2026-10-01 is a Thursday: three blank cells first.
        assert_eq!(lines[3], format!("{}1   2   3   4", " ".repeat(13)));
        assert!(text.contains("14✓"));
        assert!(text.contains("15✗"));
        assert!(text.contains("16•"));
        assert!(text.contains("19○"));
    }

    #[test]
    fn daily_view_lists_tasks_with_status() {
        let text = render(ViewState::new(ymd(2026, 10, 16)), false);
        assert!(text.contains("Friday, 2026-10-16 (today)"));
        assert!(text.contains("• today"));
        assert!(text.contains("Physics"));

        let empty = render(ViewState::new(ymd(2026, 10, 17)), false);
        assert!(empty.contains("No tasks scheduled."));
    }

    #[test]
    fn weekly_view_shows_business_days_only() {
        let text = render(
            ViewState::with_granularity(Granularity::Weekly, ymd(2026, 10, 16)),
            false,
        );
        assert!(text.contains("Week 3 (2026-10-12 .. 2026-10-16)"));
        assert!(text.contains("Fri 10-16 *"));
        assert!(!text.contains("Sat"));
        assert!(text.contains("  ✓ Biology"));
        assert!(!text.contains("Maths"));
    }

    #[test]
    fn agenda_lists_only_days_with_tasks() {
        let text = render(
            ViewState::with_granularity(Granularity::Monthly, ymd(2026, 10, 1)),
            true,
        );
        let day_lines = text
            .lines()
            .filter(|line| !line.starts_with(' ') && line.contains("2026-10-"))
            .count();
        assert_eq!(day_lines, 4);
        assert!(text.contains("Mon 2026-10-19"));
    }

    #[test]
    fn report_includes_tier_message() {
        let schedule = sample();
        let metrics = compute_metrics(&schedule.tasks, ymd(2026, 10, 16));
        let mut out = Vec::new();
        plain()
            .write_report(&mut out, &schedule, &metrics, 0)
            .expect("report");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.contains("completion   50%"));
        assert!(text.contains(metrics.feedback_tier().title()));
        assert!(text.contains(metrics.feedback_tier().message(0)));
    }

    #[test]
    fn day_status_prefers_missed_then_today() {
        let today = ymd(2026, 10, 16);
        let mut done = Task::new(today, "a");
        done.completed = true;
        let open = Task::new(today, "b");
        let late = Task::new(ymd(2026, 10, 15), "c");

        assert_eq!(day_status(&[], today), None);
        assert_eq!(day_status(&[&done], today), Some(TaskStatus::Completed));
        assert_eq!(day_status(&[&done, &open], today), Some(TaskStatus::Today));
        assert_eq!(day_status(&[&late, &open], today), Some(TaskStatus::Missed));
    }

    #[test]
    fn strip_ansi_removes_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }
}
