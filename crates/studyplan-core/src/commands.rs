use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::Context;
use tracing::{debug, info, instrument, warn};

use crate::calendar::bucket_tasks_by_date;
use crate::cli::Command;
use crate::clock::Clock;
use crate::config::Config;
use crate::datastore::{ScheduleStore, ScheduleSummary, export_schedule, parse_import};
use crate::datetime::{CalendarDate, parse_date_expr};
use crate::metrics::compute_metrics;
use crate::mutation::{CompletionUpdate, TaskSelector, rename_schedule, set_task_completion};
use crate::navigation::{Granularity, ViewState};
use crate::render::Renderer;
use crate::task::Schedule;

/// Runs one command. `today` is read from the clock exactly once and
/// threaded through everything below.
#[instrument(skip(store, cfg, renderer, clock, command))]
pub fn dispatch(
    store: &mut dyn ScheduleStore,
    cfg: &Config,
    renderer: &mut Renderer,
    clock: &dyn Clock,
    command: Command,
) -> anyhow::Result<()> {
    let today = clock.today();
    debug!(%today, ?command, "dispatching");

    match command {
        Command::List => cmd_list(store, renderer),
        Command::Show {
            id,
            view,
            date,
            step,
            agenda,
        } => {
            let state = resolve_view(cfg, today, view.as_deref(), date.as_deref(), step)?;
            cmd_show(store, renderer, &id, &state, today, agenda)
        }
        Command::Report { id, message } => cmd_report(store, renderer, &id, today, message),
        Command::Complete { id, date, task } => {
            cmd_set_completion(store, renderer, &id, &date, &task, true, today)
        }
        Command::Reopen { id, date, task } => {
            cmd_set_completion(store, renderer, &id, &date, &task, false, today)
        }
        Command::Rename { id, name } => cmd_rename(store, &id, &name),
        Command::Remove { id } => cmd_remove(store, &id),
        Command::Import { path } => cmd_import(store, path.as_deref()),
        Command::Export { id } => cmd_export(store, &id),
    }
}

/// Builds the view the `show` command renders: granularity from the flag
/// or `view.default`, positioned at `date` (default today), then moved
/// `step` times.
pub fn resolve_view(
    cfg: &Config,
    today: CalendarDate,
    view: Option<&str>,
    date: Option<&str>,
    step: i32,
) -> anyhow::Result<ViewState> {
    let granularity = match view {
        Some(raw) => raw.parse::<Granularity>()?,
        None => cfg.default_granularity(),
    };

    let mut state = ViewState::with_granularity(granularity, today);
    if let Some(expr) = date {
        state.focus(parse_date_expr(expr, today)?);
    }
    state.step(step);

    debug!(
        granularity = %state.granularity,
        reference = %state.reference_date,
        "resolved view"
    );
    Ok(state)
}

#[instrument(skip(store, renderer))]
fn cmd_list(store: &mut dyn ScheduleStore, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command list");
    let summaries = store.list()?;
    renderer.print_schedule_list(&summaries)
}

#[instrument(skip(store, renderer, state))]
fn cmd_show(
    store: &mut dyn ScheduleStore,
    renderer: &mut Renderer,
    id: &str,
    state: &ViewState,
    today: CalendarDate,
    agenda: bool,
) -> anyhow::Result<()> {
    info!("command show");
    let schedule = store.load(id)?;
    let buckets = bucket_tasks_by_date(&schedule.tasks);
    renderer.print_view(&schedule, state, &buckets, today, agenda)?;

    let metrics = compute_metrics(&schedule.tasks, today);
    renderer.print_summary_line(&metrics)
}

#[instrument(skip(store, renderer))]
fn cmd_report(
    store: &mut dyn ScheduleStore,
    renderer: &mut Renderer,
    id: &str,
    today: CalendarDate,
    message: usize,
) -> anyhow::Result<()> {
    info!("command report");
    let schedule = store.load(id)?;
    let metrics = compute_metrics(&schedule.tasks, today);
    renderer.print_report(&schedule, &metrics, message)
}

#[instrument(skip(store, renderer))]
fn cmd_set_completion(
    store: &mut dyn ScheduleStore,
    renderer: &mut Renderer,
    id: &str,
    date_expr: &str,
    selector: &str,
    completed: bool,
    today: CalendarDate,
) -> anyhow::Result<()> {
    info!(completed, "command set completion");
    let update = apply_completion(store, id, date_expr, selector, completed, today)?;
    renderer.print_completion(&update)
}

/// Toggles one task and persists the new snapshot. Nothing is written when
/// the task already had the requested value.
pub fn apply_completion(
    store: &mut dyn ScheduleStore,
    id: &str,
    date_expr: &str,
    selector: &str,
    completed: bool,
    today: CalendarDate,
) -> anyhow::Result<CompletionUpdate> {
    let date = parse_date_expr(date_expr, today)?;
    let selector: TaskSelector = selector.parse()?;
    let schedule = store.load(id)?;

    let update = set_task_completion(&schedule, date, &selector, completed, today)?;
    if update.changed {
        store
            .save(&update.schedule)
            .with_context(|| format!("failed to save schedule {id}"))?;
    } else {
        debug!("task already in requested state; skipping save");
    }

    Ok(update)
}

#[instrument(skip(store))]
fn cmd_rename(store: &mut dyn ScheduleStore, id: &str, name: &str) -> anyhow::Result<()> {
    info!("command rename");
    let renamed = apply_rename(store, id, name)?;
    println!("Renamed schedule {} to {:?}.", renamed.id, renamed.name);
    Ok(())
}

pub fn apply_rename(
    store: &mut dyn ScheduleStore,
    id: &str,
    name: &str,
) -> anyhow::Result<Schedule> {
    let schedule = store.load(id)?;
    let renamed = rename_schedule(&schedule, name)?;
    store.save(&renamed)?;
    Ok(renamed)
}

#[instrument(skip(store))]
fn cmd_remove(store: &mut dyn ScheduleStore, id: &str) -> anyhow::Result<()> {
    info!("command remove");
    store.remove(id)?;
    println!("Removed schedule {id}.");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_import(store: &mut dyn ScheduleStore, path: Option<&Path>) -> anyhow::Result<()> {
    info!("command import");

    let text = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read import from stdin")?;
            buf
        }
    };

    let imported = import_text(store, &text)?;
    for summary in &imported {
        println!(
            "Imported {} ({}, {} tasks).",
            summary.name, summary.id, summary.task_count
        );
    }
    Ok(())
}

/// Parses an import document and saves every schedule in it. A schedule
/// whose id already exists replaces the stored one.
pub fn import_text(
    store: &mut dyn ScheduleStore,
    text: &str,
) -> anyhow::Result<Vec<ScheduleSummary>> {
    let schedules = parse_import(text)?;
    let mut imported = Vec::with_capacity(schedules.len());

    for schedule in schedules {
        if store.load(&schedule.id).is_ok() {
            warn!(id = %schedule.id, "replacing existing schedule");
        }
        store.save(&schedule)?;
        imported.push(ScheduleSummary::from(&schedule));
    }

    info!(count = imported.len(), "import complete");
    Ok(imported)
}

#[instrument(skip(store))]
fn cmd_export(store: &mut dyn ScheduleStore, id: &str) -> anyhow::Result<()> {
    info!("command export");
    let schedule = store.load(id)?;
    println!("{}", export_schedule(&schedule)?);
    Ok(())
}
