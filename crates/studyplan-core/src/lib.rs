pub mod calendar;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod metrics;
pub mod mutation;
pub mod navigation;
pub mod render;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::clock::{
  Clock,
  FixedClock,
  SystemClock
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting studyplan CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let mut store =
    datastore::JsonFileStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open schedule store \
         at {}",
        data_dir.display()
      )
    })?;

  let mut renderer =
    render::Renderer::new(&cfg)?;

  let clock: Box<dyn Clock> =
    match cli.today.as_deref() {
      | Some(raw) => {
        let day =
          datetime::parse_calendar_date(
            raw
          )
          .context("invalid --today")?;
        info!(today = %day, "using fixed clock");
        Box::new(FixedClock(day))
      }
      | None => {
        Box::new(SystemClock::from_config(
          &cfg
        ))
      }
    };

  let command = cli
    .command
    .unwrap_or(cli::Command::List);

  commands::dispatch(
    &mut store,
    &cfg,
    &mut renderer,
    clock.as_ref(),
    command
  )?;

  info!("done");
  Ok(())
}
