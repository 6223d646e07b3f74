pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod duration;
pub mod error;
pub mod hidden_days;
pub mod navigation;
pub mod options;
pub mod profile;
pub mod range;
pub mod render;
pub mod render_range;
pub mod state;
pub mod title;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use crate::error::ProfileError;
pub use crate::profile::{
  DateProfile,
  DateProfileGenerator
};
pub use crate::state::{
  Action,
  Calendar,
  CalendarState
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting almanac CLI"
  );

  let overrides: Vec<(String, String)> = cli
    .overrides
    .into_iter()
    .map(|kv| (kv.key, kv.value))
    .collect();
  debug!(?overrides, "config overrides");

  let cfg = config::Config::load(
    cli.config.as_deref(),
    &overrides
  )?;

  let data_dir =
    config::resolve_data_dir(
      &cfg.calendar,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let timezone =
    datetime::resolve_timezone(
      cfg.calendar.timezone.as_deref()
    );
  let clock = Box::new(
    datetime::SystemClock::new(timezone)
  );

  let renderer =
    render::Renderer::new(&cfg.calendar);
  let inv =
    cli::Invocation::parse(cli.rest)?;

  commands::dispatch(
    &store,
    &cfg.calendar,
    &renderer,
    clock,
    inv,
    std::io::stdout().lock()
  )?;

  info!("done");
  Ok(())
}
