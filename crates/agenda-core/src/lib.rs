pub mod availability;
pub mod cli;
pub mod commands;
pub mod config;
pub mod date;
pub mod error;
pub mod filter;
pub mod grid;
pub mod item;
pub mod present;
pub mod slot;
pub mod source;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
};

pub use error::{
  AgendaError,
  Result
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli = cli::GlobalCli::parse_from(
    raw_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting agenda CLI"
  );
  debug!(overrides = ?cli.rc_overrides, "rc overrides");

  let mut cfg = config::Config::load(
    cli.agendarc.as_deref()
  )?;
  cfg.apply_overrides(cli.rc_overrides);

  let timezone = date::resolve_timezone(
    cfg.get("timezone").as_deref()
  );
  let today = date::today_in(timezone);
  debug!(%timezone, %today, "resolved today");

  let items_path =
    config::resolve_items_path(
      &cfg,
      cli.items.as_deref()
    )
    .context(
      "failed to resolve item file"
    )?;

  let items = if items_path.is_file() {
    source::ItemSource::open(&items_path)?
      .load_items()
      .with_context(|| {
        format!(
          "failed to load items from {}",
          items_path.display()
        )
      })?
  } else {
    warn!(path = %items_path.display(), "item file not found; showing an empty calendar");
    vec![]
  };

  let renderer =
    present::Renderer::new(&cfg)?;
  let command =
    cli.command.unwrap_or_default();

  commands::dispatch(
    command,
    &cfg,
    &items,
    &renderer,
    today,
    io::stdout().lock()
  )?;

  info!("done");
  Ok(())
}
