pub mod auth;
pub mod board;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod form;
pub mod lookup;
pub mod notice;
pub mod render;
pub mod session;
pub mod task;

#[cfg(test)]
mod fake_api;

use std::ffi::OsString;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
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
    "starting taskdeck"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );
  debug!(files = ?cfg.loaded_files, "configuration loaded");

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    session::SessionStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open session store \
         at {}",
        data_dir.display()
      )
    })?;

  let session =
    store.load().unwrap_or_else(|err| {
      warn!(
        error = %err,
        "failed reading stored session; \
         continuing logged out"
      );
      None
    });
  let api = Arc::new(
    client::ApiClient::from_config(
      &cfg
    )?
    .with_session(session)
  );

  let renderer =
    render::Renderer::new(&cfg)?;
  let ctx = commands::Ctx::new(
    api, &store, &cfg, &renderer
  )?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;
  runtime.block_on(
    commands::dispatch(
      &ctx,
      cli.command
    )
  )?;

  info!("done");
  Ok(())
}
