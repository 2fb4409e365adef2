// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]

mod args;
mod settings;

use crate::args::{CmdArgs, Parser};
use crate::settings::{Settings, SettingsError, load_request};

use chains::{XconnectError, xconnect_ns};
use mgmt::{Configurator, MemoryConfigurator};
use pipeline::{CallScope, Cancellation, ChainError};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracectl::{TraceCtlError, custom_target, get_trace_ctl, trace_target};
use tracing::{error, info, level_filters::LevelFilter};

trace_target!("forwarder", LevelFilter::INFO, &[]);

#[derive(Debug, Error)]
enum ForwarderError {
    #[error("Missing --{0}")]
    MissingArg(&'static str),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("Failed to build the chain: {0}")]
    Build(#[from] XconnectError),
    #[error("Failed to install the signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("Engine state unavailable: {0}")]
    Engine(String),
    #[error("Failed to render the configuration: {0}")]
    Render(#[from] serde_yaml_ng::Error),
    #[error("Failed to start the runtime: {0}")]
    Runtime(std::io::Error),
}

fn init_logging() {
    let tctl = get_trace_ctl();
    tctl.set_default_level(LevelFilter::INFO);
    custom_target!("tonic", LevelFilter::ERROR, &[]);
    custom_target!("h2", LevelFilter::ERROR, &[]);
}

/// Defaults first, so that `--tracing` can override them
fn setup_tracing(args: &CmdArgs) -> Result<(), TraceCtlError> {
    init_logging();
    if let Some(tracing) = args.tracing() {
        get_trace_ctl().setup_from_string(tracing)?;
    }
    Ok(())
}

async fn print_engine_state(engine: &MemoryConfigurator) -> Result<(), ForwarderError> {
    let state = engine
        .dump()
        .await
        .map_err(|status| ForwarderError::Engine(status.to_string()))?;
    print!("{}", serde_yaml_ng::to_string(&state)?);
    Ok(())
}

async fn run(args: &CmdArgs) -> Result<(), ForwarderError> {
    let settings = args
        .settings()
        .ok_or(ForwarderError::MissingArg("settings"))?;
    let settings = Settings::load(settings)?;
    let request = args.request().ok_or(ForwarderError::MissingArg("request"))?;
    let request = load_request(request)?;

    let engine = Arc::new(MemoryConfigurator::new());
    let peer = Arc::new(settings.peer());
    let chain = xconnect_ns(settings.params(engine.clone(), peer)?)?;

    let (stop, cancellation) = Cancellation::new();
    ctrlc::set_handler(move || {
        info!("Interrupted");
        stop.cancel();
    })?;

    let scope = || {
        CallScope::with_cancellation(cancellation.clone()).with_timeout(settings.timeout())
    };
    let conn = chain.run_request(&mut scope(), request).await?;
    info!("{}: connection established", conn.id);
    print_engine_state(&engine).await?;

    if args.close() {
        chain.run_close(&mut scope(), &conn).await?;
        info!("{}: connection closed", conn.id);
        println!("---");
        print_engine_state(&engine).await?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = CmdArgs::parse();
    if let Err(e) = setup_tracing(&args) {
        error!("Invalid tracing configuration: {e}");
        return ExitCode::FAILURE;
    }
    if args.show_tracing_tags() {
        get_trace_ctl().dump_targets_by_tag();
        return ExitCode::SUCCESS;
    }
    info!("Starting forwarder...");

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ForwarderError::Runtime)
        .and_then(|runtime| runtime.block_on(run(&args)));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
