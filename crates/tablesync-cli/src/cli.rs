//! `tablesync` command-line entry point

mod args;
mod logging;
mod output;
mod settings;

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tablesync_connection::ConnectionManager;
use tablesync_migrate::{
    DriverExecutor, MigrationEngine, MigrationError, MigrationRun, RunVerdict, SyncProgress,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::args::{Cli, Command, MigrationArgs};
use crate::logging::LoggingConfig;
use crate::output::ConnectionView;
use crate::settings::Settings;

/// Exit status when a precheck blocks the migration
const EXIT_BLOCKED: u8 = 2;
/// Exit status when at least one table failed
const EXIT_FAILED: u8 = 1;

type Engine = MigrationEngine<DriverExecutor>;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(&LoggingConfig::from_verbosity(cli.verbose, cli.log_format))?;

    let settings_path = match &cli.settings {
        Some(path) => path.clone(),
        None => settings::settings_file()?,
    };
    let settings = Settings::load(&settings_path)?;

    let connections_path = match &cli.connections {
        Some(path) => path.clone(),
        None => settings::connections_file()?,
    };
    let manager = Arc::new(ConnectionManager::with_storage_path(connections_path.clone()));
    manager.load_from_storage().await.with_context(|| {
        format!(
            "Failed to load saved connections from {}",
            connections_path.display()
        )
    })?;

    let result = run_command(&cli, manager.clone(), &settings).await;

    if let Err(e) = manager.disconnect_all().await {
        tracing::warn!(error = %e, "failed to close connections cleanly");
    }
    result
}

async fn run_command(
    cli: &Cli,
    manager: Arc<ConnectionManager>,
    settings: &Settings,
) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Command::Connections => {
            let saved = manager.saved_connections();
            if cli.json {
                let views: Vec<ConnectionView> = saved.iter().map(ConnectionView::from).collect();
                println!("{}", output::to_json(&views)?);
            } else {
                println!("{}", output::render_connections(&saved));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Test { conn } => {
            let saved = manager
                .find_saved(conn)
                .with_context(|| format!("No saved connection '{}'", conn))?;
            manager
                .test_saved(saved.id)
                .await
                .with_context(|| format!("Connection '{}' failed", saved.name))?;
            println!("Connection '{}' ({}) is reachable", saved.name, saved.address());
            Ok(ExitCode::SUCCESS)
        }
        Command::Stats { conn, db } => {
            let engine = build_engine(manager, settings);
            let stats = engine.list_table_stats(conn, db).await?;
            if cli.json {
                println!("{}", output::to_json(&stats)?);
            } else {
                println!("{}", output::render_stats(&stats));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Precheck(args) => {
            let engine = build_engine(manager, settings);
            let mut run = MigrationRun::new(args.to_request());
            let verdict = prepare_run(&engine, &mut run, args).await?;
            print_verdict(cli.json, &verdict)?;
            Ok(if verdict.blocked {
                ExitCode::from(EXIT_BLOCKED)
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Run(args) => run_migration(cli.json, manager, settings, args).await,
    }
}

fn build_engine(manager: Arc<ConnectionManager>, settings: &Settings) -> Engine {
    let executor = DriverExecutor::new(manager)
        .with_insert_batch_size(settings.sync.insert_batch_size);
    MigrationEngine::new(Arc::new(executor), settings.sync.clone())
}

/// Precheck the run and apply `--skip`, rechecking when narrowing
/// drops a blocked verdict back to draft.
async fn prepare_run(
    engine: &Engine,
    run: &mut MigrationRun,
    args: &MigrationArgs,
) -> anyhow::Result<RunVerdict> {
    let verdict = engine.precheck_run(run).await?;
    if args.skip.is_empty() {
        return Ok(verdict);
    }

    run.narrow_selection(args.skip.iter().cloned())?;
    let narrowed = if run.is_ready() {
        run.verdict().cloned()
    } else {
        None
    };
    match narrowed {
        Some(verdict) => Ok(verdict),
        None => Ok(engine.precheck_run(run).await?),
    }
}

fn print_verdict(json: bool, verdict: &RunVerdict) -> anyhow::Result<()> {
    if json {
        println!("{}", output::to_json(verdict)?);
    } else {
        println!("{}", output::render_verdict(verdict));
    }
    Ok(())
}

async fn run_migration(
    json: bool,
    manager: Arc<ConnectionManager>,
    settings: &Settings,
    args: &MigrationArgs,
) -> anyhow::Result<ExitCode> {
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let engine = build_engine(manager, settings).with_progress(progress_tx);

    let mut run = MigrationRun::new(args.to_request());
    let verdict = prepare_run(&engine, &mut run, args).await?;
    if verdict.blocked {
        print_verdict(json, &verdict)?;
        return Ok(ExitCode::from(EXIT_BLOCKED));
    }

    let printer = tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            match event {
                SyncProgress::TableStarted { name } => eprintln!("-> {}", name),
                SyncProgress::TableFinished(outcome) => match &outcome.error_detail {
                    Some(detail) => eprintln!("   {} {}: {}", outcome.name, outcome.status, detail),
                    None => eprintln!(
                        "   {} {} ({} rows, {} ms)",
                        outcome.name, outcome.status, outcome.rows_copied, outcome.elapsed_ms
                    ),
                },
            }
        }
    });

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling remaining tables");
                cancel.cancel();
            }
        })
    };

    let result = engine.execute_run(&mut run, cancel).await;
    interrupt.abort();
    // Dropping the engine closes the progress channel
    drop(engine);
    if let Err(e) = printer.await {
        tracing::debug!(error = %e, "progress printer stopped");
    }

    let report = match result {
        Ok(report) => report,
        Err(MigrationError::Blocked(verdict)) => {
            print_verdict(json, &verdict)?;
            return Ok(ExitCode::from(EXIT_BLOCKED));
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", output::to_json(&report)?);
    } else {
        println!("{}", output::render_report(&report));
    }

    Ok(if report.has_failures() {
        ExitCode::from(EXIT_FAILED)
    } else {
        ExitCode::SUCCESS
    })
}
