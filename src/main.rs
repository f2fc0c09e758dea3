use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::terminal;
use eyre::{Context, Result};

use tapdance::backend::actions::POINTER_ACTIONS;
use tapdance::backend::adb::{AdbActions, AdbCapture, AdbClient, ADB_ACTIONS};
use tapdance::vision::{DebugSink, TemplateMatcher};
use tapdance::workflow::{ExecutionController, RunMode, RunOutcome, WorkflowEngine, WorkflowLoader};

mod cli;

use cli::commands::Commands;
use cli::Cli;

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.is_verbose());

    match &cli.command {
        Commands::Run { workflow, repeat, device, templates, debug_dir } => {
            run_workflow(workflow, *repeat, device.clone(), templates, debug_dir.as_deref()).await
        }
        Commands::Check { workflow } => check_workflow(workflow),
        Commands::ListActions => {
            list_actions();
            Ok(())
        }
    }
}

async fn run_workflow(
    workflow: &Path,
    repeat: bool,
    device: Option<String>,
    templates: &Path,
    debug_dir: Option<&Path>,
) -> Result<()> {
    let items = WorkflowLoader::new()
        .load(workflow)
        .wrap_err_with(|| format!("Failed to load workflow {}", workflow.display()))?;
    let name = WorkflowLoader::workflow_name(workflow)?;
    println!(
        "{} {} ({} top-level items)",
        "Running:".green(),
        name.as_str().bold(),
        items.len()
    );

    let mut matcher = TemplateMatcher::new(templates);
    if let Some(dir) = debug_dir {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("Failed to create debug directory {}", dir.display()))?;
        matcher = matcher.with_debug(DebugSink::new(dir));
        println!("{} saving annotated frames to {}", "Debug:".yellow(), dir.display());
    }

    let client = Arc::new(AdbClient::new(device));
    let controller = Arc::new(ExecutionController::new(WorkflowEngine::new(
        items,
        Arc::new(AdbCapture::new(client.clone())),
        Arc::new(matcher),
        Arc::new(AdbActions::new(client)),
    )));

    let mode = if repeat { RunMode::Loop } else { RunMode::Once };
    controller.start(mode).await;
    println!("{}", "Press 'q' to stop".cyan());

    let done = Arc::new(AtomicBool::new(false));
    let key_listener = spawn_key_listener(controller.clone(), done.clone());

    let outcome = controller.wait().await;
    done.store(true, Ordering::SeqCst);
    if let Err(e) = key_listener.await {
        tracing::warn!(error = %e, "Key listener did not shut down cleanly");
    }

    match outcome {
        Some(Ok(RunOutcome::Completed)) => {
            println!("{}", "Workflow completed".green());
            Ok(())
        }
        Some(Ok(RunOutcome::Stopped)) => {
            println!("{}", "Workflow stopped".yellow());
            Ok(())
        }
        Some(Ok(RunOutcome::RecoveryExhausted { last_index })) => {
            println!(
                "{} stuck at step index {} and could not recover",
                "Workflow failed:".red(),
                last_index
            );
            std::process::exit(1);
        }
        Some(Err(e)) => Err(e).wrap_err("Workflow run failed"),
        None => Ok(()),
    }
}

/// Watch the keyboard for 'q' or Ctrl-C on a blocking task.
fn spawn_key_listener(
    controller: Arc<ExecutionController>,
    done: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = terminal::enable_raw_mode() {
            tracing::warn!(error = %e, "No raw terminal, keyboard stop unavailable");
            return;
        }
        while !done.load(Ordering::SeqCst) {
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => {
                    if let Ok(Event::Key(key)) = event::read() {
                        let ctrl_c = key.code == KeyCode::Char('c')
                            && key.modifiers.contains(KeyModifiers::CONTROL);
                        if key.code == KeyCode::Char('q') || ctrl_c {
                            controller.stop();
                            break;
                        }
                    }
                }
                Ok(false) => {}
                Err(_) => break,
            }
        }
        let _ = terminal::disable_raw_mode();
    })
}

fn check_workflow(workflow: &PathBuf) -> Result<()> {
    match WorkflowLoader::new().load(workflow) {
        Ok(items) => {
            let name = WorkflowLoader::workflow_name(workflow)?;
            let (plan, loops) = tapdance::workflow::flatten(&items);
            println!(
                "{} {} ({} steps, {} loops)",
                "Valid:".green(),
                name.as_str().bold(),
                plan.len(),
                loops.len()
            );
            for (index, entry) in plan.iter().enumerate() {
                let marker = if entry.loop_id.is_some() { "↻" } else { " " };
                println!("  {index:>3} {marker} {}", entry.step.name);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "Invalid:".red(), e);
            std::process::exit(1);
        }
    }
}

fn list_actions() {
    println!("{}", "Device (ADB) actions:".bold());
    for action in ADB_ACTIONS {
        println!("  {action}");
    }
    println!("{}", "Pointer actions:".bold());
    for action in POINTER_ACTIONS {
        println!("  {action}");
    }
}
