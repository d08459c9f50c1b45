// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod job;
pub mod logging;
pub mod script;
pub mod types;
pub mod validator;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::resolve_config;
use crate::engine::{EngineSettings, JobEngine, LogEventSink};
use crate::fs::{FileSystem, RealFileSystem};
use crate::job::{CheckReport, JobEnvironment, LogNotifier};
use crate::types::{JobName, JobPayload};

/// High-level entry point used by `main.rs`.
///
/// Wires together config loading, the engine with log-only host services,
/// `--submit` files, and Ctrl-C handling.
pub async fn run(args: CliArgs) -> Result<()> {
    let explicit = args.config.as_deref().map(Path::new);
    let (cfg, base_dir) = resolve_config(explicit)?;

    let mut settings = EngineSettings::from_config(&cfg, &base_dir).with_exit_when_idle(args.once);
    if let Some(dir) = &args.jobs_dir {
        settings = settings.with_jobs_dir(PathBuf::from(dir));
    }
    debug!(?settings, "engine settings");

    let env = JobEnvironment::new(Arc::new(LogNotifier), Arc::new(LogEventSink));
    let engine = JobEngine::new(settings, env)?;

    if args.check {
        let reports = engine.check();
        print_check(&engine, &reports);
        if reports.iter().any(|r| r.outcome.is_err()) {
            anyhow::bail!("one or more job files failed to load");
        }
        return Ok(());
    }

    // Ctrl-C → cooperative stop.
    {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received");
            engine.stop();
        });
    }

    submit_files(&engine, &RealFileSystem, &args.submit)?;

    engine.start().await?;
    Ok(())
}

/// Submit each `--submit` file through `fs`. A rejected script is logged and
/// skipped; an unreadable file aborts. Returns the accepted job names.
pub fn submit_files(
    engine: &JobEngine,
    fs: &dyn FileSystem,
    paths: &[String],
) -> Result<Vec<JobName>> {
    let mut accepted = Vec::new();
    for path in paths {
        let script = fs
            .read_to_string(Path::new(path))
            .with_context(|| format!("loading job script for --submit {path:?}"))?;
        match engine.submit_job(JobPayload::new(script)) {
            Ok(name) => {
                info!(job = %name, path = %path, "submitted job");
                accepted.push(name);
            }
            Err(err) => warn!(path = %path, error = %err, "job submission rejected"),
        }
    }
    Ok(accepted)
}

/// `--check` output: one line per candidate file.
fn print_check(engine: &JobEngine, reports: &[CheckReport]) {
    println!("jobhost check");
    println!("  jobs_dir = {:?}", engine.settings().jobs_dir);
    println!("  suffixes = {:?}", engine.settings().suffixes);
    println!();

    println!("jobs ({}):", reports.len());
    for report in reports {
        match &report.outcome {
            Ok(name) => println!("  ok    {name}  ({})", report.path.display()),
            Err(err) => println!("  error {err}"),
        }
    }

    debug!("check complete (nothing executed)");
}
