// src/main.rs
mod config;
mod errors;
mod irq;
mod logging;
mod tasks;

use anyhow::{Context, Result};
use callback_sched::{Scheduler, SystemClock};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    // -------- config ----------
    let cli = config::Cli::parse();
    let cfg = cli.build_config()?;
    if cli.dump_config {
        print!("{}", toml::to_string_pretty(&cfg)?);
        return Ok(());
    }

    // -------- logging ----------
    std::fs::create_dir_all(&cfg.log_dir)
        .with_context(|| format!("creating log dir {}", cfg.log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(&cfg.log_dir, "sched_runner.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive("sched_runner=info".parse()?)
                .add_directive("callback_sched=info".parse()?)
                .add_directive("tokio=warn".parse()?),
        )
        .with(fmt::layer().compact())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();
    logging::csv::init(&cfg.log_dir)?;
    info!(?cfg, "scheduler runner starting");

    // -------- scheduler ----------
    let sched = Scheduler::new(Arc::new(SystemClock::new()), cfg.scheduler_config());
    if callback_sched::install(sched.clone()).is_err() {
        anyhow::bail!("process scheduler already installed");
    }

    // periodic work goes in before the loop runs
    tasks::spawn_all(&cfg)?;
    let irq_task = irq::spawn(cfg.irq.clone());

    let loop_sched = sched.clone();
    let dispatch = tokio::task::spawn_blocking(move || loop_sched.run());

    info!(pending = sched.pending(), "running. Press Ctrl+C to stop");

    // -------- graceful shutdown ----------
    let limit = async {
        match cfg.run_secs {
            Some(secs) => tokio::time::sleep(std::time::Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(?e, "failed to listen for Ctrl+C");
            }
            info!("shutdown signal received");
        }
        _ = limit => info!(secs = ?cfg.run_secs, "run time elapsed"),
    }

    if let Some(t) = irq_task {
        t.abort();
    }
    sched.shutdown();
    dispatch.await.context("dispatch loop panicked")?;

    let st = sched.stats();
    info!(
        posted = st.posted,
        executed = st.executed,
        rearmed = st.rearmed,
        cancelled = st.cancelled,
        late = st.late,
        rejected = st.rejected,
        "final scheduler stats"
    );
    logging::csv::flush();
    Ok(())
}
