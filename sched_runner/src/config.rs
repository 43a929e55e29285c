// Command line interface
// runtime configuration (capacity, tolerances, task rates, interrupt line)
use crate::errors::RunnerError;
use anyhow::{Context, Result};
use callback_sched::{Duration, SchedulerConfig, milliseconds};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capacity: usize,
    pub default_tolerance_ms: u64,
    /// Stop after this many seconds instead of waiting for Ctrl+C.
    pub run_secs: Option<u64>,
    pub log_dir: PathBuf,
    pub heartbeat_ms: u64,
    pub samplers: Vec<SamplerConfig>,
    pub irq: IrqConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub name: String,
    pub period_ms: u64,
    pub tolerance_ms: u64,
    /// Simulated work per sample; blocks the dispatch thread.
    #[serde(default)]
    pub work_us: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IrqConfig {
    pub enabled: bool,
    /// Mean gap between edges (exponentially distributed).
    pub mean_interval_ms: f64,
    pub debounce_ms: u64,
    pub debounce_tolerance_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 64,
            default_tolerance_ms: 10,
            run_secs: None,
            log_dir: PathBuf::from("logs"),
            heartbeat_ms: 1_000,
            samplers: vec![
                SamplerConfig::new("attitude", 50, 2, 300),
                SamplerConfig::new("thermal", 100, 5, 500),
                SamplerConfig::new("power", 250, 10, 200),
            ],
            irq: IrqConfig::default(),
        }
    }
}

impl SamplerConfig {
    fn new(name: &str, period_ms: u64, tolerance_ms: u64, work_us: u64) -> Self {
        Self {
            name: name.into(),
            period_ms,
            tolerance_ms,
            work_us,
        }
    }
}

impl Default for IrqConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mean_interval_ms: 40.0,
            debounce_ms: 20,
            debounce_tolerance_ms: 5,
        }
    }
}

/// Config millisecond value as a scheduler duration; saturates instead of wrapping.
pub fn millis(ms: u64) -> Duration {
    milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

impl Config {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            capacity: self.capacity,
            default_tolerance: millis(self.default_tolerance_ms),
        }
    }

    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.capacity == 0 {
            return Err(RunnerError::Config("capacity must be > 0".into()));
        }
        if self.heartbeat_ms == 0 {
            return Err(RunnerError::Config("heartbeat_ms must be > 0".into()));
        }
        // samplers + heartbeat + one pending debounce
        let needed = self.samplers.len() + 2;
        if self.capacity < needed {
            return Err(RunnerError::Config(format!(
                "capacity {} too small for {} periodic tasks",
                self.capacity, needed
            )));
        }
        if let Some(s) = self.samplers.iter().find(|s| s.period_ms == 0) {
            return Err(RunnerError::Config(format!("sampler '{}': period_ms must be > 0", s.name)));
        }
        if self.irq.enabled && !(self.irq.mean_interval_ms > 0.0) {
            return Err(RunnerError::Config("irq.mean_interval_ms must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Host-side demo firmware for the cooperative callback scheduler")]
pub struct Cli {
    /// TOML file layered under the command-line flags.
    #[arg(long)]                    pub config: Option<PathBuf>,
    #[arg(long)]                    pub capacity: Option<u64>,
    #[arg(long)]                    pub default_tolerance_ms: Option<u64>,
    #[arg(long)]                    pub run_secs: Option<u64>,
    #[arg(long)]                    pub log_dir: Option<String>,
    #[arg(long)]                    pub irq_mean_ms: Option<f64>,
    #[arg(long, default_value_t = false)] pub no_irq: bool,
    /// Print the effective configuration as TOML and exit.
    #[arg(long, default_value_t = false)] pub dump_config: bool,
}

impl Cli {
    pub fn build_config(&self) -> Result<Config> {
        let mut builder = config::Config::builder();
        if let Some(path) = &self.config {
            builder = builder.add_source(config::File::from(path.as_path()));
        }
        builder = builder
            .set_override_option("capacity", self.capacity)?
            .set_override_option("default_tolerance_ms", self.default_tolerance_ms)?
            .set_override_option("run_secs", self.run_secs)?
            .set_override_option("log_dir", self.log_dir.clone())?
            .set_override_option("irq.mean_interval_ms", self.irq_mean_ms)?;
        if self.no_irq {
            builder = builder.set_override("irq.enabled", false)?;
        }

        let cfg: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .context("loading runner configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }
}
