use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "lesson-judge", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<String>,

    /// Whether to flush the existing database
    #[arg(long = "flush-data", short = 'f', default_value_t = false)]
    pub flush_data: bool,

    /// Insert the demo topics and tasks when the database has none
    #[arg(long = "seed-demo", default_value_t = false)]
    pub seed_demo: bool,

    /// Override the database file location
    #[arg(long = "database")]
    pub database: Option<PathBuf>,
}

impl CliArgs {
    /// Load the configuration from the specified file, or the defaults when none is given
    pub fn to_config(&self) -> std::io::Result<Config> {
        match &self.config_path {
            Some(path) => Config::from_file(path),
            None => Ok(Config::default()),
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub runner: RunnerConfig,
    pub grading: GradingConfig,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| e.into())
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

/// How submitted scripts are executed
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RunnerConfig {
    /// Wall-clock limit for one interpreter invocation
    pub timeout_seconds: u64,
    /// Executable that receives the script path as its only argument
    pub interpreter_command: String,
    /// Name of the script file written into each run directory
    pub script_file_name: String,
    /// Root for per-run directories; the system temp directory when unset
    pub work_dir: Option<PathBuf>,
    /// `false` switches grading to substring containment (degraded mode)
    pub use_real_runner: bool,
}

impl RunnerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn work_root(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            interpreter_command: "oscript".to_string(),
            script_file_name: "Main.bsl".to_string(),
            work_dir: None,
            use_real_runner: true,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GradingConfig {
    /// A task needs at least this many test cases before it accepts submissions
    pub min_test_cases: u32,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self { min_test_cases: 4 }
    }
}
