use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::model::config::{ConfigError, FileConfig, RunConfig};

#[derive(Parser, Debug, Default)]
#[command(
    name = "ab-scope",
    about = "Live per-second dashboard for Apache Benchmark runs",
    long_about = None
)]
pub struct Cli {
    /// Target URL; overrides the config file.
    pub url: Option<String>,

    /// Total number of requests.
    #[arg(short = 'n', long)]
    pub requests: Option<u32>,

    /// Number of concurrent requests.
    #[arg(short = 'c', long)]
    pub concurrency: Option<u32>,

    /// Extra options passed to ab, split on whitespace.
    #[arg(long, allow_hyphen_values = true)]
    pub options: Option<String>,

    /// ab executable to run.
    #[arg(long)]
    pub ab_binary: Option<PathBuf>,

    /// TOML file with [ab], [console] and [run] sections.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log one line per second instead of drawing the dashboard.
    #[arg(long)]
    pub short_only: bool,

    /// Plain output even on a terminal.
    #[arg(long)]
    pub no_color: bool,

    /// Palette entries to blank, e.g. `--disable-colors bg_green,RED`.
    #[arg(long, value_delimiter = ',')]
    pub disable_colors: Vec<String>,

    #[arg(long)]
    pub info_panel_width: Option<usize>,

    /// Where the ab log and other artifacts are kept.
    #[arg(long)]
    pub artifacts_dir: Option<PathBuf>,

    /// Also write every frame, without colors, to this file.
    #[arg(long)]
    pub mirror_file: Option<PathBuf>,

    /// Defaults to ab-scope.log in the artifacts directory.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}

impl Cli {
    /// Defaults, then the config file, then flags; validated once.
    pub fn into_config(self) -> Result<RunConfig, ConfigError> {
        let mut config = RunConfig::default();
        if let Some(path) = &self.config {
            config.apply_file(FileConfig::load(path)?);
        }

        if let Some(url) = self.url {
            config.ab.url = url;
        }
        if let Some(requests) = self.requests {
            config.ab.requests = requests;
        }
        if let Some(concurrency) = self.concurrency {
            config.ab.concurrency = concurrency;
        }
        if let Some(options) = self.options {
            config.ab.options = options;
        }
        if let Some(binary) = self.ab_binary {
            config.ab.binary = binary;
        }

        if self.short_only {
            config.console.short_only = true;
        }
        if self.no_color {
            config.console.disable_all_colors = true;
        }
        if !self.disable_colors.is_empty() {
            config.console.disable_colors = self.disable_colors;
        }
        if let Some(width) = self.info_panel_width {
            config.console.info_panel_width = width;
        }

        if self.artifacts_dir.is_some() {
            config.artifacts_dir = self.artifacts_dir;
        }
        if self.mirror_file.is_some() {
            config.mirror_file = self.mirror_file;
        }
        if self.log_file.is_some() {
            config.log_file = self.log_file;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }
}
