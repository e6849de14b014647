use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::ui::markup::Markup;

pub const DEFAULT_URL: &str = "http://localhost/";
pub const DEFAULT_REQUESTS: u32 = 100;
pub const DEFAULT_CONCURRENCY: u32 = 1;
pub const DEFAULT_AB_BINARY: &str = "ab";
pub const DEFAULT_INFO_PANEL_WIDTH: usize = 33;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const MIN_INFO_PANEL_WIDTH: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("url must start with http:// or https://, got {0:?}")]
    InvalidUrl(String),
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("request count must be at least 1")]
    ZeroRequests,
    #[error("concurrency {concurrency} is greater than the request count {requests}")]
    ConcurrencyExceedsRequests { concurrency: u32, requests: u32 },
    #[error("info panel width must be at least {MIN_INFO_PANEL_WIDTH}, got {0}")]
    PanelTooNarrow(usize),
    #[error("unknown color name {0:?} in disable_colors")]
    UnknownColor(String),
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
}

/// Run parameters of the ab process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbOptions {
    pub url: String,
    pub requests: u32,
    pub concurrency: u32,
    /// Extra command line options passed to ab verbatim, split on whitespace.
    pub options: String,
    pub binary: PathBuf,
}

impl Default for AbOptions {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            requests: DEFAULT_REQUESTS,
            concurrency: DEFAULT_CONCURRENCY,
            options: String::new(),
            binary: PathBuf::from(DEFAULT_AB_BINARY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleOptions {
    pub info_panel_width: usize,
    /// Log a one-line digest per second instead of drawing the screen.
    pub short_only: bool,
    pub disable_all_colors: bool,
    /// Palette entries to blank, by name (`RED`, `bg_brown`, ...).
    pub disable_colors: Vec<String>,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            info_panel_width: DEFAULT_INFO_PANEL_WIDTH,
            short_only: false,
            disable_all_colors: false,
            disable_colors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub ab: AbOptions,
    pub console: ConsoleOptions,
    pub artifacts_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub mirror_file: Option<PathBuf>,
    pub poll_interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ab: AbOptions::default(),
            console: ConsoleOptions::default(),
            artifacts_dir: None,
            log_file: None,
            mirror_file: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl RunConfig {
    /// Checks every value once, before anything is started.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.ab.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.ab.url.clone()));
        }
        if self.ab.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.ab.requests == 0 {
            return Err(ConfigError::ZeroRequests);
        }
        if self.ab.concurrency > self.ab.requests {
            return Err(ConfigError::ConcurrencyExceedsRequests {
                concurrency: self.ab.concurrency,
                requests: self.ab.requests,
            });
        }
        if self.console.info_panel_width < MIN_INFO_PANEL_WIDTH {
            return Err(ConfigError::PanelTooNarrow(self.console.info_panel_width));
        }
        if let Some(name) = self
            .console
            .disable_colors
            .iter()
            .find(|name| !Markup::is_color_name(name))
        {
            return Err(ConfigError::UnknownColor(name.clone()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    /// Applies the values present in a config file over the current ones.
    pub fn apply_file(&mut self, file: FileConfig) {
        let FileConfig { ab, console, run } = file;

        if let Some(url) = ab.url {
            self.ab.url = url;
        }
        if let Some(requests) = ab.requests {
            self.ab.requests = requests;
        }
        if let Some(concurrency) = ab.concurrency {
            self.ab.concurrency = concurrency;
        }
        if let Some(options) = ab.options {
            self.ab.options = options;
        }
        if let Some(binary) = ab.binary {
            self.ab.binary = binary;
        }

        if let Some(width) = console.info_panel_width {
            self.console.info_panel_width = width;
        }
        if let Some(short_only) = console.short_only {
            self.console.short_only = short_only;
        }
        if let Some(disable_all) = console.disable_all_colors {
            self.console.disable_all_colors = disable_all;
        }
        if let Some(colors) = console.disable_colors {
            self.console.disable_colors = colors.split_whitespace().map(str::to_string).collect();
        }

        if run.artifacts_dir.is_some() {
            self.artifacts_dir = run.artifacts_dir;
        }
        if run.log_file.is_some() {
            self.log_file = run.log_file;
        }
        if run.mirror_file.is_some() {
            self.mirror_file = run.mirror_file;
        }
        if let Some(ms) = run.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
    }
}

/// On-disk TOML layout. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub ab: AbSection,
    pub console: ConsoleSection,
    pub run: RunSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AbSection {
    pub url: Option<String>,
    pub requests: Option<u32>,
    pub concurrency: Option<u32>,
    pub options: Option<String>,
    pub binary: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleSection {
    pub info_panel_width: Option<usize>,
    pub short_only: Option<bool>,
    pub disable_all_colors: Option<bool>,
    /// Space separated palette names.
    pub disable_colors: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSection {
    pub artifacts_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub mirror_file: Option<PathBuf>,
    pub poll_interval_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.ab.url, "http://localhost/");
        assert_eq!(cfg.ab.requests, 100);
        assert_eq!(cfg.ab.concurrency, 1);
        assert_eq!(cfg.console.info_panel_width, 33);
        cfg.validate().unwrap();
    }

    #[test]
    fn file_values_override_defaults() {
        let file = FileConfig::parse(
            r#"
            [ab]
            url = "https://example.org/"
            requests = 500
            concurrency = 20
            options = "-k -H 'Host: a'"

            [console]
            short_only = true
            disable_colors = "RED bg_brown"

            [run]
            poll_interval_ms = 250
            "#,
        )
        .unwrap();

        let mut cfg = RunConfig::default();
        cfg.apply_file(file);

        assert_eq!(cfg.ab.url, "https://example.org/");
        assert_eq!(cfg.ab.requests, 500);
        assert_eq!(cfg.ab.concurrency, 20);
        assert_eq!(cfg.ab.binary, PathBuf::from("ab"));
        assert!(cfg.console.short_only);
        assert_eq!(cfg.console.disable_colors, vec!["RED", "bg_brown"]);
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        cfg.validate().unwrap();
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileConfig::parse("[ab]\nthreads = 3\n").is_err());
    }

    #[test]
    fn validation_errors() {
        let mut cfg = RunConfig::default();
        cfg.ab.url = "localhost".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidUrl(_))));

        let mut cfg = RunConfig::default();
        cfg.ab.concurrency = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroConcurrency)));

        let mut cfg = RunConfig::default();
        cfg.ab.requests = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroRequests)));

        let mut cfg = RunConfig::default();
        cfg.ab.requests = 5;
        cfg.ab.concurrency = 6;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ConcurrencyExceedsRequests { concurrency: 6, requests: 5 })
        ));

        let mut cfg = RunConfig::default();
        cfg.console.info_panel_width = 3;
        assert!(matches!(cfg.validate(), Err(ConfigError::PanelTooNarrow(3))));

        let mut cfg = RunConfig::default();
        cfg.console.disable_colors = vec!["PURPLE".into()];
        assert!(matches!(cfg.validate(), Err(ConfigError::UnknownColor(_))));

        let mut cfg = RunConfig::default();
        cfg.poll_interval = Duration::ZERO;
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroPollInterval)));
    }
}
