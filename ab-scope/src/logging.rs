use std::{fs::File, io, path::Path, sync::Mutex};

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt::writer::MakeWriterExt};

/// Installs the global subscriber. The dashboard owns the terminal, so logs go
/// to a file. In short mode the per-second digest is the output and is copied
/// to stderr.
pub fn init_logging(path: &Path, short_only: bool) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false);

    let installed = if short_only {
        builder
            .with_writer(Mutex::new(file).and(io::stderr))
            .try_init()
    } else {
        builder.with_writer(Mutex::new(file)).try_init()
    };
    installed.map_err(|e| anyhow!("cannot install log subscriber: {e}"))
}
