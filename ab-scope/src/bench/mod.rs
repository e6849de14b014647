pub mod reader;
pub mod widget;

use std::{
    ffi::OsString,
    fs::{self, File},
    io,
    os::unix::process::ExitStatusExt,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use nix::{
    sys::signal::{Signal, kill},
    unistd::Pid,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    agg::ResultBroadcast,
    artifacts::ArtifactRegistry,
    bench::{reader::AbReader, widget::AbInfoWidget},
    model::config::AbOptions,
    ui::screen::Dashboard,
};

/// Returned by [`AbPlugin::poll`] while ab is still running.
pub const STILL_RUNNING: i32 = -1;

const SECTION: &str = "ab";
const TERMINATE_GRACE: Duration = Duration::from_secs(5);
const REAP_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("cannot allocate ab output file: {0}")]
    Artifact(#[source] io::Error),
    #[error("ab plugin is not configured")]
    NotConfigured,
    #[error("ab is already started")]
    AlreadyStarted,
    #[error("failed to launch {binary}: {source}")]
    Launch {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Runs one ab process and wires its output into the aggregator and console.
///
/// ab's stdout and stderr go to artifact files rather than pipes, so a chatty
/// ab (`-v 4`) never blocks on a full pipe while nobody reads it.
pub struct AbPlugin {
    options: AbOptions,
    out_file: Option<PathBuf>,
    stdout_file: Option<PathBuf>,
    stderr_file: Option<PathBuf>,
    process: Option<Child>,
    exit_code: Option<i32>,
    terminate_grace: Duration,
}

impl Default for AbPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl AbPlugin {
    pub fn new() -> Self {
        Self {
            options: AbOptions::default(),
            out_file: None,
            stdout_file: None,
            stderr_file: None,
            process: None,
            exit_code: None,
            terminate_grace: TERMINATE_GRACE,
        }
    }

    /// How long `finish` waits after SIGTERM before killing ab.
    pub fn set_terminate_grace(&mut self, grace: Duration) {
        self.terminate_grace = grace;
    }

    pub fn out_file(&self) -> Option<&Path> {
        self.out_file.as_deref()
    }

    /// Files holding ab's stdout and stderr, once configured.
    pub fn output_files(&self) -> Option<(&Path, &Path)> {
        Some((self.stdout_file.as_deref()?, self.stderr_file.as_deref()?))
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(Child::id)
    }

    pub fn configure(
        &mut self,
        options: &AbOptions,
        artifacts: &mut dyn ArtifactRegistry,
    ) -> Result<(), BenchError> {
        self.options = options.clone();
        let mut allocate = |suffix: &str, prefix: &str| -> Result<PathBuf, BenchError> {
            let path = artifacts
                .allocate_temp_path(suffix, prefix)
                .map_err(BenchError::Artifact)?;
            artifacts.track_artifact(&path);
            Ok(path)
        };
        let out_file = allocate(".log", "ab_")?;
        let stdout_file = allocate(".out", "ab_stdout_")?;
        let stderr_file = allocate(".err", "ab_stderr_")?;
        debug!("ab results go to {}", out_file.display());
        self.out_file = Some(out_file);
        self.stdout_file = Some(stdout_file);
        self.stderr_file = Some(stderr_file);
        Ok(())
    }

    /// Installs the log reader and the info widget where possible.
    pub fn prepare(
        &self,
        aggregator: Option<&mut dyn ResultBroadcast>,
        console: Option<&mut dyn Dashboard>,
    ) {
        match (aggregator, self.out_file.as_ref()) {
            (Some(aggregator), Some(out_file)) => {
                aggregator.set_source(Box::new(AbReader::new(
                    out_file.clone(),
                    self.options.concurrency,
                    "",
                )));
            }
            (None, _) => warn!("No aggregator found, ab results will not be reported live"),
            (Some(_), None) => warn!("ab is not configured, no reader installed"),
        }

        match console {
            Some(console) => console.add_info_widget(Box::new(AbInfoWidget::new(&self.options))),
            None => debug!("Console not found"),
        }
    }

    pub fn command_args(&self) -> Result<Vec<OsString>, BenchError> {
        let out_file = self.out_file.as_ref().ok_or(BenchError::NotConfigured)?;
        let mut args: Vec<OsString> = vec![
            "-r".into(),
            "-g".into(),
            out_file.as_os_str().to_owned(),
            "-n".into(),
            self.options.requests.to_string().into(),
            "-c".into(),
            self.options.concurrency.to_string().into(),
        ];
        args.extend(self.options.options.split_whitespace().map(OsString::from));
        args.push(self.options.url.clone().into());
        Ok(args)
    }

    /// Launches ab without waiting for it.
    pub fn start(&mut self) -> Result<(), BenchError> {
        if self.process.is_some() {
            return Err(BenchError::AlreadyStarted);
        }
        let args = self.command_args()?;
        info!(
            "Starting {} with arguments: {:?}",
            self.options.binary.display(),
            args
        );

        let launch_error = |source: io::Error| BenchError::Launch {
            binary: self.options.binary.clone(),
            source,
        };
        let child = Command::new(&self.options.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(capture(self.stdout_file.as_deref()).map_err(launch_error)?)
            .stderr(capture(self.stderr_file.as_deref()).map_err(launch_error)?)
            .spawn()
            .map_err(launch_error)?;
        debug!("{SECTION} started with PID {}", child.id());
        self.process = Some(child);
        Ok(())
    }

    /// Exit code once ab is done, [`STILL_RUNNING`] before. Never blocks.
    pub fn poll(&mut self) -> i32 {
        if let Some(code) = self.exit_code {
            return code;
        }
        let Some(child) = self.process.as_mut() else {
            return STILL_RUNNING;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                let code = exit_code(status);
                debug!("{SECTION} exit code: {code}");
                self.exit_code = Some(code);
                code
            }
            Ok(None) => STILL_RUNNING,
            Err(e) => {
                warn!("cannot check {SECTION} status: {e}");
                STILL_RUNNING
            }
        }
    }

    /// Stops ab if it is still running and logs its output. The caller's exit
    /// code is returned as is.
    pub fn finish(&mut self, retcode: i32) -> i32 {
        if self.process.is_none() {
            return retcode;
        }

        if self.poll() == STILL_RUNNING {
            if let Some(child) = self.process.as_mut() {
                warn!("Terminating ab process with PID {}", child.id());
                let code = terminate(child, self.terminate_grace);
                self.exit_code = code;
            }
        } else {
            info!("Seems ab finished OK");
        }

        self.log_output();
        retcode
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

/// SIGTERM, then SIGKILL once `grace` has passed.
fn terminate(child: &mut Child, grace: Duration) -> Option<i32> {
    let pid = Pid::from_raw(child.id() as i32);
    if let Err(e) = kill(pid, Signal::SIGTERM) {
        warn!("cannot send SIGTERM to {pid}: {e}");
    }

    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(exit_code(status)),
            Ok(None) if Instant::now() < deadline => thread::sleep(REAP_POLL),
            Ok(None) => break,
            Err(e) => {
                warn!("cannot check {SECTION} status: {e}");
                break;
            }
        }
    }

    warn!("ab with PID {pid} ignored SIGTERM, killing it");
    if let Err(e) = child.kill() {
        warn!("cannot kill {pid}: {e}");
    }
    child.wait().ok().map(exit_code)
}

fn capture(path: Option<&Path>) -> io::Result<Stdio> {
    match path {
        Some(path) => Ok(File::create(path)?.into()),
        None => Ok(Stdio::null()),
    }
}

impl AbPlugin {
    fn log_output(&self) {
        if let Some(path) = &self.stdout_file {
            match fs::read_to_string(path) {
                Ok(text) if !text.trim().is_empty() => debug!("{SECTION} stdout: {}", text.trim_end()),
                Ok(_) => {}
                Err(e) => warn!("cannot read {SECTION} stdout from {}: {e}", path.display()),
            }
        }
        if let Some(path) = &self.stderr_file {
            match fs::read_to_string(path) {
                Ok(text) if !text.trim().is_empty() => warn!("{SECTION} stderr: {}", text.trim_end()),
                Ok(_) => {}
                Err(e) => warn!("cannot read {SECTION} stderr from {}: {e}", path.display()),
            }
        }
    }
}
