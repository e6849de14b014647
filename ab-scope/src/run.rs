use std::{cell::RefCell, io::Write, rc::Rc, thread};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{
    agg::{ResultBroadcast, SecondAggregator},
    artifacts::{ArtifactDir, ArtifactRegistry},
    bench::{AbPlugin, STILL_RUNNING},
    model::config::RunConfig,
    ui::{
        console::ConsoleDriver,
        mirror::FileMirror,
        report::RunReport,
    },
};

/// One benchmark run from launch to report, drawing to stdout.
pub fn run(config: &RunConfig, artifacts: &mut ArtifactDir) -> Result<RunReport> {
    let is_tty = std::io::IsTerminal::is_terminal(&std::io::stdout());
    run_with(config, artifacts, Box::new(std::io::stdout()), is_tty)
}

/// Same as [`run`] with an explicit frame sink.
pub fn run_with(
    config: &RunConfig,
    artifacts: &mut ArtifactDir,
    out: Box<dyn Write>,
    is_tty: bool,
) -> Result<RunReport> {
    let mut ab = AbPlugin::new();
    ab.configure(&config.ab, artifacts)?;

    let mut aggregator = SecondAggregator::new();
    let console = Rc::new(RefCell::new(ConsoleDriver::with_output(
        &config.console,
        is_tty,
        out,
    )));
    if let Some(path) = &config.mirror_file {
        console
            .borrow_mut()
            .set_mirror(Box::new(FileMirror::new(path.clone())));
        artifacts.track_artifact(path);
    }
    aggregator.add_result_listener(console.clone());

    ab.prepare(Some(&mut aggregator), Some(&mut *console.borrow_mut()));
    if !aggregator.has_source() {
        console.borrow_mut().without_aggregates();
    }

    let command = command_line(&ab, config)?;
    ab.start()
        .with_context(|| format!("cannot start benchmark: {command}"))?;

    let mut retcode = STILL_RUNNING;
    while retcode == STILL_RUNNING {
        aggregator.tick();
        console.borrow_mut().tick();
        retcode = ab.poll();
        if retcode == STILL_RUNNING {
            thread::sleep(config.poll_interval);
        }
    }
    info!("ab exited with code {retcode}");

    let retcode = ab.finish(retcode);
    let flushed = aggregator.end_test();
    if flushed > 0 {
        info!("{flushed} trailing seconds flushed after exit");
    }
    console.borrow_mut().tick();

    let source = aggregator.source_stats();
    if source.skipped_lines > 0 {
        warn!("{} malformed lines skipped", source.skipped_lines);
    }

    Ok(RunReport {
        command,
        exit_code: retcode,
        totals: aggregator.totals().clone(),
        source,
        artifacts: artifacts.tracked().to_vec(),
    })
}

fn command_line(ab: &AbPlugin, config: &RunConfig) -> Result<String> {
    let args = ab.command_args()?;
    Ok(std::iter::once(config.ab.binary.as_os_str())
        .chain(args.iter().map(|a| a.as_os_str()))
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" "))
}
