use std::{
    fmt::{self, Write},
    path::PathBuf,
};

use crate::{agg::summary::RunTotals, model::agg::SourceStats};

/// What is printed once the run is over.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub command: String,
    pub exit_code: i32,
    pub totals: RunTotals,
    pub source: SourceStats,
    pub artifacts: Vec<PathBuf>,
}

pub fn print_report(report: &RunReport) {
    print!("{}", render_report_to_string(report));
}

pub fn render_report_to_string(report: &RunReport) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_report(&mut out, report);
    out
}

fn write_report<W: Write>(out: &mut W, report: &RunReport) -> fmt::Result {
    let t = &report.totals;

    writeln!(out, "Command:      {}", report.command)?;
    writeln!(out, "Exit code:    {}", report.exit_code)?;
    writeln!(out, "Seconds:      {} ({} with samples)", t.span_seconds(), t.seconds)?;
    writeln!(out, "Requests:     {}", t.samples)?;
    writeln!(out, "Avg RPS:      {:.1}", t.avg_rps())?;
    writeln!(out, "Peak RPS:     {}", t.max_rps)?;
    writeln!(out, "Avg RT:       {:.1}", t.avg_response_time())?;

    if report.source.skipped_lines > 0 || report.source.late_samples > 0 {
        writeln!(out)?;
        writeln!(out, "Input problems:")?;
        writeln!(out, "{:<16} {:>10}", "Skipped lines", report.source.skipped_lines)?;
        writeln!(out, "{:<16} {:>10}", "Late samples", report.source.late_samples)?;
    }

    if !report.artifacts.is_empty() {
        writeln!(out)?;
        writeln!(out, "Artifacts:")?;
        for path in &report.artifacts {
            writeln!(out, "  {}", path.display())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::agg::{AggregateStats, SecondAggregate};

    fn report(source: SourceStats) -> RunReport {
        let mut totals = RunTotals::default();
        for (time, rps) in [(100, 4), (101, 6)] {
            totals.record(&SecondAggregate {
                time,
                overall: AggregateStats {
                    rps,
                    avg_response_time: 10.0,
                    ..AggregateStats::default()
                },
            });
        }
        RunReport {
            command: "ab -n 10 http://localhost/".into(),
            exit_code: 0,
            totals,
            source,
            artifacts: vec![PathBuf::from("/tmp/ab_1.log")],
        }
    }

    #[test]
    fn lists_totals_and_artifacts() {
        let text = render_report_to_string(&report(SourceStats::default()));
        assert!(text.contains("Requests:     10\n"));
        assert!(text.contains("Avg RPS:      5.0\n"));
        assert!(text.contains("Peak RPS:     6\n"));
        assert!(text.contains("  /tmp/ab_1.log\n"));
        assert!(!text.contains("Input problems"));
    }

    #[test]
    fn mentions_input_problems() {
        let text = render_report_to_string(&report(SourceStats {
            lines_read: 12,
            skipped_lines: 2,
            late_samples: 0,
        }));
        assert!(text.contains("Input problems:"));
        assert!(text.contains("Skipped lines"));
    }
}
