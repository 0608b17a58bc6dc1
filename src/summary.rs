use std::path::Path;

use owo_colors::{OwoColorize, Stream};

use crate::errors::{BenchError, Result};
use crate::stats::percent_delta;
use crate::types::{ArmStats, PerArm, ResultDocument};

/// Load a result file (final or checkpoint) without modifying it.
pub fn load_result(path: &Path) -> Result<ResultDocument> {
    let text = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| BenchError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Pair control/exp times by position, stopping at the shorter list.
pub fn paired_times(times: &PerArm<Vec<f64>>) -> Vec<(f64, f64)> {
    times
        .control
        .iter()
        .copied()
        .zip(times.exp.iter().copied())
        .collect()
}

/// Full summary: echoed experiment, per-run table, and mean/stdev footer.
pub fn format_summary(doc: &ResultDocument) -> String {
    let mut out = String::new();

    let experiment =
        serde_json::to_string_pretty(&doc.experiment).unwrap_or_else(|_| "{}".to_string());
    out.push_str(&experiment);
    out.push('\n');

    let header = format!("{}\t{}", doc.experiment.ref_control, doc.experiment.ref_exp);
    out.push_str(
        &header
            .if_supports_color(Stream::Stdout, |s| s.dimmed())
            .to_string(),
    );
    out.push('\n');

    for (control, exp) in paired_times(&doc.times_from_runs()) {
        out.push_str(&format!("{:.4}\t{:.4}\n", control, exp));
    }

    out.push_str(&format_footer(&doc.stats));
    out
}

/// The two mean ± stdev lines, with the percentage delta on the exp line.
pub fn format_footer(stats: &PerArm<Option<ArmStats>>) -> String {
    let control_line = format!("Control: {}", format_stats(stats.control.as_ref()));
    let mut exp_line = format!("    Exp: {}", format_stats(stats.exp.as_ref()));

    if let (Some(control), Some(exp)) = (&stats.control, &stats.exp)
        && let Some(pct) = percent_delta(control.mean, exp.mean)
    {
        let pct_str = format!("{:+.2}%", pct);
        let colored = if pct > 0.0 {
            pct_str
                .if_supports_color(Stream::Stdout, |s| s.red())
                .to_string()
        } else if pct < 0.0 {
            pct_str
                .if_supports_color(Stream::Stdout, |s| s.green())
                .to_string()
        } else {
            pct_str
        };
        exp_line.push_str(&format!(" = {}", colored));
    }

    format!("{}\n{}\n", control_line, exp_line)
}

fn format_stats(stats: Option<&ArmStats>) -> String {
    match stats {
        Some(s) => format!("{:.2} +/- {:.2} s", s.mean, s.stdev),
        None => "n/a".to_string(),
    }
}
