use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, info, warn};

use crate::errors::{BenchError, Result};
use crate::resolve::{BuildResolver, BuildTool, ResolvedBuild, VersionControl};
use crate::runner::{CommandRunner, render_command};
use crate::types::{Arm, ArmStats, Experiment, PerArm, ResolvedShas, ResultDocument, RunRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    ResolveControl,
    ResolveExp,
    Run { num: u32, arm: Arm },
    Finalize,
    Done,
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => f.write_str("init"),
            Phase::ResolveControl => f.write_str("resolve-control"),
            Phase::ResolveExp => f.write_str("resolve-exp"),
            Phase::Run { num, arm } => write!(f, "run {} {}", num, arm),
            Phase::Finalize => f.write_str("finalize"),
            Phase::Done => f.write_str("done"),
            Phase::Aborted => f.write_str("aborted"),
        }
    }
}

/// The in-progress result document. Stats for an arm are recomputed from
/// that arm's full time list on every append.
#[derive(Debug, Clone)]
pub struct ResultAccumulator {
    doc: ResultDocument,
}

impl ResultAccumulator {
    pub fn new(experiment: Experiment, resolved_shas: ResolvedShas, start_time_secs: f64) -> Self {
        ResultAccumulator {
            doc: ResultDocument {
                experiment,
                resolved_shas,
                start_time_secs,
                end_time_secs: None,
                runs: Vec::new(),
                times: PerArm::default(),
                stats: PerArm::default(),
            },
        }
    }

    pub fn append_run(&mut self, record: RunRecord) {
        let arm = record.arm;
        let times = self.doc.times.get_mut(arm);
        times.push(record.elapsed_time_secs);
        *self.doc.stats.get_mut(arm) = ArmStats::from_samples(times);
        self.doc.runs.push(record);
    }

    pub fn finish(&mut self, end_time_secs: f64) {
        self.doc.end_time_secs = Some(end_time_secs);
    }

    pub fn document(&self) -> &ResultDocument {
        &self.doc
    }

    pub fn into_document(self) -> ResultDocument {
        self.doc
    }
}

/// Temporary and final locations of a result file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPaths {
    pub checkpoint: PathBuf,
    pub final_path: PathBuf,
}

impl ResultPaths {
    /// `<dir>/tmp-<name>-<stamp>.json` while running, `<dir>/<name>-<stamp>.json` once done.
    pub fn new(results_dir: &Path, name: &str, started: DateTime<Local>) -> Self {
        let stamp = started.format("%Y-%m-%dT%H%M%S");
        ResultPaths {
            checkpoint: results_dir.join(format!("tmp-{}-{}.json", name, stamp)),
            final_path: results_dir.join(format!("{}-{}.json", name, stamp)),
        }
    }
}

/// Overwrite `path` with the full document. The JSON is rendered in memory
/// before the file is touched.
pub fn write_checkpoint(path: &Path, doc: &ResultDocument) -> Result<()> {
    let json = serde_json::to_vec_pretty(doc).map_err(|source| BenchError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|e| BenchError::io(path, e))
}

fn unix_now() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub document: ResultDocument,
    pub result_path: PathBuf,
}

/// Runs an experiment end to end: build both revisions, alternate the
/// benchmark command between them, and checkpoint after every run.
pub struct Driver<V, B, R> {
    resolver: BuildResolver<V, B>,
    runner: R,
    phase: Phase,
}

impl<V: VersionControl, B: BuildTool, R: CommandRunner> Driver<V, B, R> {
    pub fn new(resolver: BuildResolver<V, B>, runner: R) -> Self {
        Driver {
            resolver,
            runner,
            phase: Phase::Init,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn transition(&mut self, next: Phase) {
        debug!(from = %self.phase, to = %next, "phase");
        self.phase = next;
    }

    /// Run the experiment. On failure the driver ends in `Phase::Aborted`
    /// and, if any state was accumulated, rewrites the checkpoint file one
    /// last time and leaves it under its temporary name.
    pub fn run(&mut self, experiment: &Experiment, paths: &ResultPaths) -> Result<Outcome> {
        let mut acc = None;
        match self.execute(experiment, paths, &mut acc) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.transition(Phase::Aborted);
                if let Some(acc) = &acc {
                    match write_checkpoint(&paths.checkpoint, acc.document()) {
                        Ok(()) => warn!(
                            path = %paths.checkpoint.display(),
                            runs = acc.document().runs.len(),
                            "aborted; partial results kept"
                        ),
                        Err(e) => warn!(error = %e, "could not write final checkpoint"),
                    }
                }
                Err(err)
            }
        }
    }

    fn execute(
        &mut self,
        experiment: &Experiment,
        paths: &ResultPaths,
        slot: &mut Option<ResultAccumulator>,
    ) -> Result<Outcome> {
        self.transition(Phase::ResolveControl);
        let control = self
            .resolver
            .resolve(&experiment.ts_dir, experiment.reference(Arm::Control))?;
        info!(dir = %control.artifact_dir.display(), "control build");

        self.transition(Phase::ResolveExp);
        let exp = self
            .resolver
            .resolve(&experiment.ts_dir, experiment.reference(Arm::Exp))?;
        info!(dir = %exp.artifact_dir.display(), "exp build");

        let builds: PerArm<ResolvedBuild> = PerArm { control, exp };
        let shas = PerArm {
            control: builds.control.id.clone(),
            exp: builds.exp.id.clone(),
        };

        if let Some(dir) = paths.checkpoint.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(|e| BenchError::io(dir, e))?;
        }

        let acc = slot.insert(ResultAccumulator::new(experiment.clone(), shas, unix_now()));
        write_checkpoint(&paths.checkpoint, acc.document())?;
        info!(path = %paths.checkpoint.display(), "logging results");

        for num in 0..experiment.num_runs {
            for arm in Arm::ALL {
                self.transition(Phase::Run { num, arm });
                let command = render_command(&experiment.command, &builds.get(arm).artifact_dir);
                info!(num, %arm, reference = experiment.reference(arm), "starting run");
                println!("Running {}", command);

                let start = Instant::now();
                let output = self.runner.run(&command)?;
                let elapsed = start.elapsed().as_secs_f64();

                acc.append_run(RunRecord {
                    arm,
                    num,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    elapsed_time_secs: elapsed,
                });
                write_checkpoint(&paths.checkpoint, acc.document())?;
                debug!(num, %arm, elapsed, "checkpointed");
                println!("\n----\n");
            }
        }

        self.transition(Phase::Finalize);
        acc.finish(unix_now());
        write_checkpoint(&paths.checkpoint, acc.document())?;
        fs::rename(&paths.checkpoint, &paths.final_path)
            .map_err(|e| BenchError::io(&paths.final_path, e))?;
        info!(path = %paths.final_path.display(), "results written");

        self.transition(Phase::Done);
        Ok(Outcome {
            document: acc.document().clone(),
            result_path: paths.final_path.clone(),
        })
    }
}
