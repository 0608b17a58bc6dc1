use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The experiment description as read from disk. Echoed into the result
/// document; keys other than these fields are ignored on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub ref_control: String,
    pub ref_exp: String,
    pub command: String,
    pub ts_dir: PathBuf,
    pub num_runs: u32,
}

impl Experiment {
    pub fn reference(&self, arm: Arm) -> &str {
        match arm {
            Arm::Control => &self.ref_control,
            Arm::Exp => &self.ref_exp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arm {
    Control,
    Exp,
}

impl Arm {
    /// Order in which arms run within a cycle.
    pub const ALL: [Arm; 2] = [Arm::Control, Arm::Exp];

    pub fn as_str(self) -> &'static str {
        match self {
            Arm::Control => "control",
            Arm::Exp => "exp",
        }
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value kept once per arm, serialized as `{ "control": .., "exp": .. }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerArm<T> {
    pub control: T,
    pub exp: T,
}

impl<T> PerArm<T> {
    pub fn get(&self, arm: Arm) -> &T {
        match arm {
            Arm::Control => &self.control,
            Arm::Exp => &self.exp,
        }
    }

    pub fn get_mut(&mut self, arm: Arm) -> &mut T {
        match arm {
            Arm::Control => &mut self.control,
            Arm::Exp => &mut self.exp,
        }
    }
}

pub type ResolvedShas = PerArm<String>;

/// One executed trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub arm: Arm,
    pub num: u32,
    pub stdout: String,
    pub stderr: Option<String>,
    pub elapsed_time_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmStats {
    pub mean: f64,
    pub stdev: f64,
}

/// The complete persisted state of an experiment. Every checkpoint is a
/// loadable snapshot of this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub experiment: Experiment,
    pub resolved_shas: ResolvedShas,
    pub start_time_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time_secs: Option<f64>,
    pub runs: Vec<RunRecord>,
    pub times: PerArm<Vec<f64>>,
    pub stats: PerArm<Option<ArmStats>>,
}

impl ResultDocument {
    /// Elapsed times per arm, rebuilt from the run log in run order.
    pub fn times_from_runs(&self) -> PerArm<Vec<f64>> {
        let mut times = PerArm::<Vec<f64>>::default();
        for run in &self.runs {
            times.get_mut(run.arm).push(run.elapsed_time_secs);
        }
        times
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Arm::Control).unwrap(), "\"control\"");
        assert_eq!(serde_json::to_string(&Arm::Exp).unwrap(), "\"exp\"");
        let arm: Arm = serde_json::from_str("\"exp\"").unwrap();
        assert_eq!(arm, Arm::Exp);
    }

    #[test]
    fn experiment_description_is_optional() {
        let exp: Experiment = serde_json::from_str(
            r#"{"ref_control":"main","ref_exp":"feature","command":"node $tsc -p .","ts_dir":"/repo","num_runs":3}"#,
        )
        .unwrap();
        assert_eq!(exp.description, None);
        assert_eq!(exp.reference(Arm::Control), "main");
        assert_eq!(exp.reference(Arm::Exp), "feature");
    }

    #[test]
    fn absent_description_is_not_echoed_as_null() {
        let exp: Experiment = serde_json::from_str(
            r#"{"ref_control":"a","ref_exp":"b","command":"$tsc","ts_dir":"/r","num_runs":1}"#,
        )
        .unwrap();
        let value = serde_json::to_value(&exp).unwrap();
        assert!(value.get("description").is_none());

        let described = Experiment {
            description: Some("binder".to_string()),
            ..exp
        };
        let value = serde_json::to_value(&described).unwrap();
        assert_eq!(value["description"], "binder");
    }

    #[test]
    fn partial_document_has_null_stats_and_no_end_time() {
        let doc = ResultDocument {
            experiment: Experiment {
                description: None,
                ref_control: "a".to_string(),
                ref_exp: "b".to_string(),
                command: "$tsc".to_string(),
                ts_dir: PathBuf::from("/repo"),
                num_runs: 1,
            },
            resolved_shas: PerArm {
                control: "aaa".to_string(),
                exp: "bbb".to_string(),
            },
            start_time_secs: 1.0,
            end_time_secs: None,
            runs: vec![],
            times: PerArm::default(),
            stats: PerArm::default(),
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("end_time_secs").is_none());
        assert!(value["stats"]["control"].is_null());
        assert!(value["stats"]["exp"].is_null());
        assert_eq!(value["times"]["control"], serde_json::json!([]));
    }

    #[test]
    fn times_from_runs_splits_by_arm() {
        let run = |arm, num, t| RunRecord {
            arm,
            num,
            stdout: String::new(),
            stderr: None,
            elapsed_time_secs: t,
        };
        let doc: ResultDocument = ResultDocument {
            experiment: serde_json::from_str(
                r#"{"ref_control":"a","ref_exp":"b","command":"$tsc","ts_dir":"/r","num_runs":2}"#,
            )
            .unwrap(),
            resolved_shas: PerArm::default(),
            start_time_secs: 0.0,
            end_time_secs: Some(1.0),
            runs: vec![
                run(Arm::Control, 0, 1.0),
                run(Arm::Exp, 0, 2.0),
                run(Arm::Control, 1, 3.0),
            ],
            times: PerArm::default(),
            stats: PerArm::default(),
        };
        let times = doc.times_from_runs();
        assert_eq!(times.control, vec![1.0, 3.0]);
        assert_eq!(times.exp, vec![2.0]);
    }
}
