use std::path::{Path, PathBuf};

use crate::errors::{BenchError, Result};
use crate::runner::PLACEHOLDER;
use crate::types::Experiment;

/// Where results and built artifacts live for a `run` invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub results_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Discard cached artifacts instead of reusing them.
    pub rebuild: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            results_dir: PathBuf::from("results"),
            cache_dir: std::env::temp_dir(),
            rebuild: false,
        }
    }
}

/// Read and validate an experiment file.
pub fn load_experiment(path: &Path) -> Result<Experiment> {
    let text = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
    let experiment: Experiment =
        serde_json::from_str(&text).map_err(|e| BenchError::Config {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    validate(&experiment).map_err(|detail| BenchError::Config {
        path: path.to_path_buf(),
        detail,
    })?;
    Ok(experiment)
}

pub fn validate(experiment: &Experiment) -> std::result::Result<(), String> {
    let required = [
        ("ref_control", experiment.ref_control.as_str()),
        ("ref_exp", experiment.ref_exp.as_str()),
        ("command", experiment.command.as_str()),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(format!("{} must not be empty", field));
        }
    }
    if experiment.ts_dir.as_os_str().is_empty() {
        return Err("ts_dir must not be empty".to_string());
    }
    if !experiment.command.contains(PLACEHOLDER) {
        return Err(format!(
            "command must contain the {} placeholder",
            PLACEHOLDER
        ));
    }
    if experiment.num_runs < 1 {
        return Err("num_runs must be at least 1".to_string());
    }
    Ok(())
}

/// Base name used for result files: the experiment file's stem.
pub fn experiment_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "experiment".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_experiment(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("exp.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_valid_experiment() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let path = write_experiment(
            tmp.path(),
            r#"{
                "description": "faster binder",
                "ref_control": "main",
                "ref_exp": "binder-speedup",
                "command": "node $tsc -p src/compiler",
                "ts_dir": "/home/user/TypeScript",
                "num_runs": 10
            }"#,
        );
        let exp = load_experiment(&path).unwrap();
        assert_eq!(exp.description.as_deref(), Some("faster binder"));
        assert_eq!(exp.num_runs, 10);
        assert_eq!(exp.ts_dir, PathBuf::from("/home/user/TypeScript"));
    }

    #[test]
    fn missing_field_is_config_error() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let path = write_experiment(
            tmp.path(),
            r#"{"ref_control":"main","command":"$tsc","ts_dir":"/r","num_runs":1}"#,
        );
        let err = load_experiment(&path).unwrap_err();
        assert!(matches!(err, BenchError::Config { .. }));
        assert!(err.to_string().contains("ref_exp"), "got: {err}");
    }

    #[test]
    fn zero_runs_rejected() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let path = write_experiment(
            tmp.path(),
            r#"{"ref_control":"a","ref_exp":"b","command":"$tsc","ts_dir":"/r","num_runs":0}"#,
        );
        let err = load_experiment(&path).unwrap_err();
        assert!(err.to_string().contains("num_runs must be at least 1"));
    }

    #[test]
    fn negative_runs_rejected_by_parser() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let path = write_experiment(
            tmp.path(),
            r#"{"ref_control":"a","ref_exp":"b","command":"$tsc","ts_dir":"/r","num_runs":-2}"#,
        );
        assert!(matches!(
            load_experiment(&path),
            Err(BenchError::Config { .. })
        ));
    }

    #[test]
    fn command_without_placeholder_rejected() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let path = write_experiment(
            tmp.path(),
            r#"{"ref_control":"a","ref_exp":"b","command":"node tsc.js","ts_dir":"/r","num_runs":1}"#,
        );
        let err = load_experiment(&path).unwrap_err();
        assert!(err.to_string().contains("$tsc"), "got: {err}");
    }

    #[test]
    fn blank_ref_rejected() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let path = write_experiment(
            tmp.path(),
            r#"{"ref_control":"  ","ref_exp":"b","command":"$tsc","ts_dir":"/r","num_runs":1}"#,
        );
        let err = load_experiment(&path).unwrap_err();
        assert!(err.to_string().contains("ref_control must not be empty"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_experiment(Path::new("/nonexistent/exp.json")).unwrap_err();
        assert!(matches!(err, BenchError::Io { .. }));
    }

    #[test]
    fn name_is_file_stem() {
        assert_eq!(
            experiment_name(Path::new("experiments/binder.json")),
            "binder"
        );
    }
}
