use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("Could not resolve revision '{reference}': {detail}")]
    Resolution { reference: String, detail: String },

    #[error("`{program} {}` exited with {}:\n{output}", .args.join(" "), describe_code(.code))]
    Subprocess {
        program: String,
        args: Vec<String>,
        code: Option<i32>,
        output: String,
    },

    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Benchmark command `{command}` exited with {}", describe_code(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Invalid experiment {path}: {detail}")]
    Config { path: PathBuf, detail: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, BenchError>;

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "a signal".to_string(),
    }
}

impl BenchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BenchError::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code of the failing subprocess, if the error came from one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            BenchError::Subprocess { code, .. } | BenchError::CommandFailed { code, .. } => *code,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subprocess_message_includes_command_and_code() {
        let err = BenchError::Subprocess {
            program: "git".to_string(),
            args: vec!["checkout".to_string(), "abc".to_string()],
            code: Some(128),
            output: "fatal: bad revision".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`git checkout abc`"), "got: {msg}");
        assert!(msg.contains("exit code 128"));
        assert!(msg.contains("fatal: bad revision"));
        assert_eq!(err.exit_code(), Some(128));
    }

    #[test]
    fn command_failed_killed_by_signal() {
        let err = BenchError::CommandFailed {
            command: "sleep 100".to_string(),
            code: None,
            output: String::new(),
        };
        assert!(err.to_string().contains("exited with a signal"));
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn config_error_names_file() {
        let err = BenchError::Config {
            path: PathBuf::from("exp.json"),
            detail: "num_runs must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid experiment exp.json: num_runs must be at least 1"
        );
    }
}
