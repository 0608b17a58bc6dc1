use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::errors::{BenchError, Result};

/// Token in a command template that is replaced by the compiler entry point.
pub const PLACEHOLDER: &str = "$tsc";

/// Location of the compiler entry point inside an artifact directory.
pub const ENTRY_POINT: &str = "local/tsc.js";

/// Captured output of one benchmark command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: Option<String>,
}

/// Executes a fully rendered command line.
pub trait CommandRunner {
    fn run(&mut self, command: &str) -> Result<CommandOutput>;
}

/// Replace every `$tsc` in `template` with `<artifact_dir>/local/tsc.js`.
///
/// The path is inserted as-is, without shell quoting.
pub fn render_command(template: &str, artifact_dir: &Path) -> String {
    let entry = artifact_dir.join(ENTRY_POINT);
    template.replace(PLACEHOLDER, &entry.to_string_lossy())
}

/// Runs commands through `sh -c`, echoing stdout as it arrives.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    echo: bool,
}

impl Default for ShellRunner {
    fn default() -> Self {
        ShellRunner {
            shell: "sh".to_string(),
            echo: true,
        }
    }
}

impl ShellRunner {
    /// A runner that captures output without writing it to the console.
    pub fn quiet() -> Self {
        ShellRunner {
            echo: false,
            ..ShellRunner::default()
        }
    }

    /// Read stdout line by line until EOF, echoing each line if enabled.
    fn stream_stdout(&self, pipe: impl Read) -> Result<String> {
        let mut reader = BufReader::new(pipe);
        let mut stdout = String::new();
        let mut line = Vec::new();
        let console = std::io::stdout();
        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| BenchError::io(&self.shell, e))?;
            if n == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&line);
            if self.echo {
                let mut out = console.lock();
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
            stdout.push_str(&text);
        }
        Ok(stdout)
    }
}

impl CommandRunner for ShellRunner {
    fn run(&mut self, command: &str) -> Result<CommandOutput> {
        debug!(shell = %self.shell, command, "spawning");
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BenchError::Spawn {
                program: self.shell.clone(),
                source,
            })?;

        // stderr is drained on its own thread so a chatty command can't
        // block on a full pipe while we read stdout.
        let stderr_handle = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let read = match child.stdout.take() {
            Some(pipe) => self.stream_stdout(pipe),
            None => Ok(String::new()),
        };
        let stdout = match read {
            Ok(stdout) => stdout,
            Err(e) => {
                // Don't leave the child or the stderr reader behind.
                let _ = child.kill();
                let _ = child.wait();
                if let Some(h) = stderr_handle {
                    let _ = h.join();
                }
                return Err(e);
            }
        };

        let waited = child.wait();
        let stderr = stderr_handle
            .and_then(|h| h.join().ok())
            .filter(|s| !s.is_empty());
        let status = waited.map_err(|e| BenchError::io(&self.shell, e))?;

        if let Some(err) = &stderr
            && self.echo
        {
            eprintln!("stderr:\n{}", err);
        }

        if !status.success() {
            let mut output = stdout;
            if let Some(err) = stderr {
                output.push_str(&err);
            }
            return Err(BenchError::CommandFailed {
                command: command.to_string(),
                code: status.code(),
                output,
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}
