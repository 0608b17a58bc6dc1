use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::errors::{BenchError, Result};

/// Version-control operations needed to build an arbitrary revision.
pub trait VersionControl {
    /// Resolve a reference (branch, tag, sha) to an immutable commit id.
    fn resolve(&mut self, dir: &Path, reference: &str) -> Result<String>;
    fn checkout(&mut self, dir: &Path, id: &str) -> Result<()>;
    /// Return to whatever was checked out before the last `checkout`.
    fn checkout_previous(&mut self, dir: &Path) -> Result<()>;
}

/// Produces a build of whatever is checked out in `dir`.
pub trait BuildTool {
    /// Returns the directory holding the build output.
    fn build(&mut self, dir: &Path) -> Result<PathBuf>;
}

/// A reference resolved to its commit id and built tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBuild {
    pub id: String,
    pub artifact_dir: PathBuf,
}

/// `git` on PATH.
#[derive(Debug, Default, Clone)]
pub struct Git;

impl VersionControl for Git {
    fn resolve(&mut self, dir: &Path, reference: &str) -> Result<String> {
        let spec = format!("{}^{{commit}}", reference);
        match run_checked(dir, "git", &["rev-parse", "--verify", "--quiet", &spec]) {
            Ok(stdout) => {
                let id = stdout.trim().to_string();
                if id.is_empty() {
                    return Err(BenchError::Resolution {
                        reference: reference.to_string(),
                        detail: "git rev-parse printed nothing".to_string(),
                    });
                }
                Ok(id)
            }
            Err(BenchError::Subprocess { output, code, .. }) => Err(BenchError::Resolution {
                reference: reference.to_string(),
                detail: if output.trim().is_empty() {
                    format!("unknown revision (git exit {})", code.unwrap_or(-1))
                } else {
                    output.trim().to_string()
                },
            }),
            Err(e) => Err(e),
        }
    }

    fn checkout(&mut self, dir: &Path, id: &str) -> Result<()> {
        run_checked(dir, "git", &["checkout", id]).map(|_| ())
    }

    fn checkout_previous(&mut self, dir: &Path) -> Result<()> {
        run_checked(dir, "git", &["checkout", "-"]).map(|_| ())
    }
}

/// `npx hereby local`, which writes the compiler to `built/`.
#[derive(Debug, Default, Clone)]
pub struct Hereby;

impl BuildTool for Hereby {
    fn build(&mut self, dir: &Path) -> Result<PathBuf> {
        run_checked(dir, "npx", &["hereby", "local"])?;
        Ok(dir.join("built"))
    }
}

/// Resolves references and maintains the artifact cache.
///
/// A reference is resolved to a commit id, and the build for that id is kept
/// under `<cache_dir>/<id>`. An existing directory is reused as-is; nothing
/// here checks that it still matches the toolchain that produced it.
pub struct BuildResolver<V, B> {
    vcs: V,
    build_tool: B,
    cache_dir: PathBuf,
    rebuild: bool,
    resolved: HashMap<String, ResolvedBuild>,
}

impl<V: VersionControl, B: BuildTool> BuildResolver<V, B> {
    pub fn new(vcs: V, build_tool: B, cache_dir: impl Into<PathBuf>) -> Self {
        BuildResolver {
            vcs,
            build_tool,
            cache_dir: cache_dir.into(),
            rebuild: false,
            resolved: HashMap::new(),
        }
    }

    /// Discard an existing artifact directory the first time each id is
    /// built in this process.
    pub fn with_rebuild(mut self, rebuild: bool) -> Self {
        self.rebuild = rebuild;
        self
    }

    pub fn artifact_dir(&self, id: &str) -> PathBuf {
        self.cache_dir.join(id)
    }

    pub fn resolve(&mut self, source_dir: &Path, reference: &str) -> Result<ResolvedBuild> {
        let id = self.vcs.resolve(source_dir, reference)?;
        info!(reference, id = %id, "resolved revision");

        if let Some(build) = self.resolved.get(&id) {
            debug!(id = %id, "already built in this session");
            return Ok(build.clone());
        }

        let artifact_dir = self.artifact_dir(&id);
        if artifact_dir.exists() {
            if self.rebuild {
                info!(dir = %artifact_dir.display(), "removing cached build");
                fs::remove_dir_all(&artifact_dir).map_err(|e| BenchError::io(&artifact_dir, e))?;
            } else {
                info!(dir = %artifact_dir.display(), "reusing cached build");
                return Ok(self.remember(id, artifact_dir));
            }
        }

        self.build_into(source_dir, &id, &artifact_dir)?;
        Ok(self.remember(id, artifact_dir))
    }

    fn remember(&mut self, id: String, artifact_dir: PathBuf) -> ResolvedBuild {
        let build = ResolvedBuild { id: id.clone(), artifact_dir };
        self.resolved.insert(id, build.clone());
        build
    }

    fn build_into(&mut self, source_dir: &Path, id: &str, artifact_dir: &Path) -> Result<()> {
        info!(id, "building");
        self.vcs.checkout(source_dir, id)?;

        let built = self
            .build_tool
            .build(source_dir)
            .and_then(|output| copy_tree(&output, artifact_dir));

        // Restore the checkout even if the build failed; the build error wins.
        let restored = self.vcs.checkout_previous(source_dir);
        if let Err(e) = built {
            if let Err(restore_err) = restored {
                warn!(error = %restore_err, "could not restore previous checkout");
            }
            let _ = fs::remove_dir_all(artifact_dir);
            return Err(e);
        }
        restored?;
        info!(dir = %artifact_dir.display(), "build cached");
        Ok(())
    }
}

/// Recursively copy `src` to `dst`. `dst` must not exist.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| BenchError::io(dst, e))?;
    let entries = fs::read_dir(src).map_err(|e| BenchError::io(src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| BenchError::io(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| BenchError::io(&from, e))?;

        if file_type.is_dir() {
            copy_tree(&from, &to)?;
        } else if file_type.is_symlink() {
            copy_symlink(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| BenchError::io(&from, e))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target = fs::read_link(from).map_err(|e| BenchError::io(from, e))?;
    std::os::unix::fs::symlink(&target, to).map_err(|e| BenchError::io(to, e))
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| BenchError::io(from, e))
}

/// Run `program args..` in `dir`, returning stdout. Non-zero exit becomes
/// `BenchError::Subprocess` with stdout and stderr attached.
fn run_checked(dir: &Path, program: &str, args: &[&str]) -> Result<String> {
    debug!(dir = %dir.display(), program, ?args, "running");
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|source| BenchError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        let mut combined = stdout;
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(BenchError::Subprocess {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            code: output.status.code(),
            output: combined,
        });
    }
    Ok(stdout)
}
