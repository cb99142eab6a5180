//! Launch-command resolution for tool server targets.
//!
//! Decides how a server entry point is started: an explicit command/args
//! override wins; otherwise the interpreter is inferred from the target's
//! file extension, preferring a project-local virtualenv for Python targets.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A fully resolved command line for spawning a tool server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl LaunchPlan {
    /// Build a plan from an explicit command and argument list.
    pub fn command(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
        }
    }

    /// Resolve how to launch `target`.
    ///
    /// When both `command` and `args` are given they take precedence over any
    /// inference. Otherwise the interpreter is chosen by extension: `.py`
    /// launches a Python interpreter (a virtualenv near the target when one
    /// exists), `.js` launches node. Anything else is an unsupported target
    /// and nothing is spawned.
    pub fn resolve(
        target: &Path,
        command: Option<&str>,
        args: Option<&[String]>,
        env: HashMap<String, String>,
    ) -> Result<Self> {
        if let (Some(command), Some(args)) = (command, args) {
            return Ok(Self {
                command: command.to_string(),
                args: args.to_vec(),
                env,
            });
        }

        let command = match target.extension().and_then(|e| e.to_str()) {
            Some("py") => python_interpreter(target),
            Some("js") => "node".to_string(),
            _ => return Err(Error::UnsupportedTarget(target.display().to_string())),
        };

        Ok(Self {
            command,
            args: vec![target.display().to_string()],
            env,
        })
    }
}

/// Pick the Python interpreter for `target`.
///
/// Probes the target's directory and its ancestors for a `.venv`/`venv`
/// interpreter. Absence is an ordinary negative lookup, not an error; the
/// fallback to the system interpreter is warned about because a server with
/// its own dependencies will likely fail to import under it.
fn python_interpreter(target: &Path) -> String {
    if let Some(python) = find_virtualenv(target) {
        debug!(interpreter = %python.display(), "using project virtualenv");
        return python.display().to_string();
    }
    warn!(
        target = %target.display(),
        "no project virtualenv found near target; falling back to system python"
    );
    "python".to_string()
}

fn find_virtualenv(target: &Path) -> Option<PathBuf> {
    let start = target.parent()?;
    for dir in start.ancestors() {
        for name in [".venv", "venv"] {
            let candidate = venv_python(&dir.join(name));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(not(windows))]
fn venv_python(venv: &Path) -> PathBuf {
    venv.join("bin").join("python")
}

#[cfg(windows)]
fn venv_python(venv: &Path) -> PathBuf {
    venv.join("Scripts").join("python.exe")
}
