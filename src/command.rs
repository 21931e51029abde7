use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use tracing::trace;

use crate::error::AppError;

/// A single external program call: program, arguments, working directory
/// and environment overrides
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn git() -> Self {
        Self::new("git")
    }

    pub fn gh() -> Self {
        Self::new("gh")
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.envs.push((key.to_string(), value.into()));
        self
    }

    /// Program and arguments joined for logs and error messages
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured result of a finished program
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: &str) -> Self {
        Self {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Trimmed stdout on success, trimmed stderr otherwise
    pub fn into_result(self) -> Result<String, String> {
        if self.success() {
            Ok(self.stdout.trim().to_string())
        } else {
            Err(self.stderr.trim().to_string())
        }
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            // Killed by a signal has no code
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Boundary for every `git` and `gh` call. A non-zero exit is returned as
/// output, only spawn failures are errors.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, AppError>;
}

/// Runs programs with `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, AppError> {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &invocation.envs {
            command.env(key, value);
        }

        trace!(
            cmd = %invocation.display(),
            cwd = ?invocation.cwd,
            "running command"
        );

        let output: Output = command.output().map_err(|err| {
            let cwd_exists = invocation.cwd.as_ref().is_none_or(|dir| dir.is_dir());
            if err.kind() == ErrorKind::NotFound && cwd_exists {
                AppError::ToolNotFound(invocation.program.clone())
            } else {
                AppError::Io(err)
            }
        })?;

        let output = CommandOutput::from(output);
        trace!(cmd = %invocation.display(), code = output.code, "command finished");
        Ok(output)
    }
}
