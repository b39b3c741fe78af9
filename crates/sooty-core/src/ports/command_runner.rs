//! Command runner port.
//!
//! Every external program the engine invokes goes through this trait, which
//! keeps installer and supervisor logic testable without spawning processes.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Callback receiving each output line as it is produced.
pub type LineCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A line callback that discards everything.
pub fn noop_line_callback() -> LineCallback {
    Arc::new(|_line: &str| {})
}

/// Description of one external program invocation.
///
/// Arguments are passed as a vector and never through a shell.
#[derive(Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// When set, a non-zero exit is reported in [`CommandOutput`] instead of
    /// failing.
    pub fail_tolerant: bool,
    pub timeout: Option<Duration>,
    pub on_line: Option<LineCallback>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            fail_tolerant: false,
            timeout: None,
            on_line: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub const fn fail_tolerant(mut self) -> Self {
        self.fail_tolerant = true;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn on_line(mut self, callback: LineCallback) -> Self {
        self.on_line = Some(callback);
        self
    }

    /// Shell-quoted rendering for log lines.
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("env_keys", &self.env.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("fail_tolerant", &self.fail_tolerant)
            .field("timeout", &self.timeout)
            .field("on_line", &self.on_line.is_some())
            .finish()
    }
}

/// Result of a completed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Combined stdout and stderr, in arrival order.
    pub output: String,
}

impl CommandOutput {
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Errors raised by a [`CommandRunner`].
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started at all.
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The program exited unsuccessfully and the command was not fail-tolerant.
    #[error("`{program}` exited {status}")]
    Failed {
        program: String,
        code: Option<i32>,
        status: String,
        output: String,
    },

    #[error("`{program}` timed out after {}s", .after.as_secs())]
    TimedOut { program: String, after: Duration },
}

impl CommandError {
    pub fn failed(program: impl Into<String>, code: Option<i32>, output: String) -> Self {
        let status = code.map_or_else(|| "by signal".to_owned(), |c| c.to_string());
        Self::Failed {
            program: program.into(),
            code,
            status,
            output,
        }
    }

    /// Captured output, if the program got far enough to produce any.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Failed { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Runs external programs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a program to completion.
    ///
    /// Each line of output is delivered to `spec.on_line` as soon as it is
    /// read, in order per stream. A trailing fragment without newline is
    /// delivered when the stream closes.
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, CommandError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_display() {
        let spec = CommandSpec::new("steamcmd")
            .args(["+login", "anonymous"])
            .arg("+force_install_dir")
            .arg("/srv/my server")
            .env("HOME", "/home/panel")
            .fail_tolerant();

        assert_eq!(
            spec.display(),
            "steamcmd +login anonymous +force_install_dir '/srv/my server'"
        );
        assert!(spec.fail_tolerant);
        assert_eq!(spec.env, vec![("HOME".to_owned(), "/home/panel".to_owned())]);
    }

    #[test]
    fn test_failed_message() {
        let err = CommandError::failed("java", Some(3), String::new());
        assert_eq!(err.to_string(), "`java` exited 3");
        let killed = CommandError::failed("java", None, "partial".to_owned());
        assert_eq!(killed.to_string(), "`java` exited by signal");
        assert_eq!(killed.output(), Some("partial"));
    }

    #[test]
    fn test_debug_hides_env_values() {
        let spec = CommandSpec::new("x").env("TOKEN", "secret");
        assert!(!format!("{spec:?}").contains("secret"));
    }
}
