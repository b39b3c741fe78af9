//! Command runner backed by `tokio::process`.
//!
//! stdout and stderr are read concurrently and merged into one captured
//! transcript in arrival order. Each line reaches the caller's callback as
//! soon as it is read.

mod stream;

use std::process::Stdio;

use async_trait::async_trait;
use sooty_core::ports::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub use stream::spawn_line_reader;

/// Runs programs as child processes of the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, CommandError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        debug!(program = %spec.program, command = %spec.display(), "running command");
        let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, spec.program.clone(), "stdout", tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, spec.program.clone(), "stderr", tx.clone());
        }
        drop(tx);

        let on_line = spec.on_line.clone();
        let collect = async {
            let mut captured = String::new();
            while let Some(line) = rx.recv().await {
                if !line.is_empty() {
                    if let Some(callback) = &on_line {
                        callback(&line);
                    }
                }
                captured.push_str(&line);
                captured.push('\n');
            }
            let status = child.wait().await;
            (captured, status)
        };

        let (captured, status) = match spec.timeout {
            Some(limit) => {
                if let Ok(done) = tokio::time::timeout(limit, collect).await {
                    done
                } else {
                    warn!(program = %spec.program, "command timed out, killing");
                    let _ = child.kill().await;
                    return Err(CommandError::TimedOut {
                        program: spec.program,
                        after: limit,
                    });
                }
            }
            None => collect.await,
        };

        let status = status.map_err(|source| CommandError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        let code = status.code();
        debug!(program = %spec.program, ?code, "command finished");

        if status.success() || spec.fail_tolerant {
            Ok(CommandOutput {
                code,
                output: captured,
            })
        } else {
            Err(CommandError::failed(spec.program, code, captured))
        }
    }
}
