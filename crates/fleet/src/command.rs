//! Seam between fleet backends and the provisioner executables they drive.

use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors running a provisioner command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not be started.
    #[error("failed to run [{command}]: {source}")]
    Spawn {
        /// Command line.
        command: String,

        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The command exited unsuccessfully.
    #[error("[{command}] exited with status {code}: {stderr}")]
    NonZeroExit {
        /// Command line.
        command: String,

        /// Exit code.
        code: i32,

        /// Captured standard error.
        stderr: String,
    },

    /// The command was terminated by a signal.
    #[error("[{command}] was terminated by a signal")]
    Terminated {
        /// Command line.
        command: String,
    },

    /// A scripted runner had no result left for the command.
    #[error("no scripted result for [{command}]")]
    Unscripted {
        /// Command line.
        command: String,
    },
}

/// Formats a command line for logs and errors.
#[must_use]
pub fn command_line(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

/// Runs provisioner executables.
#[async_trait]
pub trait CommandRunner
where
    Self: Clone + Send + Sync + 'static,
{
    /// Runs the command with inherited output and returns its exit code.
    async fn status(&self, program: &str, args: &[String]) -> Result<i32, CommandError>;

    /// Runs the command and returns its standard output; a non-zero exit is an error.
    async fn output(&self, program: &str, args: &[String]) -> Result<Vec<u8>, CommandError>;
}

/// Runs commands as child processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn status(&self, program: &str, args: &[String]) -> Result<i32, CommandError> {
        let command = command_line(program, args);
        debug!("running [{}]", command);

        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|source| CommandError::Spawn {
                command: command.clone(),
                source,
            })?;

        status.code().ok_or(CommandError::Terminated { command })
    }

    async fn output(&self, program: &str, args: &[String]) -> Result<Vec<u8>, CommandError> {
        let command = command_line(program, args);
        debug!("running [{}]", command);

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                command: command.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        match output.status.code() {
            Some(code) => Err(CommandError::NonZeroExit {
                command,
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            None => Err(CommandError::Terminated { command }),
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use scripted::ScriptedRunner;

#[cfg(any(test, feature = "test-helpers"))]
mod scripted {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{CommandError, CommandRunner, command_line};

    #[derive(Clone, Debug)]
    enum Reply {
        Status(i32),
        Output(Vec<u8>),
        Failure { code: i32, stderr: String },
    }

    #[derive(Debug, Default)]
    struct Script {
        fallback_output: Option<Vec<u8>>,
        invocations: Vec<String>,
        replies: VecDeque<Reply>,
    }

    /// Command runner replaying queued results in order and recording every command line.
    #[derive(Clone, Debug, Default)]
    pub struct ScriptedRunner {
        script: Arc<Mutex<Script>>,
    }

    impl ScriptedRunner {
        /// Creates a runner with nothing queued.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queues an exit code for the next `status` call.
        pub async fn push_status(&self, code: i32) {
            self.script.lock().await.replies.push_back(Reply::Status(code));
        }

        /// Queues standard output for the next `output` call.
        pub async fn push_output(&self, stdout: impl Into<String> + Send) {
            self.script
                .lock()
                .await
                .replies
                .push_back(Reply::Output(stdout.into().into_bytes()));
        }

        /// Queues a failed exit for the next call.
        pub async fn push_failure(&self, code: i32, stderr: impl Into<String> + Send) {
            self.script.lock().await.replies.push_back(Reply::Failure {
                code,
                stderr: stderr.into(),
            });
        }

        /// Output returned by `output` calls once the queue is empty.
        pub async fn set_fallback_output(&self, stdout: impl Into<String> + Send) {
            self.script.lock().await.fallback_output = Some(stdout.into().into_bytes());
        }

        /// Every command line run so far.
        pub async fn invocations(&self) -> Vec<String> {
            self.script.lock().await.invocations.clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn status(&self, program: &str, args: &[String]) -> Result<i32, CommandError> {
            let command = command_line(program, args);
            let mut script = self.script.lock().await;
            script.invocations.push(command.clone());

            match script.replies.pop_front() {
                Some(Reply::Status(code) | Reply::Failure { code, .. }) => Ok(code),
                Some(Reply::Output(_)) | None => Err(CommandError::Unscripted { command }),
            }
        }

        async fn output(&self, program: &str, args: &[String]) -> Result<Vec<u8>, CommandError> {
            let command = command_line(program, args);
            let mut script = self.script.lock().await;
            script.invocations.push(command.clone());

            match script.replies.pop_front() {
                Some(Reply::Output(stdout)) => Ok(stdout),
                Some(Reply::Failure { code, stderr }) => Err(CommandError::NonZeroExit {
                    command,
                    code,
                    stderr,
                }),
                Some(Reply::Status(_)) => Err(CommandError::Unscripted { command }),
                None => script
                    .fallback_output
                    .clone()
                    .ok_or(CommandError::Unscripted { command }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_command_line() {
        assert_eq!(command_line("senza", &[]), "senza");
        assert_eq!(
            command_line("senza", &args(&["list", "app"])),
            "senza list app"
        );
    }

    #[tokio::test]
    async fn test_scripted_runner_replays_in_order() {
        let runner = ScriptedRunner::new();
        runner.push_status(0).await;
        runner.push_output("[]").await;
        runner.push_failure(2, "boom").await;

        assert_eq!(runner.status("senza", &args(&["create"])).await.unwrap(), 0);
        assert_eq!(
            runner.output("senza", &args(&["list"])).await.unwrap(),
            b"[]".to_vec()
        );
        assert!(matches!(
            runner.output("senza", &args(&["traffic"])).await,
            Err(CommandError::NonZeroExit { code: 2, .. })
        ));
        assert!(matches!(
            runner.output("senza", &args(&["events"])).await,
            Err(CommandError::Unscripted { .. })
        ));

        assert_eq!(
            runner.invocations().await,
            vec!["senza create", "senza list", "senza traffic", "senza events"]
        );
    }

    #[tokio::test]
    async fn test_scripted_runner_fallback() {
        let runner = ScriptedRunner::new();
        runner.set_fallback_output("{}").await;

        for _ in 0..3 {
            assert_eq!(runner.output("kubectl", &[]).await.unwrap(), b"{}".to_vec());
        }
    }

    #[tokio::test]
    async fn test_system_runner_reports_exit_codes() {
        let runner = SystemCommandRunner;

        assert_eq!(runner.status("true", &[]).await.unwrap(), 0);
        assert_ne!(runner.status("false", &[]).await.unwrap(), 0);
        assert_eq!(
            runner.output("echo", &args(&["hello"])).await.unwrap(),
            b"hello\n".to_vec()
        );
        assert!(matches!(
            runner.output("false", &[]).await,
            Err(CommandError::NonZeroExit { .. })
        ));
        assert!(matches!(
            runner.status("definitely-not-a-real-binary", &[]).await,
            Err(CommandError::Spawn { .. })
        ));
    }
}
