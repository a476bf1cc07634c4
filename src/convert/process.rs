//! Running external conversion programs.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;

use crate::error::{Error, Result};

/// Longest stderr excerpt carried in a failure.
const MAX_STDERR_CHARS: usize = 600;

/// Spawns external programs with a timeout, killing them when it expires.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `program` with `args` and return its stdout.
    pub async fn run<S: AsRef<OsStr>>(&self, program: &str, args: &[S]) -> Result<String> {
        self.run_in(program, args, None).await
    }

    /// Run `program` with `args` from `cwd` and return its stdout.
    pub async fn run_in<S: AsRef<OsStr>>(
        &self,
        program: &str,
        args: &[S],
        cwd: Option<&Path>,
    ) -> Result<String> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let started = Instant::now();
        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ToolNotFound(program.to_string())
            } else {
                Error::ToolFailed {
                    program: program.to_string(),
                    message: format!("Failed to start: {}", e),
                }
            }
        })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                tracing::warn!(program, timeout_secs = self.timeout.as_secs(), "program timed out");
                return Err(Error::ToolTimeout {
                    program: program.to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("exited with {}", output.status),
                text => tail(text, MAX_STDERR_CHARS).to_string(),
            };
            tracing::warn!(program, elapsed_ms, %message, "program failed");
            return Err(Error::ToolFailed {
                program: program.to_string(),
                message,
            });
        }

        tracing::debug!(program, elapsed_ms, "program finished");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Try each program in order with the same arguments; the first success wins.
    ///
    /// Returns the program that succeeded. When all fail, the last error is returned.
    pub async fn first_success<'a, S: AsRef<OsStr>>(
        &self,
        programs: &'a [String],
        args: &[S],
    ) -> Result<&'a str> {
        let mut last_error = None;

        for program in programs.iter().filter(|p| !p.trim().is_empty()) {
            match self.run(program, args).await {
                Ok(_) => return Ok(program.as_str()),
                Err(e) => {
                    tracing::debug!(program = %program, error = %e, "trying next program");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::ToolNotFound(programs.join(", "))))
    }
}

/// Last `max` characters of `text`, on a char boundary.
fn tail(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    let skip = count - max;
    let (index, _) = text.char_indices().nth(skip).unwrap_or((0, ' '));
    &text[index..]
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn runner() -> CommandRunner {
        CommandRunner::new(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = assert_ok!(runner().run("echo", &["hello"]).await);
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let err = runner()
            .run("definitely-not-a-real-binary-42", &["x"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(ref p) if p == "definitely-not-a-real-binary-42"));
    }

    #[tokio::test]
    async fn test_run_nonzero_exit_carries_stderr() {
        let err = runner()
            .run("sh", &["-c", "echo broken pipe >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            Error::ToolFailed { program, message } => {
                assert_eq!(program, "sh");
                assert_eq!(message, "broken pipe");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let runner = CommandRunner::new(Duration::from_millis(200));
        let err = assert_err!(runner.run("sleep", &["5"]).await);
        assert!(matches!(err, Error::ToolTimeout { .. }));
    }

    #[tokio::test]
    async fn test_first_success_falls_back() {
        let programs = vec![
            "definitely-not-a-real-binary-42".to_string(),
            "false".to_string(),
            "true".to_string(),
        ];
        let used = assert_ok!(runner().first_success(&programs, &[] as &[&str]).await);
        assert_eq!(used, "true");
    }

    #[tokio::test]
    async fn test_first_success_returns_last_error() {
        let programs = vec!["true-but-missing-binary".to_string(), "false".to_string()];
        let err = runner()
            .first_success(&programs, &[] as &[&str])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolFailed { .. }));
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("abc", 10), "abc");
        assert_eq!(tail("ééé", 2), "éé");
    }
}
