use super::cli_mapper::LlmProvider;
use anyhow::{Context, Result};
use indicatif::{ProgressBar as IndicatifProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Runner for executing LLM CLI commands directly
pub struct ScriptRunner {
    working_dir: PathBuf,
    timeout: Duration,
}

impl ScriptRunner {
    pub fn new(working_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            working_dir: working_dir.into(),
            timeout,
        }
    }

    /// Run an LLM CLI command with provider-agnostic interface
    ///
    /// # Arguments
    /// * `provider` - The LLM provider (Gemini, Codex, Claude)
    /// * `command` - Executable override; defaults to the provider's command
    /// * `args` - CLI arguments (already mapped via LlmProvider::build_args)
    /// * `prompt` - The prompt to pipe to stdin
    /// * `show_progress` - Whether to show a progress spinner
    pub async fn run_llm(
        &self,
        provider: LlmProvider,
        command: Option<&str>,
        args: Vec<String>,
        prompt: &str,
        show_progress: bool,
    ) -> Result<String> {
        let command = command.unwrap_or(provider.command());
        match tokio::time::timeout(
            self.timeout,
            self.run_command(command, &args, prompt, show_progress),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => anyhow::bail!(
                "Command '{}' timed out after {}s",
                command,
                self.timeout.as_secs()
            ),
        }
    }

    /// Internal: Run a CLI command, returning its stdout
    async fn run_command(
        &self,
        command_name: &str,
        args: &[String],
        prompt: &str,
        show_progress: bool,
    ) -> Result<String> {
        let mut cmd = Command::new(command_name);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let progress = if show_progress {
            let pb = IndicatifProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                pb.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
            }
            pb.set_message(format!("Running {}...", command_name));
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        } else {
            None
        };

        let mut child = cmd.spawn().with_context(|| {
            format!(
                "Command '{}' not found. Please ensure it is installed and in your PATH.",
                command_name
            )
        })?;

        // Write prompt to stdin
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .context("Failed to write to stdin")?;
            stdin.flush().await.context("Failed to flush stdin")?;
            drop(stdin);
        }

        // Drain stdout and stderr concurrently to avoid backpressure deadlock
        let mut stdout = child.stdout.take().context("Failed to capture stdout")?;
        let stderr = child.stderr.take().context("Failed to capture stderr")?;

        // stdout is the reply and is kept byte for byte (CRLF patches included)
        let mut stderr_reader = BufReader::new(stderr).lines();

        let mut reply: Vec<u8> = Vec::new();
        let mut stderr_output = String::new();
        let mut stdout_done = false;
        let mut stderr_done = false;

        while !stdout_done || !stderr_done {
            tokio::select! {
                read = stdout.read_buf(&mut reply), if !stdout_done => {
                    match read {
                        Ok(0) => stdout_done = true,
                        Ok(_) => {}
                        Err(e) => return Err(anyhow::anyhow!("Failed to read stdout: {}", e)),
                    }
                }
                line = stderr_reader.next_line(), if !stderr_done => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some(ref pb) = progress {
                                // Update progress message with recent output
                                let short_line = if line.chars().count() > 60 {
                                    let truncated: String = line.chars().take(60).collect();
                                    format!("{}...", truncated)
                                } else {
                                    line.clone()
                                };
                                pb.set_message(short_line);
                            }
                            stderr_output.push_str(&line);
                            stderr_output.push('\n');
                        }
                        Ok(None) => stderr_done = true,
                        Err(e) => return Err(anyhow::anyhow!("Failed to read stderr: {}", e)),
                    }
                }
            }
        }

        let status = child.wait().await?;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        if !status.success() {
            anyhow::bail!(
                "Command '{}' failed with exit code {:?}\nStderr: {}",
                command_name,
                status.code(),
                stderr_output.trim()
            );
        }

        Ok(String::from_utf8_lossy(&reply).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(secs: u64) -> ScriptRunner {
        ScriptRunner::new(std::env::temp_dir(), Duration::from_secs(secs))
    }

    #[tokio::test]
    async fn test_missing_command_reports_not_found() {
        let result = runner(5)
            .run_llm(
                LlmProvider::Claude,
                Some("deliverd-no-such-binary"),
                vec![],
                "prompt",
                false,
            )
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("not found"), "{}", err);
    }

    #[tokio::test]
    async fn test_stdin_is_piped_to_stdout() {
        let output = runner(5)
            .run_llm(LlmProvider::Claude, Some("cat"), vec![], "diff --git a/x b/x\n", false)
            .await
            .unwrap();
        assert_eq!(output, "diff --git a/x b/x\n");
    }

    #[tokio::test]
    async fn test_reply_keeps_crlf_and_missing_final_newline() {
        let reply = "diff --git a/x b/x\r\n-a\r\n+b";
        let output = runner(5)
            .run_llm(LlmProvider::Claude, Some("cat"), vec![], reply, false)
            .await
            .unwrap();
        assert_eq!(output, reply);
    }

    #[tokio::test]
    async fn test_non_zero_exit_includes_stderr() {
        let args = vec!["-c".to_string(), "echo nope >&2; exit 2".to_string()];
        let err = runner(5)
            .run_llm(LlmProvider::Claude, Some("sh"), args, "", false)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("exit code Some(2)"), "{}", message);
        assert!(message.contains("nope"), "{}", message);
    }

    #[tokio::test]
    async fn test_timeout() {
        let args = vec!["-c".to_string(), "sleep 5".to_string()];
        let err = runner(1)
            .run_llm(LlmProvider::Claude, Some("sh"), args, "", false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
