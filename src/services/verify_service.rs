//! Verifier - runs a feature's declared check command

use crate::models::{FeatureDescriptor, VerifyConfig};
use crate::Result;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Lines of command output kept for reports
const OUTPUT_TAIL_LINES: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Command exited zero, or nothing was declared
    Pass { command: Option<String> },
    Fail {
        command: String,
        exit_code: Option<i32>,
        timed_out: bool,
        output: String,
    },
}

impl VerifyOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, VerifyOutcome::Pass { .. })
    }

    /// Human-readable failure description
    pub fn describe(&self) -> String {
        match self {
            VerifyOutcome::Pass { .. } => "passed".to_string(),
            VerifyOutcome::Fail { timed_out: true, .. } => "timed out".to_string(),
            VerifyOutcome::Fail {
                exit_code: Some(code),
                ..
            } => format!("exited with code {}", code),
            VerifyOutcome::Fail { .. } => "terminated by signal".to_string(),
        }
    }
}

pub struct Verifier {
    root: PathBuf,
    shell: String,
    timeout: Duration,
}

impl Verifier {
    pub fn new(root: impl Into<PathBuf>, config: &VerifyConfig) -> Self {
        Self {
            root: root.into(),
            shell: config.shell.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run the feature's verify command in the repository root.
    ///
    /// A feature without a declared command passes. Timeout expiry is a
    /// failure. `Err` means the command could not be started at all.
    pub async fn verify(&self, feature: &FeatureDescriptor) -> Result<VerifyOutcome> {
        let Some(command) = feature.verify_command.clone() else {
            tracing::info!(feature = %feature.id, "no verify command declared, nothing to verify");
            return Ok(VerifyOutcome::Pass { command: None });
        };

        tracing::info!(feature = %feature.id, command = %command, "running verify command");

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&command)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to start verify shell '{}'", self.shell))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.context("Failed to wait for verify command")?,
            Err(_) => {
                tracing::warn!(feature = %feature.id, secs = self.timeout.as_secs(), "verify command timed out");
                return Ok(VerifyOutcome::Fail {
                    command,
                    exit_code: None,
                    timed_out: true,
                    output: String::new(),
                });
            }
        };

        if output.status.success() {
            return Ok(VerifyOutcome::Pass {
                command: Some(command),
            });
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(VerifyOutcome::Fail {
            command,
            exit_code: output.status.code(),
            timed_out: false,
            output: tail(&combined, OUTPUT_TAIL_LINES),
        })
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
