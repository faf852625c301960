//! Change generators
//!
//! A generator turns a [`GenerationRequest`] into the raw text reply of a
//! reasoning service. Parsing the reply into a change happens in
//! [`crate::parser::parse_response`].

use super::cli_mapper::{LlmArg, LlmProvider};
use super::prompts::GenerationRequest;
use super::script_runner::ScriptRunner;
use crate::models::GeneratorConfig;
use crate::Result;
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tools a CLI agent may use while drafting a change; none of them write
const READ_ONLY_TOOLS: &str = "Read,Glob,Grep";

/// Common interface for everything that can propose a change
#[async_trait]
pub trait ChangeGenerator: Send + Sync {
    /// Produce the raw reply for one request.
    ///
    /// # Errors
    /// Returns an error when the backend could not be reached, exited
    /// non-zero or timed out. Such failures count as a failed attempt.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Name of this generator for display purposes
    fn name(&self) -> &str;
}

/// Generator backed by an agent CLI (`claude -p`, `codex exec`, `gemini`)
pub struct CliGenerator {
    provider: LlmProvider,
    model: Option<String>,
    command: Option<String>,
    runner: ScriptRunner,
    show_progress: bool,
}

impl CliGenerator {
    pub fn new(
        provider: LlmProvider,
        config: &GeneratorConfig,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            command: config.command.clone(),
            runner: ScriptRunner::new(working_dir, Duration::from_secs(config.timeout_secs)),
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = vec![LlmArg::Print];
        if let Some(model) = &self.model {
            args.push(LlmArg::Model(model.clone()));
        }
        args.push(LlmArg::OutputFormat("text".to_string()));
        args.push(LlmArg::AllowedTools(READ_ONLY_TOOLS.to_string()));
        args.push(LlmArg::ReadOnly);
        self.provider.build_args(&args)
    }
}

#[async_trait]
impl ChangeGenerator for CliGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let prompt = request.prompt();
        tracing::debug!(
            feature = %request.feature_id,
            attempt = request.attempt,
            bytes = prompt.len(),
            "sending generation request"
        );
        self.runner
            .run_llm(
                self.provider,
                self.command.as_deref(),
                self.build_args(),
                &prompt,
                self.show_progress,
            )
            .await
    }

    fn name(&self) -> &str {
        self.command.as_deref().unwrap_or(self.provider.command())
    }
}

/// Generator that replays a prepared reply from disk.
///
/// Used for features whose change is authored by hand and registered in the
/// `[handlers]` config table.
pub struct ScriptedGenerator {
    path: PathBuf,
}

impl ScriptedGenerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ChangeGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        tracing::debug!(feature = %request.feature_id, path = %self.path.display(), "replaying scripted reply");
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read scripted reply {}", self.path.display()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Generator posting OpenAI-compatible chat completions over HTTP
#[cfg(feature = "api-direct")]
pub struct ApiGenerator {
    url: String,
    model: String,
    api_key_env: String,
    http_client: reqwest::Client,
}

#[cfg(feature = "api-direct")]
impl ApiGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            url: config.api_url.clone(),
            model: config.model.clone().unwrap_or_else(|| "gpt-4o".to_string()),
            api_key_env: config.api_key_env.clone(),
            http_client,
        })
    }
}

#[cfg(feature = "api-direct")]
#[async_trait]
impl ChangeGenerator for ApiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let api_key = std::env::var(&self.api_key_env).with_context(|| {
            format!("API key required for the api provider. Set {}.", self.api_key_env)
        })?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": super::prompts::SYSTEM_PROMPT },
                { "role": "user", "content": request.prompt() }
            ]
        });

        let response = self
            .http_client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("Generation request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("API error {}: {}", status, text);
        }

        let result: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse API response")?;

        result["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .context("API response has no message content")
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Build the default generator for a config
pub fn from_config(
    config: &GeneratorConfig,
    working_dir: &Path,
) -> Result<Box<dyn ChangeGenerator>> {
    match LlmProvider::from_config(config.provider) {
        Some(provider) => Ok(Box::new(CliGenerator::new(provider, config, working_dir))),
        None => api_generator(config),
    }
}

#[cfg(feature = "api-direct")]
fn api_generator(config: &GeneratorConfig) -> Result<Box<dyn ChangeGenerator>> {
    Ok(Box::new(ApiGenerator::new(config)?))
}

#[cfg(not(feature = "api-direct"))]
fn api_generator(_config: &GeneratorConfig) -> Result<Box<dyn ChangeGenerator>> {
    anyhow::bail!("Generator provider 'api' requires building with the `api-direct` feature")
}
