//! Agent-agnostic CLI argument mapping
//!
//! Maps common LLM arguments to specific CLI syntax for each tool.

use crate::models::GeneratorProvider;

/// Common LLM CLI arguments
#[derive(Debug, Clone)]
pub enum LlmArg {
    /// Model name/ID
    Model(String),
    /// Print mode (Claude -p flag for non-interactive)
    Print,
    /// Output format (text, json, ...)
    OutputFormat(String),
    /// Allowed tools (Claude --allowedTools)
    AllowedTools(String),
    /// Forbid the agent from writing to the working tree
    ReadOnly,
}

/// LLM CLI provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    Codex,
    Claude,
}

impl LlmProvider {
    /// CLI provider for a configured backend, if it is CLI-based
    pub fn from_config(provider: GeneratorProvider) -> Option<Self> {
        match provider {
            GeneratorProvider::Claude => Some(LlmProvider::Claude),
            GeneratorProvider::Codex => Some(LlmProvider::Codex),
            GeneratorProvider::Gemini => Some(LlmProvider::Gemini),
            GeneratorProvider::Api => None,
        }
    }

    /// Get the CLI command name
    pub fn command(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::Codex => "codex",
            LlmProvider::Claude => "claude",
        }
    }

    /// Build CLI arguments from common LlmArgs
    pub fn build_args(&self, args: &[LlmArg]) -> Vec<String> {
        let mut cli_args = Vec::new();

        // Codex: non-interactive mode is a subcommand
        if *self == LlmProvider::Codex {
            cli_args.push("exec".to_string());
        }

        for arg in args {
            match arg {
                LlmArg::Model(model) => match self {
                    LlmProvider::Gemini => {
                        cli_args.push("-m".to_string());
                        cli_args.push(model.clone());
                    }
                    LlmProvider::Codex | LlmProvider::Claude => {
                        cli_args.push("--model".to_string());
                        cli_args.push(model.clone());
                    }
                },
                LlmArg::Print => {
                    if *self == LlmProvider::Claude {
                        cli_args.push("-p".to_string());
                    }
                }
                LlmArg::OutputFormat(format) => match self {
                    LlmProvider::Gemini | LlmProvider::Claude => {
                        cli_args.push("--output-format".to_string());
                        cli_args.push(format.clone());
                    }
                    LlmProvider::Codex => {
                        // Codex prints the final message as plain text
                    }
                },
                LlmArg::AllowedTools(tools) => {
                    if *self == LlmProvider::Claude {
                        cli_args.push("--allowedTools".to_string());
                        cli_args.push(tools.clone());
                    }
                }
                LlmArg::ReadOnly => {
                    if *self == LlmProvider::Codex {
                        cli_args.push("--sandbox".to_string());
                        cli_args.push("read-only".to_string());
                    }
                }
            }
        }

        cli_args
    }
}
