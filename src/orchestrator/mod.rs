pub mod cli_mapper;
pub mod generator;
pub mod prompts;
pub mod registry;
pub mod script_runner;

pub use cli_mapper::{LlmArg, LlmProvider};
pub use generator::{ChangeGenerator, CliGenerator, ScriptedGenerator};
#[cfg(feature = "api-direct")]
pub use generator::ApiGenerator;
pub use prompts::GenerationRequest;
pub use registry::GeneratorRegistry;
pub use script_runner::ScriptRunner;

use crate::models::ProposedChange;
use crate::parser::parse_response;

/// A generation attempt that produced nothing usable
#[derive(Debug, Clone)]
pub struct GenerationFailure {
    pub reason: String,
    /// Raw reply, when the backend answered but the reply was malformed
    pub raw: Option<String>,
}

impl GenerationFailure {
    /// Artifact fed back to the next attempt
    pub fn artifact(&self) -> String {
        match &self.raw {
            Some(raw) => format!("{}\n\n--- reply ---\n{}", self.reason, raw),
            None => self.reason.clone(),
        }
    }
}

/// Ask a generator for a change and parse its reply
pub async fn propose(
    generator: &dyn ChangeGenerator,
    request: &GenerationRequest,
) -> std::result::Result<ProposedChange, GenerationFailure> {
    let raw = generator.generate(request).await.map_err(|e| GenerationFailure {
        reason: format!("{:#}", e),
        raw: None,
    })?;

    parse_response(&raw, request.format).map_err(|e| GenerationFailure {
        reason: e.to_string(),
        raw: Some(raw),
    })
}
