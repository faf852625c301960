// deliverd - autonomous feature delivery engine
// Drives backlog features through plan, approve, implement, verify and completion

pub mod cli;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod services;
pub mod state;

pub use anyhow::{Context, Result};
pub use colored::Colorize;

// Re-export commonly used types
pub use engine::{Engine, RunSummary, StepOutcome, Transition};
pub use error::{EngineError, ErrorKind};
pub use models::{ChangeFormat, EngineConfig, EngineState, FeatureDescriptor, Phase, ProposedChange};
pub use orchestrator::{ChangeGenerator, GenerationRequest, GeneratorRegistry};
pub use state::StateStore;
