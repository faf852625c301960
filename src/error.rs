//! Engine error taxonomy
//!
//! Every fatal condition the engine can hit maps to exactly one variant.
//! Variants that concern a feature carry its id and the phase it was in.

use crate::models::Phase;
use std::path::PathBuf;

/// Broad class of an engine error, used for exit codes and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Generation,
    Application,
    Verification,
    Publish,
}

impl ErrorKind {
    /// Process exit code for this class of failure
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Configuration => 2,
            ErrorKind::Generation => 3,
            ErrorKind::Application => 4,
            ErrorKind::Verification => 5,
            ErrorKind::Publish => 6,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid state structure in {path}: {reason}")]
    InvalidState { path: PathBuf, reason: String },

    #[error("Duplicate feature id {id}: {first} and {second}")]
    DuplicateFeature {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Descriptor for feature {id} not found in backlog (phase {phase})")]
    MissingDescriptor { id: String, phase: Phase },

    #[error("Working tree is not a usable git repository: {0}")]
    Repository(String),

    #[error("Generation failed for feature {feature} (phase {phase}) after {attempts} attempt(s): {reason}")]
    Generation {
        feature: String,
        phase: Phase,
        attempts: u32,
        reason: String,
    },

    #[error("Change application failed for feature {feature} (phase {phase}) after {attempts} attempt(s): {reason}")]
    Application {
        feature: String,
        phase: Phase,
        attempts: u32,
        reason: String,
    },

    #[error("Verification failed for feature {feature} (phase {phase}): `{command}` {outcome}")]
    Verification {
        feature: String,
        phase: Phase,
        command: String,
        outcome: String,
    },

    #[error("Publish failed for feature {feature} (phase {phase}): {reason}")]
    Publish {
        feature: String,
        phase: Phase,
        reason: String,
    },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidState { .. }
            | EngineError::DuplicateFeature { .. }
            | EngineError::MissingDescriptor { .. }
            | EngineError::Repository(_) => ErrorKind::Configuration,
            EngineError::Generation { .. } => ErrorKind::Generation,
            EngineError::Application { .. } => ErrorKind::Application,
            EngineError::Verification { .. } => ErrorKind::Verification,
            EngineError::Publish { .. } => ErrorKind::Publish,
        }
    }
}

/// Exit code for any error reaching the process boundary
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<EngineError>()
        .map(|e| e.kind().exit_code())
        .unwrap_or(1)
}
