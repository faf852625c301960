//! Service layer for deliverd
//!
//! Each service owns one collaborator of the engine loop: the backlog, the
//! git working tree, change application, publishing and verification.

pub mod apply_service;
pub mod catalog_service;
pub mod git_service;
pub mod publish_service;
pub mod verify_service;

// Re-export commonly used types
pub use apply_service::{ApplyOutcome, ChangeApplicator};
pub use catalog_service::FeatureCatalog;
pub use git_service::{GitOutput, GitRepo};
pub use publish_service::{commit_message, PublishOutcome, Publisher};
pub use verify_service::{VerifyOutcome, Verifier};
