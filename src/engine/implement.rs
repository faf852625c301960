//! IMPLEMENT phase: generate, apply with a single retry, publish

use super::Engine;
use crate::error::EngineError;
use crate::models::{FeatureDescriptor, Phase};
use crate::orchestrator::{propose, GenerationFailure, GenerationRequest};
use crate::services::{ApplyOutcome, ChangeApplicator, PublishOutcome};
use crate::Result;
use anyhow::Context;

/// Generation attempts per feature: the first try plus one retry
pub const MAX_ATTEMPTS: u32 = 2;

/// Why an attempt produced nothing applicable
enum AttemptFailure {
    Generation(GenerationFailure),
    Application { reason: String, change: String },
}

impl AttemptFailure {
    fn reason(&self) -> &str {
        match self {
            AttemptFailure::Generation(failure) => &failure.reason,
            AttemptFailure::Application { reason, .. } => reason,
        }
    }

    /// Text fed back to the generator on retry
    fn feedback(&self) -> String {
        match self {
            AttemptFailure::Generation(failure) => failure.artifact(),
            AttemptFailure::Application { reason, .. } => reason.clone(),
        }
    }

    /// Full diagnostic written to the rejected directory
    fn diagnostic(&self) -> String {
        match self {
            AttemptFailure::Generation(failure) => failure.artifact(),
            AttemptFailure::Application { reason, change } => {
                format!("{}\n\n--- proposal ---\n{}", reason, change)
            }
        }
    }

    fn into_error(self, feature: &str, attempts: u32) -> EngineError {
        match self {
            AttemptFailure::Generation(failure) => EngineError::Generation {
                feature: feature.to_string(),
                phase: Phase::Implement,
                attempts,
                reason: failure.reason,
            },
            AttemptFailure::Application { reason, .. } => EngineError::Application {
                feature: feature.to_string(),
                phase: Phase::Implement,
                attempts,
                reason,
            },
        }
    }
}

impl Engine {
    /// Bring the working tree to "feature committed and pushed".
    ///
    /// Returns a short note for the transition record.
    pub(super) async fn implement(&self, feature: &FeatureDescriptor) -> Result<String> {
        let publisher = self.publisher();

        // Killed after commit: the change is already in history
        if publisher.already_published(feature)? {
            tracing::warn!(feature = %feature.id, "HEAD already carries this feature, skipping generation");
            if self.config.git.push {
                publisher
                    .push()
                    .await
                    .map_err(|e| publish_error(feature, e))?;
            }
            return Ok("already committed".to_string());
        }

        // Killed mid-apply: start over from HEAD
        if self.repo.is_dirty()? {
            tracing::warn!(feature = %feature.id, "working tree has uncommitted changes, restoring HEAD");
            self.repo.reset_hard().await?;
        }

        self.apply_with_retry(feature).await?;

        match publisher.publish(feature).await {
            Ok(PublishOutcome::Committed { sha }) => {
                Ok(format!("committed {}", &sha[..sha.len().min(12)]))
            }
            Ok(PublishOutcome::NoOp) => Ok("no changes".to_string()),
            Err(e) => Err(publish_error(feature, e).into()),
        }
    }

    /// Generate and apply, regenerating once with the failure fed back
    async fn apply_with_retry(&self, feature: &FeatureDescriptor) -> Result<()> {
        let conventions = self.conventions()?;
        let generator = self.registry.resolve(feature);
        let applicator = ChangeApplicator::new(
            &self.repo,
            vec![self.config.state_dir(), self.config.backlog_dir.clone()],
        );
        let mut request = GenerationRequest::new(feature, &conventions, self.config.change_format);

        tracing::info!(feature = %feature.id, generator = generator.name(), "generating change");

        loop {
            let failure = match propose(generator, &request).await {
                Ok(change) => {
                    tracing::info!(feature = %feature.id, attempt = request.attempt, change = %change.summary(), "change proposed");
                    match applicator.apply(&change).await? {
                        ApplyOutcome::Applied => return Ok(()),
                        ApplyOutcome::Rejected(reason) => AttemptFailure::Application {
                            reason,
                            change: change.to_wire(),
                        },
                    }
                }
                Err(failure) => AttemptFailure::Generation(failure),
            };

            tracing::warn!(
                feature = %feature.id,
                attempt = request.attempt,
                reason = failure.reason(),
                "attempt rejected"
            );
            self.save_rejected(feature, request.attempt, &failure);

            if self.repo.is_dirty()? {
                self.repo.reset_hard().await?;
            }

            if request.attempt >= MAX_ATTEMPTS {
                return Err(failure.into_error(&feature.id, request.attempt).into());
            }
            request = request.retry(failure.feedback());
        }
    }

    /// Keep a rejected proposal for diagnosis; failure to do so is not fatal
    fn save_rejected(&self, feature: &FeatureDescriptor, attempt: u32, failure: &AttemptFailure) {
        let dir = self.rejected_dir();
        let path = dir.join(format!("{}-attempt{}.txt", feature.id, attempt));
        let content = format!(
            "feature: {}\nattempt: {}\n\n{}\n",
            feature.id,
            attempt,
            failure.diagnostic()
        );

        let result = std::fs::create_dir_all(&dir)
            .and_then(|_| std::fs::write(&path, content))
            .with_context(|| format!("Failed to write {}", path.display()));
        match result {
            Ok(()) => tracing::info!(path = %path.display(), "rejected proposal saved"),
            Err(e) => tracing::warn!(error = %e, "could not save rejected proposal"),
        }
    }
}

fn publish_error(feature: &FeatureDescriptor, err: anyhow::Error) -> EngineError {
    EngineError::Publish {
        feature: feature.id.clone(),
        phase: Phase::Implement,
        reason: format!("{:#}", err),
    }
}
