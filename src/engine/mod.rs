//! Engine loop - the feature lifecycle state machine
//!
//! Every call to [`Engine::step`] loads and validates the persisted state,
//! performs exactly one transition and persists the result before returning.
//! [`Engine::run`] repeats steps until the backlog is exhausted or a feature
//! is waiting for approval.

mod implement;

use crate::error::EngineError;
use crate::models::{EngineConfig, EngineState, FeatureDescriptor, Phase};
use crate::orchestrator::{generator, GeneratorRegistry};
use crate::services::{FeatureCatalog, GitRepo, Publisher, Verifier, VerifyOutcome};
use crate::state::StateStore;
use crate::Result;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Instrument;

pub use implement::MAX_ATTEMPTS;

/// One persisted phase change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    /// Feature in flight during the transition
    pub feature: Option<String>,
    /// Short human-readable result (commit id, verify command, ...)
    pub note: Option<String>,
}

/// Result of a single step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced(Transition),
    /// Nothing pending; no state was written
    Idle,
    /// Feature held at APPROVE until `approve` is called
    AwaitingApproval { feature: String },
}

/// Summary of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub transitions: usize,
    /// Features that reached COMPLETED during this run
    pub completed: Vec<String>,
    /// Set when the run stopped at APPROVE
    pub awaiting_approval: Option<String>,
}

/// The engine bound to one repository
pub struct Engine {
    root: PathBuf,
    config: EngineConfig,
    store: StateStore,
    catalog: FeatureCatalog,
    registry: GeneratorRegistry,
    repo: GitRepo,
    verifier: Verifier,
}

impl Engine {
    /// Open the engine with the generator configured in `config`
    pub fn open(root: impl Into<PathBuf>, config: EngineConfig) -> Result<Self> {
        let root = root.into();
        let default = generator::from_config(&config.generator, &root)?;
        let mut registry = GeneratorRegistry::new(default);
        registry.register_scripted(&root, &config.handlers)?;
        Self::with_registry(root, config, registry)
    }

    /// Open the engine with an explicit generator registry.
    ///
    /// Persisted state is validated before anything in the repository is
    /// touched.
    pub fn with_registry(
        root: impl Into<PathBuf>,
        config: EngineConfig,
        registry: GeneratorRegistry,
    ) -> Result<Self> {
        let root = root.into();
        let store = StateStore::new(root.join(&config.state_path));
        store.load()?;

        let repo = GitRepo::open(
            &root,
            &[config.state_dir()],
            Duration::from_secs(config.git.timeout_secs),
        )?
        .preserving(&[config.backlog_dir.clone()]);

        Ok(Self {
            catalog: FeatureCatalog::new(root.join(&config.backlog_dir)),
            verifier: Verifier::new(&root, &config.verify),
            root,
            config,
            store,
            registry,
            repo,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }

    pub fn registry_mut(&mut self) -> &mut GeneratorRegistry {
        &mut self.registry
    }

    /// Load and validate the persisted state
    pub fn state(&self) -> Result<EngineState> {
        self.store.load()
    }

    /// Drive every pending feature to COMPLETED.
    ///
    /// `on_step` sees each transition as soon as it is persisted.
    pub async fn run(&self, mut on_step: impl FnMut(&Transition)) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        loop {
            match self.step().await? {
                StepOutcome::Advanced(transition) => {
                    summary.transitions += 1;
                    if transition.to == Phase::Completed {
                        if let Some(id) = &transition.feature {
                            summary.completed.push(id.clone());
                        }
                    }
                    on_step(&transition);
                }
                StepOutcome::Idle => return Ok(summary),
                StepOutcome::AwaitingApproval { feature } => {
                    summary.awaiting_approval = Some(feature);
                    return Ok(summary);
                }
            }
        }
    }

    /// Perform exactly one transition and persist it
    pub async fn step(&self) -> Result<StepOutcome> {
        let state = self.store.load()?;
        let from = state.phase;
        let feature = state.current_feature.clone();

        let span = tracing::info_span!("step", phase = %from, feature = feature.as_deref().unwrap_or("-"));
        let (next, note) = match self.advance(state).instrument(span).await? {
            Advance::To(next, note) => (next, note),
            Advance::Idle => return Ok(StepOutcome::Idle),
            Advance::Waiting(feature) => return Ok(StepOutcome::AwaitingApproval { feature }),
        };

        self.store.save(&next)?;
        tracing::info!(from = %from, to = %next.phase, "transition persisted");

        Ok(StepOutcome::Advanced(Transition {
            from,
            to: next.phase,
            feature: feature.or_else(|| next.current_feature.clone()),
            note,
        }))
    }

    /// Record approval for the feature held at APPROVE
    pub fn approve(&self) -> Result<Transition> {
        let state = self.store.load()?;
        if state.phase != Phase::Approve {
            anyhow::bail!("Nothing to approve: engine is in phase {}", state.phase);
        }
        let feature = state.current_feature.clone();
        let next = state.transition(Phase::Implement);
        self.store.save(&next)?;
        tracing::info!(feature = feature.as_deref().unwrap_or("-"), "approval recorded");

        Ok(Transition {
            from: Phase::Approve,
            to: Phase::Implement,
            feature,
            note: Some("approved".to_string()),
        })
    }

    async fn advance(&self, state: EngineState) -> Result<Advance> {
        if state.is_orphaned() {
            tracing::warn!(phase = %state.phase, "no feature in flight, returning to PLANNING");
            return Ok(Advance::To(
                state.transition(Phase::Planning),
                Some("no feature in flight".to_string()),
            ));
        }

        match state.phase {
            Phase::Plan | Phase::Bootstrap => {
                let backlog = self.catalog.discover()?;
                tracing::info!(features = backlog.len(), "backlog compiled");
                Ok(Advance::To(
                    state.transition(Phase::Planning),
                    Some(format!("{} feature(s) in backlog", backlog.len())),
                ))
            }
            Phase::Planning => {
                let pending = self.catalog.list_pending(&state)?;
                let Some(next) = pending.first() else {
                    tracing::info!("backlog exhausted");
                    return Ok(Advance::Idle);
                };
                tracing::info!(feature = %next.id, remaining = pending.len(), "feature selected");
                let note = next.title.clone();
                Ok(Advance::To(state.select_feature(next.id.clone()), note))
            }
            Phase::Approve => {
                let feature = self.current(&state)?;
                if !self.config.auto_approve {
                    return Ok(Advance::Waiting(feature.id));
                }
                Ok(Advance::To(
                    state.transition(Phase::Implement),
                    Some("auto-approved".to_string()),
                ))
            }
            Phase::Implement => {
                let feature = self.current(&state)?;
                let note = self.implement(&feature).await?;
                Ok(Advance::To(state.transition(Phase::Verify), Some(note)))
            }
            Phase::Verify => {
                let feature = self.current(&state)?;
                let note = self.verify(&feature).await?;
                Ok(Advance::To(state.complete_current(), Some(note)))
            }
            Phase::Completed => Ok(Advance::To(state.transition(Phase::Planning), None)),
        }
    }

    /// Descriptor of the feature in flight
    fn current(&self, state: &EngineState) -> Result<FeatureDescriptor> {
        let id = state
            .current_feature
            .as_deref()
            .with_context(|| format!("phase {} has no current feature", state.phase))?;
        self.catalog.find(id, state.phase)
    }

    async fn verify(&self, feature: &FeatureDescriptor) -> Result<String> {
        let outcome = self.verifier.verify(feature).await?;
        match &outcome {
            VerifyOutcome::Pass { command: None } => Ok("nothing to verify".to_string()),
            VerifyOutcome::Pass {
                command: Some(command),
            } => Ok(format!("`{}` passed", command)),
            VerifyOutcome::Fail {
                command, output, ..
            } => {
                if !output.is_empty() {
                    tracing::warn!(feature = %feature.id, "verify output:\n{}", output);
                }
                Err(EngineError::Verification {
                    feature: feature.id.clone(),
                    phase: Phase::Verify,
                    command: command.clone(),
                    outcome: outcome.describe(),
                }
                .into())
            }
        }
    }

    fn publisher(&self) -> Publisher<'_> {
        Publisher::new(&self.repo, &self.config.git)
    }

    /// Directory for rejected proposals
    fn rejected_dir(&self) -> PathBuf {
        self.root.join(self.config.state_dir()).join("rejected")
    }

    fn conventions(&self) -> Result<String> {
        let path = self.root.join(&self.config.conventions_path);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no conventions file");
            return Ok(String::new());
        }
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read conventions {}", path.display()))
    }
}

/// What one phase handler decided
enum Advance {
    To(EngineState, Option<String>),
    Idle,
    Waiting(String),
}
