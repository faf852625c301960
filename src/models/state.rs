use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Current schema version written to new state files
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Lifecycle phase of the engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Canonical initial phase: backlog not yet compiled
    Plan,
    /// Feature selected, waiting for approval
    Approve,
    /// Change generation, application and publish
    Implement,
    /// Running the feature's verify command
    Verify,
    /// Feature recorded as done
    Completed,
    /// Selecting the next pending feature
    Planning,
    /// Legacy initial phase, behaves like `Plan`
    Bootstrap,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Plan,
        Phase::Approve,
        Phase::Implement,
        Phase::Verify,
        Phase::Completed,
        Phase::Planning,
        Phase::Bootstrap,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Plan => "PLAN",
            Phase::Approve => "APPROVE",
            Phase::Implement => "IMPLEMENT",
            Phase::Verify => "VERIFY",
            Phase::Completed => "COMPLETED",
            Phase::Planning => "PLANNING",
            Phase::Bootstrap => "BOOTSTRAP",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Phase::Plan | Phase::Bootstrap => "📝",
            Phase::Planning => "🗂️",
            Phase::Approve => "🔍",
            Phase::Implement => "🔨",
            Phase::Verify => "🧪",
            Phase::Completed => "✅",
        }
    }

    /// Whether a feature is in flight while in this phase
    pub fn holds_feature(&self) -> bool {
        matches!(self, Phase::Approve | Phase::Implement | Phase::Verify)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One append-only audit record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HistoryEntry {
    /// Phase entered by this transition; absent on bare completion records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,

    /// Feature in flight when the phase was entered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,

    /// Feature recorded as completed by this transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implemented: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
}

impl HistoryEntry {
    pub fn new(phase: Phase, feature: Option<String>) -> Self {
        Self {
            phase: Some(phase),
            feature,
            implemented: None,
            at: Some(Utc::now()),
        }
    }
}

/// The sole persisted aggregate of the engine.
///
/// Transitions consume the value and return the next one; callers never
/// patch individual fields across unrelated code paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    pub phase: Phase,

    pub completed_features: BTreeSet<String>,

    pub current_feature: Option<String>,

    pub history: Vec<HistoryEntry>,
}

fn default_schema_version() -> u32 {
    STATE_SCHEMA_VERSION
}

impl Default for EngineState {
    fn default() -> Self {
        Self::initial()
    }
}

impl EngineState {
    /// State used when nothing has been persisted yet
    pub fn initial() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            phase: Phase::Plan,
            completed_features: BTreeSet::new(),
            current_feature: None,
            history: Vec::new(),
        }
    }

    /// Check whether a feature id is already completed.
    ///
    /// Ids match either verbatim or by numeric ordinal, so `1` and `001`
    /// refer to the same feature.
    pub fn is_completed(&self, id: &str) -> bool {
        if self.completed_features.contains(id) {
            return true;
        }
        let Ok(ordinal) = id.parse::<u64>() else {
            return false;
        };
        self.completed_features
            .iter()
            .any(|done| done.parse::<u64>().map_or(false, |n| n == ordinal))
    }

    /// Move to `phase`, keeping the current feature and appending a record
    pub fn transition(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self.history
            .push(HistoryEntry::new(phase, self.current_feature.clone()));
        self
    }

    /// PLANNING -> APPROVE with `id` as the feature in flight
    pub fn select_feature(mut self, id: impl Into<String>) -> Self {
        self.current_feature = Some(id.into());
        self.transition(Phase::Approve)
    }

    /// VERIFY -> COMPLETED: record the current feature and clear it
    pub fn complete_current(mut self) -> Self {
        let implemented = self.current_feature.take();
        if let Some(id) = &implemented {
            self.completed_features.insert(id.clone());
        }
        self.phase = Phase::Completed;
        self.history.push(HistoryEntry {
            implemented,
            ..HistoryEntry::new(Phase::Completed, None)
        });
        self
    }

    /// Whether the phase expects a feature in flight but none is recorded.
    ///
    /// Older runners finished a feature without clearing the phase; the
    /// engine treats such a state as idle and goes back to PLANNING.
    pub fn is_orphaned(&self) -> bool {
        self.phase.holds_feature() && self.current_feature.is_none()
    }

    /// Semantic invariants not expressible in the structural schema
    pub fn check_invariants(&self) -> Result<(), String> {
        if let Some(id) = &self.current_feature {
            if !self.phase.holds_feature() {
                return Err(format!(
                    "current_feature '{}' set while phase is {}",
                    id, self.phase
                ));
            }
        }

        if let Some(id) = &self.current_feature {
            if self.is_completed(id) {
                return Err(format!(
                    "current_feature '{}' is already in completed_features",
                    id
                ));
            }
        }

        if self.schema_version > STATE_SCHEMA_VERSION {
            return Err(format!(
                "schema_version {} is newer than supported version {}",
                self.schema_version, STATE_SCHEMA_VERSION
            ));
        }

        Ok(())
    }

    /// Last history record, if any
    pub fn last_record(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }
}
