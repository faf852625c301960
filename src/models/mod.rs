pub mod change;
pub mod config;
pub mod feature;
pub mod state;

pub use change::{ChangeFormat, ProposedChange, DIFF_MARKER};
pub use config::{
    EngineConfig, GeneratorConfig, GeneratorProvider, GitConfig, VerifyConfig, CONFIG_PATH,
};
pub use feature::FeatureDescriptor;
pub use state::{EngineState, HistoryEntry, Phase, STATE_SCHEMA_VERSION};
