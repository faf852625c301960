use super::{print_transition, Workspace};
use crate::engine::Engine;
use crate::Result;

/// Record approval for the feature held at APPROVE
pub async fn run(workspace: &Workspace) -> Result<()> {
    let config = workspace.load_config()?;
    let engine = Engine::open(workspace.root(), config)?;

    let transition = engine.approve()?;
    print_transition(&transition);
    Ok(())
}
