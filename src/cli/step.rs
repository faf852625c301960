use super::{print_transition, Workspace};
use crate::engine::{Engine, StepOutcome};
use crate::Result;
use colored::Colorize;

/// Advance exactly one phase and exit
pub async fn run(workspace: &Workspace) -> Result<()> {
    let config = workspace.load_config()?;
    let engine = Engine::open(workspace.root(), config)?;

    match engine.step().await? {
        StepOutcome::Advanced(transition) => print_transition(&transition),
        StepOutcome::Idle => println!("{}", "✅ Nothing to do: backlog exhausted".green()),
        StepOutcome::AwaitingApproval { feature } => {
            println!(
                "{}",
                format!("⏸️  Feature {} is waiting for approval", feature).yellow()
            );
            println!("   Run {} to continue", "deliverd approve".green());
        }
    }
    Ok(())
}
