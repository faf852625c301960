use super::{print_transition, Workspace};
use crate::engine::Engine;
use crate::Result;
use colored::Colorize;

/// Drive every pending feature to COMPLETED
pub async fn run(workspace: &Workspace) -> Result<()> {
    let config = workspace.load_config()?;
    let engine = Engine::open(workspace.root(), config)?;

    let summary = engine.run(print_transition).await?;

    println!();
    if let Some(feature) = &summary.awaiting_approval {
        println!(
            "{}",
            format!("⏸️  Feature {} is waiting for approval", feature).yellow().bold()
        );
        println!("   Run {} to continue", "deliverd approve".green());
    } else if summary.completed.is_empty() {
        println!("{}", "✅ Nothing to do: backlog exhausted".green());
    } else {
        println!(
            "{}",
            format!(
                "✅ Delivered {} feature(s): {}",
                summary.completed.len(),
                summary.completed.join(", ")
            )
            .green()
            .bold()
        );
    }
    Ok(())
}
