use super::Workspace;
use crate::services::FeatureCatalog;
use crate::state::StateStore;
use crate::Result;
use colored::Colorize;

/// List pending descriptors in execution order
pub async fn run(workspace: &Workspace) -> Result<()> {
    let config = workspace.load_config()?;
    let store = StateStore::new(workspace.root().join(&config.state_path));
    let catalog = FeatureCatalog::new(workspace.root().join(&config.backlog_dir));

    let state = store.load()?;
    let pending = catalog.list_pending(&state)?;

    if pending.is_empty() {
        println!("{}", "✅ No pending features".green());
        return Ok(());
    }

    println!("{}", format!("📋 {} pending feature(s):", pending.len()).cyan().bold());
    for feature in &pending {
        let marker = if state.current_feature.as_deref() == Some(feature.id.as_str()) {
            "▶".yellow().to_string()
        } else {
            " ".to_string()
        };
        let verify = match &feature.verify_command {
            Some(command) => format!("verify: {}", command).bright_black().to_string(),
            None => "no verify command".bright_black().to_string(),
        };
        println!("   {} {:<6} {}  {}", marker, feature.id, feature.display_name(), verify);
    }
    Ok(())
}
