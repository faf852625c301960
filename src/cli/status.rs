use super::Workspace;
use crate::models::{EngineState, HistoryEntry, Phase};
use crate::services::FeatureCatalog;
use crate::state::StateStore;
use crate::Result;
use colored::Colorize;
use serde::Serialize;

/// History records shown by `status`
const RECENT_HISTORY: usize = 5;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub phase: Phase,
    pub current_feature: Option<String>,
    pub completed_features: Vec<String>,
    pub pending_features: Vec<String>,
    pub recent_history: Vec<HistoryEntry>,
}

impl StatusReport {
    pub fn build(state: &EngineState, catalog: &FeatureCatalog) -> Result<Self> {
        let pending = catalog.list_pending(state)?;
        let skip = state.history.len().saturating_sub(RECENT_HISTORY);
        Ok(Self {
            phase: state.phase,
            current_feature: state.current_feature.clone(),
            completed_features: state.completed_features.iter().cloned().collect(),
            pending_features: pending.into_iter().map(|f| f.id).collect(),
            recent_history: state.history[skip..].to_vec(),
        })
    }
}

pub async fn run(workspace: &Workspace, json: bool) -> Result<()> {
    let config = workspace.load_config()?;
    let store = StateStore::new(workspace.root().join(&config.state_path));
    let catalog = FeatureCatalog::new(workspace.root().join(&config.backlog_dir));

    let state = store.load()?;
    let report = StatusReport::build(&state, &catalog)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Delivery status".cyan().bold());
    println!();

    let phase = match report.phase {
        Phase::Completed => report.phase.to_string().green(),
        Phase::Implement => report.phase.to_string().blue(),
        Phase::Verify => report.phase.to_string().yellow(),
        Phase::Approve => report.phase.to_string().magenta(),
        _ => report.phase.to_string().normal(),
    };
    println!("   Phase:     {} {}", report.phase.emoji(), phase);
    println!(
        "   Current:   {}",
        report.current_feature.as_deref().unwrap_or("-")
    );
    println!(
        "   Completed: {} {}",
        report.completed_features.len(),
        list(&report.completed_features).bright_black()
    );
    println!(
        "   Pending:   {} {}",
        report.pending_features.len(),
        list(&report.pending_features).bright_black()
    );

    if !report.recent_history.is_empty() {
        println!();
        println!("{}", "Recent history:".cyan());
        for entry in &report.recent_history {
            let at = entry
                .at
                .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            let phase = entry.phase.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
            let mut line = format!("   {}  {}", at.bright_black(), phase);
            if let Some(feature) = &entry.feature {
                line.push_str(&format!(" [{}]", feature));
            }
            if let Some(implemented) = &entry.implemented {
                line.push_str(&format!(" {}", format!("implemented {}", implemented).green()));
            }
            println!("{}", line);
        }
    }

    Ok(())
}

fn list(ids: &[String]) -> String {
    if ids.is_empty() {
        String::new()
    } else {
        format!("({})", ids.join(", "))
    }
}
