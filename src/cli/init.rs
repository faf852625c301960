use super::Workspace;
use crate::models::EngineConfig;
use crate::Result;
use colored::Colorize;
use std::path::Path;

const CONVENTIONS_TEMPLATE: &str = include_str!("../../templates/conventions.md");
const FEATURE_TEMPLATE: &str = include_str!("../../templates/feature.md");

/// Name of the sample descriptor written into an empty backlog
const SAMPLE_FEATURE: &str = "001-example.md";

pub async fn run(workspace: &Workspace, force: bool) -> Result<()> {
    let root = workspace.root();

    if workspace.config_path.exists() && !force {
        println!("{}", "⚠️  deliverd is already initialized".yellow());
        println!("   Run with --force to rewrite the config");
        return Ok(());
    }

    let config = if workspace.config_path.exists() {
        // Keep user settings, fill in any keys added since
        workspace.load_config()?
    } else {
        EngineConfig::default()
    };

    println!("{}", "📁 Creating directory structure...".cyan());
    config.save_to(&workspace.config_path)?;
    println!("   ✓ {}", display(root, &workspace.config_path));

    let conventions = root.join(&config.conventions_path);
    if write_if_missing(&conventions, CONVENTIONS_TEMPLATE)? {
        println!("   ✓ {}", display(root, &conventions));
    }

    let backlog = root.join(&config.backlog_dir);
    std::fs::create_dir_all(&backlog)?;
    let has_features = std::fs::read_dir(&backlog)?.next().is_some();
    if !has_features {
        let sample = backlog.join(SAMPLE_FEATURE);
        std::fs::write(&sample, FEATURE_TEMPLATE)?;
        println!("   ✓ {}", display(root, &sample));
    }

    std::fs::create_dir_all(root.join(config.state_dir()))?;

    println!();
    println!("{}", "✅ deliverd initialized successfully!".green().bold());
    println!();
    println!("{}", "⏭️  Next Steps:".yellow().bold());
    println!("   1. Describe your conventions in {}", config.conventions_path.display());
    println!("   2. Add one file per feature to {}/", config.backlog_dir.display());
    println!("   3. Run {}", "deliverd run".green());

    Ok(())
}

/// Returns true if the file was written
fn write_if_missing(path: &Path, content: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(true)
}

fn display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CONFIG_PATH;
    use crate::services::FeatureCatalog;
    use tempfile::TempDir;

    fn workspace(temp: &TempDir) -> Workspace {
        Workspace::resolve(Some(temp.path().to_path_buf()), None).unwrap()
    }

    #[tokio::test]
    async fn test_init_creates_layout() {
        let temp = TempDir::new().unwrap();
        run(&workspace(&temp), false).await.unwrap();

        assert!(temp.path().join(CONFIG_PATH).exists());
        assert!(temp.path().join("deliverd/conventions.md").exists());
        assert!(temp.path().join("deliverd/state").is_dir());

        let backlog = FeatureCatalog::new(temp.path().join("features")).discover().unwrap();
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].id, "001");
        assert_eq!(backlog[0].verify_command.as_deref(), Some("true"));

        let config = EngineConfig::load(temp.path()).unwrap();
        assert_eq!(config.git.commit_prefix, "autonomous");
    }

    #[tokio::test]
    async fn test_init_without_force_keeps_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_PATH);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "auto_approve = false\n").unwrap();

        run(&workspace(&temp), false).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "auto_approve = false\n");

        run(&workspace(&temp), true).await.unwrap();
        let config = EngineConfig::load(temp.path()).unwrap();
        assert!(!config.auto_approve);
        assert!(std::fs::read_to_string(&path).unwrap().contains("[git]"));
    }
}
