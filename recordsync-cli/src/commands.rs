//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use recordsync_core::config::{SyncConfig, load_config, workspace_config_path};
use recordsync_core::{
    CsvExtractor, DataExtractor, ReportDefinition, SalesforceSession, get_report,
    list_report_names, run_with_session,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            report,
            json,
            source_dir,
        } => handle_run(&report, json, source_dir, workspace).await,
        Commands::Reports => {
            println!("Available reports:");
            for name in list_report_names() {
                println!("  {name}");
            }
            Ok(())
        }
        Commands::Show { report } => handle_show(&report, workspace),
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn load(workspace: &Path) -> anyhow::Result<SyncConfig> {
    load_config(Some(workspace), None).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

fn resolve_report(
    name: &str,
    config: &SyncConfig,
    workspace: &Path,
) -> anyhow::Result<ReportDefinition> {
    let data_dir = config.data.resolve(workspace);
    Ok(get_report(name, &data_dir)?)
}

async fn handle_run(
    name: &str,
    json: bool,
    source_dir: Option<PathBuf>,
    workspace: &Path,
) -> anyhow::Result<()> {
    let config = load(workspace)?;
    let mut report = resolve_report(name, &config, workspace)?;
    if let Some(dir) = source_dir {
        report.source_dir = dir;
    }

    // Extraction happens before login so a bad export never opens a session.
    let dataset = CsvExtractor::default().extract(&report.source_dir, report.rows_to_skip)?;
    info!(
        report = %report.report_id,
        rows = dataset.len(),
        "Extracted report data"
    );

    let credentials = config.salesforce.credentials()?;
    let session = SalesforceSession::login(&config.salesforce, &credentials).await?;
    let run = run_with_session(Arc::new(session), &report.pipeline, dataset, &config.write).await?;
    run.log();

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print!("{}", run.render());
    }

    if !run.is_success() {
        anyhow::bail!(
            "Report '{}' failed at step '{}'",
            report.report_id,
            run.failed_step.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}

fn handle_show(name: &str, workspace: &Path) -> anyhow::Result<()> {
    let config = load(workspace)?;
    let report = resolve_report(name, &config, workspace)?;

    println!("Report: {} ({})", report.report_id, report.name);
    println!("Source folder: {}", report.source_dir.display());
    println!("Preamble rows skipped per file: {}", report.rows_to_skip);
    println!("Steps:");
    for (i, step) in report.pipeline.steps().iter().enumerate() {
        println!("  {}. {} [{}] -> {}", i + 1, step.name, step.kind, step.target);
    }
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }

            let toml_str = toml::to_string_pretty(&SyncConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace).await.unwrap();

        let config_path = workspace.join(".recordsync").join("config.toml");
        assert!(config_path.exists());

        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: SyncConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.write.batch_size, 200);
        assert_eq!(parsed.salesforce.api_version, "61.0");
    }

    #[tokio::test]
    async fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace).await.unwrap();
        let config_path = workspace.join(".recordsync").join("config.toml");
        let first = std::fs::read_to_string(&config_path).unwrap();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace).await.unwrap();
        let second = std::fs::read_to_string(&config_path).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Show,
        };
        assert!(handle_command(command, dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_reports_and_show() {
        let dir = TempDir::new().unwrap();
        assert!(handle_command(Commands::Reports, dir.path()).await.is_ok());

        let command = Commands::Show {
            report: "gnrl106".into(),
        };
        assert!(handle_command(command, dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_show_unknown_report_fails() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Show {
            report: "gnrl999".into(),
        };
        let err = handle_command(command, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("gnrl999"));
    }

    #[tokio::test]
    async fn test_run_without_exports_fails_before_login() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Run {
            report: "gnrl220".into(),
            json: false,
            source_dir: Some(dir.path().join("missing")),
        };
        let err = handle_command(command, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
