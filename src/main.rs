//! Database Backup Runner
//!
//! Produces one timestamped, compressed snapshot of a PostgreSQL database per
//! cycle and prunes snapshots older than the configured retention window.

// backuprunner/src/main.rs
mod backup;
mod config;
mod credentials;
mod errors;
mod probe;

use anyhow::{Context, Result};
use config::{AppConfig, OperationConfig, load_backup_config_from_json};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

/// Main entry point for the backup runner
#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    dotenv::dotenv().ok();

    // Define the path to config.json. Expects it in the working directory,
    // the same place a scheduled invocation mounts it.
    let config_path = PathBuf::from("config.json");
    let mut app_config = AppConfig::load_from_json(&config_path).context(format!(
        "Failed to load application configuration from {}",
        config_path.display()
    ))?;

    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else {
        prompt_choice()?
    };

    match choice.as_str() {
        "1" | "backup" => {
            println!("🚀 Starting Backup Cycle...");
            let backup_config = load_backup_config_from_json(&app_config.raw_json_config)
                .context("Failed to load backup configuration from JSON")?;
            app_config.operation = Some(OperationConfig::Backup(backup_config));
            backup::run_backup_flow(&app_config)
                .await
                .context("Backup process failed")?;
        }
        "2" | "prune" => {
            println!("🗑 Starting Retention Pruning...");
            let backup_config = load_backup_config_from_json(&app_config.raw_json_config)
                .context("Failed to load backup configuration from JSON")?;
            app_config.operation = Some(OperationConfig::Prune(backup_config));
            backup::run_prune_flow(&app_config)
                .await
                .context("Prune process failed")?;
        }
        _ => {
            println!("❌ Invalid choice. Please enter '1' (backup) or '2' (prune).");
            anyhow::bail!("Invalid operation choice");
        }
    }
    Ok(())
}

/// Prompts user to select an operation
///
/// Returns the user's choice as String
fn prompt_choice() -> Result<String> {
    use std::io::{Write, stdin, stdout};

    println!("Select an operation:");
    println!("1. Run Backup Cycle (or type 'backup')");
    println!("2. Prune Expired Artifacts (or type 'prune')");
    print!("Enter your choice: ");
    let _ = stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
