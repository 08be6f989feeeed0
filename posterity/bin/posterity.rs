//! Letters to your future self
//!
//! `posterity serve` runs the daily delivery trigger. The other subcommands
//! are operational tools that share the same configuration file.

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use posterity::Posterity;
use posterity_store::LetterId;

#[derive(Parser, Debug)]
#[command(name = "posterity")]
#[command(about = "Deliver letters to their future readers", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (overrides `POSTERITY_CONFIG` and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daily delivery trigger until interrupted
    Serve,
    /// Deliver everything that is due right now, then exit
    RunNow,
    /// Show whether email delivery is fully configured
    EmailConfig,
    /// Send a test letter to an address
    TestEmail {
        /// Address to send the test letter to
        address: String,
    },
    /// Show the delivery status of a letter
    Status {
        /// Letter ID
        letter_id: LetterId,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => find_config_file()?,
    };
    let config_content = std::fs::read_to_string(&config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config from {}: {}",
            config_path.display(),
            e
        )
    })?;
    let posterity: Posterity = ron::from_str(&config_content)?;

    if !matches!(cli.command, Commands::Serve) {
        posterity_common::logging::init();
    }

    match cli.command {
        Commands::Serve => posterity.run().await?,
        Commands::RunNow => {
            let summary = posterity.run_now().await?;
            println!("{summary}");
            for outcome in summary.outcomes.iter().filter(|o| !o.is_sent()) {
                if let posterity_delivery::AttemptResult::Failed(failure) = &outcome.result {
                    println!("  {}: {failure}", outcome.letter_id);
                }
            }
        }
        Commands::EmailConfig => match posterity.email_config() {
            Some(status) if status.is_configured() => println!("Email delivery is configured"),
            Some(status) => {
                println!(
                    "Email delivery is not configured. Missing: {}",
                    status.missing().join(", ")
                );
                std::process::exit(1);
            }
            None => println!("Email delivery is disabled; letters are written to the log"),
        },
        Commands::TestEmail { address } => {
            let receipt = posterity.send_test_email(&address).await?;
            println!(
                "Test letter sent to {address} (message id: {})",
                receipt.message_id.as_deref().unwrap_or("none")
            );
        }
        Commands::Status { letter_id } => {
            print!("{}", posterity.letter_status(letter_id).await?);
        }
    }

    Ok(())
}

/// Find the configuration file using the following precedence:
/// 1. `POSTERITY_CONFIG` environment variable
/// 2. ./posterity.config.ron (current working directory)
/// 3. /etc/posterity/posterity.config.ron (system-wide config)
fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("POSTERITY_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "POSTERITY_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = [
        PathBuf::from("./posterity.config.ron"),
        PathBuf::from("/etc/posterity/posterity.config.ron"),
    ];

    if let Some(path) = default_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - POSTERITY_CONFIG environment variable\n{paths_tried}"
    )
}
