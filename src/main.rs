use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use gazette::api::{self, AppState};
use gazette::config::Config;
use gazette::db::Database;
use gazette::generator::{self, GenerationRequest};
use gazette::logging;
use gazette::scheduler;

#[derive(Parser)]
#[command(name = "gazette", about = "Automated news generation for group feeds")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server exposing the trigger and scheduler endpoints
    Serve,
    /// Run one generation pass and print the report
    Run {
        /// Generate for this group only; omit for the legacy bulk mode
        #[arg(long)]
        group_id: Option<String>,
        /// Bypass the frequency gate, as the admin "Generate Now" action does
        #[arg(long)]
        manual: bool,
        /// Attribute the attempt to this user instead of the group creator
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Run one scheduled pass over all enabled groups and print the report
    Scheduled,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::configure_logging();

    // Missing content-search credential is fatal before any group is touched.
    let config = Config::from_env()?;
    let db = Database::new(&config.database_path).await?;
    let state = AppState::new(db, &config);

    match Cli::parse().command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting gazette v{}", env!("CARGO_PKG_VERSION"));
            api::serve(state, config.port).await?;
        }
        Command::Run {
            group_id,
            manual,
            user_id,
        } => {
            let request = GenerationRequest {
                group_id,
                is_manual: manual,
                user_id,
            };
            let report =
                generator::run(&state.db, state.llm.as_ref(), state.images.as_ref(), request)
                    .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Scheduled => {
            let report =
                scheduler::run_scheduled(&state.db, state.llm.as_ref(), state.images.as_ref())
                    .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
