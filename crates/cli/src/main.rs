//! Nova CLI: the main entry point.
//!
//! Commands:
//! - `onboard` : Write the default config
//! - `chat`    : Interactive chat or single-message mode
//! - `docs`    : Add, list, count and clear indexed documents
//! - `memory`  : Inspect and edit the stored profile and facts
//! - `history` : List threads, or show or clear a thread's saved turns
//! - `status`  : Show configuration and store status

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "nova",
    about = "Nova — a helpful and factual AI assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Onboard,

    /// Chat with Nova
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation thread to continue (a new one is started otherwise)
        #[arg(long)]
        thread: Option<String>,
    },

    /// Manage indexed documents
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Manage the stored profile and facts
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// List, show or clear saved conversation turns
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Show configuration and store status
    Status,
}

#[derive(Subcommand)]
enum DocsAction {
    /// Index plain-text files
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List indexed sources
    List,
    /// Print the number of indexed chunks
    Count,
    /// Remove every indexed document
    Clear,
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Show the stored name and facts
    Show,
    /// Set the user's name
    SetName { name: String },
    /// Append a fact
    AddFact {
        category: String,
        label: String,
        value: String,
    },
    /// Remove every fact
    ClearFacts,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List the most recently written threads
    List {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print a thread's messages in order
    Show {
        /// Thread ID, as printed when the chat started
        #[arg(long)]
        thread: String,
    },
    /// Delete a thread's messages
    Clear {
        #[arg(long)]
        thread: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logs go to stderr so streamed answers on stdout stay clean.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { message, thread } => commands::chat::run(message, thread).await?,
        Commands::Docs { action } => match action {
            DocsAction::Add { files } => commands::docs::add(&files).await?,
            DocsAction::List => commands::docs::list().await?,
            DocsAction::Count => commands::docs::count().await?,
            DocsAction::Clear => commands::docs::clear().await?,
        },
        Commands::Memory { action } => match action {
            MemoryAction::Show => commands::memory::show().await?,
            MemoryAction::SetName { name } => commands::memory::set_name(&name).await?,
            MemoryAction::AddFact {
                category,
                label,
                value,
            } => commands::memory::add_fact(&category, &label, &value).await?,
            MemoryAction::ClearFacts => commands::memory::clear_facts().await?,
        },
        Commands::History { action } => match action {
            HistoryAction::List { limit } => commands::history::list(limit).await?,
            HistoryAction::Show { thread } => commands::history::show(&thread).await?,
            HistoryAction::Clear { thread } => commands::history::clear(&thread).await?,
        },
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
