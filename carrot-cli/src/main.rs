//! Main entry point for the Carrot command-line client.

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use client::ClientError;
use dotenv::dotenv;

mod commands;

use commands::{
    chat::{ChatArgs, SendArgs},
    comments::{CommentAction, CommentsArgs},
    notifications::NotificationsArgs,
    rooms::RoomsArgs,
};

/// Carrot CLI
#[derive(Parser)]
#[command(name = "carrot")]
#[command(about = "Chat and comment on Carrot marketplace listings from the terminal", long_about = None)]
struct Cli {
    /// Path to a configuration file (toml, yaml, or json)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List your chat rooms, newest first
    Rooms(RoomsArgs),

    /// Show a conversation about a listing, optionally following it live
    Chat(ChatArgs),

    /// Send a message about a listing
    Send(SendArgs),

    /// Show the comments under a listing, optionally following them live
    Comments(CommentsArgs),

    /// Post, edit, or delete one of your comments
    Comment {
        #[command(subcommand)]
        action: CommentAction,
    },

    /// Show or acknowledge locally stored notifications
    Notifications(NotificationsArgs),

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)
        #[arg(long, short)]
        shell: clap_complete::Shell,
    },
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config;
    match cli.command {
        Commands::Rooms(args) => commands::rooms::handle_rooms(config, args).await,
        Commands::Chat(args) => commands::chat::handle_chat(config, args).await,
        Commands::Send(args) => commands::chat::handle_send(config, args).await,
        Commands::Comments(args) => commands::comments::handle_comments(config, args).await,
        Commands::Comment { action } => commands::comments::handle_action(config, action).await,
        Commands::Notifications(args) => commands::notifications::handle_notifications(&args),
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let retryable = err
                .chain()
                .find_map(|cause| cause.downcast_ref::<ClientError>())
                .is_some_and(ClientError::is_retryable);
            if retryable {
                eprintln!("hint: this looks like a temporary network problem; try again");
            }
            ExitCode::FAILURE
        }
    }
}
