//! Support Console - terminal admin console for a customer-support chat platform
//!
//! Conversations grouped by customer with live presence, tickets, and a
//! one-time-code admin login.

mod api;
mod auth;
mod commands;
mod config;
mod models;
mod presence;
mod tui;
mod views;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::conversations::ListArgs;
use models::{StatusFilter, TicketStatus};

#[derive(Parser)]
#[command(name = "support-console")]
#[command(about = "Admin console for customer-support chat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// API origin, overriding config and environment
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with a one-time code sent by email
    Login {
        /// Admin email (prompted if omitted)
        #[arg(short, long)]
        email: Option<String>,

        /// Sign in again even if a token is stored
        #[arg(short, long)]
        force: bool,
    },

    /// Forget the stored token
    Logout,

    /// Show configuration and whether the stored token works
    Status,

    /// Show dashboard counters
    Stats,

    /// List conversations grouped by customer
    Conversations {
        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Free-text search
        #[arg(short, long, default_value = "")]
        query: String,

        /// Only conversations of this customer email
        #[arg(long, default_value = "")]
        email: String,

        /// Created on or after this day (YYYY-MM-DD)
        #[arg(long, default_value = "")]
        from: String,

        /// Created on or before this day (YYYY-MM-DD)
        #[arg(long, default_value = "")]
        to: String,

        /// Merge live presence before printing
        #[arg(long)]
        live: bool,
    },

    /// Read a conversation
    Thread {
        /// Session key (from `conversations` output)
        session: String,

        /// Resolve the customer's status from live presence
        #[arg(long)]
        live: bool,
    },

    /// Reply to a conversation as the assistant
    Reply {
        session: String,
        message: String,
    },

    /// Replace the content of a message
    Edit {
        session: String,
        message_id: i64,
        content: String,
    },

    /// Delete one message
    DeleteMessage { session: String, message_id: i64 },

    /// Delete a conversation and its messages
    DeleteConversation {
        session: String,

        /// Required; deletion cannot be undone
        #[arg(long)]
        yes: bool,
    },

    /// Set a conversation's title
    Rename { session: String, title: String },

    /// List tickets
    Tickets {
        /// all, open, in_progress, resolved, closed
        #[arg(short, long, default_value = "all")]
        status: StatusFilter,

        /// Free-text search
        #[arg(short, long, default_value = "")]
        query: String,

        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Show one ticket
    Ticket { id: i64 },

    /// Change a ticket's status and/or admin note
    TicketUpdate {
        id: i64,

        /// open, in_progress, resolved, closed
        #[arg(short, long)]
        status: Option<TicketStatus>,

        /// New admin note (empty string clears it)
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Watch live presence until Ctrl-C
    Presence,

    /// Launch the inbox terminal user interface
    Inbox,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; the inbox owns the terminal, so it gets a capture buffer
    let filter = if cli.verbose { "debug" } else { "info" };
    let log_buffer = matches!(cli.command, Commands::Inbox).then(tui::LogBuffer::new);
    let captured = log_buffer.clone().map(|buffer| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(buffer)
    });
    let stdout = log_buffer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_target(false));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(captured)
        .with(stdout)
        .init();

    let mut config = config::Config::load()?;
    if let Some(base) = cli.base_url.as_deref() {
        config = config.with_base_url(base);
    }

    match cli.command {
        Commands::Login { email, force } => {
            tracing::info!("Starting login flow...");
            auth::login(&config, email, force).await?;
        }
        Commands::Logout => {
            auth::logout().await?;
        }
        Commands::Status => {
            auth::status(&config).await?;
        }
        Commands::Stats => {
            commands::conversations::stats(&config).await?;
        }
        Commands::Conversations {
            page,
            query,
            email,
            from,
            to,
            live,
        } => {
            let args = ListArgs {
                page,
                q: query,
                user_email: email,
                from_date: from,
                to_date: to,
                live,
            };
            commands::conversations::list(&config, args).await?;
        }
        Commands::Thread { session, live } => {
            commands::conversations::thread(&config, &session, live).await?;
        }
        Commands::Reply { session, message } => {
            tracing::info!("Sending reply...");
            commands::conversations::send_reply(&config, &session, &message).await?;
        }
        Commands::Edit {
            session,
            message_id,
            content,
        } => {
            commands::conversations::edit(&config, &session, message_id, &content).await?;
        }
        Commands::DeleteMessage {
            session,
            message_id,
        } => {
            commands::conversations::remove_message(&config, &session, message_id).await?;
        }
        Commands::DeleteConversation { session, yes } => {
            if !yes {
                anyhow::bail!("Refusing to delete {} without --yes.", session);
            }
            commands::conversations::remove_conversation(&config, &session).await?;
        }
        Commands::Rename { session, title } => {
            commands::conversations::rename(&config, &session, &title).await?;
        }
        Commands::Tickets {
            status,
            query,
            page,
        } => {
            commands::tickets::list(&config, query, status, page).await?;
        }
        Commands::Ticket { id } => {
            commands::tickets::show(&config, id).await?;
        }
        Commands::TicketUpdate { id, status, note } => {
            commands::tickets::update(&config, id, status, note).await?;
        }
        Commands::Presence => {
            commands::presence::watch(&config).await?;
        }
        Commands::Inbox => {
            tui::run(&config, log_buffer.unwrap_or_default()).await?;
        }
    }

    Ok(())
}
