//! Cartwheel CLI - database migrations, user management and catalog seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! cartwheel migrate
//!
//! # Create an admin user
//! cartwheel admin create -u alice -p 'correct horse' -r admin
//!
//! # Seed catalog items from YAML
//! cartwheel seed items catalog.yaml --owner alice
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `admin create` - Create users (the only way to obtain an admin)
//! - `seed items` - Insert catalog items from a YAML file
//!
//! All commands read `CARTWHEEL_DATABASE_URL` (or `DATABASE_URL`), loading
//! `.env` if present.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cartwheel")]
#[command(author, version, about = "Cartwheel CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new user
    Create {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Role (`admin`, `user`)
        #[arg(short, long, default_value = "admin")]
        role: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert catalog items from a YAML file
    Items {
        /// Path to the YAML file
        file: String,

        /// Username recorded as the items' creator
        #[arg(long, default_value = "admin")]
        owner: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                username,
                password,
                role,
            } => {
                commands::admin::create_user(&username, &password, &role).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Items { file, owner } => commands::seed::items(&file, &owner).await?,
        },
    }
    Ok(())
}
