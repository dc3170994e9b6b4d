//! Second Chance CLI - migrations, seeding and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply storefront migrations (and the session table)
//! sc-cli migrate
//!
//! # Seed the product catalog
//! sc-cli seed products -f crates/cli/seeds/products.yaml
//!
//! # Produce ADMIN_PASSWORD_HASH
//! sc-cli admin hash-password
//!
//! # Site settings
//! sc-cli settings set tiktok_pixel_id C4ABC123XYZ
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sc-cli")]
#[command(author, version, about = "Second Chance Checkout CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Admin panel credentials
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Read or write site settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert products from a YAML file, skipping existing slugs
    Products {
        /// Path to the YAML file
        #[arg(short, long)]
        file: String,

        /// Validate the file without touching the database
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Hash a password read from stdin for ADMIN_PASSWORD_HASH
    HashPassword,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print a setting
    Get { key: String },
    /// Store a setting (empty value clears it)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file, dry_run } => {
                commands::seed::products(&file, dry_run).await?;
            }
        },
        Commands::Admin { action } => match action {
            AdminAction::HashPassword => commands::admin::hash_password_from_stdin()?,
        },
        Commands::Settings { action } => match action {
            SettingsAction::Get { key } => commands::settings::get(&key).await?,
            SettingsAction::Set { key, value } => commands::settings::set(&key, &value).await?,
        },
    }
    Ok(())
}
