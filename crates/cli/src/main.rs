//! Emporium CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (including the session table)
//! emporium migrate
//!
//! # Create an admin user (password from --password or ADMIN_PASSWORD)
//! emporium admin create -e admin@example.com -n "Admin Name"
//!
//! # Promote an existing account instead
//! emporium admin create -e owner@example.com -n "Owner" --promote
//!
//! # One-shot maintenance
//! emporium maintenance activate-products
//! emporium maintenance uppercase-coupons
//! emporium maintenance seed-categories --file categories.yaml
//! emporium maintenance purge-reset-tokens
//! ```
//!
//! All commands read `DATABASE_URL` (a `.env` file is honored).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "emporium")]
#[command(author, version, about = "Emporium CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// One-shot data maintenance
    Maintenance {
        #[command(subcommand)]
        task: MaintenanceTask,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Password (falls back to the `ADMIN_PASSWORD` environment variable)
        #[arg(long)]
        password: Option<String>,

        /// Promote the user if the email is already registered
        #[arg(long)]
        promote: bool,
    },
}

#[derive(Subcommand)]
enum MaintenanceTask {
    /// Activate every inactive product
    ActivateProducts,
    /// Rewrite all coupon codes in uppercase
    UppercaseCoupons,
    /// Insert the starter categories, skipping existing slugs
    SeedCategories {
        /// YAML list of `{name, description}` entries
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Delete expired password reset tokens
    PurgeResetTokens,
}

#[tokio::main]
async fn main() {
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
                email,
                name,
                password,
                promote,
            } => {
                commands::admin::create_user(&email, &name, password, promote).await?;
            }
        },
        Commands::Maintenance { task } => match task {
            MaintenanceTask::ActivateProducts => {
                commands::maintenance::activate_products().await?;
            }
            MaintenanceTask::UppercaseCoupons => {
                commands::maintenance::uppercase_coupons().await?;
            }
            MaintenanceTask::SeedCategories { file } => {
                commands::maintenance::seed_categories(file.as_deref()).await?;
            }
            MaintenanceTask::PurgeResetTokens => {
                commands::maintenance::purge_reset_tokens().await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_seed_categories_file() {
        let cli = Cli::try_parse_from([
            "emporium",
            "maintenance",
            "seed-categories",
            "--file",
            "categories.yaml",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Maintenance {
                task: MaintenanceTask::SeedCategories { file: Some(_) }
            })
        ));
    }
}
