//! BrokeShop CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (shop schema and session table)
//! bs-cli migrate
//!
//! # Insert the demo catalog; create demo accounts for supplied passwords
//! bs-cli seed demo --root-password '...' --user-password '...'
//!
//! # Create an account
//! bs-cli user create -u carol -e carol@example.com -r admin
//!
//! # Snapshot products and users
//! bs-cli snapshot export -o snapshot.json
//! bs-cli snapshot import snapshot.json --yes
//! ```
//!
//! The database URL comes from `STOREFRONT_DATABASE_URL` or `DATABASE_URL`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bs-cli")]
#[command(author, version, about = "BrokeShop CLI tools")]
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
    /// Manage accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Export or import products and users
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Demo catalog, plus demo accounts for each password given
    Demo {
        /// Password for the `root` account
        #[arg(long, env = "BS_DEMO_ROOT_PASSWORD", hide_env_values = true)]
        root_password: Option<String>,

        /// Password for the `admin` account
        #[arg(long, env = "BS_DEMO_ADMIN_PASSWORD", hide_env_values = true)]
        admin_password: Option<String>,

        /// Password for the `user` account
        #[arg(long, env = "BS_DEMO_USER_PASSWORD", hide_env_values = true)]
        user_password: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new account
    Create {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Role (`user`, `admin`, `root`)
        #[arg(short, long, default_value = "user")]
        role: String,

        /// Password
        #[arg(short, long, env = "BS_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Write products and users as JSON
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace all products and users with a snapshot
    Import {
        /// Snapshot file
        file: PathBuf,

        /// Confirm the destructive replace
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Demo {
                root_password,
                admin_password,
                user_password,
            } => {
                let passwords = commands::seed::DemoPasswords {
                    root: root_password,
                    admin: admin_password,
                    user: user_password,
                };
                commands::seed::demo(&passwords).await?;
            }
        },
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                email,
                role,
                password,
            } => {
                commands::user::create(&username, &email, &role, &password).await?;
            }
        },
        Commands::Snapshot { action } => match action {
            SnapshotAction::Export { output } => {
                commands::snapshot::export(output.as_deref()).await?;
            }
            SnapshotAction::Import { file, yes } => {
                commands::snapshot::import(&file, yes).await?;
            }
        },
    }
    Ok(())
}
