mod auth;
mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::commands::{cmd_admin_create, cmd_calc};
use crate::config::{Config, CorsOrigins};
use dietlog_core::db::Database;
use dietlog_core::metabolic::{ActivityLevel, BodyMetrics, Goal, Sex};

#[derive(Parser)]
#[command(
    name = "dietlog",
    version,
    about = "Diet tracking backend with metabolic targets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value = "5000")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, env = "HOST", default_value = "127.0.0.1")]
        bind: String,
    },
    /// Create or upgrade the database schema
    Migrate,
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
    /// Compute BMR, TDEE and daily macro targets
    Calc {
        /// Body weight in kg
        #[arg(long)]
        weight: f64,
        /// Height in cm
        #[arg(long)]
        height: f64,
        /// Age in years
        #[arg(long)]
        age: u32,
        /// male or female
        #[arg(long)]
        gender: String,
        /// sedentary, light, moderate, active, very_active
        #[arg(long, default_value = "sedentary")]
        activity: String,
        /// Goal, e.g. "weight loss", "weight gain" or "maintain"
        #[arg(long, default_value = "maintain")]
        goal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create an admin account, or promote an existing user
    Create {
        /// Account email
        email: String,
        /// Account password
        password: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dietlog=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Calc {
            weight,
            height,
            age,
            gender,
            activity,
            goal,
            json,
        } => cmd_calc(
            &BodyMetrics {
                weight_kg: weight,
                height_cm: height,
                age_years: f64::from(age),
                sex: Sex::from_input(&gender),
                activity: ActivityLevel::from_input(&activity),
                goal: Goal::from_input(&goal),
            },
            json,
        ),
        Commands::Migrate => {
            let config = Config::load()?;
            let db = Database::open_and_migrate(&config.db_path)?;
            info!(
                path = %config.db_path.display(),
                version = db.schema_version()?,
                "database schema is current"
            );
            Ok(())
        }
        Commands::Admin { command } => match command {
            AdminCommands::Create {
                email,
                password,
                name,
            } => {
                let config = Config::load()?;
                let db = Database::open(&config.db_path)?;
                cmd_admin_create(&db, &email, &password, name.as_deref(), bcrypt::DEFAULT_COST)?;
                Ok(())
            }
        },
        Commands::Serve { port, bind } => {
            let config = Config::load()?;
            let db = Database::open(&config.db_path)?;
            let secret = config.jwt_secret()?;
            info!(path = %config.db_path.display(), "opened database");
            server::start_server(db, port, &bind, &secret, &CorsOrigins::from_env()).await
        }
    }
}
