use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use btech_buddy::models::TaskFilter;
use btech_buddy::web::{self, AppState};
use btech_buddy::{auth, db, report};

#[derive(Parser)]
#[command(name = "btech-buddy")]
#[command(about = "Personal tracker for subjects, attendance, tasks and coding practice", long_about = None)]
struct Cli {
    /// SQLite connection string
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "sqlite://btech_buddy.sqlite3"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo account with a populated semester
    Seed,
    /// Import attendance records for a user from a CSV file
    Import {
        #[arg(long)]
        email: String,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Write a markdown study report for a user
    Report {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Run the web application
    Serve {
        #[arg(long, env = "BTB_BIND", default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
        #[arg(long, env = "BTB_SESSION_TTL_HOURS", default_value_t = 24)]
        session_ttl_hours: i64,
        #[arg(long, env = "BTB_MAX_CONNECTIONS", default_value_t = 5)]
        max_connections: u32,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("btech_buddy=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = db::connect(&cli.database_url, 1).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = db::connect(&cli.database_url, 1).await?;
            db::init_db(&pool).await?;
            if db::seed(&pool).await? {
                println!("Seed data inserted. Log in as {} / {}.", db::DEMO_EMAIL, db::DEMO_PASSWORD);
            } else {
                println!("Demo account already present.");
            }
        }
        Commands::Import { email, csv } => {
            let pool = db::connect(&cli.database_url, 1).await?;
            let email = auth::normalize_email(&email);
            let user = db::find_user_by_email(&pool, &email)
                .await?
                .with_context(|| format!("no user registered as {email}"))?;
            let written = db::import_attendance_csv(&pool, user.id, &csv).await?;
            println!("Imported {written} attendance records from {}.", csv.display());
        }
        Commands::Report { email, out } => {
            let pool = db::connect(&cli.database_url, 1).await?;
            let email = auth::normalize_email(&email);
            let user = db::find_user_by_email(&pool, &email)
                .await?
                .with_context(|| format!("no user registered as {email}"))?;

            let attendance = db::attendance_summary(&pool, user.id).await?;
            let tasks = db::list_tasks(&pool, user.id, TaskFilter::Todo).await?;
            let logs = db::list_coding_logs(&pool, user.id, 200).await?;
            let report = report::build_report(
                &user.name,
                &user.email,
                chrono::Local::now().date_naive(),
                &attendance,
                &tasks,
                &logs,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve {
            bind,
            session_ttl_hours,
            max_connections,
        } => {
            let pool = db::connect(&cli.database_url, max_connections).await?;
            db::init_db(&pool).await?;
            let state = AppState::new(pool, chrono::Duration::hours(session_ttl_hours.max(1)))?;
            web::serve(state, bind).await?;
        }
    }

    Ok(())
}
