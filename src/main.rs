use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use schedule_dedup::config::Config;
use schedule_dedup::db;
use schedule_dedup::error::AppError;
use schedule_dedup::models::ScheduleKind;
use schedule_dedup::services::{ReconcileScope, ReconcileService, RunMode, report};

/// Merge duplicate schedule rows left behind by lecturer replacements.
#[derive(Parser, Debug)]
#[command(name = "schedule-dedup")]
#[command(version)]
struct Args {
    /// Report what would be merged without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// SQLite URL of the scheduling database
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Only touch rows of this semester
    #[arg(long)]
    semester: Option<String>,

    /// Restrict the run to one schedule type (repeatable)
    #[arg(long = "only", value_name = "TYPE")]
    only: Vec<ScheduleKind>,

    /// Print the structured summary as JSON after the report
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "schedule_dedup=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = Config::new_from_env()?.with_database_url(args.database_url.clone())?;

    let mode = if args.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Apply
    };

    if mode == RunMode::Apply
        && !args.yes
        && !confirm("This will merge and delete duplicate schedule rows. Proceed? [y/N] ").await?
    {
        println!("Aborted, nothing was changed.");
        return Ok(());
    }

    let pool = match db::connect(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to {}: {}", config.database_url, e);
            print!("{}", report::render_storage_unavailable(mode, &e.to_string()));
            return Err(e.into());
        }
    };
    info!("Connected to {}", config.database_url);

    // dry runs must not write, not even the migrations table
    if mode == RunMode::Apply {
        if let Err(e) = db::migrate(&pool).await {
            error!("Failed to run migrations: {}", e);
            print!("{}", report::render_storage_unavailable(mode, &e.to_string()));
            pool.close().await;
            return Err(e.into());
        }
    }

    let mut scope = ReconcileScope {
        semester_id: args.semester.clone(),
        ..ReconcileScope::default()
    };
    if !args.only.is_empty() {
        scope.kinds = args.only.clone();
    }

    let service = ReconcileService::new(pool.clone(), mode, scope);
    let summary = service.reconcile_all().await;

    print!("{}", report::render_text(&summary));
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    pool.close().await;

    if summary.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

async fn confirm(prompt: &str) -> Result<bool, AppError> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;

    let answer = line.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}
