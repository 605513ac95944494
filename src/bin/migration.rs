use clap::{Parser, Subcommand};
use market_prices_api::{config, db};
use migrations::Migrator;
use sea_orm_migration::MigratorTrait;
use tracing::info;

#[derive(Parser)]
#[command(name = "migration", about = "Manage the market prices database schema", version)]
struct Cli {
    /// Database URL; falls back to DATABASE_URL, then the application config
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up {
        #[arg(long, help = "Number of migrations to apply")]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        #[arg(long, default_value_t = 1, help = "Number of migrations to roll back")]
        steps: u32,
    },
    /// Show which migrations have been applied
    Status,
    /// Drop every table and re-apply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let database_url = match cli.database_url {
        Some(url) => url,
        None => config::load_config()?.database_url,
    };

    let pool = db::establish_connection(&database_url).await?;

    match cli.command.unwrap_or(Command::Up { steps: None }) {
        Command::Up { steps } => {
            info!("Applying migrations");
            Migrator::up(&pool, steps).await?;
        }
        Command::Down { steps } => {
            info!(steps, "Rolling back migrations");
            Migrator::down(&pool, Some(steps)).await?;
        }
        Command::Status => Migrator::status(&pool).await?,
        Command::Fresh => {
            info!("Recreating schema from scratch");
            Migrator::fresh(&pool).await?;
        }
    }

    db::close_pool(pool).await?;
    info!("Migration command completed");
    Ok(())
}
