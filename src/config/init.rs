use crate::dao::{postgres, redis_db};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Loads `.env`, sets up logging, then checks both stores and runs the
/// bootstrap SQL. Any failure aborts startup.
pub async fn init() -> anyhow::Result<()> {
    if let Err(e) = dotenv::dotenv() {
        eprintln!("no .env file loaded: {}", e);
    }
    init_logging();
    lazy_static::initialize(&crate::utils::jwt::SECRET);

    let pong = redis_db::ping().await?;
    tracing::info!(reply = %pong, "redis connected");
    postgres::get_pg_connect().await?;
    tracing::info!("postgres connected");

    postgres::init_tables().await?;
    Ok(())
}
