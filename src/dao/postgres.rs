use anyhow::Result;
use deadpool::managed::Object;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use futures::StreamExt;
use std::str::FromStr;

use crate::config::env;
use crate::constants;
use lazy_static::lazy_static;
lazy_static! {
    static ref POOL: Pool = config_pg_pool();
}

fn config_pg_pool() -> Pool {
    let cfg = tokio_postgres::Config::from_str(env::database_url().as_str())
        .unwrap_or_else(|e| panic!("DATABASE_URL 格式错误: {}", e));
    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(cfg, tokio_postgres::NoTls, mgr_config);
    Pool::new(mgr, constants::POSTGRES_POOL_SIZE)
}

pub async fn get_pg_connect() -> Result<Object<Manager>> {
    Ok(POOL.get().await?)
}

/// Starts a transaction on a pooled connection. Dropping it without
/// `commit` rolls back.
pub async fn begin(conn: &mut Object<Manager>) -> Result<tokio_postgres::Transaction<'_>> {
    let client: &mut tokio_postgres::Client = &mut **conn;
    Ok(client.transaction().await?)
}

/// Runs every `*.sql` file under `SQL_DIR`. The statements are written to be
/// idempotent, so this runs on every start.
pub async fn init_tables() -> Result<()> {
    let sql_dir = env::sql_dir();
    let conn = get_pg_connect().await?;
    let mut entries = async_walkdir::WalkDir::new(std::path::Path::new(sql_dir.as_str()));
    while let Some(entry) = entries.next().await {
        let entry = entry?;
        let path = entry.path();
        if entry.metadata().await?.is_dir()
            || path.extension().and_then(|e| e.to_str()) != Some("sql")
        {
            continue;
        }
        let sql = async_fs::read_to_string(&path).await?;
        match conn.batch_execute(sql.as_str()).await {
            Ok(_) => tracing::info!(file = ?path.file_name(), "sql executed"),
            Err(e) => tracing::error!(file = ?path.file_name(), error = %e, "sql failed"),
        }
    }
    Ok(())
}
