pub mod config;
pub mod constants;
pub mod dao;
pub mod macros;
pub mod middleware;
pub mod model;
pub mod service;
pub mod types;
pub mod utils;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init::init().await?;

    let addr: std::net::SocketAddr = config::env::addr().parse()?;
    let app = config::routes::config_routes();
    tracing::info!(%addr, "course forum listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
