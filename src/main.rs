use std::sync::Arc;

use campus_api::config::Config;
use campus_api::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::from_env()?;
    let pool = db::connect(&config).await?;
    log::info!("Connected to database {}", config.database_url);

    let addr = config.listen;
    let app = campus_api::app(pool, Arc::new(config));

    log::info!("Starting campus HTTP server on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
