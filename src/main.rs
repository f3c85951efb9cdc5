//! Boutique server: loads settings from the environment, prepares the database and serves the API.

use boutique::{build_router, ensure_database_exists, ensure_tables, AppState, Settings};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("boutique=info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let settings = Settings::from_env()?;
    ensure_database_exists(&settings.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    let state = AppState::new(pool, settings);
    ensure_tables(&state.pool, &state.tables).await?;

    let app = build_router(state.clone());
    let listener = TcpListener::bind(&state.settings.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, schema = %state.settings.schema, "boutique listening");
    axum::serve(listener, app).await?;
    Ok(())
}
