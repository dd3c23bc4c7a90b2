mod allergens;
mod analysis;
mod app;
mod auth;
mod config;
mod error;
mod products;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "nutriscan=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;
    tracing::info!(
        food_api = %app_state.config.food_api.base_url,
        vision = %app_state.config.vision.url,
        vision_timeout_secs = app_state.config.vision.timeout.as_secs(),
        "upstream services configured"
    );

    app::serve(app::build_app(app_state)).await
}
