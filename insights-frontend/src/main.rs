use dotenvy::dotenv;
use insight_core::observability::logging::init_tracing;
use insights_frontend::config::get_configuration;
use insights_frontend::services::auth_client::AuthClient;
use insights_frontend::services::genai::gemini::GeminiModel;
use insights_frontend::services::user_store::firestore::FirestoreUserStore;
use insights_frontend::startup::build_router;
use insights_frontend::AppState;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "insights-frontend",
        "info",
        configuration.server.otlp_endpoint.as_deref(),
    );

    insights_frontend::services::metrics::init_metrics();

    let settings = Arc::new(configuration);
    let auth_client = Arc::new(AuthClient::new(settings.identity.clone()));
    let user_store = Arc::new(FirestoreUserStore::new(settings.user_store.clone()));
    let text_model = Arc::new(GeminiModel::new(settings.genai.clone()));

    let address = format!("{}:{}", settings.server.host, settings.server.port);

    let state = AppState::new(settings, auth_client, user_store, text_model);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting insights-frontend on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
