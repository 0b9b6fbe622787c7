use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use insight_core::middleware::tracing::request_id_middleware;
use time::Duration;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::handlers::{
    app::{health_check, index},
    auth::{
        google_login_callback, google_login_redirect, login_handler, login_page, logout_handler,
        register_handler, register_page,
    },
    report::{
        dashboard_handler, download_report_handler, generate_report_handler,
        summarize_report_handler,
    },
};
use crate::middleware::auth::auth_middleware;
use crate::services::metrics::metrics_middleware;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    // Session setup
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false) // Set to true in production with HTTPS
        .with_expiry(Expiry::OnInactivity(Duration::hours(24)));

    // Multipart bodies carry the upload; leave headroom over the image limit
    // for the other form fields.
    let body_limit = DefaultBodyLimit::max(state.settings.limits.max_upload_bytes + 64 * 1024);

    let protected = Router::new()
        .route("/dashboard", get(dashboard_handler))
        .route("/report", post(generate_report_handler))
        .route("/report/summarize", post(summarize_report_handler))
        .route("/report/download", post(download_report_handler))
        .layer(from_fn(auth_middleware));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(crate::handlers::metrics::metrics))
        .route("/login", get(login_page).post(login_handler))
        .route("/login/google", get(google_login_redirect))
        .route("/login/google/callback", get(google_login_callback))
        .route("/register", get(register_page).post(register_handler))
        .route("/logout", get(logout_handler))
        .merge(protected)
        .nest_service("/static", ServeDir::new("insights-frontend/static"))
        .layer(body_limit)
        .layer(session_layer)
        .layer(from_fn(metrics_middleware))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
