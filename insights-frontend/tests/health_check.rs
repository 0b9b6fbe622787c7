use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use insights_frontend::config::{
    GenaiSettings, IdentitySettings, LimitSettings, ServerSettings, Settings, UserStoreSettings,
};
use insights_frontend::services::auth_client::AuthClient;
use insights_frontend::services::genai::mock::MockTextModel;
use insights_frontend::services::user_store::memory::InMemoryUserStore;
use insights_frontend::startup::build_router;
use insights_frontend::AppState;
use secrecy::Secret;
use std::sync::Arc;
use tower::util::ServiceExt;

fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            session_secret: Secret::new("test-secret".to_string()),
            public_url: "http://127.0.0.1:8080".to_string(),
            otlp_endpoint: None,
        },
        identity: IdentitySettings {
            url: "http://127.0.0.1:0".to_string(),
            api_key: Secret::new("test-key".to_string()),
            google_client_id: None,
            google_client_secret: None,
        },
        user_store: UserStoreSettings {
            url: "http://127.0.0.1:0".to_string(),
            project_id: "test-project".to_string(),
            api_key: Secret::new("test-key".to_string()),
        },
        genai: GenaiSettings {
            url: "http://127.0.0.1:0".to_string(),
            api_key: Secret::new("test-key".to_string()),
            model: "gemini-2.0-flash".to_string(),
        },
        limits: LimitSettings::default(),
    }
}

fn test_app_state() -> AppState {
    let settings = Arc::new(test_settings());
    let auth_client = Arc::new(AuthClient::new(settings.identity.clone()));
    let user_store = Arc::new(InMemoryUserStore::new());
    let text_model = Arc::new(MockTextModel::new(Vec::<String>::new()));

    AppState::new(settings, auth_client, user_store, text_model)
}

#[tokio::test]
async fn health_check_works() {
    let app = build_router(test_app_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn index_and_auth_pages_render() {
    let app = build_router(test_app_state());

    for uri in ["/", "/login", "/register"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "GET {} failed", uri);
    }
}

#[tokio::test]
async fn dashboard_requires_authentication() {
    let app = build_router(test_app_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/dashboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok()),
        Some("/login")
    );
}

#[tokio::test]
async fn google_sign_in_bounces_to_login_when_unconfigured() {
    let app = build_router(test_app_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/login/google")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok()),
        Some("/login?error=federated_unavailable")
    );
}

#[tokio::test]
async fn report_submission_requires_authentication() {
    let app = build_router(test_app_state());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/report")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}
