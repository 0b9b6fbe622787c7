//! End-to-end coverage of the report submission pipeline against the
//! in-memory store and a scripted model.

use chrono::Utc;
use insights_frontend::config::{
    GenaiSettings, IdentitySettings, LimitSettings, ServerSettings, Settings, UserStoreSettings,
};
use insights_frontend::handlers::report::{
    generate_report_pipeline, ReportSubmission, SubmissionError, UploadedFile,
};
use insights_frontend::models::user::UserRecord;
use insights_frontend::services::auth_client::AuthClient;
use insights_frontend::services::genai::mock::MockTextModel;
use insights_frontend::services::user_store::memory::InMemoryUserStore;
use insights_frontend::AppState;
use secrecy::Secret;
use std::sync::Arc;

const USER_ID: &str = "uid-1";

fn settings_with_limits(limits: LimitSettings) -> Settings {
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
        limits,
    }
}

fn app_state(store: Arc<InMemoryUserStore>, model: Arc<MockTextModel>) -> AppState {
    app_state_with_limits(store, model, LimitSettings::default())
}

fn app_state_with_limits(
    store: Arc<InMemoryUserStore>,
    model: Arc<MockTextModel>,
    limits: LimitSettings,
) -> AppState {
    let settings = Arc::new(settings_with_limits(limits));
    let auth_client = Arc::new(AuthClient::new(settings.identity.clone()));
    AppState::new(settings, auth_client, store, model)
}

fn user_record(report_count: i64, last_report_date: Option<&str>) -> UserRecord {
    UserRecord {
        id: USER_ID.to_string(),
        email: "ada@example.com".to_string(),
        full_name: "Ada Lovelace".to_string(),
        registration_date: "2024-01-01T00:00:00Z".to_string(),
        report_count,
        last_report_date: last_report_date.map(|d| d.to_string()),
    }
}

fn png_submission() -> ReportSubmission {
    ReportSubmission {
        file: Some(UploadedFile {
            content_type: "image/png".to_string(),
            bytes: b"fake png bytes".to_vec(),
        }),
        patient_details: Some("45-year-old male, persistent cough".to_string()),
        language: Some("en".to_string()),
    }
}

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

#[tokio::test]
async fn missing_file_is_rejected_without_model_call() {
    let store = Arc::new(InMemoryUserStore::new());
    let model = Arc::new(MockTextModel::new(Vec::<String>::new()));
    let state = app_state(store, model.clone());

    let submission = ReportSubmission::default();
    let result = generate_report_pipeline(&state, USER_ID, submission).await;

    assert_eq!(result.unwrap_err(), SubmissionError::MissingFile);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn unsupported_file_type_is_rejected_without_model_call() {
    let store = Arc::new(InMemoryUserStore::new());
    let model = Arc::new(MockTextModel::new(Vec::<String>::new()));
    let state = app_state(store, model.clone());

    let submission = ReportSubmission {
        file: Some(UploadedFile {
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        }),
        ..Default::default()
    };
    let result = generate_report_pipeline(&state, USER_ID, submission).await;

    assert_eq!(result.unwrap_err(), SubmissionError::UnsupportedType);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn oversized_file_is_rejected() {
    let store = Arc::new(InMemoryUserStore::new());
    let model = Arc::new(MockTextModel::new(Vec::<String>::new()));
    let limits = LimitSettings {
        max_upload_bytes: 8,
        ..Default::default()
    };
    let state = app_state_with_limits(store, model.clone(), limits);

    let result = generate_report_pipeline(&state, USER_ID, png_submission()).await;

    assert_eq!(result.unwrap_err(), SubmissionError::FileTooLarge(8));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn non_xray_image_surfaces_reason_and_spends_no_quota() {
    let store = Arc::new(InMemoryUserStore::new());
    store.insert(user_record(3, Some(&today()))).await;

    let model = Arc::new(MockTextModel::new([
        r#"{"isXray": false, "reason": "This appears to be a photograph of a cat."}"#,
    ]));
    let state = app_state(store.clone(), model.clone());

    let result = generate_report_pipeline(&state, USER_ID, png_submission()).await;

    let err = result.unwrap_err();
    assert_eq!(
        err,
        SubmissionError::NotAnXray("This appears to be a photograph of a cat.".to_string())
    );
    assert_eq!(
        err.message(),
        "Image validation failed: This appears to be a photograph of a cat."
    );
    // Only the validation call went out, and the count is untouched.
    assert_eq!(model.call_count(), 1);
    assert_eq!(store.record(USER_ID).await.unwrap().report_count, 3);
}

#[tokio::test]
async fn exhausted_quota_blocks_generation_after_validation() {
    let store = Arc::new(InMemoryUserStore::new());
    store.insert(user_record(10, Some(&today()))).await;

    let model = Arc::new(MockTextModel::new([r#"{"isXray": true, "reason": "ok"}"#]));
    let state = app_state(store.clone(), model.clone());

    let result = generate_report_pipeline(&state, USER_ID, png_submission()).await;

    assert_eq!(result.unwrap_err(), SubmissionError::QuotaExceeded);
    assert_eq!(model.call_count(), 1);
    assert_eq!(store.record(USER_ID).await.unwrap().report_count, 10);
}

#[tokio::test]
async fn missing_user_record_fails_closed() {
    let store = Arc::new(InMemoryUserStore::new());
    let model = Arc::new(MockTextModel::new([r#"{"isXray": true, "reason": "ok"}"#]));
    let state = app_state(store, model);

    let result = generate_report_pipeline(&state, "nobody", png_submission()).await;

    assert_eq!(result.unwrap_err(), SubmissionError::AccountUnavailable);
}

#[tokio::test]
async fn store_failure_fails_closed() {
    let store = Arc::new(InMemoryUserStore::failing());
    let model = Arc::new(MockTextModel::new([r#"{"isXray": true, "reason": "ok"}"#]));
    let state = app_state(store, model);

    let result = generate_report_pipeline(&state, USER_ID, png_submission()).await;

    assert_eq!(result.unwrap_err(), SubmissionError::AccountUnavailable);
}

#[tokio::test]
async fn successful_submission_returns_report_and_increments_count() {
    let store = Arc::new(InMemoryUserStore::new());
    store.insert(user_record(3, Some(&today()))).await;

    let model = Arc::new(MockTextModel::new([
        r#"{"isXray": true, "reason": "Chest X-ray"}"#,
        r###"{"report": "## 1. Image Type & Region\nChest X-ray, PA view."}"###,
    ]));
    let state = app_state(store.clone(), model.clone());

    let generated = generate_report_pipeline(&state, USER_ID, png_submission())
        .await
        .unwrap();

    assert!(generated.report.starts_with("## 1. Image Type & Region"));
    assert!(generated
        .xray_image_data_uri
        .starts_with("data:image/png;base64,"));
    assert_eq!(model.call_count(), 2);

    let record = store.record(USER_ID).await.unwrap();
    assert_eq!(record.report_count, 4);
    assert_eq!(record.last_report_date.as_deref(), Some(today().as_str()));
}

#[tokio::test]
async fn model_failure_after_quota_spend_reports_generation_error() {
    let store = Arc::new(InMemoryUserStore::new());
    store.insert(user_record(0, None)).await;

    // One scripted reply: validation passes, then the report call has
    // nothing left and errors.
    let model = Arc::new(MockTextModel::new([r#"{"isXray": true, "reason": "ok"}"#]));
    let state = app_state(store.clone(), model.clone());

    let result = generate_report_pipeline(&state, USER_ID, png_submission()).await;

    assert_eq!(result.unwrap_err(), SubmissionError::GenerationFailed);
    assert_eq!(model.call_count(), 2);
}
