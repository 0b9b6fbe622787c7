//! Dashboard and report generation handlers.
//!
//! The submission path runs as a fixed pipeline: file checks, model
//! validation of the image, quota consumption, then report generation.
//! Each stage maps to a distinct user-facing failure so the page can show
//! exactly what went wrong.

use crate::flows::{generate_report, summarize_report, validate_xray};
use crate::models::user::{AuthUser, UserProfile};
use crate::services::quota::{self, DenyReason, QuotaDecision};
use crate::utils::data_uri::{is_allowed_image_type, DataUri};
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub user: UserProfile,
    pub current_page: &'static str,
}

#[derive(Template)]
#[template(path = "fragments/report.html")]
pub struct ReportFragment {
    pub report: String,
    pub xray_image_data_uri: String,
}

#[derive(Template)]
#[template(path = "fragments/summary.html")]
pub struct SummaryFragment {
    pub summary: String,
}

pub async fn dashboard_handler(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> impl IntoResponse {
    let user = match state.user_store.get_user(&auth_user.user_id).await {
        Ok(Some(record)) => UserProfile {
            email: record.email,
            full_name: Some(record.full_name),
        },
        Ok(None) => {
            tracing::warn!(user_id = %auth_user.user_id, "No user record for signed-in user");
            UserProfile {
                email: auth_user.email,
                full_name: None,
            }
        }
        Err(e) => {
            // The dashboard still renders from session data when the store is down.
            tracing::error!(user_id = %auth_user.user_id, "Failed to load user record: {}", e);
            UserProfile {
                email: auth_user.email,
                full_name: None,
            }
        }
    };

    DashboardTemplate {
        user,
        current_page: "dashboard",
    }
}

/// The uploaded image plus optional submission fields, as parsed out of
/// the multipart form.
#[derive(Debug, Default)]
pub struct ReportSubmission {
    pub file: Option<UploadedFile>,
    pub patient_details: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug)]
pub struct UploadedFile {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A submission failure, carrying the status and message shown to the user.
#[derive(Debug, PartialEq, Eq)]
pub enum SubmissionError {
    MissingFile,
    UnsupportedType,
    FileTooLarge(usize),
    NotAnXray(String),
    QuotaExceeded,
    AccountUnavailable,
    GenerationFailed,
}

impl SubmissionError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::UnsupportedType => StatusCode::UNPROCESSABLE_ENTITY,
            Self::FileTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotAnXray(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::AccountUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::GenerationFailed => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::MissingFile => "Please upload an X-ray image file.".to_string(),
            Self::UnsupportedType => {
                "Invalid file type. Please upload a JPG, PNG, or WEBP image.".to_string()
            }
            Self::FileTooLarge(limit) => format!(
                "The image is too large. The maximum size is {} MB.",
                limit / (1024 * 1024)
            ),
            Self::NotAnXray(reason) => format!("Image validation failed: {}", reason),
            Self::QuotaExceeded => {
                "You have reached your daily report limit. Please try again tomorrow.".to_string()
            }
            Self::AccountUnavailable => {
                "We could not verify your account right now. Please try again later.".to_string()
            }
            Self::GenerationFailed => {
                "Report generation failed. Please try again later.".to_string()
            }
        }
    }
}

#[derive(Debug)]
pub struct GeneratedReport {
    pub report: String,
    pub xray_image_data_uri: String,
}

/// Run the full submission pipeline for one upload.
///
/// The quota is consumed only after the image has passed model validation,
/// so a rejected upload never costs the user a report.
pub async fn generate_report_pipeline(
    state: &AppState,
    user_id: &str,
    submission: ReportSubmission,
) -> Result<GeneratedReport, SubmissionError> {
    let file = submission.file.ok_or(SubmissionError::MissingFile)?;
    if file.bytes.is_empty() {
        return Err(SubmissionError::MissingFile);
    }
    if !is_allowed_image_type(&file.content_type) {
        return Err(SubmissionError::UnsupportedType);
    }

    let max_bytes = state.settings.limits.max_upload_bytes;
    if file.bytes.len() > max_bytes {
        return Err(SubmissionError::FileTooLarge(max_bytes));
    }

    let data_uri = DataUri::from_bytes(&file.content_type, &file.bytes).to_string();

    let verdict = validate_xray::run(
        state.text_model.as_ref(),
        validate_xray::ValidateXrayInput {
            xray_image_data_uri: data_uri.clone(),
        },
    )
    .await
    .map_err(|e| {
        tracing::error!(user_id = %user_id, "Image validation flow failed: {}", e);
        SubmissionError::GenerationFailed
    })?;

    if !verdict.is_xray {
        return Err(SubmissionError::NotAnXray(verdict.reason));
    }

    let daily_limit = state.settings.limits.daily_report_limit;
    match quota::check_and_increment(state.user_store.as_ref(), user_id, daily_limit).await {
        QuotaDecision::Allowed => {}
        QuotaDecision::Denied(DenyReason::LimitReached) => {
            return Err(SubmissionError::QuotaExceeded)
        }
        QuotaDecision::Denied(DenyReason::MissingRecord | DenyReason::StoreUnavailable) => {
            return Err(SubmissionError::AccountUnavailable)
        }
    }

    let output = generate_report::run(
        state.text_model.as_ref(),
        generate_report::GenerateReportInput {
            xray_image_data_uri: data_uri.clone(),
            patient_details: submission.patient_details,
            language: submission.language,
        },
    )
    .await
    .map_err(|e| {
        tracing::error!(user_id = %user_id, "Report flow failed: {}", e);
        SubmissionError::GenerationFailed
    })?;

    Ok(GeneratedReport {
        report: output.report,
        xray_image_data_uri: data_uri,
    })
}

/// Pull the submission fields out of the multipart form.
async fn parse_submission(multipart: &mut Multipart) -> Result<ReportSubmission, SubmissionError> {
    let mut submission = ReportSubmission::default();

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name().unwrap_or_default() {
            "xrayImage" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    tracing::error!("Failed to read uploaded file: {}", e);
                    SubmissionError::MissingFile
                })?;
                submission.file = Some(UploadedFile {
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "patientDetails" => {
                let value = field.text().await.unwrap_or_default();
                if !value.trim().is_empty() {
                    submission.patient_details = Some(value);
                }
            }
            "language" => {
                let value = field.text().await.unwrap_or_default();
                if !value.trim().is_empty() {
                    submission.language = Some(value);
                }
            }
            _ => {}
        }
    }

    Ok(submission)
}

fn error_fragment(error: &SubmissionError) -> Response {
    (
        error.status(),
        Html(format!(
            "<p class='text-red-500 text-sm'>{}</p>",
            error.message()
        )),
    )
        .into_response()
}

pub async fn generate_report_handler(
    State(state): State<AppState>,
    auth_user: AuthUser,
    mut multipart: Multipart,
) -> Response {
    let submission = match parse_submission(&mut multipart).await {
        Ok(submission) => submission,
        Err(e) => return error_fragment(&e),
    };

    match generate_report_pipeline(&state, &auth_user.user_id, submission).await {
        Ok(generated) => {
            tracing::info!(user_id = %auth_user.user_id, "Report generated");
            ReportFragment {
                report: generated.report,
                xray_image_data_uri: generated.xray_image_data_uri,
            }
            .into_response()
        }
        Err(e) => error_fragment(&e),
    }
}

#[derive(Deserialize)]
pub struct SummarizeRequest {
    pub report: String,
    pub xray_image_data_uri: String,
}

pub async fn summarize_report_handler(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Form(payload): Form<SummarizeRequest>,
) -> Response {
    let result = summarize_report::run(
        state.text_model.as_ref(),
        summarize_report::SummarizeReportInput {
            photo_data_uri: payload.xray_image_data_uri,
            report: payload.report,
        },
    )
    .await;

    match result {
        Ok(output) => SummaryFragment {
            summary: output.summary,
        }
        .into_response(),
        Err(e) => {
            tracing::error!(user_id = %auth_user.user_id, "Summarize flow failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Html("<p class='text-red-500 text-sm'>Summarization failed. Please try again later.</p>"),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct DownloadRequest {
    pub report: String,
}

/// Serve the generated report back as a markdown attachment.
pub async fn download_report_handler(
    _auth_user: AuthUser,
    Form(payload): Form<DownloadRequest>,
) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"diagnostic-report.md\"",
            ),
        ],
        payload.report,
    )
}
