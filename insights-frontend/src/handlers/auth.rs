use crate::models::user::UserRecord;
use crate::services::auth_client::AuthError;
use crate::utils::jwt::decode_id_token_claims;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect},
    Form,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

pub async fn login_page() -> impl IntoResponse {
    LoginTemplate {}
}

pub async fn register_page() -> impl IntoResponse {
    RegisterTemplate {}
}

fn error_fragment(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Html(format!("<p class='text-red-500 text-sm'>{}</p>", message)),
    )
        .into_response()
}

fn redirect_fragment(location: &'static str) -> axum::response::Response {
    let mut headers = HeaderMap::new();
    headers.insert("HX-Redirect", location.parse().expect("static header value"));
    (StatusCode::OK, headers, "").into_response()
}

/// Store the signed-in identity in the session. The token came straight
/// from the identity provider over TLS, so its claims are trusted here.
async fn establish_session(
    session: &Session,
    id_token: &str,
    fallback_uid: &str,
    email: &str,
) -> Result<(), tower_sessions::session::Error> {
    let user_id = match decode_id_token_claims(id_token) {
        Ok(claims) => claims.sub,
        Err(e) => {
            tracing::warn!("Falling back to provider uid, could not decode ID token: {}", e);
            fallback_uid.to_string()
        }
    };

    session.insert("id_token", id_token).await?;
    session.insert("user_id", &user_id).await?;
    session.insert("email", email).await?;

    tracing::info!(user_id = %user_id, email = %email, "Session established");
    Ok(())
}

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    Form(payload): Form<LoginRequest>,
) -> impl IntoResponse {
    match state.auth_client.sign_in(&payload.email, &payload.password).await {
        Ok(tokens) => {
            if let Err(e) =
                establish_session(&session, &tokens.id_token, &tokens.local_id, &tokens.email)
                    .await
            {
                tracing::error!("Failed to write session: {}", e);
                return error_fragment(StatusCode::INTERNAL_SERVER_ERROR, "Authentication error");
            }

            redirect_fragment("/dashboard")
        }
        Err(e @ (AuthError::InvalidCredentials | AuthError::InvalidEmail)) => {
            error_fragment(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string())
        }
        Err(e) => {
            tracing::error!("Sign-in failed: {}", e);
            error_fragment(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid email or password.",
            )
        }
    }
}

pub async fn register_handler(
    State(state): State<AppState>,
    session: Session,
    Form(payload): Form<RegisterRequest>,
) -> impl IntoResponse {
    if payload.full_name.trim().is_empty() {
        return error_fragment(StatusCode::UNPROCESSABLE_ENTITY, "Please enter your name.");
    }
    if payload.password.len() < 6 {
        return error_fragment(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Password must be at least 6 characters.",
        );
    }

    let tokens = match state.auth_client.sign_up(&payload.email, &payload.password).await {
        Ok(tokens) => tokens,
        Err(e @ (AuthError::EmailExists | AuthError::InvalidEmail | AuthError::WeakPassword)) => {
            return error_fragment(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string());
        }
        Err(e) => {
            tracing::error!("Sign-up failed: {}", e);
            return error_fragment(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed. Please try again later.",
            );
        }
    };

    // The quota check reads this record, so account setup fails without it.
    let record = UserRecord::new(
        tokens.local_id.clone(),
        tokens.email.clone(),
        payload.full_name.trim().to_string(),
    );
    if let Err(e) = state.user_store.create_user(&record).await {
        tracing::error!(user_id = %record.id, "Failed to create user record: {}", e);
        return error_fragment(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Registration failed. Please try again later.",
        );
    }

    // Verification is advisory; a delivery failure must not block signup.
    if let Err(e) = state.auth_client.send_verification_email(&tokens.id_token).await {
        tracing::warn!("Failed to send verification email: {}", e);
    }

    if let Err(e) =
        establish_session(&session, &tokens.id_token, &tokens.local_id, &tokens.email).await
    {
        tracing::error!("Failed to write session: {}", e);
        return error_fragment(StatusCode::INTERNAL_SERVER_ERROR, "Authentication error");
    }

    redirect_fragment("/dashboard")
}

pub async fn logout_handler(session: Session) -> impl IntoResponse {
    session.clear().await;
    redirect_fragment("/")
}

// Google sign-in

fn google_redirect_uri(public_url: &str) -> String {
    format!("{}/login/google/callback", public_url.trim_end_matches('/'))
}

fn google_auth_url(client_id: &str, redirect_uri: &str, state: &str) -> String {
    reqwest::Url::parse_with_params(
        GOOGLE_AUTH_ENDPOINT,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("state", state),
        ],
    )
    .map(|url| url.to_string())
    .unwrap_or_else(|_| "/login?error=federated_unavailable".to_string())
}

/// Kicks off the Google OAuth code flow.
pub async fn google_login_redirect(
    State(state): State<AppState>,
    session: Session,
) -> impl IntoResponse {
    let Some(client_id) = state.settings.identity.google_client_id.clone() else {
        tracing::warn!("Google sign-in requested but no OAuth client is configured");
        return Redirect::to("/login?error=federated_unavailable").into_response();
    };

    let oauth_state = Uuid::new_v4().to_string();
    if let Err(e) = session.insert("oauth_state", &oauth_state).await {
        tracing::error!("Failed to write session: {}", e);
        return Redirect::to("/login?error=session").into_response();
    }

    let url = google_auth_url(
        &client_id,
        &google_redirect_uri(&state.settings.server.public_url),
        &oauth_state,
    );
    Redirect::to(&url).into_response()
}

#[derive(Deserialize)]
pub struct OAuthCallbackParams {
    pub code: String,
    pub state: Option<String>,
}

/// Finishes the Google OAuth code flow: authorization code to Google ID
/// token, then a federated exchange at the identity provider.
pub async fn google_login_callback(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<OAuthCallbackParams>,
) -> impl IntoResponse {
    let (Some(client_id), Some(client_secret)) = (
        state.settings.identity.google_client_id.clone(),
        state.settings.identity.google_client_secret.clone(),
    ) else {
        return Redirect::to("/login?error=federated_unavailable").into_response();
    };

    let expected_state: Option<String> = session.get("oauth_state").await.unwrap_or(None);
    if expected_state.is_none() || params.state != expected_state {
        tracing::warn!("OAuth state mismatch on Google callback");
        return Redirect::to("/login?error=state_mismatch").into_response();
    }
    let _ = session.remove::<String>("oauth_state").await;

    let redirect_uri = google_redirect_uri(&state.settings.server.public_url);
    let google_id_token = match state
        .auth_client
        .exchange_google_code(
            &client_id,
            client_secret.expose_secret(),
            &params.code,
            &redirect_uri,
        )
        .await
    {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Google code exchange failed: {}", e);
            return Redirect::to("/login?error=oauth_failed").into_response();
        }
    };

    let tokens = match state
        .auth_client
        .sign_in_with_idp("google.com", &google_id_token, &redirect_uri)
        .await
    {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!("Federated sign-in failed: {}", e);
            return Redirect::to("/login?error=oauth_failed").into_response();
        }
    };

    // A first federated sign-in has no stored record yet, and the quota
    // check fails closed without one.
    match state.user_store.get_user(&tokens.local_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let record = UserRecord::new(
                tokens.local_id.clone(),
                tokens.email.clone(),
                tokens.display_name.clone().unwrap_or_default(),
            );
            if let Err(e) = state.user_store.create_user(&record).await {
                tracing::error!(user_id = %record.id, "Failed to create user record: {}", e);
                return Redirect::to("/login?error=account_setup").into_response();
            }
        }
        Err(e) => {
            tracing::error!("Failed to look up user record: {}", e);
            return Redirect::to("/login?error=account_setup").into_response();
        }
    }

    if let Err(e) =
        establish_session(&session, &tokens.id_token, &tokens.local_id, &tokens.email).await
    {
        tracing::error!("Failed to write session: {}", e);
        return Redirect::to("/login?error=session").into_response();
    }

    Redirect::to("/dashboard").into_response()
}
