use secrecy::Secret;
use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub identity: IdentitySettings,
    pub user_store: UserStoreSettings,
    pub genai: GenaiSettings,
    #[serde(default)]
    pub limits: LimitSettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub session_secret: Secret<String>,
    /// Externally reachable base URL, used to build OAuth redirect URIs.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// OTLP collector endpoint; span export is disabled when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_public_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

/// Hosted identity provider (Identity Toolkit wire shape).
#[derive(Deserialize, Clone)]
pub struct IdentitySettings {
    #[serde(default = "default_identity_url")]
    pub url: String,
    pub api_key: Secret<String>,
    /// OAuth client for Google sign-in. The login page's Google button
    /// bounces back with an error while these are unset.
    #[serde(default)]
    pub google_client_id: Option<String>,
    #[serde(default)]
    pub google_client_secret: Option<Secret<String>>,
}

fn default_identity_url() -> String {
    "https://identitytoolkit.googleapis.com/v1".to_string()
}

/// Remote user document store (Firestore wire shape).
#[derive(Deserialize, Clone)]
pub struct UserStoreSettings {
    #[serde(default = "default_user_store_url")]
    pub url: String,
    pub project_id: String,
    pub api_key: Secret<String>,
}

fn default_user_store_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

/// Hosted generative model endpoint.
#[derive(Deserialize, Clone)]
pub struct GenaiSettings {
    #[serde(default = "default_genai_url")]
    pub url: String,
    pub api_key: Secret<String>,
    #[serde(default = "default_text_model")]
    pub model: String,
}

fn default_genai_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_text_model() -> String {
    "gemini-2.0-flash".to_string()
}

#[derive(Deserialize, Clone)]
pub struct LimitSettings {
    /// Reports a user may generate per UTC calendar day.
    #[serde(default = "default_daily_report_limit")]
    pub daily_report_limit: i64,
    /// Upper bound on the uploaded image size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            daily_report_limit: default_daily_report_limit(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_daily_report_limit() -> i64 {
    10
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");

    // Check if we're already in insights-frontend directory or need to navigate to it
    let configuration_directory = if base_path.ends_with("insights-frontend") {
        base_path.join("config")
    } else {
        base_path.join("insights-frontend").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
