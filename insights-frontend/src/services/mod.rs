pub mod auth_client;
pub mod genai;
pub mod metrics;
pub mod quota;
pub mod user_store;
