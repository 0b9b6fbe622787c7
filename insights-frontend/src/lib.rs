pub mod config;
pub mod flows;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use config::Settings;
use services::{auth_client::AuthClient, genai::TextModel, user_store::UserStore};
use std::sync::Arc;

/// Shared application state: configuration plus the clients for the three
/// external collaborators (identity provider, user document store,
/// generative model).
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub auth_client: Arc<AuthClient>,
    pub user_store: Arc<dyn UserStore>,
    pub text_model: Arc<dyn TextModel>,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        auth_client: Arc<AuthClient>,
        user_store: Arc<dyn UserStore>,
        text_model: Arc<dyn TextModel>,
    ) -> Self {
        Self {
            settings,
            auth_client,
            user_store,
            text_model,
        }
    }
}
