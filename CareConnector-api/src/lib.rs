// CareConnector-api lib.rs
//
// HTTP surface of the CareConnector backend.

pub mod api;
pub mod config;
pub mod entities;
pub mod openapi;

use axum::Router;

use crate::api::AppState;
use crate::config::AppConfig;

/// Build the production router from the environment
pub async fn create_application(config: AppConfig) -> anyhow::Result<Router> {
    let state = AppState::from_env(config).await?;
    Ok(api::create_app(state))
}
