use std::sync::Arc;
use std::time::Instant;

use care_connector_data::database::{connect_table, StoreConfig};
use care_connector_data::repository::TableRepositoryTrait;
use care_connector_domain::auth::auth0::{Auth0Config, Auth0Verifier};
use care_connector_domain::auth::TokenVerifier;
use care_connector_domain::health::{HealthService, HealthServiceTrait};
use care_connector_domain::mail::{AgentMailClient, AgentMailConfig, MailClientTrait};
use care_connector_domain::services::{
    CoordinationService, CoordinationServiceTrait, InboxService, InboxServiceTrait, PatientService,
    PatientServiceTrait,
};
use tracing::{info, warn};

use crate::config::AppConfig;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub patients: Arc<dyn PatientServiceTrait>,
    pub coordination: Arc<dyn CoordinationServiceTrait>,
    pub inbox: Arc<dyn InboxServiceTrait>,
    pub health: Arc<dyn HealthServiceTrait>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub config: AppConfig,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the services over the given collaborators
    pub fn new(
        table: Arc<dyn TableRepositoryTrait>,
        mail: Arc<dyn MailClientTrait>,
        verifier: Arc<dyn TokenVerifier>,
        auth_configured: bool,
        config: AppConfig,
    ) -> Self {
        Self {
            patients: Arc::new(PatientService::new(table.clone(), mail.clone())),
            coordination: Arc::new(CoordinationService::new(mail.clone())),
            inbox: Arc::new(InboxService::new(table.clone(), mail.clone())),
            health: Arc::new(HealthService::new(table, mail, auth_configured)),
            verifier,
            config,
            started_at: Instant::now(),
        }
    }

    /// Build the production state from environment configuration
    pub async fn from_env(config: AppConfig) -> anyhow::Result<Self> {
        let store_config = StoreConfig::from_env()?;
        info!("Using {}", store_config.target_display());
        let table: Arc<dyn TableRepositoryTrait> = Arc::new(connect_table(&store_config).await?);

        let mail_config = AgentMailConfig::from_env();
        if !mail_config.is_configured() {
            warn!("AGENTMAIL_API_KEY not set; emails and inboxes are disabled");
        }
        let mail: Arc<dyn MailClientTrait> = Arc::new(AgentMailClient::new(mail_config)?);

        let auth_config = Auth0Config::from_env();
        let auth_configured = auth_config.is_configured();
        if auth_configured {
            info!("Auth0 issuer: {}", auth_config.issuer().unwrap_or_default());
        } else {
            warn!("AUTH0_DOMAIN or AUTH0_AUDIENCE not set; protected routes will reject all tokens");
        }
        let verifier: Arc<dyn TokenVerifier> = Arc::new(Auth0Verifier::new(auth_config));

        Ok(Self::new(table, mail, verifier, auth_configured, config))
    }
}
