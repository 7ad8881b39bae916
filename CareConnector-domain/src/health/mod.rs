//! Domain layer health check functionality
//! Reports on the table store, the mail provider and the identity provider

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use care_connector_data::repository::TableRepositoryTrait;
use serde::Serialize;
use tracing::warn;

use crate::mail::MailClientTrait;

/// System health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    /// All components are healthy
    Healthy,
    /// Some components are degraded but the system is functional
    Degraded,
    /// System is not functioning properly
    Unhealthy,
}

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Represents a health component with status and optional details
#[derive(Debug, Clone, Serialize)]
pub struct HealthComponent {
    /// Status of the component
    pub status: ComponentStatus,
    /// Optional details about the component status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HealthComponent {
    fn healthy(details: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Healthy,
            details: Some(details.into()),
        }
    }

    fn degraded(details: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Degraded,
            details: Some(details.into()),
        }
    }

    fn unhealthy(details: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Unhealthy,
            details: Some(details.into()),
        }
    }
}

/// Represents the overall health of the system
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    /// Overall system status
    pub status: SystemStatus,
    /// Map of component names to their health status
    pub components: HashMap<String, HealthComponent>,
}

/// Trait for health services
#[async_trait]
pub trait HealthServiceTrait: Send + Sync + std::fmt::Debug {
    /// Get the overall system health
    async fn get_system_health(&self) -> SystemHealth;

    /// Check the table store; an error means it cannot be reached
    async fn check_database_status(&self) -> Result<bool, String>;
}

/// Health checks over the application's collaborators
#[derive(Debug, Clone)]
pub struct HealthService {
    table: Arc<dyn TableRepositoryTrait>,
    mail: Arc<dyn MailClientTrait>,
    auth_configured: bool,
}

impl HealthService {
    pub fn new(
        table: Arc<dyn TableRepositoryTrait>,
        mail: Arc<dyn MailClientTrait>,
        auth_configured: bool,
    ) -> Self {
        Self {
            table,
            mail,
            auth_configured,
        }
    }
}

#[async_trait]
impl HealthServiceTrait for HealthService {
    async fn get_system_health(&self) -> SystemHealth {
        let database = match self.check_database_status().await {
            Ok(_) => HealthComponent::healthy("Table reachable"),
            Err(e) => HealthComponent::unhealthy(e),
        };

        let mail = if self.mail.is_configured() {
            HealthComponent::healthy("AgentMail API key configured")
        } else {
            HealthComponent::degraded("AgentMail API key not configured")
        };

        let auth = if self.auth_configured {
            HealthComponent::healthy("Auth0 configured")
        } else {
            HealthComponent::degraded("Auth0 domain or audience not configured")
        };

        let components: HashMap<String, HealthComponent> = vec![
            ("database".to_string(), database),
            ("agentmail".to_string(), mail),
            ("auth".to_string(), auth),
        ]
        .into_iter()
        .collect();

        let status = match components.values().map(|c| c.status).max() {
            Some(ComponentStatus::Unhealthy) => SystemStatus::Unhealthy,
            Some(ComponentStatus::Degraded) => SystemStatus::Degraded,
            _ => SystemStatus::Healthy,
        };

        SystemHealth { status, components }
    }

    async fn check_database_status(&self) -> Result<bool, String> {
        self.table.ping().await.map(|_| true).map_err(|e| {
            warn!("Database health check failed: {}", e);
            format!("Database connection error: {}", e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MockMailClientTrait;
    use care_connector_data::repository::TableRepository;

    fn mail(configured: bool) -> Arc<dyn MailClientTrait> {
        let mut mock = MockMailClientTrait::new();
        mock.expect_is_configured().return_const(configured);
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_all_components_healthy() {
        let service = HealthService::new(Arc::new(TableRepository::in_memory()), mail(true), true);
        let health = service.get_system_health().await;

        assert_eq!(health.status, SystemStatus::Healthy);
        assert_eq!(health.components["database"].status, ComponentStatus::Healthy);
        assert_eq!(health.components.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_mail_key_degrades() {
        let service = HealthService::new(Arc::new(TableRepository::in_memory()), mail(false), true);
        let health = service.get_system_health().await;

        assert_eq!(health.status, SystemStatus::Degraded);
        assert_eq!(health.components["agentmail"].status, ComponentStatus::Degraded);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_value(SystemStatus::Degraded).unwrap(), "degraded");
    }
}
