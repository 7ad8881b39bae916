// CareConnector Domain
// Business logic for the CareConnector backend

// Services that implement business logic
pub mod services;

// Authentication
pub mod auth;

// AgentMail client
pub mod mail;

// Domain entities
pub mod entities;

// Health checks and system status
pub mod health;

// Re-export the data layer for convenience
pub use care_connector_data::{database, models, repository};

// Testing utilities - only available with mock feature
#[cfg(feature = "mock")]
pub mod testing;
