//! AgentMail integration
//!
//! Inbox provisioning and outgoing email through the AgentMail HTTP API.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;
use validator::Validate;

mod client;

pub use client::AgentMailClient;

/// Default AgentMail API root
pub const DEFAULT_BASE_URL: &str = "https://api.agentmail.com";

/// AgentMail connection settings
#[derive(Debug, Clone)]
pub struct AgentMailConfig {
    /// API key; requests are refused locally while unset
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for AgentMailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl AgentMailConfig {
    /// Read `AGENTMAIL_API_KEY`, `AGENTMAIL_BASE_URL` and `AGENTMAIL_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env::var("AGENTMAIL_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            base_url: env::var("AGENTMAIL_BASE_URL")
                .ok()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(defaults.base_url),
            timeout: env::var("AGENTMAIL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// AgentMail failures
#[derive(Debug, Error)]
pub enum MailError {
    #[error("AgentMail API key not configured")]
    NotConfigured,

    #[error("Invalid mail request: {0}")]
    Validation(String),

    #[error("AgentMail request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AgentMail returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Options for a new inbox; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateInboxRequest {
    /// Local part of the inbox address
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 64))]
    pub username: Option<String>,
    /// Domain of the inbox address
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 3, max = 253))]
    pub domain: Option<String>,
    /// Name shown to recipients
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 128))]
    pub display_name: Option<String>,
    /// Idempotency key chosen by the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 128))]
    pub client_id: Option<String>,
}

/// Inbox as returned by AgentMail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inbox {
    pub inbox_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Remaining fields, passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Outgoing email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub content: String,
    pub template_id: Option<String>,
}

impl OutgoingMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            content: content.into(),
            template_id: None,
        }
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }
}

/// Operations on the mail provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailClientTrait: Send + Sync + std::fmt::Debug {
    /// Whether requests can be sent at all
    fn is_configured(&self) -> bool;

    /// Provision a new inbox
    async fn create_inbox(&self, request: CreateInboxRequest) -> Result<Inbox, MailError>;

    /// Send an email
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), MailError>;

    /// Messages of an inbox, as returned by the provider
    async fn list_messages(&self, inbox_id: &str) -> Result<Value, MailError>;

    /// Threads of an inbox, as returned by the provider
    async fn list_threads(&self, inbox_id: &str) -> Result<Value, MailError>;
}
