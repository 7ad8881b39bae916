// Testing utilities for the domain layer
// This module is only available when the "mock" feature is enabled

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::auth::{AuthError, TokenVerifier, UserInfo};
use crate::mail::{CreateInboxRequest, Inbox, MailClientTrait, MailError, OutgoingMessage};

/// Token verifier that accepts a fixed set of tokens
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    users: HashMap<String, UserInfo>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as `user`
    pub fn with_user(mut self, token: impl Into<String>, user: UserInfo) -> Self {
        self.users.insert(token.into(), user);
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<UserInfo, AuthError> {
        self.users.get(token).cloned().ok_or(AuthError::KeyNotFound)
    }

    fn method(&self) -> &'static str {
        "static"
    }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mail client that keeps everything in memory
#[derive(Debug, Default)]
pub struct RecordingMailClient {
    sent: Mutex<Vec<OutgoingMessage>>,
    inbox_requests: Mutex<Vec<CreateInboxRequest>>,
    fail: bool,
}

impl RecordingMailClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with an API error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        guard(&self.sent).clone()
    }

    pub fn inbox_requests(&self) -> Vec<CreateInboxRequest> {
        guard(&self.inbox_requests).clone()
    }

    fn check(&self) -> Result<(), MailError> {
        if self.fail {
            Err(MailError::Api {
                status: 500,
                body: "mail provider unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MailClientTrait for RecordingMailClient {
    fn is_configured(&self) -> bool {
        !self.fail
    }

    async fn create_inbox(&self, request: CreateInboxRequest) -> Result<Inbox, MailError> {
        self.check()?;
        let mut requests = guard(&self.inbox_requests);
        let inbox_id = match &request.username {
            Some(username) => format!("{}@agentmail.to", username),
            None => format!("inbox-{}@agentmail.to", requests.len() + 1),
        };
        let inbox = Inbox {
            inbox_id,
            display_name: request.display_name.clone(),
            client_id: request.client_id.clone(),
            extra: Default::default(),
        };
        requests.push(request);
        Ok(inbox)
    }

    async fn send_message(&self, message: OutgoingMessage) -> Result<(), MailError> {
        self.check()?;
        guard(&self.sent).push(message);
        Ok(())
    }

    async fn list_messages(&self, inbox_id: &str) -> Result<Value, MailError> {
        self.check()?;
        Ok(json!({
            "count": 1,
            "messages": [{"inbox_id": inbox_id, "subject": "Welcome", "message_id": "msg-1"}]
        }))
    }

    async fn list_threads(&self, inbox_id: &str) -> Result<Value, MailError> {
        self.check()?;
        Ok(json!({
            "count": 1,
            "threads": [{"inbox_id": inbox_id, "thread_id": "thread-1"}]
        }))
    }
}
