use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, info};
use validator::Validate;

use super::{AgentMailConfig, CreateInboxRequest, Inbox, MailClientTrait, MailError, OutgoingMessage};

/// reqwest-backed AgentMail client
#[derive(Debug, Clone)]
pub struct AgentMailClient {
    client: Client,
    config: AgentMailConfig,
}

impl AgentMailClient {
    pub fn new(config: AgentMailConfig) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(std::time::Duration::from_secs(120))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AgentMailConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, MailError> {
        let key = self.config.api_key.as_deref().ok_or(MailError::NotConfigured)?;
        Ok(builder.bearer_auth(key))
    }

    async fn check(response: Response, accepted: impl Fn(StatusCode) -> bool) -> Result<Response, MailError> {
        let status = response.status();
        if accepted(status) {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(MailError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value, MailError> {
        let request = self.authorized(self.client.get(self.url(path)))?;
        let response = Self::check(request.send().await?, |s| s.is_success()).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MailClientTrait for AgentMailClient {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn create_inbox(&self, request: CreateInboxRequest) -> Result<Inbox, MailError> {
        request
            .validate()
            .map_err(|e| MailError::Validation(e.to_string()))?;

        let builder = self.authorized(self.client.post(self.url("/v0/inboxes")))?;
        let response = Self::check(builder.json(&request).send().await?, |s| s.is_success()).await?;
        let inbox: Inbox = response.json().await?;

        info!("Created AgentMail inbox {}", inbox.inbox_id);
        Ok(inbox)
    }

    async fn send_message(&self, message: OutgoingMessage) -> Result<(), MailError> {
        let payload = json!({
            "to": message.to,
            "subject": message.subject,
            "content": message.content,
            "template_id": message.template_id,
        });

        let builder = self.authorized(self.client.post(self.url("/v1/messages")))?;
        match Self::check(builder.json(&payload).send().await?, |s| s == StatusCode::OK).await {
            Ok(_) => {
                info!("Email sent successfully to {}", message.to);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send email to {}: {}", message.to, e);
                Err(e)
            }
        }
    }

    async fn list_messages(&self, inbox_id: &str) -> Result<Value, MailError> {
        debug!("Listing messages of {}", inbox_id);
        self.get_json(&format!("/v0/inboxes/{}/messages", inbox_id)).await
    }

    async fn list_threads(&self, inbox_id: &str) -> Result<Value, MailError> {
        debug!("Listing threads of {}", inbox_id);
        self.get_json(&format!("/v0/inboxes/{}/threads", inbox_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{get, post},
        Json, Router,
    };
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Seen = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

    fn record(seen: &Seen, path: &str, headers: &HeaderMap, body: Value) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        seen.lock().unwrap().push((path.to_string(), auth, body));
    }

    async fn fake_agentmail() -> (String, Seen) {
        let seen: Seen = Arc::default();

        let app = Router::new()
            .route(
                "/v0/inboxes",
                post(|State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    record(&seen, "/v0/inboxes", &headers, body.clone());
                    Json(json!({
                        "inbox_id": "pat@agentmail.to",
                        "display_name": body["display_name"],
                        "client_id": body["client_id"],
                        "organization_id": "org-1"
                    }))
                }),
            )
            .route(
                "/v1/messages",
                post(|State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    record(&seen, "/v1/messages", &headers, body.clone());
                    if body["to"] == "bounce@example.com" {
                        (AxumStatus::ACCEPTED, "queued")
                    } else {
                        (AxumStatus::OK, "sent")
                    }
                }),
            )
            .route(
                "/v0/inboxes/:id/messages",
                get(|Path(id): Path<String>| async move {
                    Json(json!({"count": 1, "messages": [{"inbox_id": id, "subject": "Hi"}]}))
                }),
            )
            .route(
                "/v0/inboxes/:id/threads",
                get(|| async { (AxumStatus::NOT_FOUND, "no such inbox") }),
            )
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), seen)
    }

    fn client(base_url: &str, api_key: Option<&str>) -> AgentMailClient {
        AgentMailClient::new(AgentMailConfig {
            api_key: api_key.map(String::from),
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_inbox() {
        let (base_url, seen) = fake_agentmail().await;
        let inbox = client(&base_url, Some("key-1"))
            .create_inbox(CreateInboxRequest {
                display_name: Some("Pat Example".into()),
                client_id: Some("auth0|1".into()),
                ..CreateInboxRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(inbox.inbox_id, "pat@agentmail.to");
        assert_eq!(inbox.display_name.as_deref(), Some("Pat Example"));
        assert_eq!(inbox.extra["organization_id"], "org-1");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].1.as_deref(), Some("Bearer key-1"));
        assert!(seen[0].2.get("username").is_none());
    }

    #[tokio::test]
    async fn test_send_message_requires_200() {
        let (base_url, seen) = fake_agentmail().await;
        let client = client(&base_url, Some("key-1"));

        client
            .send_message(OutgoingMessage::new("pat@example.com", "Hello", "Body").with_template("welcome_template"))
            .await
            .unwrap();

        let err = client
            .send_message(OutgoingMessage::new("bounce@example.com", "Hello", "Body"))
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Api { status: 202, .. }));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "/v1/messages");
        assert_eq!(seen[0].2["template_id"], "welcome_template");
        assert_eq!(seen[1].2["template_id"], Value::Null);
    }

    #[tokio::test]
    async fn test_listing_passes_json_through() {
        let (base_url, _) = fake_agentmail().await;
        let client = client(&base_url, Some("key-1"));

        let messages = client.list_messages("pat@agentmail.to").await.unwrap();
        assert_eq!(messages["messages"][0]["inbox_id"], "pat@agentmail.to");

        let err = client.list_threads("missing").await.unwrap_err();
        match err {
            MailError::Api { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such inbox");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_client_sends_nothing() {
        let (base_url, seen) = fake_agentmail().await;
        let client = client(&base_url, None);

        assert!(!client.is_configured());
        let err = client
            .send_message(OutgoingMessage::new("pat@example.com", "Hello", "Body"))
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::NotConfigured));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_inbox_request_is_rejected_locally() {
        let client = client("http://127.0.0.1:9", Some("key-1"));
        let err = client
            .create_inbox(CreateInboxRequest {
                username: Some(String::new()),
                ..CreateInboxRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Validation(_)));
    }
}
