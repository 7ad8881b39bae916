use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Configure Swagger UI endpoints
pub fn configure_swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::api::handlers::health::health_check,

        // Patient endpoints
        crate::api::handlers::patient::initialize_patient,
        crate::api::handlers::patient::get_profile,
        crate::api::handlers::patient::create_profile,
        crate::api::handlers::patient::update_profile,
        crate::api::handlers::patient::delete_profile,
        crate::api::handlers::patient::patients_by_agent,
        crate::api::handlers::patient::list_records,
        crate::api::handlers::patient::create_record,

        // Coordination endpoints
        crate::api::handlers::coordination::list_appointments,
        crate::api::handlers::coordination::create_appointment,
        crate::api::handlers::coordination::list_messages,
        crate::api::handlers::coordination::send_message,
        crate::api::handlers::coordination::list_providers,
        crate::api::handlers::coordination::dashboard_stats,
        crate::api::handlers::coordination::send_notification,

        // Inbox endpoints
        crate::api::handlers::inbox::create_inbox,
        crate::api::handlers::inbox::inbox_messages,
        crate::api::handlers::inbox::inbox_threads
    ),
    components(
        schemas(
            crate::entities::common::ErrorBody,
            crate::entities::common::MessageBody,
            crate::entities::responses::ProfileResponse,
            crate::entities::responses::RecordResponse,
            crate::entities::responses::AppointmentResponse,
            crate::entities::responses::MessageSentResponse,
            crate::entities::responses::InboxResponse,
            crate::api::handlers::health::HealthResponse,
            crate::api::handlers::health::ComponentHealth,
            care_connector_domain::auth::UserInfo,
            care_connector_domain::entities::Appointment,
            care_connector_domain::entities::MessageSummary,
            care_connector_domain::entities::Provider,
            care_connector_domain::entities::DashboardStats,
            care_connector_domain::entities::CreateMedicalRecordRequest,
            care_connector_domain::mail::CreateInboxRequest
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Service health"),
        (name = "patient", description = "Patient profiles and medical records"),
        (name = "coordination", description = "Appointments, messages, providers and notifications"),
        (name = "inbox", description = "AgentMail inboxes")
    ),
    info(
        title = "CareConnector API",
        version = "0.1.0",
        description = "Healthcare coordination backend",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        ),
    ),
    servers(
        (url = "/", description = "Local development server")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_doc_generation() {
        let openapi = ApiDoc::openapi();

        assert_eq!(openapi.info.title, "CareConnector API");

        let tags = openapi.tags.as_ref().expect("tags are defined");
        assert!(tags.iter().any(|tag| tag.name == "patient"));
        assert!(tags.iter().any(|tag| tag.name == "inbox"));

        for path in [
            "/api/health",
            "/api/patient/profile",
            "/api/patients/by-agent/{agent_email}",
            "/api/notifications/send",
            "/api/create-inbox",
        ] {
            assert!(openapi.paths.paths.contains_key(path), "missing {path}");
        }

        let components = openapi.components.expect("components are defined");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
