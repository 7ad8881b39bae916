// Domain entities and value objects
pub mod coordination;
pub mod patient;

// Re-export common types for easier imports
pub use coordination::{Appointment, DashboardStats, MessageSummary, NotificationKind, Provider};
pub use patient::{CreateMedicalRecordRequest, Initialization};
