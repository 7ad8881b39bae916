// Domain services
// Business logic over the table store and the mail provider.

pub mod coordination;
pub mod inbox;
pub mod patient;

pub use coordination::{CoordinationError, CoordinationService, CoordinationServiceTrait, ProviderFilter};
pub use inbox::{InboxError, InboxService, InboxServiceTrait};
pub use patient::{PatientService, PatientServiceError, PatientServiceTrait};
