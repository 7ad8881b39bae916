// Repository module structure
pub mod errors;
pub mod expression;
pub mod keys;
pub mod storage;
pub mod dynamodb;
pub mod in_memory;
mod sdk_errors;
mod table;
mod patient;
mod medical_record;

// Re-export commonly used types
pub use errors::RepositoryError;
pub use expression::{Condition, Index, SortKeyCondition};
pub use table::{TableRepository, TableRepositoryTrait, BATCH_GET_LIMIT, BATCH_WRITE_LIMIT};
pub use patient::{PatientRepository, PATIENT_ENTITY};
pub use medical_record::{MedicalRecordRepository, MEDICAL_RECORD_ENTITY};
