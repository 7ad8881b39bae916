// CareConnector Data
// Single-table document storage shared by every CareConnector entity

// Backend selection and AWS client setup
pub mod database;

// Table access, key conventions and entity repositories
pub mod repository;

// Documents, keys and request shapes
pub mod models;
