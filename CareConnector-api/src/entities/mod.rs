// Public entities for the CareConnector API
// Request and response shapes shared across the application boundary

// Error bodies and request body parsing
pub mod common;

// Response envelopes and query parameters
pub mod responses;
