pub mod coordination;
pub mod health;
pub mod inbox;
pub mod patient;

// Re-export handlers for easier imports
pub use health::health_check;
