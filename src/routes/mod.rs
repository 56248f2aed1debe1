// Export all route modules
pub mod expiration;
pub mod public_config;
pub mod settlement;
pub mod setup;

// Re-export all route handlers for easy importing
pub use expiration::*;
pub use public_config::*;
pub use settlement::*;
pub use setup::*;
