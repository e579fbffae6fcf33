//! Request handlers

pub mod edits;
pub mod health;

pub use edits::edits_router;
pub use health::health_router;
