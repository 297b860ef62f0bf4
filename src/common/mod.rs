//! Common utilities and shared functionality
//!
//! Identifiers, collaborator traits, clocks and configuration loading used
//! across the engine.

pub mod clock;
pub mod config;
pub mod traits;
pub mod types;
