/// Song catalog listings.
pub mod catalog;
/// Health check response structures.
pub mod health;
/// Round start requests and prompts.
pub mod round;
/// Result submission payloads.
pub mod submission;
/// Validation functions for DTOs.
pub mod validation;
/// WebSocket message structures.
pub mod ws;
