/// Audio URL signing.
pub mod audio;
/// Catalog, result and completion-hook storage backends.
pub mod heardle_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
