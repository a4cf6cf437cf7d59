//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// The ID of a transaction in the database.
pub type TransactionId = DatabaseId;

/// The ID of a category in the database.
pub type CategoryId = DatabaseId;
