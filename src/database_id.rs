//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// The ID of a customer row.
pub type CustomerId = i64;

/// The ID of a transaction row.
pub type TransactionId = i64;
