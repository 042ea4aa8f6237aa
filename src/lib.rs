//! Khata is a bookkeeping client for a local shop.
//!
//! It keeps a per-customer credit ledger (an "udhaar khata"): every customer
//! carries a running `total_debt` balance that is maintained in lockstep with
//! an append-only log of debt and payment transactions. A best-effort parser
//! turns free-form bilingual (Telugu/English) speech transcripts into
//! candidate transactions so entries can be dictated instead of typed.
//!
//! This library provides the ledger core and the parser; the `khata` binary
//! wraps them in a small command line client.

#![warn(missing_docs)]

pub mod capture;
pub mod customer;
pub mod database_id;
pub mod db;
pub mod ledger;
pub mod summary;
pub mod transaction;
pub mod utterance;
pub mod voice_entry;

pub use customer::{Customer, CustomerName};
pub use transaction::{Transaction, TransactionType};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An empty string was used to create a customer name.
    #[error("Customer name cannot be empty")]
    EmptyCustomerName,

    /// A non-positive amount was used to create a transaction.
    ///
    /// The direction of a transaction is carried by its type, so amounts are
    /// always strictly positive magnitudes.
    #[error("{0} is not a valid transaction amount, amounts must be greater than zero")]
    InvalidAmount(f64),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to update a customer that does not exist
    #[error("tried to update a customer that is not in the database")]
    UpdateMissingCustomer,

    /// Tried to delete a customer that does not exist
    #[error("tried to delete a customer that is not in the database")]
    DeleteMissingCustomer,

    /// Tried to delete a transaction that does not exist
    #[error("tried to delete a transaction that is not in the database")]
    DeleteMissingTransaction,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Voice capture is not available in this environment.
    ///
    /// The capability is decided once when the capture collaborator is
    /// constructed, not re-checked at every call site.
    #[error("voice capture is not supported in this environment")]
    CaptureUnsupported,

    /// The voice capture collaborator failed mid-session.
    ///
    /// A user-initiated stop is a normal end of the transcript stream, not a
    /// `CaptureError`.
    #[error("voice capture failed: {0}")]
    CaptureError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
