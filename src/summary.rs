//! Headline figures for the whole ledger.

use rusqlite::Connection;
use serde::Serialize;

use crate::Error;

/// The figures shown at the top of the ledger: how much is owed in total and
/// by how many customers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSummary {
    /// The sum of every customer's balance. Customers in credit reduce it.
    pub total_outstanding: f64,
    /// How many customers currently owe money.
    pub active_customers: u32,
    /// How many customers are on the books at all.
    pub customer_count: u32,
}

/// Compute the ledger-wide summary figures.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_summary(connection: &Connection) -> Result<LedgerSummary, Error> {
    let summary = connection
        .prepare(
            "SELECT COALESCE(SUM(total_debt), 0),
                    COALESCE(SUM(total_debt > 0), 0),
                    COUNT(id)
             FROM customer",
        )?
        .query_row([], |row| {
            Ok(LedgerSummary {
                total_outstanding: row.get(0)?,
                active_customers: row.get(1)?,
                customer_count: row.get(2)?,
            })
        })?;

    Ok(summary)
}
