//! Database initialization for the application.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{Error, customer::create_customer_table, transaction::create_transaction_table};

/// Create the application's tables if they do not exist.
///
/// All tables are created within a single SQL transaction so that a partially
/// initialized schema is never left behind. Foreign key enforcement is turned
/// on for the connection.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_customer_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
