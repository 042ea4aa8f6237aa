//! Defines the transaction model and the database functions for the
//! append-only transaction log.
//!
//! Rows in the log are never mutated after creation; they are only inserted
//! and removed, and the functions in [crate::ledger] keep the owning
//! customer's balance in lockstep with those changes.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{CustomerId, TransactionId},
};

// ============================================================================
// MODELS
// ============================================================================

/// The direction of a transaction.
///
/// Amounts are always positive magnitudes; the type decides whether a
/// transaction raises or lowers the customer's outstanding balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// The customer took goods on credit and owes the shop more.
    Debt,
    /// The customer paid money back and owes the shop less.
    Payment,
}

impl TransactionType {
    /// The canonical string stored in the database for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Debt => "debt",
            TransactionType::Payment => "payment",
        }
    }

    /// The signed balance contribution of a transaction of this type with
    /// the given (positive) `amount`.
    pub fn signed_amount(&self, amount: f64) -> f64 {
        match self {
            TransactionType::Debt => amount,
            TransactionType::Payment => -amount,
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debt" => Ok(TransactionType::Debt),
            "payment" => Ok(TransactionType::Payment),
            other => Err(format!("unknown transaction type \"{other}\"")),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().and_then(|text| {
            text.parse()
                .map_err(|error: String| FromSqlError::Other(error.into()))
        })
    }
}

/// One entry in a customer's ledger: goods taken on credit or money paid back.
///
/// Transactions are immutable once created. To create one and keep the
/// customer's balance consistent, use [crate::ledger::add_transaction].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The ID of the customer this transaction belongs to.
    pub customer_id: CustomerId,
    /// The positive magnitude of the transaction.
    pub amount: f64,
    /// Whether this transaction raises or lowers the customer's balance.
    pub transaction_type: TransactionType,
    /// A free-text description of the goods or payment. May be empty.
    pub items: String,
    /// When the transaction was recorded. Used for ordering the log.
    pub date: OffsetDateTime,
}

impl Transaction {
    /// The signed balance contribution of this transaction.
    pub fn signed_amount(&self) -> f64 {
        self.transaction_type.signed_amount(self.amount)
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Insert a transaction row into the log.
///
/// This is the raw row insert; it does not adjust the owning customer's
/// balance. Use [crate::ledger::add_transaction] to record a transaction and
/// keep the balance consistent.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `customer_id` does not refer to a real customer,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn insert_transaction(
    customer_id: CustomerId,
    amount: f64,
    items: &str,
    transaction_type: TransactionType,
    date: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (customer_id, amount, type, items, date)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, customer_id, amount, type, items, date",
        )?
        .query_row(
            (customer_id, amount, transaction_type, items, date),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })?;

    Ok(transaction)
}

/// Retrieve a transaction from the log by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, customer_id, amount, type, items, date FROM \"transaction\"
             WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Retrieve a customer's transactions, most recent first.
///
/// Rows with equal dates keep their insertion order.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_transactions_for_customer(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, customer_id, amount, type, items, date FROM \"transaction\"
             WHERE customer_id = :customer_id
             ORDER BY date DESC, id ASC",
        )?
        .query_map(&[(":customer_id", &customer_id)], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Delete a transaction row from the log.
///
/// This is the raw row delete; it does not adjust the owning customer's
/// balance. Use [crate::ledger::delete_transaction] to remove a transaction
/// and keep the balance consistent.
///
/// # Errors
/// This function will return an error if there is an SQL error or if the
/// transaction doesn't exist.
pub fn delete_transaction_row(
    id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM \"transaction\" WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingTransaction);
    }

    Ok(())
}

/// Delete every transaction belonging to `customer_id`, returning how many
/// rows were removed.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn delete_transactions_for_customer(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<usize, Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE customer_id = ?1",
        [customer_id],
    )?;

    Ok(rows_affected)
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id INTEGER NOT NULL,
            amount REAL NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('debt', 'payment')),
            items TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            FOREIGN KEY(customer_id) REFERENCES customer(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_customer_date
            ON \"transaction\"(customer_id, date);",
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let customer_id = row.get(1)?;
    let amount = row.get(2)?;
    let transaction_type = row.get(3)?;
    let items = row.get(4)?;
    let date = row.get(5)?;

    Ok(Transaction {
        id,
        customer_id,
        amount,
        transaction_type,
        items,
        date,
    })
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        customer::{CustomerName, create_customer},
        db::initialize,
        transaction::{
            TransactionType, delete_transaction_row, delete_transactions_for_customer,
            get_transaction, get_transactions_for_customer, insert_transaction,
        },
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    fn create_test_customer(connection: &Connection) -> crate::customer::Customer {
        create_customer(CustomerName::new_unchecked("Ram"), None, connection)
            .expect("Could not create test customer")
    }

    #[test]
    fn insert_round_trips_type_and_fields() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);
        let date = OffsetDateTime::now_utc();

        let inserted = insert_transaction(
            customer.id,
            42.5,
            "Rice and dal",
            TransactionType::Payment,
            date,
            &connection,
        )
        .expect("Could not insert transaction");

        let selected = get_transaction(inserted.id, &connection);
        assert_eq!(Ok(inserted.clone()), selected);
        assert_eq!(inserted.customer_id, customer.id);
        assert_eq!(inserted.amount, 42.5);
        assert_eq!(inserted.transaction_type, TransactionType::Payment);
        assert_eq!(inserted.items, "Rice and dal");
    }

    #[test]
    fn insert_fails_for_unknown_customer() {
        let connection = get_test_db_connection();

        let result = insert_transaction(
            1337,
            10.0,
            "",
            TransactionType::Debt,
            OffsetDateTime::now_utc(),
            &connection,
        );

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn listing_orders_by_date_descending_with_stable_ties() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);
        let base_date = OffsetDateTime::now_utc();

        let older = insert_transaction(
            customer.id,
            10.0,
            "",
            TransactionType::Debt,
            base_date - Duration::days(1),
            &connection,
        )
        .unwrap();
        let tied_first = insert_transaction(
            customer.id,
            20.0,
            "",
            TransactionType::Debt,
            base_date,
            &connection,
        )
        .unwrap();
        let tied_second = insert_transaction(
            customer.id,
            30.0,
            "",
            TransactionType::Debt,
            base_date,
            &connection,
        )
        .unwrap();

        let transactions =
            get_transactions_for_customer(customer.id, &connection).expect("Could not list");

        assert_eq!(transactions, vec![tied_first, tied_second, older]);
    }

    #[test]
    fn listing_excludes_other_customers() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);
        let other = create_customer(CustomerName::new_unchecked("Sita"), None, &connection)
            .expect("Could not create test customer");
        let date = OffsetDateTime::now_utc();
        insert_transaction(customer.id, 10.0, "", TransactionType::Debt, date, &connection)
            .unwrap();
        insert_transaction(other.id, 20.0, "", TransactionType::Debt, date, &connection)
            .unwrap();

        let transactions =
            get_transactions_for_customer(customer.id, &connection).expect("Could not list");

        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].customer_id, customer.id);
    }

    #[test]
    fn delete_row_removes_transaction() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);
        let transaction = insert_transaction(
            customer.id,
            10.0,
            "",
            TransactionType::Debt,
            OffsetDateTime::now_utc(),
            &connection,
        )
        .unwrap();

        delete_transaction_row(transaction.id, &connection)
            .expect("Could not delete transaction");

        assert_eq!(
            get_transaction(transaction.id, &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn delete_row_with_invalid_id_returns_not_found() {
        let connection = get_test_db_connection();

        let result = delete_transaction_row(999999, &connection);

        assert_eq!(result, Err(Error::DeleteMissingTransaction));
    }

    #[test]
    fn delete_for_customer_reports_row_count() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);
        let date = OffsetDateTime::now_utc();
        for amount in [10.0, 20.0, 30.0] {
            insert_transaction(
                customer.id,
                amount,
                "",
                TransactionType::Debt,
                date,
                &connection,
            )
            .unwrap();
        }

        let deleted = delete_transactions_for_customer(customer.id, &connection)
            .expect("Could not delete transactions");

        assert_eq!(deleted, 3);
        assert_eq!(
            get_transactions_for_customer(customer.id, &connection),
            Ok(vec![])
        );
    }
}
