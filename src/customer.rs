//! This file defines the `Customer` type, the types needed to create a
//! customer and the database functions for the customer directory.
//!
//! A customer is the owner of a ledger: their `total_debt` balance is kept in
//! lockstep with their transaction log by the functions in [crate::ledger].

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, database_id::CustomerId};

/// The name of a customer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CustomerName(String);

impl CustomerName {
    /// Create a customer name.
    ///
    /// Leading and trailing whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCustomerName] if `name` is
    /// an empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCustomerName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a customer name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`,
    /// because if the non-empty invariant is violated it will cause incorrect
    /// behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CustomerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CustomerName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CustomerName::new(s)
    }
}

impl Display for CustomerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A customer of the shop and the running balance of their ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// The ID of the customer.
    pub id: CustomerId,
    /// The customer's display name.
    pub name: CustomerName,
    /// An optional contact phone number.
    pub phone: Option<String>,
    /// The customer's outstanding balance.
    ///
    /// Positive means the customer owes the shop money; zero or negative
    /// means they are paid up or overpaid. Always equal to the signed sum of
    /// the customer's transactions.
    pub total_debt: f64,
    /// When the customer record was created. Immutable.
    pub created_at: OffsetDateTime,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a customer in the database with a zero balance.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_customer(
    name: CustomerName,
    phone: Option<String>,
    connection: &Connection,
) -> Result<Customer, Error> {
    let created_at = OffsetDateTime::now_utc();

    let customer = connection
        .prepare(
            "INSERT INTO customer (name, phone, total_debt, created_at)
             VALUES (?1, ?2, 0, ?3)
             RETURNING id, name, phone, total_debt, created_at",
        )?
        .query_row((name.as_ref(), &phone, &created_at), map_customer_row)?;

    Ok(customer)
}

/// Retrieve a customer from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid customer,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_customer(id: CustomerId, connection: &Connection) -> Result<Customer, Error> {
    let customer = connection
        .prepare(
            "SELECT id, name, phone, total_debt, created_at FROM customer WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_customer_row)?;

    Ok(customer)
}

/// Retrieve the customer whose name matches `name`, ignoring letter case.
///
/// The match is exact apart from case and surrounding whitespace. Voice entry
/// uses this to attach repeated mentions of the same person to one customer
/// record instead of creating duplicates.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn find_customer_by_name(
    name: &str,
    connection: &Connection,
) -> Result<Option<Customer>, Error> {
    let name = name.trim();
    let result = connection
        .prepare(
            "SELECT id, name, phone, total_debt, created_at FROM customer
             WHERE name = :name COLLATE NOCASE",
        )?
        .query_row(&[(":name", &name)], map_customer_row);

    match result {
        Ok(customer) => Ok(Some(customer)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Retrieve all customers, most recently created first.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_customers(connection: &Connection) -> Result<Vec<Customer>, Error> {
    connection
        .prepare(
            "SELECT id, name, phone, total_debt, created_at FROM customer
             ORDER BY created_at DESC, id DESC",
        )?
        .query_map([], map_customer_row)?
        .map(|maybe_customer| maybe_customer.map_err(|error| error.into()))
        .collect()
}

/// Update a customer's name and phone number in the database.
///
/// The customer's balance and creation time are never touched by this
/// function; the balance only moves in lockstep with the transaction log.
///
/// # Errors
/// This function will return an error if there is an SQL error or if the
/// customer doesn't exist.
pub fn update_customer(
    id: CustomerId,
    name: CustomerName,
    phone: Option<String>,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE customer SET name = ?1, phone = ?2 WHERE id = ?3",
        (name.as_ref(), &phone, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingCustomer);
    }

    Ok(())
}

/// Create the customer table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_customer_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS customer (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            phone TEXT,
            total_debt REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_customer_name ON customer(name);",
    )?;

    Ok(())
}

/// Map a database row to a Customer.
pub fn map_customer_row(row: &Row) -> Result<Customer, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let name = CustomerName::new_unchecked(&raw_name);
    let phone = row.get(2)?;
    let total_debt = row.get(3)?;
    let created_at = row.get(4)?;

    Ok(Customer {
        id,
        name,
        phone,
        total_debt,
        created_at,
    })
}

// ============================================================================
// TESTS
// ============================================================================
