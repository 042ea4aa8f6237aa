//! The ledger operations that keep each customer's running balance consistent
//! with their transaction log.
//!
//! Every operation in this module is a compound change (a log row plus a
//! balance adjustment) and executes inside a single SQL transaction, so the
//! balance can never be observed out of step with the log, even when an
//! operation fails partway. The balance adjustment is a relative
//! `UPDATE ... SET total_debt = total_debt + ?` rather than a client-side
//! read-modify-write, which also closes the lost-update race between
//! concurrent writers on the same customer.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{CustomerId, TransactionId},
    transaction::{
        Transaction, TransactionType, delete_transaction_row, delete_transactions_for_customer,
        get_transaction, insert_transaction,
    },
};

/// Record a transaction against a customer and move their balance by the
/// signed amount.
///
/// The transaction is dated now (UTC). A `Debt` raises `total_debt` by
/// `amount`; a `Payment` lowers it. Balances may go negative (an overpaying
/// customer is in credit).
///
/// Returns the created transaction; callers that need the customer's
/// refreshed balance should re-fetch the customer row.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if `amount` is not strictly positive,
/// - [Error::NotFound] if `customer_id` does not refer to a real customer,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn add_transaction(
    customer_id: CustomerId,
    amount: f64,
    items: &str,
    transaction_type: TransactionType,
    connection: &Connection,
) -> Result<Transaction, Error> {
    // Written this way round so NaN is rejected too.
    if !(amount > 0.0) {
        return Err(Error::InvalidAmount(amount));
    }

    let sql_transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let rows_affected = sql_transaction.execute(
        "UPDATE customer SET total_debt = total_debt + ?1 WHERE id = ?2",
        (transaction_type.signed_amount(amount), customer_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    let transaction = insert_transaction(
        customer_id,
        amount,
        items,
        transaction_type,
        OffsetDateTime::now_utc(),
        &sql_transaction,
    )?;

    sql_transaction.commit()?;

    Ok(transaction)
}

/// Remove a transaction from the log and undo its effect on the owning
/// customer's balance.
///
/// The transaction's amount and type are re-fetched from the database rather
/// than trusted from the caller, so a stale view of the log cannot corrupt
/// the balance.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingTransaction] if `transaction_id` is unknown,
/// - [Error::NotFound] if the owning customer is missing,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let sql_transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let transaction = match get_transaction(transaction_id, &sql_transaction) {
        Ok(transaction) => transaction,
        Err(Error::NotFound) => return Err(Error::DeleteMissingTransaction),
        Err(error) => return Err(error),
    };

    let rows_affected = sql_transaction.execute(
        "UPDATE customer SET total_debt = total_debt + ?1 WHERE id = ?2",
        (-transaction.signed_amount(), transaction.customer_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    delete_transaction_row(transaction_id, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok(())
}

/// Remove every transaction for a customer and reset their balance to zero.
///
/// The balance is reset, not recomputed: an empty log means a zero balance by
/// definition.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `customer_id` does not refer to a real customer,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_all_transactions(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<(), Error> {
    let sql_transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let rows_affected = sql_transaction.execute(
        "UPDATE customer SET total_debt = 0 WHERE id = ?1",
        [customer_id],
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    delete_transactions_for_customer(customer_id, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok(())
}

/// Remove a customer and every transaction they own.
///
/// The cascade is explicit: the log rows go first, then the customer row, in
/// one SQL transaction, so no orphaned transactions can remain.
///
/// # Errors
/// This function will return an error if there is an SQL error or if the
/// customer doesn't exist.
pub fn delete_customer(customer_id: CustomerId, connection: &Connection) -> Result<(), Error> {
    let sql_transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    delete_transactions_for_customer(customer_id, &sql_transaction)?;

    let rows_affected =
        sql_transaction.execute("DELETE FROM customer WHERE id = ?1", [customer_id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingCustomer);
    }

    sql_transaction.commit()?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod ledger_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        customer::{Customer, CustomerName, create_customer, get_customer},
        db::initialize,
        ledger::{
            add_transaction, delete_all_transactions, delete_customer, delete_transaction,
        },
        transaction::{TransactionType, get_transaction, get_transactions_for_customer},
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    fn create_test_customer(connection: &Connection) -> Customer {
        create_customer(CustomerName::new_unchecked("Ram"), None, connection)
            .expect("Could not create test customer")
    }

    /// The one correctness property that matters: the stored balance equals
    /// the signed sum over the remaining log.
    fn assert_balance_matches_log(customer_id: i64, connection: &Connection) {
        let customer = get_customer(customer_id, connection).expect("Could not get customer");
        let signed_sum: f64 = get_transactions_for_customer(customer_id, connection)
            .expect("Could not list transactions")
            .iter()
            .map(|transaction| transaction.signed_amount())
            .sum();

        assert_eq!(customer.total_debt, signed_sum);
    }

    #[test]
    fn add_debt_raises_balance() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);

        let transaction =
            add_transaction(customer.id, 500.0, "Groceries", TransactionType::Debt, &connection)
                .expect("Could not add transaction");

        assert_eq!(transaction.amount, 500.0);
        assert_eq!(transaction.transaction_type, TransactionType::Debt);
        assert_eq!(
            get_customer(customer.id, &connection).unwrap().total_debt,
            500.0
        );
        assert_balance_matches_log(customer.id, &connection);
    }

    #[test]
    fn add_payment_lowers_balance() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);
        add_transaction(customer.id, 500.0, "", TransactionType::Debt, &connection).unwrap();

        add_transaction(
            customer.id,
            200.0,
            "Cash",
            TransactionType::Payment,
            &connection,
        )
        .expect("Could not add payment");

        assert_eq!(
            get_customer(customer.id, &connection).unwrap().total_debt,
            300.0
        );
        assert_balance_matches_log(customer.id, &connection);
    }

    #[test]
    fn overpayment_goes_negative() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);

        add_transaction(customer.id, 200.0, "", TransactionType::Payment, &connection)
            .expect("Could not add payment");

        assert_eq!(
            get_customer(customer.id, &connection).unwrap().total_debt,
            -200.0
        );
        assert_balance_matches_log(customer.id, &connection);
    }

    #[test]
    fn balance_matches_log_after_every_step_of_a_mixed_sequence() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);

        let first =
            add_transaction(customer.id, 100.0, "", TransactionType::Debt, &connection).unwrap();
        assert_balance_matches_log(customer.id, &connection);

        add_transaction(customer.id, 40.0, "", TransactionType::Payment, &connection).unwrap();
        assert_balance_matches_log(customer.id, &connection);

        add_transaction(customer.id, 75.5, "", TransactionType::Debt, &connection).unwrap();
        assert_balance_matches_log(customer.id, &connection);

        delete_transaction(first.id, &connection).unwrap();
        assert_balance_matches_log(customer.id, &connection);

        delete_all_transactions(customer.id, &connection).unwrap();
        assert_balance_matches_log(customer.id, &connection);
    }

    #[test]
    fn add_fails_on_zero_amount() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);

        let result =
            add_transaction(customer.id, 0.0, "", TransactionType::Debt, &connection);

        assert_eq!(result, Err(Error::InvalidAmount(0.0)));
    }

    #[test]
    fn add_fails_on_negative_amount() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);

        let result =
            add_transaction(customer.id, -12.5, "", TransactionType::Debt, &connection);

        assert_eq!(result, Err(Error::InvalidAmount(-12.5)));
    }

    #[test]
    fn add_fails_on_nan_amount() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);

        let result =
            add_transaction(customer.id, f64::NAN, "", TransactionType::Debt, &connection);

        assert!(matches!(result, Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn add_fails_for_unknown_customer() {
        let connection = get_test_db_connection();

        let result = add_transaction(1337, 100.0, "", TransactionType::Debt, &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn failed_add_leaves_no_partial_state() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);

        let result = add_transaction(1337, 100.0, "", TransactionType::Debt, &connection);

        assert_eq!(result, Err(Error::NotFound));
        assert_eq!(
            get_transactions_for_customer(customer.id, &connection),
            Ok(vec![])
        );
        assert_balance_matches_log(customer.id, &connection);
    }

    #[test]
    fn delete_undoes_add() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);
        add_transaction(customer.id, 50.0, "", TransactionType::Debt, &connection).unwrap();
        let balance_before = get_customer(customer.id, &connection).unwrap().total_debt;

        let transaction =
            add_transaction(customer.id, 100.0, "x", TransactionType::Debt, &connection).unwrap();
        delete_transaction(transaction.id, &connection).expect("Could not delete transaction");

        assert_eq!(
            get_customer(customer.id, &connection).unwrap().total_debt,
            balance_before
        );
        assert_eq!(
            get_transaction(transaction.id, &connection),
            Err(Error::NotFound)
        );
        assert_balance_matches_log(customer.id, &connection);
    }

    #[test]
    fn delete_undoes_payment() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);
        let payment =
            add_transaction(customer.id, 80.0, "", TransactionType::Payment, &connection)
                .unwrap();

        delete_transaction(payment.id, &connection).expect("Could not delete transaction");

        assert_eq!(
            get_customer(customer.id, &connection).unwrap().total_debt,
            0.0
        );
        assert_balance_matches_log(customer.id, &connection);
    }

    #[test]
    fn delete_with_invalid_id_returns_not_found() {
        let connection = get_test_db_connection();

        let result = delete_transaction(999999, &connection);

        assert_eq!(result, Err(Error::DeleteMissingTransaction));
    }

    #[test]
    fn bulk_delete_resets_balance_to_zero() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);
        add_transaction(customer.id, 100.0, "", TransactionType::Debt, &connection).unwrap();
        add_transaction(customer.id, 30.0, "", TransactionType::Payment, &connection).unwrap();
        add_transaction(customer.id, 9.99, "", TransactionType::Debt, &connection).unwrap();

        delete_all_transactions(customer.id, &connection)
            .expect("Could not delete all transactions");

        assert_eq!(
            get_customer(customer.id, &connection).unwrap().total_debt,
            0.0
        );
        assert_eq!(
            get_transactions_for_customer(customer.id, &connection),
            Ok(vec![])
        );
    }

    #[test]
    fn bulk_delete_for_unknown_customer_returns_not_found() {
        let connection = get_test_db_connection();

        let result = delete_all_transactions(1337, &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn delete_customer_cascades_to_transactions() {
        let connection = get_test_db_connection();
        let customer = create_test_customer(&connection);
        let kept_customer =
            create_customer(CustomerName::new_unchecked("Sita"), None, &connection)
                .expect("Could not create test customer");
        let doomed =
            add_transaction(customer.id, 100.0, "", TransactionType::Debt, &connection).unwrap();
        let kept =
            add_transaction(kept_customer.id, 55.0, "", TransactionType::Debt, &connection)
                .unwrap();

        delete_customer(customer.id, &connection).expect("Could not delete customer");

        assert_eq!(get_customer(customer.id, &connection), Err(Error::NotFound));
        assert_eq!(get_transaction(doomed.id, &connection), Err(Error::NotFound));
        assert_eq!(
            get_transactions_for_customer(customer.id, &connection),
            Ok(vec![])
        );
        // Unrelated ledgers are untouched.
        assert_eq!(get_transaction(kept.id, &connection), Ok(kept.clone()));
        assert_balance_matches_log(kept_customer.id, &connection);
    }

    #[test]
    fn delete_missing_customer_returns_not_found() {
        let connection = get_test_db_connection();

        let result = delete_customer(1337, &connection);

        assert_eq!(result, Err(Error::DeleteMissingCustomer));
    }
}
