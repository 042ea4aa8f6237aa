//! Turns parsed utterances into ledger entries.
//!
//! This is the consumer of the parser, the customer directory and the ledger:
//! a successful parse is attached to the existing customer with that name
//! (matched case-insensitively) or to a newly created one, and recorded as a
//! transaction. An utterance the parser rejects is a normal non-result; it
//! never becomes an error.

use rusqlite::Connection;

use crate::{
    Error,
    capture::VoiceCapture,
    customer::{Customer, CustomerName, create_customer, find_customer_by_name, get_customer},
    ledger,
    transaction::Transaction,
    utterance::{ParsedTransaction, parse_utterance},
};

/// The outcome of recording one accepted utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceEntry {
    /// The customer the transaction was attached to, with their balance
    /// refreshed after the entry.
    pub customer: Customer,
    /// The transaction that was recorded.
    pub transaction: Transaction,
    /// What the parser extracted from the utterance.
    pub parsed: ParsedTransaction,
}

/// Parse one utterance and, if it is acceptable, record it against the named
/// customer, creating the customer first when no existing record matches the
/// name case-insensitively.
///
/// Returns `Ok(None)` for an utterance the parser rejects.
///
/// # Errors
/// This function will return an error if the customer lookup, creation or the
/// ledger write fails; see [ledger::add_transaction].
pub fn record_utterance(
    text: &str,
    connection: &Connection,
) -> Result<Option<VoiceEntry>, Error> {
    let Some(parsed) = parse_utterance(text) else {
        return Ok(None);
    };

    let customer = match find_customer_by_name(&parsed.customer_name, connection)? {
        Some(existing) => existing,
        None => {
            tracing::info!(
                "creating customer \"{}\" from voice entry",
                parsed.customer_name
            );
            create_customer(CustomerName::new(&parsed.customer_name)?, None, connection)?
        }
    };

    let transaction = ledger::add_transaction(
        customer.id,
        parsed.amount,
        &parsed.description,
        parsed.transaction_type,
        connection,
    )?;

    // Re-fetch so the returned balance reflects the entry just recorded.
    let customer = get_customer(customer.id, connection)?;

    Ok(Some(VoiceEntry {
        customer,
        transaction,
        parsed,
    }))
}

/// Drive one capture session to completion, recording every finalized
/// transcript that parses.
///
/// Interim transcripts and utterances the parser rejects are skipped.
/// `on_entry` is called once per recorded entry; the return value is the
/// number of entries recorded.
///
/// # Errors
/// This function will return an [Error::CaptureUnsupported] or
/// [Error::CaptureError] if the capture collaborator is unavailable or failed
/// mid-session, or any error from recording an entry. A user-initiated stop
/// simply ends the session.
pub fn run_capture_session<F>(
    capture: &mut dyn VoiceCapture,
    language_hint: &str,
    connection: &Connection,
    mut on_entry: F,
) -> Result<u32, Error>
where
    F: FnMut(&VoiceEntry),
{
    let events = capture.start_capture(language_hint)?;
    let mut recorded = 0;

    for event in events {
        if !event.is_final {
            continue;
        }

        if let Some(entry) = record_utterance(&event.text, connection)? {
            on_entry(&entry);
            recorded += 1;
        }
    }

    if let Some(error) = capture.take_error() {
        return Err(error);
    }

    Ok(recorded)
}

// ============================================================================
// TESTS
// ============================================================================
