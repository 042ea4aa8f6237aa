//! The command line client for the khata ledger.

use std::{
    io::BufRead,
    path::PathBuf,
    process::ExitCode,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, channel},
    },
    thread,
};

use clap::{Parser, Subcommand};
use numfmt::{Formatter, Precision};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use khata::{
    Error, TransactionType,
    capture::{TranscriptEvent, VoiceCapture},
    customer::{self, CustomerName},
    database_id::{CustomerId, TransactionId},
    db::initialize,
    ledger, summary,
    transaction::get_transactions_for_customer,
    utterance::parse_utterance,
    voice_entry::{self, VoiceEntry},
};

/// A digital udhaar khata: track what each customer owes, record debts and
/// payments, and dictate entries in Telugu or English.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the ledger SQLite database.
    #[arg(long, default_value = "khata.db")]
    db_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all customers with their balances, newest first.
    Customers,

    /// Add a customer.
    AddCustomer {
        /// The customer's display name.
        name: String,

        /// An optional contact phone number.
        #[arg(long)]
        phone: Option<String>,
    },

    /// Change a customer's name and phone number.
    EditCustomer {
        /// The ID of the customer to edit.
        id: CustomerId,

        /// The new display name.
        name: String,

        /// The new phone number; omit to clear it.
        #[arg(long)]
        phone: Option<String>,
    },

    /// Delete a customer and their entire transaction history.
    RemoveCustomer {
        /// The ID of the customer to delete.
        id: CustomerId,
    },

    /// Show a customer's balance and transaction history.
    History {
        /// The ID of the customer.
        id: CustomerId,
    },

    /// Record a debt or payment for a customer.
    Add {
        /// The ID of the customer.
        customer_id: CustomerId,

        /// The amount, always positive; the type carries the direction.
        amount: f64,

        /// Whether the entry is a debt or a payment.
        #[arg(long, default_value = "debt")]
        r#type: TransactionType,

        /// What was bought, or payment details.
        #[arg(long, default_value = "")]
        items: String,
    },

    /// Delete a single transaction and undo its effect on the balance.
    RemoveTransaction {
        /// The ID of the transaction to delete.
        id: TransactionId,
    },

    /// Delete a customer's entire history and reset their balance to zero.
    Clear {
        /// The ID of the customer.
        customer_id: CustomerId,
    },

    /// Parse an utterance and show what would be recorded, without recording.
    Parse {
        /// The utterance, e.g. "Ram 500 rupees groceries bought".
        text: String,

        /// Print the parse result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Parse an utterance and record it against the named customer.
    Say {
        /// The utterance, e.g. "సీత 200 రూపాయలు చెల్లించింది".
        text: String,
    },

    /// Record dictated entries from stdin, one utterance per line.
    Listen,

    /// Show the headline figures for the whole ledger.
    Summary,
}

fn main() -> ExitCode {
    setup_logging();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<(), Error> {
    let connection = Connection::open(&args.db_path)?;
    initialize(&connection)?;

    match args.command {
        Command::Customers => {
            for customer in customer::get_all_customers(&connection)? {
                let phone = customer.phone.as_deref().unwrap_or("-");
                println!(
                    "#{:<4} {:<24} {:<14} {}",
                    customer.id,
                    customer.name,
                    phone,
                    currency(customer.total_debt)
                );
            }
        }
        Command::AddCustomer { name, phone } => {
            let customer =
                customer::create_customer(CustomerName::new(&name)?, phone, &connection)?;
            println!("Added customer #{} {}", customer.id, customer.name);
        }
        Command::EditCustomer { id, name, phone } => {
            customer::update_customer(id, CustomerName::new(&name)?, phone, &connection)?;
            println!("Updated customer #{id}");
        }
        Command::RemoveCustomer { id } => {
            ledger::delete_customer(id, &connection)?;
            println!("Removed customer #{id} and their transactions");
        }
        Command::History { id } => {
            let customer = customer::get_customer(id, &connection)?;
            println!(
                "{} owes {}",
                customer.name,
                currency(customer.total_debt)
            );
            for transaction in get_transactions_for_customer(id, &connection)? {
                println!(
                    "#{:<4} {} {:<8} {:>12}  {}",
                    transaction.id,
                    transaction.date,
                    transaction.transaction_type,
                    currency(transaction.amount),
                    transaction.items
                );
            }
        }
        Command::Add {
            customer_id,
            amount,
            r#type,
            items,
        } => {
            let transaction =
                ledger::add_transaction(customer_id, amount, &items, r#type, &connection)?;
            let customer = customer::get_customer(customer_id, &connection)?;
            println!(
                "Recorded {} of {} for {}; they now owe {}",
                transaction.transaction_type,
                currency(transaction.amount),
                customer.name,
                currency(customer.total_debt)
            );
        }
        Command::RemoveTransaction { id } => {
            ledger::delete_transaction(id, &connection)?;
            println!("Removed transaction #{id}");
        }
        Command::Clear { customer_id } => {
            ledger::delete_all_transactions(customer_id, &connection)?;
            println!("Cleared all transactions for customer #{customer_id}");
        }
        Command::Parse { text, json } => match parse_utterance(&text) {
            Some(parsed) if json => {
                let output = serde_json::to_string_pretty(&parsed)
                    .expect("Could not serialize parse result");
                println!("{output}");
            }
            Some(parsed) => {
                println!("Customer:    {}", parsed.customer_name);
                println!("Amount:      {}", currency(parsed.amount));
                println!("Type:        {}", parsed.transaction_type);
                println!("Description: {}", parsed.description);
                println!("Heard as:    {}", parsed.translated_text);
            }
            None => println!("Could not make a transaction out of that."),
        },
        Command::Say { text } => match voice_entry::record_utterance(&text, &connection)? {
            Some(entry) => print_entry(&entry),
            None => println!("Could not make a transaction out of that."),
        },
        Command::Listen => {
            let mut capture = StdinCapture::default();
            let recorded = voice_entry::run_capture_session(
                &mut capture,
                "te-IN",
                &connection,
                print_entry,
            )?;
            println!("Recorded {recorded} entries.");
        }
        Command::Summary => {
            let summary = summary::get_summary(&connection)?;
            println!("Total outstanding: {}", currency(summary.total_outstanding));
            println!(
                "Active customers:  {} of {}",
                summary.active_customers, summary.customer_count
            );
        }
    }

    Ok(())
}

fn print_entry(entry: &VoiceEntry) {
    let direction = match entry.transaction.transaction_type {
        TransactionType::Debt => "Debt",
        TransactionType::Payment => "Payment",
    };
    println!(
        "{} of {} recorded for {}; they now owe {}",
        direction,
        currency(entry.transaction.amount),
        entry.customer.name,
        currency(entry.customer.total_debt)
    );
}

fn currency(number: f64) -> String {
    static POSITIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let positive_fmt = POSITIVE_FMT.get_or_init(|| {
        Formatter::currency("₹")
            .unwrap()
            .precision(Precision::Decimals(2))
    });

    static NEGATIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let negative_fmt = NEGATIVE_FMT.get_or_init(|| {
        Formatter::currency("-₹")
            .unwrap()
            .precision(Precision::Decimals(2))
    });

    let mut formatted_string = if number < 0.0 {
        negative_fmt.fmt_string(number.abs())
    } else if number > 0.0 {
        positive_fmt.fmt_string(number)
    } else {
        // Zero is hardcoded as "0", so we must specify the formatted string for zero
        "₹0.00".to_owned()
    };

    // numfmt omits the last trailing zero, so we must add it ourselves
    // For example, "12.30" is rendered as "12.3" so we append "0".
    if formatted_string.as_bytes()[formatted_string.len() - 3] != b'.' {
        formatted_string = format!("{formatted_string}0");
    }

    formatted_string
}

/// A capture collaborator that treats each line typed on stdin as one
/// finalized transcript. The stream ends at end-of-file.
#[derive(Default)]
struct StdinCapture {
    stop_flag: Option<Arc<AtomicBool>>,
}

impl VoiceCapture for StdinCapture {
    fn is_available(&self) -> bool {
        true
    }

    fn start_capture(&mut self, _language_hint: &str) -> Result<Receiver<TranscriptEvent>, Error> {
        // Only one session at a time.
        self.stop();

        let stop_flag = Arc::new(AtomicBool::new(false));
        self.stop_flag = Some(stop_flag.clone());
        let (sender, receiver) = channel();

        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if sender.send(TranscriptEvent::finalized(line)).is_err() {
                    break;
                }
            }
        });

        Ok(receiver)
    }

    fn stop(&mut self) {
        if let Some(stop_flag) = self.stop_flag.take() {
            stop_flag.store(true, Ordering::Relaxed);
        }
    }
}
