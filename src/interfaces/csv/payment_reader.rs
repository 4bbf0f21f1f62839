use crate::domain::payment::{PaymentRequest, PaymentSubmission};
use crate::error::{PaymentError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Deserialize)]
struct SubmissionRow {
    idempotency_key: Option<String>,
    card_number: String,
    expiry_month: i32,
    expiry_year: i32,
    currency: String,
    amount: i64,
    cvv: String,
}

impl From<SubmissionRow> for PaymentSubmission {
    fn from(row: SubmissionRow) -> Self {
        Self {
            idempotency_key: row.idempotency_key,
            request: PaymentRequest {
                card_number: row.card_number,
                expiry_month: row.expiry_month,
                expiry_year: row.expiry_year,
                currency: row.currency,
                amount: row.amount,
                cvv: row.cvv,
            },
        }
    }
}

/// Reads payment submissions from a CSV source.
///
/// Expects the header
/// `idempotency_key,card_number,expiry_month,expiry_year,currency,amount,cvv` and trims
/// whitespace around every field.
pub struct PaymentReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PaymentReader<R> {
    /// Creates a new `PaymentReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes submissions.
    pub fn submissions(self) -> impl Iterator<Item = Result<PaymentSubmission>> {
        self.reader
            .into_deserialize::<SubmissionRow>()
            .map(|result| result.map(PaymentSubmission::from).map_err(PaymentError::from))
    }
}
