use crate::domain::payment::{PaymentOutcome, PaymentStatus};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;
use uuid::Uuid;

#[derive(Serialize)]
struct OutcomeRow<'a> {
    id: Uuid,
    status: PaymentStatus,
    card_number_last_four: u16,
    expiry_month: i32,
    expiry_year: i32,
    currency: &'a str,
    amount: i64,
    errors: String,
}

impl<'a> From<&'a PaymentOutcome> for OutcomeRow<'a> {
    fn from(outcome: &'a PaymentOutcome) -> Self {
        let payment = &outcome.payment;
        Self {
            id: payment.id,
            status: payment.status,
            card_number_last_four: payment.card_number_last_four,
            expiry_month: payment.expiry_month,
            expiry_year: payment.expiry_year,
            currency: &payment.currency,
            amount: payment.amount,
            errors: outcome.errors.join("; "),
        }
    }
}

/// Writes payment outcomes as CSV, one row per submission.
pub struct OutcomeWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OutcomeWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_outcomes<'a, I>(&mut self, outcomes: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a PaymentOutcome>,
    {
        for outcome in outcomes {
            self.writer.serialize(OutcomeRow::from(outcome))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
