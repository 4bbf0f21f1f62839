use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A card payment as submitted by a merchant.
///
/// Numeric fields are signed and strings are unconstrained so that malformed input
/// survives deserialization and is reported by the validator instead.
#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub struct PaymentRequest {
    pub card_number: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
    pub currency: String,
    /// Amount in the smallest currency unit.
    pub amount: i64,
    pub cvv: String,
}

impl fmt::Debug for PaymentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentRequest")
            .field("card_number_last_four", &card_last_four(&self.card_number))
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("currency", &self.currency)
            .field("amount", &self.amount)
            .field("cvv", &"***")
            .finish()
    }
}

/// A payment request together with the idempotency key it was submitted under.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSubmission {
    /// `None` when the caller sent no key.
    pub idempotency_key: Option<String>,
    pub request: PaymentRequest,
}

/// Caller-supplied token that makes a payment submission idempotent.
///
/// Keys compare case-insensitively: `normalized()` is the form every guard and store
/// uses for lookups, and equality and hashing only look at that form.
#[derive(Debug, Clone)]
pub struct IdempotencyKey {
    raw: String,
    normalized: String,
}

impl IdempotencyKey {
    /// Returns `None` for a missing, empty or whitespace-only key.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw?;
        if raw.trim().is_empty() {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            normalized: raw.to_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl PartialEq for IdempotencyKey {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for IdempotencyKey {}

impl Hash for IdempotencyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum PaymentStatus {
    Authorized,
    Declined,
    Rejected,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentStatus::Authorized => "Authorized",
            PaymentStatus::Declined => "Declined",
            PaymentStatus::Rejected => "Rejected",
        };
        f.write_str(label)
    }
}

/// The only card data kept after processing is the last four digits.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub status: PaymentStatus,
    pub card_number_last_four: u16,
    pub expiry_month: i32,
    pub expiry_year: i32,
    pub currency: String,
    pub amount: i64,
}

impl PaymentRecord {
    /// Builds a record with a fresh identifier from the submitted request.
    pub fn from_request(request: &PaymentRequest, status: PaymentStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            status,
            card_number_last_four: card_last_four(&request.card_number),
            expiry_month: request.expiry_month,
            expiry_year: request.expiry_year,
            currency: request.currency.clone(),
            amount: request.amount,
        }
    }

    pub fn rejected(request: &PaymentRequest) -> Self {
        Self::from_request(request, PaymentStatus::Rejected)
    }
}

/// Result of a create-payment call: a fully formed record plus any error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub payment: PaymentRecord,
    pub errors: Vec<String>,
}

impl PaymentOutcome {
    pub fn accepted(payment: PaymentRecord) -> Self {
        Self {
            payment,
            errors: Vec::new(),
        }
    }

    pub fn rejected(request: &PaymentRequest, errors: Vec<String>) -> Self {
        Self {
            payment: PaymentRecord::rejected(request),
            errors,
        }
    }

    pub fn is_rejected(&self) -> bool {
        !self.errors.is_empty() || self.payment.status == PaymentStatus::Rejected
    }
}

/// Last four characters of the card number read as a number, or 0 when that is not
/// possible.
pub fn card_last_four(card_number: &str) -> u16 {
    if card_number.trim().is_empty() {
        return 0;
    }
    let chars: Vec<char> = card_number.chars().collect();
    if chars.len() < 4 {
        return 0;
    }
    let tail = &chars[chars.len() - 4..];
    if !tail.iter().all(char::is_ascii_digit) {
        return 0;
    }
    tail.iter().collect::<String>().parse().unwrap_or(0)
}
