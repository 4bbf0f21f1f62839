use super::payment::PaymentRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Authorization request sent to the settlement authority.
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SettlementRequest {
    pub card_number: String,
    /// `"{month}/{year}"` without zero padding.
    pub expiry_date: String,
    pub currency: String,
    pub amount: i64,
    pub cvv: String,
}

impl From<&PaymentRequest> for SettlementRequest {
    fn from(request: &PaymentRequest) -> Self {
        Self {
            card_number: request.card_number.clone(),
            expiry_date: format!("{}/{}", request.expiry_month, request.expiry_year),
            currency: request.currency.clone(),
            amount: request.amount,
            cvv: request.cvv.clone(),
        }
    }
}

impl fmt::Debug for SettlementRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlementRequest")
            .field("expiry_date", &self.expiry_date)
            .field("currency", &self.currency)
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

/// Response body returned by the settlement authority.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SettlementResponse {
    pub authorized: bool,
    #[serde(default)]
    pub authorization_code: Option<String>,
}

/// Two-valued authorization decision handed back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettlementOutcome {
    pub authorized: bool,
    pub authorization_code: Option<String>,
}

impl SettlementOutcome {
    pub fn unauthorized() -> Self {
        Self::default()
    }
}

impl From<SettlementResponse> for SettlementOutcome {
    fn from(response: SettlementResponse) -> Self {
        Self {
            authorized: response.authorized,
            authorization_code: response.authorization_code,
        }
    }
}

/// A fault raised outside the settlement client's handled failure paths.
///
/// Declines, timeouts and unreachable authorities are not faults: they are reported
/// as an unauthorized [`SettlementOutcome`].
#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("failed to encode settlement request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("settlement client fault: {0}")]
    Client(String),
}
