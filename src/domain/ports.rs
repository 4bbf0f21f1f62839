use super::payment::{IdempotencyKey, PaymentRecord};
use super::settlement::{SettlementError, SettlementOutcome, SettlementRequest};
use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Reservation ledger for idempotency keys.
///
/// Reservations are permanent: a key that has been reserved once can never be
/// reserved again.
pub trait IdempotencyGuard: Send + Sync {
    /// Atomically reserves `key`. Returns `true` only for the first caller ever to
    /// reserve it; every other call returns `false` and leaves the ledger untouched.
    fn reserve(&self, key: &IdempotencyKey) -> Result<bool>;

    /// Has this key already been reserved?
    fn is_reserved(&self, key: &IdempotencyKey) -> Result<bool>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persists a finalized payment and binds it to the key it was reserved under.
    async fn add(&self, key: &IdempotencyKey, payment: PaymentRecord) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<PaymentRecord>>;
    async fn find_by_idempotency_key(&self, key: &IdempotencyKey)
    -> Result<Option<PaymentRecord>>;
}

#[async_trait]
pub trait SettlementGateway: Send + Sync {
    /// Asks the settlement authority to authorize a payment.
    ///
    /// Declines and unreachable authorities come back as an unauthorized outcome;
    /// `Err` means the call itself faulted.
    async fn authorize(
        &self,
        request: &SettlementRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<SettlementOutcome, SettlementError>;
}

pub type IdempotencyGuardBox = Box<dyn IdempotencyGuard>;
pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type SettlementGatewayBox = Box<dyn SettlementGateway>;
