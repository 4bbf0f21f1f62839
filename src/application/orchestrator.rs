use crate::domain::payment::{
    IdempotencyKey, PaymentOutcome, PaymentRecord, PaymentRequest, PaymentStatus,
};
use crate::domain::ports::{IdempotencyGuardBox, PaymentStoreBox, SettlementGatewayBox};
use crate::domain::settlement::SettlementRequest;
use crate::domain::validation;
use crate::error::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const MISSING_IDEMPOTENCY_KEY: &str = "Idempotency-Key header is required for payment requests";
pub const DUPLICATE_IDEMPOTENCY_KEY: &str =
    "Idempotency-Key header already used for a previous payment";
pub const BANK_SERVICE_ERROR: &str = "Bank service error";

/// The main entry point for processing card payments.
///
/// `PaymentOrchestrator` runs each submission through a fixed sequence of gates:
/// idempotency key presence, key reservation, field validation, then authorization
/// with the settlement authority. Rejections stop at the first failing gate and are
/// never persisted; authorized and declined payments always are.
///
/// The orchestrator is `Send + Sync`; share it behind an `Arc` to serve concurrent
/// submissions.
pub struct PaymentOrchestrator {
    guard: IdempotencyGuardBox,
    store: PaymentStoreBox,
    settlement: SettlementGatewayBox,
}

impl PaymentOrchestrator {
    /// Creates a new `PaymentOrchestrator` instance.
    ///
    /// # Arguments
    ///
    /// * `guard` - The ledger of reserved idempotency keys.
    /// * `store` - The store for finalized payments.
    /// * `settlement` - The client for the settlement authority.
    pub fn new(
        guard: IdempotencyGuardBox,
        store: PaymentStoreBox,
        settlement: SettlementGatewayBox,
    ) -> Self {
        Self {
            guard,
            store,
            settlement,
        }
    }

    /// Processes one payment submission.
    ///
    /// Business failures come back as a `Rejected` outcome carrying error messages;
    /// `Err` is reserved for storage failures. `cancel` only reaches the settlement
    /// call, and a cancelled call resolves to `Declined`.
    pub async fn process_payment(
        &self,
        request: PaymentRequest,
        idempotency_key: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<PaymentOutcome> {
        let Some(key) = IdempotencyKey::parse(idempotency_key) else {
            warn!("Payment rejected: missing idempotency key");
            return Ok(PaymentOutcome::rejected(
                &request,
                vec![MISSING_IDEMPOTENCY_KEY.to_string()],
            ));
        };

        // Reserve before validating so a reused key is always reported as a duplicate.
        if !self.guard.reserve(&key)? {
            warn!(idempotency_key = %key, "Payment rejected: idempotency key already used");
            return Ok(PaymentOutcome::rejected(
                &request,
                vec![DUPLICATE_IDEMPOTENCY_KEY.to_string()],
            ));
        }

        let errors = validation::validate(&request);
        if !errors.is_empty() {
            warn!(
                idempotency_key = %key,
                error_count = errors.len(),
                "Payment rejected: validation failed"
            );
            return Ok(PaymentOutcome::rejected(&request, errors));
        }

        let settlement_request = SettlementRequest::from(&request);
        let outcome = match self.settlement.authorize(&settlement_request, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(idempotency_key = %key, error = %e, "Error processing payment");
                return Ok(PaymentOutcome::rejected(
                    &request,
                    vec![BANK_SERVICE_ERROR.to_string()],
                ));
            }
        };

        let status = if outcome.authorized {
            PaymentStatus::Authorized
        } else {
            PaymentStatus::Declined
        };
        let payment = PaymentRecord::from_request(&request, status);
        self.store.add(&key, payment.clone()).await?;

        info!(
            payment_id = %payment.id,
            idempotency_key = %key,
            status = %payment.status,
            amount = payment.amount,
            currency = %payment.currency,
            "Payment processed"
        );
        Ok(PaymentOutcome::accepted(payment))
    }

    /// Looks up a finalized payment. `None` means not found.
    pub async fn get_payment(&self, id: Uuid) -> Result<Option<PaymentRecord>> {
        self.store.get(id).await
    }

    /// Looks up the payment finalized under `idempotency_key`, if any.
    pub async fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<PaymentRecord>> {
        match IdempotencyKey::parse(Some(idempotency_key)) {
            Some(key) => self.store.find_by_idempotency_key(&key).await,
            None => Ok(None),
        }
    }
}
