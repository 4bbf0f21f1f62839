use super::orchestrator::PaymentOrchestrator;
use crate::domain::payment::{PaymentOutcome, PaymentSubmission};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Submissions in flight at once. Zero is treated as one.
    pub concurrency: usize,
    /// Cancels a settlement call still running this long after its submission started.
    pub deadline: Option<Duration>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            deadline: None,
        }
    }
}

/// Runs a stream of submissions through the orchestrator and returns the outcomes in
/// input order.
///
/// Unreadable submissions and submissions whose processing fails (a storage error, a
/// panicked task) are logged and left out; every other outcome is still returned.
pub async fn process_batch<I>(
    orchestrator: Arc<PaymentOrchestrator>,
    submissions: I,
    options: BatchOptions,
) -> Vec<PaymentOutcome>
where
    I: IntoIterator<Item = Result<PaymentSubmission>>,
{
    let permits = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (row, submission) in submissions.into_iter().enumerate() {
        let submission = match submission {
            Ok(submission) => submission,
            Err(e) => {
                error!(row = row + 1, error = %e, "Error reading payment submission");
                continue;
            }
        };

        // The semaphore is never closed.
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let orchestrator = orchestrator.clone();
        tasks.spawn(async move {
            let outcome = process_one(&orchestrator, submission, options.deadline).await;
            drop(permit);
            (row, outcome)
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((row, Ok(outcome))) => outcomes.push((row, outcome)),
            Ok((row, Err(e))) => {
                error!(row = row + 1, error = %e, "Error processing payment");
            }
            Err(e) => error!(error = %e, "Payment task failed"),
        }
    }
    outcomes.sort_by_key(|(row, _)| *row);

    let rejected = outcomes.iter().filter(|(_, o)| o.is_rejected()).count();
    info!(processed = outcomes.len(), rejected, "Payment batch complete");

    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

async fn process_one(
    orchestrator: &PaymentOrchestrator,
    submission: PaymentSubmission,
    deadline: Option<Duration>,
) -> Result<PaymentOutcome> {
    let cancel = CancellationToken::new();
    let work = orchestrator.process_payment(
        submission.request,
        submission.idempotency_key.as_deref(),
        &cancel,
    );
    tokio::pin!(work);

    let Some(deadline) = deadline else {
        return work.await;
    };
    tokio::select! {
        outcome = &mut work => outcome,
        _ = tokio::time::sleep(deadline) => {
            cancel.cancel();
            work.await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{IdempotencyKey, PaymentRecord, PaymentRequest, PaymentStatus};
    use crate::domain::ports::{PaymentStore, SettlementGateway};
    use crate::domain::settlement::{SettlementError, SettlementOutcome, SettlementRequest};
    use crate::error::PaymentError;
    use crate::infrastructure::in_memory::{InMemoryIdempotencyGuard, InMemoryPaymentStore};
    use async_trait::async_trait;
    use chrono::{Datelike, Local};
    use uuid::Uuid;

    /// Authorizes at once, or waits for cancellation when `hang` is set.
    struct StubSettlement {
        hang: bool,
    }

    #[async_trait]
    impl SettlementGateway for StubSettlement {
        async fn authorize(
            &self,
            _request: &SettlementRequest,
            cancel: &CancellationToken,
        ) -> std::result::Result<SettlementOutcome, SettlementError> {
            if self.hang {
                cancel.cancelled().await;
                return Ok(SettlementOutcome::unauthorized());
            }
            Ok(SettlementOutcome {
                authorized: true,
                authorization_code: None,
            })
        }
    }

    /// Refuses to persist payments for one amount.
    struct FailingStore {
        inner: InMemoryPaymentStore,
        failing_amount: i64,
    }

    #[async_trait]
    impl PaymentStore for FailingStore {
        async fn add(&self, key: &IdempotencyKey, payment: PaymentRecord) -> Result<()> {
            if payment.amount == self.failing_amount {
                return Err(PaymentError::InternalError(Box::new(std::io::Error::other(
                    "disk full",
                ))));
            }
            self.inner.add(key, payment).await
        }

        async fn get(&self, id: Uuid) -> Result<Option<PaymentRecord>> {
            self.inner.get(id).await
        }

        async fn find_by_idempotency_key(
            &self,
            key: &IdempotencyKey,
        ) -> Result<Option<PaymentRecord>> {
            self.inner.find_by_idempotency_key(key).await
        }
    }

    fn orchestrator(store: Box<dyn PaymentStore>, hang: bool) -> Arc<PaymentOrchestrator> {
        Arc::new(PaymentOrchestrator::new(
            Box::new(InMemoryIdempotencyGuard::new()),
            store,
            Box::new(StubSettlement { hang }),
        ))
    }

    fn submission(key: &str, amount: i64) -> Result<PaymentSubmission> {
        Ok(PaymentSubmission {
            idempotency_key: Some(key.to_string()),
            request: PaymentRequest {
                card_number: "2222405343248877".to_string(),
                expiry_month: 12,
                expiry_year: Local::now().year() + 2,
                currency: "GBP".to_string(),
                amount,
                cvv: "123".to_string(),
            },
        })
    }

    #[tokio::test]
    async fn test_storage_failure_skips_only_that_row() {
        let store = FailingStore {
            inner: InMemoryPaymentStore::new(),
            failing_amount: 13,
        };
        let engine = orchestrator(Box::new(store), false);

        let outcomes = process_batch(
            engine.clone(),
            vec![submission("a", 100), submission("b", 13), submission("c", 300)],
            BatchOptions::default(),
        )
        .await;

        let amounts: Vec<i64> = outcomes.iter().map(|o| o.payment.amount).collect();
        assert_eq!(amounts, vec![100, 300]);
        for outcome in &outcomes {
            assert_eq!(outcome.payment.status, PaymentStatus::Authorized);
            assert!(engine.get_payment(outcome.payment.id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_unreadable_rows_are_skipped() {
        let engine = orchestrator(Box::new(InMemoryPaymentStore::new()), false);
        let unreadable = Err(PaymentError::ConfigError("bad row".to_string()));

        let outcomes = process_batch(
            engine,
            vec![submission("a", 100), unreadable, submission("a", 200)],
            BatchOptions {
                concurrency: 4,
                deadline: None,
            },
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].payment.amount, 100);
        assert_eq!(outcomes[1].payment.amount, 200);
    }

    #[tokio::test]
    async fn test_deadline_cancels_settlement_and_declines() {
        let engine = orchestrator(Box::new(InMemoryPaymentStore::new()), true);

        let outcomes = process_batch(
            engine.clone(),
            vec![submission("slow", 100)],
            BatchOptions {
                concurrency: 1,
                deadline: Some(Duration::from_millis(50)),
            },
        )
        .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].payment.status, PaymentStatus::Declined);
        assert!(outcomes[0].errors.is_empty());
        assert!(engine.get_payment(outcomes[0].payment.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_deadline_leaves_no_tasks_behind() {
        let engine = orchestrator(Box::new(InMemoryPaymentStore::new()), false);

        let outcomes = process_batch(
            engine,
            vec![submission("a", 100), submission("b", 200)],
            BatchOptions {
                concurrency: 2,
                deadline: Some(Duration::from_secs(3600)),
            },
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        let metrics = tokio::runtime::Handle::current().metrics();
        assert_eq!(metrics.num_alive_tasks(), 0);
    }
}
