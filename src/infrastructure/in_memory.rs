use crate::domain::payment::{IdempotencyKey, PaymentRecord};
use crate::domain::ports::{IdempotencyGuard, PaymentStore};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory idempotency ledger.
///
/// Backed by a sharded `DashMap` keyed by the normalized key; `reserve` is a single
/// entry-API insert-if-absent, so concurrent callers with the same key serialize on
/// one shard and exactly one of them wins.
#[derive(Default, Clone)]
pub struct InMemoryIdempotencyGuard {
    keys: Arc<DashMap<String, ()>>,
}

impl InMemoryIdempotencyGuard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdempotencyGuard for InMemoryIdempotencyGuard {
    fn reserve(&self, key: &IdempotencyKey) -> Result<bool> {
        match self.keys.entry(key.normalized().to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(true)
            }
        }
    }

    fn is_reserved(&self, key: &IdempotencyKey) -> Result<bool> {
        Ok(self.keys.contains_key(key.normalized()))
    }
}

#[derive(Default)]
struct PaymentTables {
    by_id: HashMap<Uuid, PaymentRecord>,
    by_key: HashMap<String, Uuid>,
}

/// A thread-safe in-memory payment store.
///
/// Uses `Arc<RwLock<..>>` around an id index and a key index so both are updated
/// under one write lock.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    tables: Arc<RwLock<PaymentTables>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn add(&self, key: &IdempotencyKey, payment: PaymentRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.by_key.insert(key.normalized().to_string(), payment.id);
        tables.by_id.insert(payment.id, payment);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<PaymentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.by_id.get(&id).cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<PaymentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_key
            .get(key.normalized())
            .and_then(|id| tables.by_id.get(id))
            .cloned())
    }
}
