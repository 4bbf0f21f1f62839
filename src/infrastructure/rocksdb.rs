use crate::domain::payment::{IdempotencyKey, PaymentRecord};
use crate::domain::ports::{IdempotencyGuard, PaymentStore};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Column Family for finalized payment records, keyed by payment id.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for idempotency reservations, keyed by normalized key.
///
/// The value is empty while the payment is in flight and holds the payment id once
/// the record has been persisted.
pub const CF_IDEMPOTENCY_KEYS: &str = "idempotency_keys";

/// A persistent payment store and idempotency ledger using RocksDB.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`). RocksDB has
/// no native put-if-absent, so reservations go through a check-and-put guarded by a
/// mutex that every clone shares.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    reservations: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "payments" and "idempotency_keys" column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_payments = ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default());
        let cf_keys = ColumnFamilyDescriptor::new(CF_IDEMPOTENCY_KEYS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_payments, cf_keys])?;

        Ok(Self {
            db: Arc::new(db),
            reservations: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PaymentError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn read_payment(&self, id: Uuid) -> Result<Option<PaymentRecord>> {
        let cf = self.cf(CF_PAYMENTS)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl IdempotencyGuard for RocksDBStore {
    fn reserve(&self, key: &IdempotencyKey) -> Result<bool> {
        let cf = self.cf(CF_IDEMPOTENCY_KEYS)?;
        let _lock = self.reservations.lock().map_err(|_| {
            PaymentError::InternalError(Box::new(std::io::Error::other(
                "idempotency reservation lock poisoned",
            )))
        })?;

        if self.db.get_pinned_cf(cf, key.normalized())?.is_some() {
            return Ok(false);
        }
        self.db.put_cf(cf, key.normalized(), b"")?;
        Ok(true)
    }

    fn is_reserved(&self, key: &IdempotencyKey) -> Result<bool> {
        let cf = self.cf(CF_IDEMPOTENCY_KEYS)?;
        Ok(self.db.get_pinned_cf(cf, key.normalized())?.is_some())
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn add(&self, key: &IdempotencyKey, payment: PaymentRecord) -> Result<()> {
        let payments = self.cf(CF_PAYMENTS)?;
        let keys = self.cf(CF_IDEMPOTENCY_KEYS)?;
        let value = serde_json::to_vec(&payment)?;

        let mut batch = rocksdb::WriteBatch::default();
        batch.put_cf(payments, payment.id.as_bytes(), value);
        batch.put_cf(keys, key.normalized(), payment.id.as_bytes());
        self.db.write(batch)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<PaymentRecord>> {
        self.read_payment(id)
    }

    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<PaymentRecord>> {
        let cf = self.cf(CF_IDEMPOTENCY_KEYS)?;
        let Some(bytes) = self.db.get_cf(cf, key.normalized())? else {
            return Ok(None);
        };
        // Reserved but not yet (or never) finalized.
        let Ok(id) = Uuid::from_slice(&bytes) else {
            return Ok(None);
        };
        self.read_payment(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{PaymentRequest, PaymentStatus};
    use tempfile::tempdir;

    fn key(raw: &str) -> IdempotencyKey {
        IdempotencyKey::parse(Some(raw)).unwrap()
    }

    fn record() -> PaymentRecord {
        let request = PaymentRequest {
            card_number: "2222405343248877".to_string(),
            expiry_month: 4,
            expiry_year: 2030,
            currency: "GBP".to_string(),
            amount: 100,
            cvv: "123".to_string(),
        };
        PaymentRecord::from_request(&request, PaymentStatus::Declined)
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_PAYMENTS).is_some());
        assert!(store.db.cf_handle(CF_IDEMPOTENCY_KEYS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_payment_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let payment = record();

        assert!(store.reserve(&key("k-1")).unwrap());
        store.add(&key("k-1"), payment.clone()).await.unwrap();

        let retrieved = store.get(payment.id).await.unwrap().unwrap();
        assert_eq!(retrieved, payment);
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());

        let by_key = store.find_by_idempotency_key(&key("K-1")).await.unwrap();
        assert_eq!(by_key, Some(payment));
    }

    #[tokio::test]
    async fn test_rocksdb_reservation_without_payment() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        assert!(store.reserve(&key("pending")).unwrap());
        assert!(!store.reserve(&key("PENDING")).unwrap());
        assert!(store.is_reserved(&key("pending")).unwrap());
        assert!(
            store
                .find_by_idempotency_key(&key("pending"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_rocksdb_reservations_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            assert!(store.reserve(&key("durable")).unwrap());
        }
        let store = RocksDBStore::open(dir.path()).unwrap();
        assert!(!store.reserve(&key("durable")).unwrap());
    }

    #[test]
    fn test_rocksdb_concurrent_reserve_has_single_winner() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.reserve(&key("shared")).unwrap())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
