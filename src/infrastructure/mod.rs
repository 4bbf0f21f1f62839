//! Adapters behind the domain ports: payment stores, idempotency ledgers and the HTTP
//! settlement client.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod settlement_client;
