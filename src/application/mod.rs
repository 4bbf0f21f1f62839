//! Application layer containing the payment orchestration.
//!
//! This module defines the `PaymentOrchestrator`, the entry point for creating and
//! retrieving payments. It sequences the idempotency guard, the validator and the
//! settlement client, and decides the final status of every submission. `batch` feeds
//! it a stream of submissions with bounded concurrency.

pub mod batch;
pub mod orchestrator;
