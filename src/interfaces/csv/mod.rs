//! CSV adapters for batch payment submission.

pub mod outcome_writer;
pub mod payment_reader;
