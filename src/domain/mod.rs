//! Domain layer: payment data, the validation rules, the settlement wire model and the
//! ports the orchestrator depends on.

pub mod payment;
pub mod ports;
pub mod settlement;
pub mod validation;
