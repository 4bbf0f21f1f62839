#![allow(dead_code)]

use chrono::{Datelike, Local};
use paygate::domain::payment::PaymentRequest;
use std::fmt;
use std::io::Error;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry;

pub const SUBMISSION_HEADER: [&str; 7] = [
    "idempotency_key",
    "card_number",
    "expiry_month",
    "expiry_year",
    "currency",
    "amount",
    "cvv",
];

/// A request that passes validation today and for the next two years.
pub fn valid_request() -> PaymentRequest {
    PaymentRequest {
        card_number: "2222405343248877".to_string(),
        expiry_month: 12,
        expiry_year: Local::now().year() + 2,
        currency: "GBP".to_string(),
        amount: 100,
        cvv: "123".to_string(),
    }
}

pub fn write_submissions(path: &Path, rows: &[[&str; 7]]) -> Result<(), Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(SUBMISSION_HEADER)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
}

/// Layer that records every event's level and message for later assertions.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Captures events on the current thread until the guard is dropped.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let guard = tracing::subscriber::set_default(registry().with(capture.clone()));
        (capture, guard)
    }

    pub fn count(&self, level: Level, message: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.level == level && e.message == message)
            .count()
    }

    pub fn count_level(&self, level: Level) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.level == level)
            .count()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}
