//! Application services: one async method per document operation.
//!
//! Every operation follows the same shape:
//!
//! ```text
//! Caller + request
//!   ↓
//! 1. Open a store transaction (bounded by `store_timeout`)
//!   ↓
//! 2. Load the target rows for update, scoped to the caller's tenant
//!   ↓
//! 3. Apply the pure domain rule (quotation/invoice/ledger/conversion)
//!   ↓
//! 4. Save with the loaded version as `ExpectedVersion`, commit
//! ```
//!
//! Services hold no per-request state; correctness under concurrent requests
//! is delegated to the store's row locks, version checks and unique
//! constraints.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::clock::{Clock, SystemClock};
use crate::store::{DocumentStore, DocumentTx};

pub mod conversion;
pub mod error;
pub mod invoices;
pub mod payments;
pub mod quotations;
pub mod sweeper;
pub mod work_orders;

pub use error::ServiceError;
pub use sweeper::SweepReport;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Days between conversion and the invoice due date.
    pub payment_terms_days: i64,
    /// Upper bound for a whole operation, store round-trips included.
    pub store_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            payment_terms_days: 30,
            store_timeout: Duration::from_millis(5_000),
        }
    }
}

#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    settings: ServiceSettings,
}

impl DocumentService {
    pub fn new(store: Arc<dyn DocumentStore>, settings: ServiceSettings) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> ServiceSettings {
        self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn begin(&self) -> ServiceResult<Box<dyn DocumentTx>> {
        Ok(self.store.begin().await?)
    }

    /// Run `fut` under the configured timeout. A timed-out operation drops its
    /// transaction, which rolls it back.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        let limit = self.settings.store_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_ms = limit.as_millis() as u64, "operation timed out");
                Err(ServiceError::Timeout {
                    operation,
                    timeout_ms: limit.as_millis() as u64,
                })
            }
        }
    }
}
