//! Infrastructure layer: document stores, application services, clock and
//! background workers.

pub mod clock;
pub mod services;
pub mod store;
pub mod workers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use services::{DocumentService, ServiceError, ServiceResult, ServiceSettings, SweepReport};
pub use store::{DocumentStore, InMemoryDocumentStore, ListQuery, PostgresDocumentStore};

#[cfg(test)]
mod integration_tests;
