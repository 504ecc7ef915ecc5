//! `shopdocs-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod number;
pub mod tenant;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use entity::{Entity, position_of};
pub use error::{DomainError, DomainResult};
pub use id::{
    CustomerId, InvoiceId, LineItemId, PaymentId, QuotationId, TenantId, UserId, WorkOrderId,
};
pub use money::Money;
pub use number::DocumentKind;
pub use tenant::{Caller, TenantScoped, guard};
