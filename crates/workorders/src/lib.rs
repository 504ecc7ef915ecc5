//! Work orders as seen by the invoicing pipeline.
//!
//! The fulfillment workflow owns work orders. This crate only models the
//! snapshot it hands over and the single mutation invoicing performs on it:
//! stamping the invoice that billed the work.

pub mod work_order;

pub use work_order::{WorkOrder, WorkOrderImport, WorkOrderStatus};
