//! Quotations domain module.
//!
//! This crate contains the quotation aggregate and its lifecycle rules,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod quotation;

pub use quotation::{
    Quotation, QuotationDraft, QuotationPatch, QuotationStatus, TransitionRequest,
};
