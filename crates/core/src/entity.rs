//! Entities owned by a document aggregate.

use crate::error::{DomainError, DomainResult};

/// Something with a stable identity inside its owning document.
///
/// Line items and payments are entities; quotations and invoices are
/// aggregates (see [`crate::AggregateRoot`]).
pub trait Entity {
    type Id: Copy + Eq + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}

/// Index of the entity with `id`, or `NotFound`.
pub fn position_of<E: Entity>(entities: &[E], id: E::Id) -> DomainResult<usize> {
    entities
        .iter()
        .position(|e| *e.id() == id)
        .ok_or(DomainError::NotFound)
}
