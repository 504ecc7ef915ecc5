//! `shopdocs-auth`: resolves bearer tokens to a [`Caller`](shopdocs_core::Caller).
//!
//! This crate is intentionally decoupled from HTTP and storage. The only thing
//! the document services need from authentication is a tenant id and a user id.

pub mod claims;
pub mod validator;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use validator::{Hs256JwtValidator, JwtValidator};
