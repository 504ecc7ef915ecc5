use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shopdocs_core::{Caller, TenantId, UserId};

/// JWT claims model (transport-agnostic).
///
/// This is the minimal set of claims expected once a token has been decoded
/// and its signature verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the acting user.
    pub sub: UserId,

    /// The one tenant this token acts within.
    pub tenant_id: TenantId,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

impl JwtClaims {
    pub fn new(sub: UserId, tenant_id: TenantId, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            sub,
            tenant_id,
            issued_at,
            expires_at,
        }
    }

    /// The identity every document operation runs under.
    pub fn caller(&self) -> Caller {
        Caller::new(self.tenant_id, self.sub)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid token signature")]
    InvalidSignature,
}

/// Deterministically validate JWT claims.
///
/// Note: this validates the *claims* only. Signature verification lives in
/// [`crate::validator`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(issued_at: DateTime<Utc>, ttl: Duration) -> JwtClaims {
        JwtClaims::new(UserId::new(), TenantId::new(), issued_at, issued_at + ttl)
    }

    #[test]
    fn validates_time_window() {
        let now = Utc::now();
        assert!(validate_claims(&claims(now, Duration::minutes(5)), now).is_ok());
        assert_eq!(
            validate_claims(&claims(now, Duration::minutes(5)), now + Duration::minutes(5)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims(now + Duration::minutes(1), Duration::minutes(5)), now),
            Err(TokenValidationError::NotYetValid)
        );
        assert_eq!(
            validate_claims(&claims(now, Duration::zero()), now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn caller_carries_token_tenant() {
        let c = claims(Utc::now(), Duration::minutes(1));
        let caller = c.caller();
        assert_eq!(caller.tenant_id(), c.tenant_id);
        assert_eq!(caller.user_id(), c.sub);
    }
}
