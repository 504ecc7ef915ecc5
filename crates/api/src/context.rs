use chrono::{DateTime, Utc};

use shopdocs_core::Caller;

/// Authenticated identity for a request.
///
/// Inserted by the auth middleware; must be present for all document routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CallerContext {
    caller: Caller,
    token_expires_at: DateTime<Utc>,
}

impl CallerContext {
    pub fn new(caller: Caller, token_expires_at: DateTime<Utc>) -> Self {
        Self {
            caller,
            token_expires_at,
        }
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    pub fn token_expires_at(&self) -> DateTime<Utc> {
        self.token_expires_at
    }
}
