use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopdocs_core::{
    Caller, DomainError, DomainResult, Entity, InvoiceId, Money, PaymentId, TenantId, TenantScoped,
    UserId,
};

pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    MobileMoney,
    Cheque,
    Other,
}

/// Client-supplied payment details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentInput {
    pub amount: Money,
    pub method: PaymentMethod,
    /// Defaults to the time the payment is recorded.
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Replays with the same key return the invoice unchanged.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// A recorded payment. Immutable; the only correction is deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    tenant_id: TenantId,
    invoice_id: InvoiceId,
    amount: Money,
    method: PaymentMethod,
    paid_at: DateTime<Utc>,
    reference: Option<String>,
    notes: Option<String>,
    idempotency_key: Option<String>,
    recorded_by: UserId,
    created_at: DateTime<Utc>,
}

impl Payment {
    pub fn record(
        id: PaymentId,
        caller: &Caller,
        invoice_id: InvoiceId,
        input: PaymentInput,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !input.amount.is_positive() {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        let idempotency_key = match input.idempotency_key {
            Some(key) => {
                let key = key.trim().to_string();
                if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
                    return Err(DomainError::validation(format!(
                        "idempotency_key must be 1..={MAX_IDEMPOTENCY_KEY_LEN} characters"
                    )));
                }
                Some(key)
            }
            None => None,
        };

        Ok(Self {
            id,
            tenant_id: caller.tenant_id(),
            invoice_id,
            amount: input.amount,
            method: input.method,
            paid_at: input.paid_at.unwrap_or(now),
            reference: input.reference,
            notes: input.notes,
            idempotency_key,
            recorded_by: caller.user_id(),
            created_at: now,
        })
    }

    pub fn id_typed(&self) -> PaymentId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn invoice_id(&self) -> InvoiceId {
        self.invoice_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn paid_at(&self) -> DateTime<Utc> {
        self.paid_at
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    pub fn recorded_by(&self) -> UserId {
        self.recorded_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Payment {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
