use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopdocs_core::{
    AggregateRoot, Caller, CustomerId, DomainError, DomainResult, InvoiceId, LineItemId, Money,
    QuotationId, TenantId, TenantScoped, UserId, position_of,
};
use shopdocs_pricing::{Discount, LineItem, LineItemInput, LineItemPatch, Totals};

/// Quotation status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Expired,
    Converted,
}

impl QuotationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::Sent => "sent",
            QuotationStatus::Approved => "approved",
            QuotationStatus::Rejected => "rejected",
            QuotationStatus::Expired => "expired",
            QuotationStatus::Converted => "converted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(QuotationStatus::Draft),
            "sent" => Some(QuotationStatus::Sent),
            "approved" => Some(QuotationStatus::Approved),
            "rejected" => Some(QuotationStatus::Rejected),
            "expired" => Some(QuotationStatus::Expired),
            "converted" => Some(QuotationStatus::Converted),
            _ => None,
        }
    }

    /// Items and header fields can change only before the customer decides.
    pub fn is_editable(self) -> bool {
        matches!(self, QuotationStatus::Draft | QuotationStatus::Sent)
    }

    /// Statuses the sweeper demotes once `valid_until` has passed.
    pub fn is_expirable(self) -> bool {
        matches!(
            self,
            QuotationStatus::Draft | QuotationStatus::Sent | QuotationStatus::Approved
        )
    }
}

impl core::fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating a quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotationDraft {
    pub customer_id: CustomerId,
    pub valid_until: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub discount_percent: Option<Decimal>,
    #[serde(default)]
    pub discount_amount: Option<Money>,
    #[serde(default)]
    pub items: Vec<LineItemInput>,
}

/// Closed set of header fields a caller may change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotationPatch {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub discount_percent: Option<Decimal>,
    #[serde(default)]
    pub discount_amount: Option<Money>,
    /// Removes the document discount.
    #[serde(default)]
    pub clear_discount: bool,
}

/// Caller-driven status change.
///
/// `valid_until` is required when re-opening an expired quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionRequest {
    pub to: QuotationStatus,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

/// Aggregate root: Quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    id: QuotationId,
    tenant_id: TenantId,
    customer_id: CustomerId,
    number: String,
    status: QuotationStatus,
    items: Vec<LineItem>,
    document_discount: Option<Discount>,
    #[serde(flatten)]
    totals: Totals,
    valid_until: DateTime<Utc>,
    notes: Option<String>,
    invoice_id: Option<InvoiceId>,
    created_by: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Quotation {
    /// Create a new draft quotation owned by the caller's tenant.
    pub fn create(
        id: QuotationId,
        number: String,
        caller: &Caller,
        draft: QuotationDraft,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if draft.valid_until <= now {
            return Err(DomainError::validation("valid_until must be in the future"));
        }
        let items = draft
            .items
            .into_iter()
            .map(|input| LineItem::new(LineItemId::new(), input))
            .collect::<DomainResult<Vec<_>>>()?;

        let mut quotation = Self {
            id,
            tenant_id: caller.tenant_id(),
            customer_id: draft.customer_id,
            number,
            status: QuotationStatus::Draft,
            items,
            document_discount: Discount::from_parts(draft.discount_percent, draft.discount_amount)?,
            totals: Totals::default(),
            valid_until: draft.valid_until,
            notes: draft.notes,
            invoice_id: None,
            created_by: caller.user_id(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: 1,
        };
        quotation.recompute();
        Ok(quotation)
    }

    pub fn id_typed(&self) -> QuotationId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn status(&self) -> QuotationStatus {
        self.status
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn document_discount(&self) -> Option<&Discount> {
        self.document_discount.as_ref()
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn valid_until(&self) -> DateTime<Utc> {
        self.valid_until
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Invoice created from this quotation, once converted.
    pub fn invoice_id(&self) -> Option<InvoiceId> {
        self.invoice_id
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn ensure_editable(&self) -> DomainResult<()> {
        if !self.status.is_editable() {
            return Err(DomainError::invalid_state(
                self.status,
                "quotation can no longer be edited",
            ));
        }
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }

    fn recompute(&mut self) {
        self.totals =
            shopdocs_pricing::compute_with_discount(&self.items, self.document_discount.as_ref());
    }

    fn item_index(&self, item_id: LineItemId) -> DomainResult<usize> {
        position_of(&self.items, item_id)
    }

    pub fn add_item(&mut self, input: LineItemInput, now: DateTime<Utc>) -> DomainResult<LineItemId> {
        self.ensure_editable()?;
        let item = LineItem::new(LineItemId::new(), input)?;
        let id = item.id;
        self.items.push(item);
        self.recompute();
        self.touch(now);
        Ok(id)
    }

    pub fn update_item(
        &mut self,
        item_id: LineItemId,
        patch: LineItemPatch,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_editable()?;
        let idx = self.item_index(item_id)?;
        self.items[idx] = self.items[idx].patched(patch)?;
        self.recompute();
        self.touch(now);
        Ok(())
    }

    pub fn delete_item(&mut self, item_id: LineItemId, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_editable()?;
        let idx = self.item_index(item_id)?;
        self.items.remove(idx);
        self.recompute();
        self.touch(now);
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: QuotationPatch, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_editable()?;
        if let Some(valid_until) = patch.valid_until {
            if valid_until <= now {
                return Err(DomainError::validation("valid_until must be in the future"));
            }
        }
        let discount = Discount::patched(
            self.document_discount,
            patch.discount_percent,
            patch.discount_amount,
            patch.clear_discount,
        )?;

        if let Some(customer_id) = patch.customer_id {
            self.customer_id = customer_id;
        }
        if let Some(valid_until) = patch.valid_until {
            self.valid_until = valid_until;
        }
        if patch.notes.is_some() {
            self.notes = patch.notes;
        }
        self.document_discount = discount;
        self.recompute();
        self.touch(now);
        Ok(())
    }

    /// Apply a caller-driven status change.
    ///
    /// `converted` and `expired` are reserved for the conversion pipeline and
    /// the sweeper respectively.
    pub fn transition(&mut self, request: TransitionRequest, now: DateTime<Utc>) -> DomainResult<()> {
        use QuotationStatus::*;

        match (self.status, request.to) {
            (Draft, Sent) => {
                if self.items.is_empty() {
                    return Err(DomainError::EmptyDocument);
                }
            }
            (Sent, Approved) | (Sent, Rejected) => {}
            (Expired, Draft) => {
                let valid_until = request.valid_until.ok_or_else(|| {
                    DomainError::validation("re-opening an expired quotation requires valid_until")
                })?;
                if valid_until <= now {
                    return Err(DomainError::validation("valid_until must be in the future"));
                }
                self.valid_until = valid_until;
            }
            (from, to) => {
                return Err(DomainError::invalid_state(
                    from,
                    format!("cannot transition quotation to {to}"),
                ));
            }
        }

        self.status = request.to;
        self.touch(now);
        Ok(())
    }

    /// Check every conversion precondition without mutating.
    pub fn ensure_convertible(&self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == QuotationStatus::Converted || self.invoice_id.is_some() {
            return Err(DomainError::AlreadyConverted);
        }
        if self.status != QuotationStatus::Approved {
            return Err(DomainError::invalid_state(
                self.status,
                "only approved quotations can be converted",
            ));
        }
        if self.valid_until < now {
            return Err(DomainError::Expired {
                valid_until: self.valid_until,
            });
        }
        if self.items.is_empty() {
            return Err(DomainError::EmptyDocument);
        }
        Ok(())
    }

    pub fn mark_converted(&mut self, invoice_id: InvoiceId, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_convertible(now)?;
        self.status = QuotationStatus::Converted;
        self.invoice_id = Some(invoice_id);
        self.touch(now);
        Ok(())
    }

    /// Sweeper hook. Returns whether the status changed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.is_expirable() || self.valid_until >= now {
            return false;
        }
        self.status = QuotationStatus::Expired;
        self.touch(now);
        true
    }

    /// Soft delete. Only drafts can be deleted.
    pub fn soft_delete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != QuotationStatus::Draft {
            return Err(DomainError::invalid_state(
                self.status,
                "only draft quotations can be deleted",
            ));
        }
        self.deleted_at = Some(now);
        self.touch(now);
        Ok(())
    }
}

impl AggregateRoot for Quotation {
    type Id = QuotationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TenantScoped for Quotation {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
