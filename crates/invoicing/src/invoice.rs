use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopdocs_core::{
    AggregateRoot, Caller, CustomerId, DomainError, DomainResult, InvoiceId, LineItemId, Money,
    QuotationId, TenantId, TenantScoped, UserId, WorkOrderId, position_of,
};
use shopdocs_pricing::{Discount, LineItem, LineItemInput, LineItemPatch, Totals};

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    PartiallyPaid,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "issued" => Some(InvoiceStatus::Issued),
            "partially_paid" => Some(InvoiceStatus::PartiallyPaid),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }

    /// Issued and not yet closed; status is derived from the ledger and due date.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            InvoiceStatus::Issued | InvoiceStatus::PartiallyPaid | InvoiceStatus::Overdue
        )
    }

    pub fn allows_item_edits(self) -> bool {
        self == InvoiceStatus::Draft || self.is_open()
    }

    /// Statuses the sweeper may demote to `overdue`.
    pub fn is_overdue_candidate(self) -> bool {
        matches!(self, InvoiceStatus::Issued | InvoiceStatus::PartiallyPaid)
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an invoice came from. Each source converts at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum InvoiceSource {
    #[default]
    None,
    Quotation(QuotationId),
    WorkOrder(WorkOrderId),
}

impl InvoiceSource {
    pub fn quotation_id(&self) -> Option<QuotationId> {
        match self {
            InvoiceSource::Quotation(id) => Some(*id),
            _ => None,
        }
    }

    pub fn work_order_id(&self) -> Option<WorkOrderId> {
        match self {
            InvoiceSource::WorkOrder(id) => Some(*id),
            _ => None,
        }
    }
}

/// Billable content copied off a quotation or work order.
///
/// Items are deep copies under fresh line ids; later edits to the source never
/// reach the invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSnapshot {
    pub customer_id: CustomerId,
    pub items: Vec<LineItem>,
    pub document_discount: Option<Discount>,
    pub source: InvoiceSource,
}

/// Input for creating an invoice directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvoiceDraft {
    pub customer_id: CustomerId,
    pub due_date: DateTime<Utc>,
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
pub struct InvoicePatch {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
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

/// Aggregate root: Invoice.
///
/// `paid_amount` is never incremented in place: the ledger re-reads every
/// payment and hands the sum to [`Invoice::apply_ledger`]. The persisted status
/// is a materialized view of `(paid_amount, total, due_date)`; use
/// [`Invoice::effective_status`] when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: TenantId,
    customer_id: CustomerId,
    number: String,
    status: InvoiceStatus,
    items: Vec<LineItem>,
    document_discount: Option<Discount>,
    #[serde(flatten)]
    totals: Totals,
    paid_amount: Money,
    due_date: DateTime<Utc>,
    source: InvoiceSource,
    notes: Option<String>,
    created_by: UserId,
    issued_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Invoice {
    /// Create a draft invoice owned by the caller's tenant.
    pub fn create(
        id: InvoiceId,
        number: String,
        caller: &Caller,
        draft: InvoiceDraft,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let items = draft
            .items
            .into_iter()
            .map(|input| LineItem::new(LineItemId::new(), input))
            .collect::<DomainResult<Vec<_>>>()?;
        let document_discount = Discount::from_parts(draft.discount_percent, draft.discount_amount)?;

        let mut invoice = Self::blank(id, number, caller, draft.customer_id, draft.due_date, now);
        invoice.items = items;
        invoice.document_discount = document_discount;
        invoice.notes = draft.notes;
        invoice.recompute();
        Ok(invoice)
    }

    /// Create an already-issued invoice from a source document snapshot.
    pub fn issued_from_source(
        id: InvoiceId,
        number: String,
        caller: &Caller,
        snapshot: SourceSnapshot,
        due_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if snapshot.items.is_empty() {
            return Err(DomainError::EmptyDocument);
        }
        let mut invoice = Self::blank(id, number, caller, snapshot.customer_id, due_date, now);
        invoice.items = snapshot.items;
        invoice.document_discount = snapshot.document_discount;
        invoice.source = snapshot.source;
        invoice.status = InvoiceStatus::Issued;
        invoice.issued_at = Some(now);
        invoice.recompute();
        invoice.status = invoice.derive_status(now);
        Ok(invoice)
    }

    fn blank(
        id: InvoiceId,
        number: String,
        caller: &Caller,
        customer_id: CustomerId,
        due_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id: caller.tenant_id(),
            customer_id,
            number,
            status: InvoiceStatus::Draft,
            items: Vec::new(),
            document_discount: None,
            totals: Totals::default(),
            paid_amount: Money::ZERO,
            due_date,
            source: InvoiceSource::None,
            notes: None,
            created_by: caller.user_id(),
            issued_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
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

    /// Status as last persisted.
    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    /// Status as of `now`; surfaces `overdue` before the sweeper has run.
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvoiceStatus {
        self.derive_status(now)
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

    pub fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    pub fn balance_due(&self) -> Money {
        self.totals.total.saturating_sub_floor(self.paid_amount)
    }

    /// Amount received beyond the total. Accepted, but flagged.
    pub fn overpaid_amount(&self) -> Money {
        self.paid_amount.saturating_sub_floor(self.totals.total)
    }

    pub fn due_date(&self) -> DateTime<Utc> {
        self.due_date
    }

    pub fn source(&self) -> InvoiceSource {
        self.source
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn derive_status(&self, now: DateTime<Utc>) -> InvoiceStatus {
        match self.status {
            InvoiceStatus::Draft | InvoiceStatus::Cancelled => self.status,
            _ if self.paid_amount >= self.totals.total => InvoiceStatus::Paid,
            _ if self.due_date < now => InvoiceStatus::Overdue,
            _ if self.paid_amount.is_positive() => InvoiceStatus::PartiallyPaid,
            _ => InvoiceStatus::Issued,
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }

    fn recompute(&mut self) {
        self.totals =
            shopdocs_pricing::compute_with_discount(&self.items, self.document_discount.as_ref());
    }

    fn ensure_items_editable(&self) -> DomainResult<()> {
        if !self.status.allows_item_edits() {
            return Err(DomainError::invalid_state(
                self.status,
                "invoice items can no longer be edited",
            ));
        }
        Ok(())
    }

    fn item_index(&self, item_id: LineItemId) -> DomainResult<usize> {
        position_of(&self.items, item_id)
    }

    fn after_change(&mut self, now: DateTime<Utc>) {
        self.recompute();
        self.status = self.derive_status(now);
        self.touch(now);
    }

    pub fn add_item(&mut self, input: LineItemInput, now: DateTime<Utc>) -> DomainResult<LineItemId> {
        self.ensure_items_editable()?;
        let item = LineItem::new(LineItemId::new(), input)?;
        let id = item.id;
        self.items.push(item);
        self.after_change(now);
        Ok(id)
    }

    pub fn update_item(
        &mut self,
        item_id: LineItemId,
        patch: LineItemPatch,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_items_editable()?;
        let idx = self.item_index(item_id)?;
        self.items[idx] = self.items[idx].patched(patch)?;
        self.after_change(now);
        Ok(())
    }

    /// Issued invoices must keep at least one item.
    pub fn delete_item(&mut self, item_id: LineItemId, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_items_editable()?;
        let idx = self.item_index(item_id)?;
        if self.status != InvoiceStatus::Draft && self.items.len() == 1 {
            return Err(DomainError::EmptyDocument);
        }
        self.items.remove(idx);
        self.after_change(now);
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: InvoicePatch, now: DateTime<Utc>) -> DomainResult<()> {
        if matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled) {
            return Err(DomainError::invalid_state(
                self.status,
                "invoice can no longer be edited",
            ));
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
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if patch.notes.is_some() {
            self.notes = patch.notes;
        }
        self.document_discount = discount;
        self.after_change(now);
        Ok(())
    }

    pub fn issue(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != InvoiceStatus::Draft {
            return Err(DomainError::invalid_state(
                self.status,
                "only draft invoices can be issued",
            ));
        }
        if self.items.is_empty() {
            return Err(DomainError::EmptyDocument);
        }
        self.status = InvoiceStatus::Issued;
        self.issued_at = Some(now);
        self.after_change(now);
        Ok(())
    }

    /// Cancel the invoice. Recorded payments are kept.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled) {
            return Err(DomainError::invalid_state(
                self.status,
                "invoice cannot be cancelled",
            ));
        }
        self.status = InvoiceStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.touch(now);
        Ok(())
    }

    /// Preconditions for recording a new payment.
    pub fn ensure_accepts_payment(&self) -> DomainResult<()> {
        if self.status == InvoiceStatus::Cancelled {
            return Err(DomainError::invalid_state(
                self.status,
                "cannot record payment on a cancelled invoice",
            ));
        }
        if self.items.is_empty() {
            return Err(DomainError::EmptyDocument);
        }
        Ok(())
    }

    /// Replace `paid_amount` with the ledger sum and re-derive the status.
    ///
    /// A payment against a draft issues it.
    pub fn apply_ledger(&mut self, paid_amount: Money, now: DateTime<Utc>) -> DomainResult<()> {
        if paid_amount.is_negative() {
            return Err(DomainError::validation("paid amount must not be negative"));
        }
        if self.status == InvoiceStatus::Draft && paid_amount.is_positive() {
            self.status = InvoiceStatus::Issued;
            self.issued_at = Some(now);
        }
        self.paid_amount = paid_amount;
        self.status = self.derive_status(now);
        self.touch(now);
        Ok(())
    }

    /// Sweeper hook. Returns whether the status changed.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.is_overdue_candidate() || self.due_date >= now {
            return false;
        }
        let next = self.derive_status(now);
        if next != InvoiceStatus::Overdue {
            return false;
        }
        self.status = next;
        self.touch(now);
        true
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TenantScoped for Invoice {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use shopdocs_pricing::LineItemKind;

    fn test_caller() -> Caller {
        Caller::new(TenantId::new(), UserId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_item() -> LineItemInput {
        LineItemInput {
            kind: LineItemKind::Product,
            reference_id: None,
            description: "Tyre 205/55 R16".to_string(),
            quantity: dec!(2),
            unit_price: Money::from_major(100),
            discount_percent: None,
            discount_amount: None,
            tax_percent: Some(dec!(16)),
            notes: None,
        }
    }

    fn draft_invoice(due_in_days: i64) -> (Invoice, DateTime<Utc>) {
        let now = test_time();
        let invoice = Invoice::create(
            InvoiceId::new(),
            "INV-000001".to_string(),
            &test_caller(),
            InvoiceDraft {
                customer_id: CustomerId::new(),
                due_date: now + Duration::days(due_in_days),
                notes: None,
                discount_percent: None,
                discount_amount: None,
                items: vec![test_item()],
            },
            now,
        )
        .unwrap();
        (invoice, now)
    }

    fn issued_invoice(due_in_days: i64) -> (Invoice, DateTime<Utc>) {
        let (mut invoice, now) = draft_invoice(due_in_days);
        invoice.issue(now).unwrap();
        (invoice, now)
    }

    #[test]
    fn partial_then_full_payment() {
        let (mut invoice, now) = issued_invoice(30);
        assert_eq!(invoice.totals().total, Money::from_major(232));

        invoice.apply_ledger(Money::from_major(100), now).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::PartiallyPaid);
        assert_eq!(invoice.balance_due(), Money::from_major(132));

        invoice.apply_ledger(Money::from_major(232), now).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
        assert_eq!(invoice.overpaid_amount(), Money::ZERO);
    }

    #[test]
    fn overpayment_resolves_to_paid_and_is_flagged() {
        let (mut invoice, now) = issued_invoice(30);
        invoice.apply_ledger(Money::from_major(250), now).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
        assert_eq!(invoice.overpaid_amount(), Money::from_major(18));
    }

    #[test]
    fn removing_a_payment_reopens_paid_invoice() {
        let (mut invoice, now) = issued_invoice(30);
        invoice.apply_ledger(Money::from_major(232), now).unwrap();
        invoice.apply_ledger(Money::from_major(100), now).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::PartiallyPaid);
    }

    #[test]
    fn payment_on_draft_issues_it() {
        let (mut invoice, now) = draft_invoice(30);
        invoice.apply_ledger(Money::from_major(50), now).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::PartiallyPaid);
        assert_eq!(invoice.issued_at(), Some(now));
    }

    #[test]
    fn overdue_is_derived_and_cleared_by_full_payment() {
        let (mut invoice, now) = issued_invoice(1);
        let later = now + Duration::days(2);
        assert_eq!(invoice.status(), InvoiceStatus::Issued);
        assert_eq!(invoice.effective_status(later), InvoiceStatus::Overdue);

        assert!(invoice.mark_overdue(later));
        assert!(!invoice.mark_overdue(later));
        assert_eq!(invoice.status(), InvoiceStatus::Overdue);

        invoice.apply_ledger(Money::from_major(232), later).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
    }

    #[test]
    fn extending_due_date_clears_overdue() {
        let (mut invoice, now) = issued_invoice(1);
        let later = now + Duration::days(2);
        invoice.mark_overdue(later);
        invoice
            .apply_patch(
                InvoicePatch {
                    due_date: Some(later + Duration::days(10)),
                    ..InvoicePatch::default()
                },
                later,
            )
            .unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Issued);
    }

    #[test]
    fn cancelled_invoice_rejects_payments_and_keeps_paid_amount() {
        let (mut invoice, now) = issued_invoice(30);
        invoice.apply_ledger(Money::from_major(10), now).unwrap();
        invoice.cancel(now).unwrap();
        assert_eq!(invoice.paid_amount(), Money::from_major(10));
        match invoice.ensure_accepts_payment() {
            Err(DomainError::InvalidState { status, .. }) => assert_eq!(status, "cancelled"),
            other => panic!("Expected InvalidState, got {other:?}"),
        }
    }

    #[test]
    fn paid_invoice_is_terminal_for_callers() {
        let (mut invoice, now) = issued_invoice(30);
        invoice.apply_ledger(Money::from_major(232), now).unwrap();
        assert!(matches!(invoice.cancel(now), Err(DomainError::InvalidState { .. })));
        assert!(matches!(invoice.add_item(test_item(), now), Err(DomainError::InvalidState { .. })));
        assert!(matches!(
            invoice.apply_patch(InvoicePatch::default(), now),
            Err(DomainError::InvalidState { .. })
        ));
    }

    #[test]
    fn item_edit_rederives_status() {
        let (mut invoice, now) = issued_invoice(30);
        invoice.apply_ledger(Money::from_major(116), now).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::PartiallyPaid);

        let id = invoice.items()[0].id;
        invoice
            .update_item(
                id,
                LineItemPatch {
                    quantity: Some(dec!(1)),
                    ..LineItemPatch::default()
                },
                now,
            )
            .unwrap();
        assert_eq!(invoice.totals().total, Money::from_major(116));
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
    }

    #[test]
    fn issued_invoice_keeps_at_least_one_item() {
        let (mut invoice, now) = issued_invoice(30);
        let id = invoice.items()[0].id;
        assert_eq!(invoice.delete_item(id, now), Err(DomainError::EmptyDocument));
    }

    #[test]
    fn issuing_an_empty_draft_fails() {
        let now = test_time();
        let mut invoice = Invoice::create(
            InvoiceId::new(),
            "INV-000002".to_string(),
            &test_caller(),
            InvoiceDraft {
                customer_id: CustomerId::new(),
                due_date: now,
                notes: None,
                discount_percent: None,
                discount_amount: None,
                items: vec![],
            },
            now,
        )
        .unwrap();
        assert_eq!(invoice.issue(now), Err(DomainError::EmptyDocument));
        assert_eq!(invoice.status(), InvoiceStatus::Draft);
    }

    #[test]
    fn source_serializes_as_tagged_object() {
        let id = QuotationId::new();
        let json = serde_json::to_value(InvoiceSource::Quotation(id)).unwrap();
        assert_eq!(json["type"], "quotation");
        assert_eq!(json["id"], id.to_string());
    }
}
