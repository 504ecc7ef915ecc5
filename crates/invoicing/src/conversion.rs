//! Invoice construction from quotations and work orders.
//!
//! These builders check the source-side preconditions and snapshot the
//! billable content. Marking the source as converted, and enforcing that a
//! source converts at most once, happens in the same store transaction that
//! inserts the invoice.

use chrono::{DateTime, Utc};

use shopdocs_core::{Caller, DomainResult, InvoiceId};
use shopdocs_pricing::LineItem;
use shopdocs_quotations::Quotation;
use shopdocs_workorders::WorkOrder;

use crate::invoice::{Invoice, InvoiceSource, SourceSnapshot};

fn snapshot_items(items: &[LineItem]) -> Vec<LineItem> {
    items.iter().map(LineItem::snapshot).collect()
}

/// Issue an invoice for an approved, unexpired quotation.
pub fn invoice_from_quotation(
    id: InvoiceId,
    number: String,
    caller: &Caller,
    quotation: &Quotation,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DomainResult<Invoice> {
    quotation.ensure_convertible(now)?;
    Invoice::issued_from_source(
        id,
        number,
        caller,
        SourceSnapshot {
            customer_id: quotation.customer_id(),
            items: snapshot_items(quotation.items()),
            document_discount: quotation.document_discount().copied(),
            source: InvoiceSource::Quotation(quotation.id_typed()),
        },
        due_date,
        now,
    )
}

/// Issue an invoice for a completed work order.
pub fn invoice_from_work_order(
    id: InvoiceId,
    number: String,
    caller: &Caller,
    work_order: &WorkOrder,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DomainResult<Invoice> {
    work_order.ensure_billable()?;
    Invoice::issued_from_source(
        id,
        number,
        caller,
        SourceSnapshot {
            customer_id: work_order.customer_id(),
            items: snapshot_items(work_order.items()),
            document_discount: None,
            source: InvoiceSource::WorkOrder(work_order.id_typed()),
        },
        due_date,
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::InvoiceStatus;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use shopdocs_core::{CustomerId, DomainError, Money, QuotationId, TenantId, UserId, WorkOrderId};
    use shopdocs_pricing::{LineItemInput, LineItemKind, LineItemPatch};
    use shopdocs_quotations::{QuotationDraft, QuotationStatus, TransitionRequest};
    use shopdocs_workorders::{WorkOrderImport, WorkOrderStatus};

    fn item() -> LineItemInput {
        LineItemInput {
            kind: LineItemKind::Product,
            reference_id: None,
            description: "Battery 70Ah".to_string(),
            quantity: dec!(2),
            unit_price: Money::from_major(100),
            discount_percent: None,
            discount_amount: None,
            tax_percent: Some(dec!(16)),
            notes: None,
        }
    }

    fn approved_quotation(caller: &Caller, now: DateTime<Utc>) -> Quotation {
        let mut q = Quotation::create(
            QuotationId::new(),
            "Q-000001".to_string(),
            caller,
            QuotationDraft {
                customer_id: CustomerId::new(),
                valid_until: now + Duration::days(7),
                notes: None,
                discount_percent: None,
                discount_amount: None,
                items: vec![item()],
            },
            now,
        )
        .unwrap();
        for to in [QuotationStatus::Sent, QuotationStatus::Approved] {
            q.transition(TransitionRequest { to, valid_until: None }, now).unwrap();
        }
        q
    }

    #[test]
    fn converted_invoice_is_issued_with_source_stamped() {
        let caller = Caller::new(TenantId::new(), UserId::new());
        let now = Utc::now();
        let q = approved_quotation(&caller, now);

        let invoice = invoice_from_quotation(
            InvoiceId::new(),
            "INV-000001".to_string(),
            &caller,
            &q,
            now + Duration::days(30),
            now,
        )
        .unwrap();

        assert_eq!(invoice.status(), InvoiceStatus::Issued);
        assert_eq!(invoice.source().quotation_id(), Some(q.id_typed()));
        assert_eq!(invoice.totals().total, Money::from_major(232));
        assert_eq!(invoice.paid_amount(), Money::ZERO);
        assert_eq!(invoice.customer_id(), q.customer_id());
    }

    #[test]
    fn invoice_items_are_independent_copies() {
        let caller = Caller::new(TenantId::new(), UserId::new());
        let now = Utc::now();
        let mut q = approved_quotation(&caller, now);
        let invoice =
            invoice_from_quotation(InvoiceId::new(), "INV-1".into(), &caller, &q, now, now).unwrap();

        assert_ne!(invoice.items()[0].id, q.items()[0].id);

        // Re-opening through expiry is the only way back to edits.
        let later = now + Duration::days(8);
        assert!(q.expire(later));
        q.transition(
            TransitionRequest {
                to: QuotationStatus::Draft,
                valid_until: Some(later + Duration::days(7)),
            },
            later,
        )
        .unwrap();
        let item_id = q.items()[0].id;
        q.update_item(
            item_id,
            LineItemPatch {
                quantity: Some(dec!(5)),
                ..LineItemPatch::default()
            },
            later,
        )
        .unwrap();
        assert_eq!(invoice.items()[0].quantity, dec!(2));
    }

    #[test]
    fn expired_quotation_cannot_convert() {
        let caller = Caller::new(TenantId::new(), UserId::new());
        let now = Utc::now();
        let q = approved_quotation(&caller, now);
        let err = invoice_from_quotation(
            InvoiceId::new(),
            "INV-1".into(),
            &caller,
            &q,
            now,
            now + Duration::days(8),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Expired { .. }));
    }

    #[test]
    fn work_order_must_be_completed() {
        let caller = Caller::new(TenantId::new(), UserId::new());
        let now = Utc::now();
        let wo = WorkOrder::import(
            &caller,
            WorkOrderImport {
                id: WorkOrderId::new(),
                customer_id: CustomerId::new(),
                number: "WO-7".to_string(),
                status: WorkOrderStatus::Open,
                items: vec![item()],
            },
            now,
        )
        .unwrap();
        let err = invoice_from_work_order(InvoiceId::new(), "INV-1".into(), &caller, &wo, now, now)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }

    #[test]
    fn completed_work_order_converts() {
        let caller = Caller::new(TenantId::new(), UserId::new());
        let now = Utc::now();
        let wo = WorkOrder::import(
            &caller,
            WorkOrderImport {
                id: WorkOrderId::new(),
                customer_id: CustomerId::new(),
                number: "WO-8".to_string(),
                status: WorkOrderStatus::Completed,
                items: vec![item()],
            },
            now,
        )
        .unwrap();
        let invoice = invoice_from_work_order(
            InvoiceId::new(),
            "INV-2".into(),
            &caller,
            &wo,
            now + Duration::days(30),
            now,
        )
        .unwrap();
        assert_eq!(invoice.source().work_order_id(), Some(wo.id_typed()));
        assert_eq!(invoice.status(), InvoiceStatus::Issued);
    }
}
