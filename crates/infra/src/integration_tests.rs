//! End-to-end tests for the document services over the in-memory store.
//!
//! Covers:
//! - Quotation → invoice conversion, at most once, including under concurrency
//! - Payment ledger status derivation, deletion and idempotent replays,
//!   including concurrent writers on one invoice
//! - Sweeper expiry/overdue demotion and its idempotence
//! - Tenant isolation and operation timeouts

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use shopdocs_core::{Caller, CustomerId, Money, TenantId, UserId, WorkOrderId};
use shopdocs_invoicing::{
    Invoice, InvoiceDraft, InvoicePatch, InvoiceSource, InvoiceStatus, PaymentInput, PaymentMethod,
};
use shopdocs_pricing::{LineItemInput, LineItemKind};
use shopdocs_quotations::{Quotation, QuotationDraft, QuotationStatus, TransitionRequest};
use shopdocs_workorders::{WorkOrderImport, WorkOrderStatus};

use crate::clock::ManualClock;
use crate::services::{DocumentService, ServiceError, ServiceSettings};
use crate::store::{DocumentStore, InMemoryDocumentStore, ListQuery};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn setup() -> (DocumentService, Arc<ManualClock>, InMemoryDocumentStore) {
    let store = InMemoryDocumentStore::new();
    let clock = Arc::new(ManualClock::new(start()));
    let service = DocumentService::new(Arc::new(store.clone()), ServiceSettings::default())
        .with_clock(clock.clone());
    (service, clock, store)
}

fn caller() -> Caller {
    Caller::new(TenantId::new(), UserId::new())
}

fn item(quantity: Decimal, price_major: i64, tax: Decimal) -> LineItemInput {
    LineItemInput {
        kind: LineItemKind::Service,
        reference_id: None,
        description: "Brake pad replacement".to_string(),
        quantity,
        unit_price: Money::from_major(price_major),
        discount_percent: None,
        discount_amount: None,
        tax_percent: Some(tax),
        notes: None,
    }
}

fn payment(major: i64) -> PaymentInput {
    PaymentInput {
        amount: Money::from_major(major),
        method: PaymentMethod::Cash,
        paid_at: None,
        reference: None,
        notes: None,
        idempotency_key: None,
    }
}

async fn approved_quotation(service: &DocumentService, caller: &Caller) -> Quotation {
    let q = service
        .create_quotation(
            caller,
            QuotationDraft {
                customer_id: CustomerId::new(),
                valid_until: start() + Duration::days(14),
                notes: None,
                discount_percent: None,
                discount_amount: None,
                items: vec![item(dec!(2), 100, dec!(16))],
            },
        )
        .await
        .unwrap();
    for to in [QuotationStatus::Sent, QuotationStatus::Approved] {
        service
            .transition_quotation(caller, q.id_typed(), TransitionRequest { to, valid_until: None })
            .await
            .unwrap();
    }
    service.get_quotation(caller, q.id_typed()).await.unwrap()
}

async fn issued_invoice(service: &DocumentService, caller: &Caller, due_in: Duration) -> Invoice {
    let invoice = service
        .create_invoice(
            caller,
            InvoiceDraft {
                customer_id: CustomerId::new(),
                due_date: service.now() + due_in,
                notes: None,
                discount_percent: None,
                discount_amount: None,
                items: vec![item(dec!(2), 100, dec!(16))],
            },
        )
        .await
        .unwrap();
    service.issue_invoice(caller, invoice.id_typed()).await.unwrap()
}

#[tokio::test]
async fn approved_quotation_converts_exactly_once() {
    let (service, _, _) = setup();
    let c = caller();
    let q = approved_quotation(&service, &c).await;
    assert_eq!(q.totals().total, Money::from_major(232));
    assert_eq!(q.number(), "Q-000001");

    let invoice = service.convert_quotation(&c, q.id_typed()).await.unwrap();
    assert_eq!(invoice.source(), InvoiceSource::Quotation(q.id_typed()));
    assert_eq!(invoice.totals().total, Money::from_major(232));
    assert_eq!(invoice.paid_amount(), Money::ZERO);
    assert_eq!(invoice.status(), InvoiceStatus::Issued);
    assert_eq!(invoice.number(), "INV-000001");
    assert_eq!(invoice.due_date(), start() + Duration::days(30));

    let q = service.get_quotation(&c, q.id_typed()).await.unwrap();
    assert_eq!(q.status(), QuotationStatus::Converted);
    assert_eq!(q.invoice_id(), Some(invoice.id_typed()));

    let second = service.convert_quotation(&c, q.id_typed()).await;
    assert_eq!(second.unwrap_err(), ServiceError::AlreadyConverted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_conversions_produce_one_invoice() {
    let (service, _, _) = setup();
    let c = caller();
    let q = approved_quotation(&service, &c).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let id = q.id_typed();
        handles.push(tokio::spawn(async move { service.convert_quotation(&c, id).await }));
    }

    let mut converted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => converted += 1,
            Err(ServiceError::AlreadyConverted) => rejected += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!((converted, rejected), (1, 7));

    let invoices = service.list_invoices(&c, ListQuery::default()).await.unwrap();
    assert_eq!(invoices.len(), 1);
}

#[tokio::test]
async fn conversion_preconditions_surface_named_errors() {
    let (service, clock, _) = setup();
    let c = caller();

    let draft = service
        .create_quotation(
            &c,
            QuotationDraft {
                customer_id: CustomerId::new(),
                valid_until: start() + Duration::days(1),
                notes: None,
                discount_percent: None,
                discount_amount: None,
                items: vec![item(dec!(1), 10, dec!(0))],
            },
        )
        .await
        .unwrap();
    match service.convert_quotation(&c, draft.id_typed()).await {
        Err(ServiceError::InvalidState { status, .. }) => assert_eq!(status, "draft"),
        other => panic!("expected InvalidState, got {other:?}"),
    }

    let approved = approved_quotation(&service, &c).await;
    clock.advance(Duration::days(15));
    assert!(matches!(
        service.convert_quotation(&c, approved.id_typed()).await,
        Err(ServiceError::Expired { .. })
    ));

    // Failed conversions leave no invoice behind and consume no number.
    assert!(service.list_invoices(&c, ListQuery::default()).await.unwrap().is_empty());
    let next = issued_invoice(&service, &c, Duration::days(3)).await;
    assert_eq!(next.number(), "INV-000001");
}

#[tokio::test]
async fn partial_then_full_payment() {
    let (service, _, _) = setup();
    let c = caller();
    let invoice = issued_invoice(&service, &c, Duration::days(10)).await;

    let invoice = service.record_payment(&c, invoice.id_typed(), payment(100)).await.unwrap();
    assert_eq!(invoice.paid_amount(), Money::from_major(100));
    assert_eq!(invoice.status(), InvoiceStatus::PartiallyPaid);

    let invoice = service.record_payment(&c, invoice.id_typed(), payment(132)).await.unwrap();
    assert_eq!(invoice.paid_amount(), Money::from_major(232));
    assert_eq!(invoice.status(), InvoiceStatus::Paid);
    assert_eq!(invoice.balance_due(), Money::ZERO);
}

#[tokio::test]
async fn deleting_a_payment_recomputes_from_the_ledger() {
    let (service, _, _) = setup();
    let c = caller();
    let invoice = issued_invoice(&service, &c, Duration::days(10)).await;
    service.record_payment(&c, invoice.id_typed(), payment(100)).await.unwrap();
    let paid = service.record_payment(&c, invoice.id_typed(), payment(132)).await.unwrap();
    assert_eq!(paid.status(), InvoiceStatus::Paid);

    let payments = service.list_payments(&c, invoice.id_typed()).await.unwrap();
    let last = payments
        .iter()
        .find(|p| p.amount() == Money::from_major(132))
        .unwrap();
    let invoice = service
        .delete_payment(&c, invoice.id_typed(), last.id_typed())
        .await
        .unwrap();
    assert_eq!(invoice.paid_amount(), Money::from_major(100));
    assert_eq!(invoice.status(), InvoiceStatus::PartiallyPaid);

    let again = service.delete_payment(&c, invoice.id_typed(), last.id_typed()).await;
    assert_eq!(again.unwrap_err(), ServiceError::NotFound);
}

async fn assert_paid_matches_ledger(
    service: &DocumentService,
    caller: &Caller,
    invoice: &Invoice,
) -> Invoice {
    let current = service.get_invoice(caller, invoice.id_typed()).await.unwrap();
    let ledger: Money = service
        .list_payments(caller, invoice.id_typed())
        .await
        .unwrap()
        .iter()
        .map(|p| p.amount())
        .sum();
    assert_eq!(current.paid_amount(), ledger);
    assert_eq!(
        current.status() == InvoiceStatus::Paid,
        current.paid_amount() >= current.totals().total
    );
    current
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_payments_converge_on_the_ledger_sum() {
    let (service, _, _) = setup();
    let c = caller();
    let invoice = issued_invoice(&service, &c, Duration::days(10)).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let id = invoice.id_typed();
        handles.push(tokio::spawn(async move { service.record_payment(&c, id, payment(25)).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    let current = assert_paid_matches_ledger(&service, &c, &invoice).await;
    assert_eq!(current.paid_amount(), Money::from_major(200));
    assert_eq!(current.status(), InvoiceStatus::PartiallyPaid);

    service.record_payment(&c, invoice.id_typed(), payment(32)).await.unwrap();
    let current = assert_paid_matches_ledger(&service, &c, &invoice).await;
    assert_eq!(current.status(), InvoiceStatus::Paid);

    let payments = service.list_payments(&c, invoice.id_typed()).await.unwrap();
    let mut handles = Vec::new();
    for p in payments.iter().filter(|p| p.amount() == Money::from_major(25)).take(3) {
        let service = service.clone();
        let (id, payment_id) = (invoice.id_typed(), p.id_typed());
        handles.push(tokio::spawn(async move { service.delete_payment(&c, id, payment_id).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    let current = assert_paid_matches_ledger(&service, &c, &invoice).await;
    assert_eq!(current.paid_amount(), Money::from_major(157));
    assert_eq!(current.status(), InvoiceStatus::PartiallyPaid);
    assert_eq!(service.list_payments(&c, invoice.id_typed()).await.unwrap().len(), 6);
}

#[tokio::test]
async fn idempotency_key_replay_records_once() {
    let (service, _, _) = setup();
    let c = caller();
    let invoice = issued_invoice(&service, &c, Duration::days(10)).await;

    let mut input = payment(50);
    input.idempotency_key = Some("till-7/0042".to_string());

    let first = service.record_payment(&c, invoice.id_typed(), input.clone()).await.unwrap();
    let replay = service.record_payment(&c, invoice.id_typed(), input).await.unwrap();

    assert_eq!(first.paid_amount(), Money::from_major(50));
    assert_eq!(replay, first);
    assert_eq!(service.list_payments(&c, invoice.id_typed()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn payments_are_rejected_on_cancelled_invoices() {
    let (service, _, _) = setup();
    let c = caller();
    let invoice = issued_invoice(&service, &c, Duration::days(10)).await;
    service.record_payment(&c, invoice.id_typed(), payment(20)).await.unwrap();
    let cancelled = service.cancel_invoice(&c, invoice.id_typed()).await.unwrap();
    assert_eq!(cancelled.paid_amount(), Money::from_major(20));

    match service.record_payment(&c, invoice.id_typed(), payment(10)).await {
        Err(ServiceError::InvalidState { status, .. }) => assert_eq!(status, "cancelled"),
        other => panic!("expected InvalidState, got {other:?}"),
    }
}

#[tokio::test]
async fn zero_payment_is_a_validation_error() {
    let (service, _, _) = setup();
    let c = caller();
    let invoice = issued_invoice(&service, &c, Duration::days(10)).await;
    assert!(matches!(
        service.record_payment(&c, invoice.id_typed(), payment(0)).await,
        Err(ServiceError::Validation(_))
    ));
}

#[tokio::test]
async fn overpayment_is_recorded_and_reported() {
    let (service, _, _) = setup();
    let c = caller();
    let invoice = issued_invoice(&service, &c, Duration::days(10)).await;

    let invoice = service.record_payment(&c, invoice.id_typed(), payment(300)).await.unwrap();
    assert_eq!(invoice.status(), InvoiceStatus::Paid);
    assert_eq!(invoice.overpaid_amount(), Money::from_major(68));
}

#[tokio::test]
async fn sweep_marks_overdue_and_payment_clears_it() {
    let (service, clock, _) = setup();
    let c = caller();
    let invoice = issued_invoice(&service, &c, Duration::days(1)).await;
    assert_eq!(invoice.status(), InvoiceStatus::Issued);

    clock.advance(Duration::days(2));
    let report = service.sweep_tenant(c.tenant_id()).await.unwrap();
    assert_eq!(report.invoices_overdue, 1);
    let overdue = service.get_invoice(&c, invoice.id_typed()).await.unwrap();
    assert_eq!(overdue.status(), InvoiceStatus::Overdue);

    let paid = service.record_payment(&c, invoice.id_typed(), payment(232)).await.unwrap();
    assert_eq!(paid.status(), InvoiceStatus::Paid);
}

#[tokio::test]
async fn extending_the_due_date_clears_overdue() {
    let (service, clock, _) = setup();
    let c = caller();
    let invoice = issued_invoice(&service, &c, Duration::days(1)).await;
    clock.advance(Duration::days(2));
    service.sweep_tenant(c.tenant_id()).await.unwrap();

    let invoice = service
        .update_invoice(
            &c,
            invoice.id_typed(),
            InvoicePatch {
                due_date: Some(service.now() + Duration::days(7)),
                ..InvoicePatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(invoice.status(), InvoiceStatus::Issued);
}

#[tokio::test]
async fn status_filter_matches_the_effective_status() {
    let (service, clock, _) = setup();
    let c = caller();
    let late = issued_invoice(&service, &c, Duration::days(1)).await;
    let current = issued_invoice(&service, &c, Duration::days(30)).await;
    clock.advance(Duration::days(2));

    let by_status = |status: InvoiceStatus| ListQuery {
        status: Some(status),
        ..ListQuery::default()
    };
    let overdue = service.list_invoices(&c, by_status(InvoiceStatus::Overdue)).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id_typed(), late.id_typed());
    assert_eq!(overdue[0].status(), InvoiceStatus::Issued);

    let issued = service.list_invoices(&c, by_status(InvoiceStatus::Issued)).await.unwrap();
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].id_typed(), current.id_typed());
}

#[tokio::test]
async fn sweep_expires_quotations_and_is_idempotent() {
    let (service, clock, _) = setup();
    let c = caller();
    let approved = approved_quotation(&service, &c).await;
    let converted = approved_quotation(&service, &c).await;
    service.convert_quotation(&c, converted.id_typed()).await.unwrap();

    clock.advance(Duration::days(20));
    let first = service.sweep_all().await.unwrap();
    assert_eq!(first.quotations_expired, 1);

    let second = service.sweep_all().await.unwrap();
    assert!(second.is_empty());

    let approved = service.get_quotation(&c, approved.id_typed()).await.unwrap();
    assert_eq!(approved.status(), QuotationStatus::Expired);
    let converted = service.get_quotation(&c, converted.id_typed()).await.unwrap();
    assert_eq!(converted.status(), QuotationStatus::Converted);
}

#[tokio::test]
async fn expired_quotation_can_return_to_draft_with_new_validity() {
    let (service, clock, _) = setup();
    let c = caller();
    let q = approved_quotation(&service, &c).await;
    clock.advance(Duration::days(20));
    service.sweep_tenant(c.tenant_id()).await.unwrap();

    let reopened = service
        .transition_quotation(
            &c,
            q.id_typed(),
            TransitionRequest {
                to: QuotationStatus::Draft,
                valid_until: Some(service.now() + Duration::days(14)),
            },
        )
        .await
        .unwrap();
    assert_eq!(reopened.status(), QuotationStatus::Draft);
}

#[tokio::test]
async fn foreign_tenant_sees_not_found() {
    let (service, _, _) = setup();
    let owner = caller();
    let stranger = caller();
    let q = approved_quotation(&service, &owner).await;
    let invoice = issued_invoice(&service, &owner, Duration::days(5)).await;

    assert_eq!(
        service.get_quotation(&stranger, q.id_typed()).await.unwrap_err(),
        ServiceError::NotFound
    );
    assert_eq!(
        service.convert_quotation(&stranger, q.id_typed()).await.unwrap_err(),
        ServiceError::NotFound
    );
    assert_eq!(
        service
            .record_payment(&stranger, invoice.id_typed(), payment(10))
            .await
            .unwrap_err(),
        ServiceError::NotFound
    );
    assert!(service
        .list_invoices(&stranger, ListQuery::default())
        .await
        .unwrap()
        .is_empty());

    // Owner state is untouched.
    let invoice = service.get_invoice(&owner, invoice.id_typed()).await.unwrap();
    assert_eq!(invoice.paid_amount(), Money::ZERO);
}

#[tokio::test]
async fn completed_work_order_converts_once() {
    let (service, _, _) = setup();
    let c = caller();
    let snapshot = WorkOrderImport {
        id: WorkOrderId::new(),
        customer_id: CustomerId::new(),
        number: "WO-118".to_string(),
        status: WorkOrderStatus::InProgress,
        items: vec![item(dec!(1.5), 40, dec!(16))],
    };
    service.import_work_order(&c, snapshot.clone()).await.unwrap();

    match service.convert_work_order(&c, snapshot.id).await {
        Err(ServiceError::InvalidState { status, .. }) => assert_eq!(status, "in_progress"),
        other => panic!("expected InvalidState, got {other:?}"),
    }

    let mut done = snapshot.clone();
    done.status = WorkOrderStatus::Completed;
    let wo = service.import_work_order(&c, done).await.unwrap();
    assert_eq!(wo.status(), WorkOrderStatus::Completed);

    let invoice = service.convert_work_order(&c, snapshot.id).await.unwrap();
    assert_eq!(invoice.source(), InvoiceSource::WorkOrder(snapshot.id));
    // 1.5 × 40.00 = 60.00, 16% tax = 9.60
    assert_eq!(invoice.totals().total, Money::from_minor(6960));

    assert_eq!(
        service.convert_work_order(&c, snapshot.id).await.unwrap_err(),
        ServiceError::AlreadyConverted
    );
    let wo = service.get_work_order(&c, snapshot.id).await.unwrap();
    assert_eq!(wo.invoice_id(), Some(invoice.id_typed()));
}

#[tokio::test]
async fn blocked_store_times_out_and_rolls_back() {
    let (service, _, store) = setup();
    let settings = ServiceSettings {
        store_timeout: StdDuration::from_millis(50),
        ..ServiceSettings::default()
    };
    let impatient = DocumentService::new(Arc::new(store.clone()), settings);
    let c = caller();

    // Hold the store's only transaction slot.
    let held = store.begin().await.unwrap();
    let err = impatient
        .create_invoice(
            &c,
            InvoiceDraft {
                customer_id: CustomerId::new(),
                due_date: Utc::now() + Duration::days(3),
                notes: None,
                discount_percent: None,
                discount_amount: None,
                items: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Timeout { operation: "invoice.create", .. }));
    drop(held);

    assert!(service.list_invoices(&c, ListQuery::default()).await.unwrap().is_empty());
}
