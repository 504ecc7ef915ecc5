//! Quotation and work order conversion into issued invoices.
//!
//! The source row is locked and checked, the invoice is inserted with its
//! `source` stamped, and the source is marked converted, all in one
//! transaction. The store's unique index on the invoice source is what finally
//! decides a race between two converters; the loser's insert fails and its
//! transaction rolls back.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};

use shopdocs_core::{
    AggregateRoot, Caller, DocumentKind, ExpectedVersion, InvoiceId, QuotationId, WorkOrderId,
    guard,
};
use shopdocs_invoicing::{Invoice, invoice_from_quotation, invoice_from_work_order};

use super::{DocumentService, ServiceResult};

impl DocumentService {
    fn due_date_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.settings().payment_terms_days)
    }

    #[instrument(skip(self, caller), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn convert_quotation(
        &self,
        caller: &Caller,
        quotation_id: QuotationId,
    ) -> ServiceResult<Invoice> {
        self.bounded("quotation.convert", async move {
            let now = self.now();
            let mut tx = self.begin().await?;
            let mut quotation =
                guard(caller, tx.load_quotation(caller.tenant_id(), quotation_id).await?)?;
            let expected = ExpectedVersion::Exact(quotation.version());

            // Fail before consuming an invoice number.
            quotation.ensure_convertible(now)?;

            let seq = tx.next_number(caller.tenant_id(), DocumentKind::Invoice).await?;
            let invoice = invoice_from_quotation(
                InvoiceId::new(),
                DocumentKind::Invoice.format(seq),
                caller,
                &quotation,
                self.due_date_from(now),
                now,
            )?;
            tx.insert_invoice(&invoice).await?;

            quotation.mark_converted(invoice.id_typed(), now)?;
            tx.save_quotation(&quotation, expected).await?;
            tx.commit().await?;

            info!(
                %quotation_id,
                invoice_id = %invoice.id_typed(),
                number = invoice.number(),
                total = %invoice.totals().total,
                "quotation converted"
            );
            Ok(invoice)
        })
        .await
    }

    #[instrument(skip(self, caller), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn convert_work_order(
        &self,
        caller: &Caller,
        work_order_id: WorkOrderId,
    ) -> ServiceResult<Invoice> {
        self.bounded("work_order.convert", async move {
            let now = self.now();
            let mut tx = self.begin().await?;
            let mut work_order =
                guard(caller, tx.load_work_order(caller.tenant_id(), work_order_id).await?)?;
            let expected = ExpectedVersion::Exact(work_order.version());

            work_order.ensure_billable()?;

            let seq = tx.next_number(caller.tenant_id(), DocumentKind::Invoice).await?;
            let invoice = invoice_from_work_order(
                InvoiceId::new(),
                DocumentKind::Invoice.format(seq),
                caller,
                &work_order,
                self.due_date_from(now),
                now,
            )?;
            tx.insert_invoice(&invoice).await?;

            work_order.mark_invoiced(invoice.id_typed(), now)?;
            tx.save_work_order(&work_order, expected).await?;
            tx.commit().await?;

            info!(
                %work_order_id,
                invoice_id = %invoice.id_typed(),
                number = invoice.number(),
                total = %invoice.totals().total,
                "work order converted"
            );
            Ok(invoice)
        })
        .await
    }
}
