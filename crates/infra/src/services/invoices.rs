use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use shopdocs_core::{
    AggregateRoot, Caller, DocumentKind, DomainResult, ExpectedVersion, InvoiceId, LineItemId,
    guard,
};
use shopdocs_invoicing::{Invoice, InvoiceDraft, InvoicePatch, InvoiceStatus};
use shopdocs_pricing::{LineItemInput, LineItemPatch};

use super::{DocumentService, ServiceResult};
use crate::store::ListQuery;

impl DocumentService {
    async fn mutate_invoice<T, F>(
        &self,
        operation: &'static str,
        caller: &Caller,
        id: InvoiceId,
        f: F,
    ) -> ServiceResult<(Invoice, T)>
    where
        F: FnOnce(&mut Invoice, DateTime<Utc>) -> DomainResult<T> + Send,
        T: Send,
    {
        self.bounded(operation, async move {
            let now = self.now();
            let mut tx = self.begin().await?;
            let mut invoice = guard(caller, tx.load_invoice(caller.tenant_id(), id).await?)?;
            let expected = ExpectedVersion::Exact(invoice.version());

            let out = f(&mut invoice, now)?;

            tx.save_invoice(&invoice, expected).await?;
            tx.commit().await?;
            Ok((invoice, out))
        })
        .await
    }

    /// Create a draft invoice not backed by any source document.
    #[instrument(skip(self, caller, draft), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn create_invoice(
        &self,
        caller: &Caller,
        draft: InvoiceDraft,
    ) -> ServiceResult<Invoice> {
        self.bounded("invoice.create", async move {
            let now = self.now();
            let mut tx = self.begin().await?;
            let seq = tx.next_number(caller.tenant_id(), DocumentKind::Invoice).await?;
            let invoice = Invoice::create(
                InvoiceId::new(),
                DocumentKind::Invoice.format(seq),
                caller,
                draft,
                now,
            )?;
            tx.insert_invoice(&invoice).await?;
            tx.commit().await?;

            info!(
                invoice_id = %invoice.id_typed(),
                number = invoice.number(),
                total = %invoice.totals().total,
                "invoice created"
            );
            Ok(invoice)
        })
        .await
    }

    #[instrument(skip(self, caller, patch), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn update_invoice(
        &self,
        caller: &Caller,
        id: InvoiceId,
        patch: InvoicePatch,
    ) -> ServiceResult<Invoice> {
        let (invoice, ()) = self
            .mutate_invoice("invoice.update", caller, id, |inv, now| inv.apply_patch(patch, now))
            .await?;
        Ok(invoice)
    }

    #[instrument(skip(self, caller, input), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn add_invoice_item(
        &self,
        caller: &Caller,
        id: InvoiceId,
        input: LineItemInput,
    ) -> ServiceResult<Invoice> {
        let (invoice, item_id) = self
            .mutate_invoice("invoice.add_item", caller, id, |inv, now| inv.add_item(input, now))
            .await?;
        info!(%item_id, total = %invoice.totals().total, status = %invoice.status(), "invoice item added");
        Ok(invoice)
    }

    #[instrument(skip(self, caller, patch), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn update_invoice_item(
        &self,
        caller: &Caller,
        id: InvoiceId,
        item_id: LineItemId,
        patch: LineItemPatch,
    ) -> ServiceResult<Invoice> {
        let (invoice, ()) = self
            .mutate_invoice("invoice.update_item", caller, id, |inv, now| {
                inv.update_item(item_id, patch, now)
            })
            .await?;
        Ok(invoice)
    }

    #[instrument(skip(self, caller), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn delete_invoice_item(
        &self,
        caller: &Caller,
        id: InvoiceId,
        item_id: LineItemId,
    ) -> ServiceResult<Invoice> {
        let (invoice, ()) = self
            .mutate_invoice("invoice.delete_item", caller, id, |inv, now| {
                inv.delete_item(item_id, now)
            })
            .await?;
        Ok(invoice)
    }

    #[instrument(skip(self, caller), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn issue_invoice(&self, caller: &Caller, id: InvoiceId) -> ServiceResult<Invoice> {
        let (invoice, ()) = self
            .mutate_invoice("invoice.issue", caller, id, |inv, now| inv.issue(now))
            .await?;
        info!(invoice_id = %id, status = %invoice.status(), "invoice issued");
        Ok(invoice)
    }

    #[instrument(skip(self, caller), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn cancel_invoice(&self, caller: &Caller, id: InvoiceId) -> ServiceResult<Invoice> {
        let (invoice, ()) = self
            .mutate_invoice("invoice.cancel", caller, id, |inv, now| inv.cancel(now))
            .await?;
        info!(invoice_id = %id, paid = %invoice.paid_amount(), "invoice cancelled");
        Ok(invoice)
    }

    pub async fn get_invoice(&self, caller: &Caller, id: InvoiceId) -> ServiceResult<Invoice> {
        self.bounded("invoice.get", async move {
            let mut tx = self.begin().await?;
            Ok(guard(caller, tx.load_invoice(caller.tenant_id(), id).await?)?)
        })
        .await
    }

    pub async fn list_invoices(
        &self,
        caller: &Caller,
        query: ListQuery<InvoiceStatus>,
    ) -> ServiceResult<Vec<Invoice>> {
        self.bounded("invoice.list", async move {
            let now = self.now();
            let mut tx = self.begin().await?;
            Ok(tx.list_invoices(caller.tenant_id(), &query, now).await?)
        })
        .await
    }
}
