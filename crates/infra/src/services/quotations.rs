use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use shopdocs_core::{
    AggregateRoot, Caller, DocumentKind, DomainResult, ExpectedVersion, LineItemId, QuotationId,
    guard,
};
use shopdocs_pricing::{LineItemInput, LineItemPatch};
use shopdocs_quotations::{
    Quotation, QuotationDraft, QuotationPatch, QuotationStatus, TransitionRequest,
};

use super::{DocumentService, ServiceResult};
use crate::store::ListQuery;

impl DocumentService {
    /// Load, mutate and save one quotation in a single transaction.
    async fn mutate_quotation<T, F>(
        &self,
        operation: &'static str,
        caller: &Caller,
        id: QuotationId,
        f: F,
    ) -> ServiceResult<(Quotation, T)>
    where
        F: FnOnce(&mut Quotation, DateTime<Utc>) -> DomainResult<T> + Send,
        T: Send,
    {
        self.bounded(operation, async move {
            let now = self.now();
            let mut tx = self.begin().await?;
            let mut quotation = guard(caller, tx.load_quotation(caller.tenant_id(), id).await?)?;
            let expected = ExpectedVersion::Exact(quotation.version());

            let out = f(&mut quotation, now)?;

            tx.save_quotation(&quotation, expected).await?;
            tx.commit().await?;
            Ok((quotation, out))
        })
        .await
    }

    #[instrument(skip(self, caller, draft), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn create_quotation(
        &self,
        caller: &Caller,
        draft: QuotationDraft,
    ) -> ServiceResult<Quotation> {
        self.bounded("quotation.create", async move {
            let now = self.now();
            let mut tx = self.begin().await?;
            let seq = tx
                .next_number(caller.tenant_id(), DocumentKind::Quotation)
                .await?;
            let quotation = Quotation::create(
                QuotationId::new(),
                DocumentKind::Quotation.format(seq),
                caller,
                draft,
                now,
            )?;
            tx.insert_quotation(&quotation).await?;
            tx.commit().await?;

            info!(
                quotation_id = %quotation.id_typed(),
                number = quotation.number(),
                total = %quotation.totals().total,
                "quotation created"
            );
            Ok(quotation)
        })
        .await
    }

    #[instrument(skip(self, caller, patch), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn update_quotation(
        &self,
        caller: &Caller,
        id: QuotationId,
        patch: QuotationPatch,
    ) -> ServiceResult<Quotation> {
        let (quotation, ()) = self
            .mutate_quotation("quotation.update", caller, id, |q, now| q.apply_patch(patch, now))
            .await?;
        Ok(quotation)
    }

    #[instrument(skip(self, caller, input), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn add_quotation_item(
        &self,
        caller: &Caller,
        id: QuotationId,
        input: LineItemInput,
    ) -> ServiceResult<Quotation> {
        let (quotation, item_id) = self
            .mutate_quotation("quotation.add_item", caller, id, |q, now| q.add_item(input, now))
            .await?;
        info!(%item_id, total = %quotation.totals().total, "quotation item added");
        Ok(quotation)
    }

    #[instrument(skip(self, caller, patch), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn update_quotation_item(
        &self,
        caller: &Caller,
        id: QuotationId,
        item_id: LineItemId,
        patch: LineItemPatch,
    ) -> ServiceResult<Quotation> {
        let (quotation, ()) = self
            .mutate_quotation("quotation.update_item", caller, id, |q, now| {
                q.update_item(item_id, patch, now)
            })
            .await?;
        Ok(quotation)
    }

    #[instrument(skip(self, caller), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn delete_quotation_item(
        &self,
        caller: &Caller,
        id: QuotationId,
        item_id: LineItemId,
    ) -> ServiceResult<Quotation> {
        let (quotation, ()) = self
            .mutate_quotation("quotation.delete_item", caller, id, |q, now| {
                q.delete_item(item_id, now)
            })
            .await?;
        Ok(quotation)
    }

    #[instrument(skip(self, caller), fields(tenant_id = %caller.tenant_id(), to = %request.to), err)]
    pub async fn transition_quotation(
        &self,
        caller: &Caller,
        id: QuotationId,
        request: TransitionRequest,
    ) -> ServiceResult<Quotation> {
        let (quotation, ()) = self
            .mutate_quotation("quotation.transition", caller, id, |q, now| {
                q.transition(request, now)
            })
            .await?;
        info!(status = %quotation.status(), "quotation transitioned");
        Ok(quotation)
    }

    /// Soft delete; the quotation is `NotFound` afterwards.
    #[instrument(skip(self, caller), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn delete_quotation(&self, caller: &Caller, id: QuotationId) -> ServiceResult<()> {
        self.mutate_quotation("quotation.delete", caller, id, |q, now| q.soft_delete(now))
            .await?;
        info!(quotation_id = %id, "quotation deleted");
        Ok(())
    }

    pub async fn get_quotation(&self, caller: &Caller, id: QuotationId) -> ServiceResult<Quotation> {
        self.bounded("quotation.get", async move {
            let mut tx = self.begin().await?;
            Ok(guard(caller, tx.load_quotation(caller.tenant_id(), id).await?)?)
        })
        .await
    }

    pub async fn list_quotations(
        &self,
        caller: &Caller,
        query: ListQuery<QuotationStatus>,
    ) -> ServiceResult<Vec<Quotation>> {
        self.bounded("quotation.list", async move {
            let mut tx = self.begin().await?;
            Ok(tx.list_quotations(caller.tenant_id(), &query).await?)
        })
        .await
    }
}
