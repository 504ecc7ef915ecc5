use tracing::{info, instrument, warn};

use shopdocs_core::{AggregateRoot, Caller, ExpectedVersion, InvoiceId, PaymentId, guard};
use shopdocs_invoicing::{Invoice, Payment, PaymentInput, paid_amount};

use super::{DocumentService, ServiceError, ServiceResult};
use crate::store::{StoreError, constraints};

impl DocumentService {
    /// Record a payment and return the invoice in its new state.
    ///
    /// With an idempotency key, a replay of an already-recorded payment
    /// returns the current invoice without inserting anything.
    #[instrument(
        skip(self, caller, input),
        fields(tenant_id = %caller.tenant_id(), amount = %input.amount, method = ?input.method),
        err
    )]
    pub async fn record_payment(
        &self,
        caller: &Caller,
        invoice_id: InvoiceId,
        input: PaymentInput,
    ) -> ServiceResult<Invoice> {
        let idempotency_key = input.idempotency_key.clone();
        let outcome = self
            .bounded("payment.record", async move {
                let now = self.now();
                let mut tx = self.begin().await?;
                let mut invoice =
                    guard(caller, tx.load_invoice(caller.tenant_id(), invoice_id).await?)?;

                if let Some(key) = input.idempotency_key.as_deref() {
                    let key = key.trim();
                    if let Some(existing) = tx
                        .find_payment_by_key(caller.tenant_id(), invoice_id, key)
                        .await?
                    {
                        info!(payment_id = %existing.id_typed(), "payment replayed");
                        return Ok(Ok(invoice));
                    }
                }

                invoice.ensure_accepts_payment()?;
                let expected = ExpectedVersion::Exact(invoice.version());
                let payment = Payment::record(PaymentId::new(), caller, invoice_id, input, now)?;

                match tx.insert_payment(&payment).await {
                    Ok(()) => {}
                    Err(StoreError::UniqueViolation { constraint })
                        if constraint == constraints::PAYMENT_IDEMPOTENCY_KEY =>
                    {
                        return Ok(Err(()));
                    }
                    Err(e) => return Err(e.into()),
                }

                let payments = tx.list_payments(caller.tenant_id(), invoice_id).await?;
                invoice.apply_ledger(paid_amount(&payments), now)?;
                tx.save_invoice(&invoice, expected).await?;
                tx.commit().await?;

                info!(
                    payment_id = %payment.id_typed(),
                    paid = %invoice.paid_amount(),
                    status = %invoice.status(),
                    "payment recorded"
                );
                if invoice.overpaid_amount().is_positive() {
                    warn!(
                        invoice_id = %invoice_id,
                        overpaid = %invoice.overpaid_amount(),
                        "invoice overpaid"
                    );
                }
                Ok(Ok(invoice))
            })
            .await?;

        match outcome {
            Ok(invoice) => Ok(invoice),
            // Lost a race against a concurrent request carrying the same key;
            // that request's payment is the one that counts.
            Err(()) => {
                info!(idempotency_key = ?idempotency_key, "payment replayed after concurrent insert");
                self.get_invoice(caller, invoice_id).await
            }
        }
    }

    /// Delete a payment and re-derive the invoice from the remaining ledger.
    #[instrument(skip(self, caller), fields(tenant_id = %caller.tenant_id()), err)]
    pub async fn delete_payment(
        &self,
        caller: &Caller,
        invoice_id: InvoiceId,
        payment_id: PaymentId,
    ) -> ServiceResult<Invoice> {
        self.bounded("payment.delete", async move {
            let now = self.now();
            let mut tx = self.begin().await?;
            let mut invoice =
                guard(caller, tx.load_invoice(caller.tenant_id(), invoice_id).await?)?;
            let expected = ExpectedVersion::Exact(invoice.version());

            if !tx
                .delete_payment(caller.tenant_id(), invoice_id, payment_id)
                .await?
            {
                return Err(ServiceError::NotFound);
            }
            let payments = tx.list_payments(caller.tenant_id(), invoice_id).await?;
            invoice.apply_ledger(paid_amount(&payments), now)?;
            tx.save_invoice(&invoice, expected).await?;
            tx.commit().await?;

            info!(
                %payment_id,
                paid = %invoice.paid_amount(),
                status = %invoice.status(),
                "payment deleted"
            );
            Ok(invoice)
        })
        .await
    }

    pub async fn list_payments(
        &self,
        caller: &Caller,
        invoice_id: InvoiceId,
    ) -> ServiceResult<Vec<Payment>> {
        self.bounded("payment.list", async move {
            let mut tx = self.begin().await?;
            guard(caller, tx.load_invoice(caller.tenant_id(), invoice_id).await?)?;
            Ok(tx.list_payments(caller.tenant_id(), invoice_id).await?)
        })
        .await
    }
}
