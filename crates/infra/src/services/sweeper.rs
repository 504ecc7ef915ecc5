//! Time-driven status demotion: quotations past `valid_until` become
//! `expired`, open invoices past `due_date` become `overdue`.
//!
//! A pass touches status fields only. Running it twice with the same clock is
//! a no-op the second time.

use core::ops::AddAssign;

use serde::Serialize;
use tracing::{info, instrument, warn};

use shopdocs_core::{AggregateRoot, ExpectedVersion, TenantId};

use super::{DocumentService, ServiceResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub quotations_expired: u64,
    pub invoices_overdue: u64,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.quotations_expired == 0 && self.invoices_overdue == 0
    }
}

impl AddAssign for SweepReport {
    fn add_assign(&mut self, rhs: SweepReport) {
        self.quotations_expired += rhs.quotations_expired;
        self.invoices_overdue += rhs.invoices_overdue;
    }
}

impl DocumentService {
    /// One sweep pass over a single tenant, in one transaction.
    #[instrument(skip(self), err)]
    pub async fn sweep_tenant(&self, tenant_id: TenantId) -> ServiceResult<SweepReport> {
        self.bounded("sweep.tenant", async move {
            let now = self.now();
            let mut tx = self.begin().await?;
            let mut report = SweepReport::default();

            for mut quotation in tx.quotations_to_expire(tenant_id, now).await? {
                let expected = ExpectedVersion::Exact(quotation.version());
                if quotation.expire(now) {
                    tx.save_quotation(&quotation, expected).await?;
                    report.quotations_expired += 1;
                }
            }

            for mut invoice in tx.invoices_past_due(tenant_id, now).await? {
                let expected = ExpectedVersion::Exact(invoice.version());
                if invoice.mark_overdue(now) {
                    tx.save_invoice(&invoice, expected).await?;
                    report.invoices_overdue += 1;
                }
            }

            tx.commit().await?;
            if !report.is_empty() {
                info!(
                    quotations_expired = report.quotations_expired,
                    invoices_overdue = report.invoices_overdue,
                    "sweep applied"
                );
            }
            Ok(report)
        })
        .await
    }

    /// Sweep every known tenant. A failing tenant is logged and skipped.
    #[instrument(skip(self))]
    pub async fn sweep_all(&self) -> ServiceResult<SweepReport> {
        let tenants = self
            .bounded("sweep.tenants", async { Ok(self.store.tenants().await?) })
            .await?;

        let mut total = SweepReport::default();
        for tenant_id in tenants {
            match self.sweep_tenant(tenant_id).await {
                Ok(report) => total += report,
                Err(err) => warn!(%tenant_id, error = %err, "tenant sweep failed"),
            }
        }
        info!(
            quotations_expired = total.quotations_expired,
            invoices_overdue = total.invoices_overdue,
            "sweep pass finished"
        );
        Ok(total)
    }
}
