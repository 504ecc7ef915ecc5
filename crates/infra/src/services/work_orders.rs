use tracing::{info, instrument};

use shopdocs_core::{AggregateRoot, Caller, ExpectedVersion, WorkOrderId, guard};
use shopdocs_workorders::{WorkOrder, WorkOrderImport};

use super::{DocumentService, ServiceResult};

impl DocumentService {
    /// Upsert a work order snapshot pushed by the fulfillment workflow.
    ///
    /// Re-importing an invoiced work order is rejected; its billed content is
    /// frozen.
    #[instrument(
        skip(self, caller, snapshot),
        fields(tenant_id = %caller.tenant_id(), work_order_id = %snapshot.id, status = %snapshot.status),
        err
    )]
    pub async fn import_work_order(
        &self,
        caller: &Caller,
        snapshot: WorkOrderImport,
    ) -> ServiceResult<WorkOrder> {
        self.bounded("work_order.import", async move {
            let now = self.now();
            let mut tx = self.begin().await?;
            let work_order = match tx.load_work_order(caller.tenant_id(), snapshot.id).await? {
                Some(mut existing) => {
                    let expected = ExpectedVersion::Exact(existing.version());
                    existing.refresh(snapshot, now)?;
                    tx.save_work_order(&existing, expected).await?;
                    existing
                }
                None => {
                    let created = WorkOrder::import(caller, snapshot, now)?;
                    tx.insert_work_order(&created).await?;
                    created
                }
            };
            tx.commit().await?;

            info!(version = work_order.version(), "work order imported");
            Ok(work_order)
        })
        .await
    }

    pub async fn get_work_order(
        &self,
        caller: &Caller,
        id: WorkOrderId,
    ) -> ServiceResult<WorkOrder> {
        self.bounded("work_order.get", async move {
            let mut tx = self.begin().await?;
            Ok(guard(caller, tx.load_work_order(caller.tenant_id(), id).await?)?)
        })
        .await
    }
}
