use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopdocs_core::{
    AggregateRoot, Caller, CustomerId, DomainError, DomainResult, InvoiceId, LineItemId, TenantId,
    TenantScoped, WorkOrderId,
};
use shopdocs_pricing::{LineItem, LineItemInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Open,
    InProgress,
    Completed,
    Delivered,
    Cancelled,
}

impl WorkOrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkOrderStatus::Open => "open",
            WorkOrderStatus::InProgress => "in_progress",
            WorkOrderStatus::Completed => "completed",
            WorkOrderStatus::Delivered => "delivered",
            WorkOrderStatus::Cancelled => "cancelled",
        }
    }

    /// Work is finished and may be billed.
    pub fn is_billable(self) -> bool {
        matches!(self, WorkOrderStatus::Completed | WorkOrderStatus::Delivered)
    }
}

impl core::fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot pushed by the fulfillment workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkOrderImport {
    pub id: WorkOrderId,
    pub customer_id: CustomerId,
    pub number: String,
    pub status: WorkOrderStatus,
    #[serde(default)]
    pub items: Vec<LineItemInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrder {
    id: WorkOrderId,
    tenant_id: TenantId,
    customer_id: CustomerId,
    number: String,
    status: WorkOrderStatus,
    items: Vec<LineItem>,
    invoice_id: Option<InvoiceId>,
    invoiced_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl WorkOrder {
    pub fn import(caller: &Caller, snapshot: WorkOrderImport, now: DateTime<Utc>) -> DomainResult<Self> {
        Self::build(caller.tenant_id(), snapshot, now)
    }

    fn build(tenant_id: TenantId, snapshot: WorkOrderImport, now: DateTime<Utc>) -> DomainResult<Self> {
        if snapshot.number.trim().is_empty() {
            return Err(DomainError::validation("work order number must not be empty"));
        }
        let items = snapshot
            .items
            .into_iter()
            .map(|input| LineItem::new(LineItemId::new(), input))
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(Self {
            id: snapshot.id,
            tenant_id,
            customer_id: snapshot.customer_id,
            number: snapshot.number,
            status: snapshot.status,
            items,
            invoice_id: None,
            invoiced_at: None,
            updated_at: now,
            version: 1,
        })
    }

    /// Replace the fulfillment-owned fields with a newer snapshot.
    ///
    /// The invoice stamp survives re-imports; once billed, the items are frozen.
    pub fn refresh(&mut self, snapshot: WorkOrderImport, now: DateTime<Utc>) -> DomainResult<()> {
        if snapshot.id != self.id {
            return Err(DomainError::validation("work order id mismatch"));
        }
        if self.invoice_id.is_some() {
            return Err(DomainError::invalid_state(
                self.status,
                "work order has already been invoiced",
            ));
        }
        let next = Self::build(self.tenant_id, snapshot, now)?;
        *self = Self {
            version: self.version + 1,
            ..next
        };
        Ok(())
    }

    pub fn id_typed(&self) -> WorkOrderId {
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

    pub fn status(&self) -> WorkOrderStatus {
        self.status
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn invoice_id(&self) -> Option<InvoiceId> {
        self.invoice_id
    }

    pub fn invoiced_at(&self) -> Option<DateTime<Utc>> {
        self.invoiced_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn ensure_billable(&self) -> DomainResult<()> {
        if !self.status.is_billable() {
            return Err(DomainError::invalid_state(
                self.status,
                "only completed work orders can be invoiced",
            ));
        }
        if self.invoice_id.is_some() {
            return Err(DomainError::AlreadyConverted);
        }
        Ok(())
    }

    pub fn mark_invoiced(&mut self, invoice_id: InvoiceId, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_billable()?;
        self.invoice_id = Some(invoice_id);
        self.invoiced_at = Some(now);
        self.updated_at = now;
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for WorkOrder {
    type Id = WorkOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TenantScoped for WorkOrder {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
