use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Actor,
    errors::ServiceError,
    models::{
        EntityKind, InvoiceStatus, PaymentPlanStatus, PurchaseOrderStatus, QuotationStatus,
        RfqStatus, Supplier, SupplierStatus,
    },
    store::{EntityFilter, EntityStore, EntityStoreExt, Record},
};

/// Filter accepted by the list endpoints.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ListFilter {
    pub status: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub rfq_id: Option<Uuid>,
    pub purchase_order_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

/// Canonical status name for `kind`, or a validation error naming the bad value.
pub fn normalize_status(kind: EntityKind, status: &str) -> Result<String, ServiceError> {
    fn parse<S: FromStr + ToString>(status: &str) -> Option<String> {
        S::from_str(status).ok().map(|s| s.to_string())
    }

    let status = status.trim().to_lowercase();
    let parsed = match kind {
        EntityKind::Supplier => parse::<SupplierStatus>(&status),
        EntityKind::Rfq => parse::<RfqStatus>(&status),
        EntityKind::Quotation => parse::<QuotationStatus>(&status),
        EntityKind::PurchaseOrder => parse::<PurchaseOrderStatus>(&status),
        EntityKind::Invoice => parse::<InvoiceStatus>(&status),
        EntityKind::PaymentPlan => parse::<PaymentPlanStatus>(&status),
        EntityKind::Payment => None,
    };
    parsed.ok_or_else(|| ServiceError::ValidationError(format!("unknown {} status '{}'", kind, status)))
}

/// Role-scoped reads over the store.
///
/// Staff roles see everything. A provider sees its own suppliers, the RFQs they
/// were invited to, and the quotations, orders, invoices and plans of those
/// suppliers.
#[derive(Clone)]
pub struct EntityQueryService {
    store: Arc<dyn EntityStore>,
}

impl EntityQueryService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    async fn owned_suppliers(&self, actor: &Actor) -> Result<HashSet<Uuid>, ServiceError> {
        let mut filter = EntityFilter::new(EntityKind::Supplier);
        filter.created_by = Some(actor.id);
        let suppliers: Vec<Supplier> = self.store.find(&filter).await?;
        Ok(suppliers.into_iter().map(|s| s.id).collect())
    }

    fn visible_to(record: &Record, owned: &HashSet<Uuid>) -> bool {
        match record {
            Record::Rfq(rfq) => rfq.invited_supplier_ids.iter().any(|id| owned.contains(id)),
            other => other.supplier_id().map_or(false, |id| owned.contains(&id)),
        }
    }

    fn ensure_stored(kind: EntityKind) -> Result<(), ServiceError> {
        if kind.is_stored() {
            Ok(())
        } else {
            Err(ServiceError::ValidationError(format!(
                "{} records are read through their payment plan",
                kind
            )))
        }
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn get_entity(
        &self,
        actor: &Actor,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<Record, ServiceError> {
        Self::ensure_stored(kind)?;
        let record = self.store.get(kind, id).await?;
        if actor.is_provider() {
            let owned = self.owned_suppliers(actor).await?;
            if !Self::visible_to(&record, &owned) {
                warn!(actor = %actor.id, %kind, %id, "provider read outside its suppliers");
                return Err(ServiceError::Unauthorized(format!(
                    "{} {} does not belong to your suppliers",
                    kind, id
                )));
            }
        }
        Ok(record)
    }

    /// Every matching record visible to `actor`, oldest first.
    #[instrument(skip(self, actor, filter), fields(actor = %actor.id))]
    pub async fn list_entities(
        &self,
        actor: &Actor,
        kind: EntityKind,
        filter: &ListFilter,
    ) -> Result<Vec<Record>, ServiceError> {
        Self::ensure_stored(kind)?;
        let mut query = EntityFilter::new(kind);
        query.status = filter
            .status
            .as_deref()
            .map(|s| normalize_status(kind, s))
            .transpose()?;
        query.supplier_id = filter.supplier_id;
        query.rfq_id = filter.rfq_id;
        query.purchase_order_id = filter.purchase_order_id;
        query.invoice_id = filter.invoice_id;
        query.created_from = filter.created_from;
        query.created_to = filter.created_to;

        let records = self.store.query(&query).await?;
        if !actor.is_provider() {
            return Ok(records);
        }
        let owned = self.owned_suppliers(actor).await?;
        Ok(records
            .into_iter()
            .filter(|r| Self::visible_to(r, &owned))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_are_normalized() {
        assert_eq!(
            normalize_status(EntityKind::PurchaseOrder, "Issued").unwrap(),
            "sent"
        );
        assert_eq!(normalize_status(EntityKind::Rfq, "open").unwrap(), "open");
        assert!(normalize_status(EntityKind::Invoice, "shipped").is_err());
        assert!(normalize_status(EntityKind::Payment, "paid").is_err());
    }
}
