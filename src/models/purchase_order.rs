use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::EntityKind;
use crate::errors::ServiceError;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    #[serde(alias = "issued")]
    #[strum(to_string = "sent", serialize = "issued")]
    Sent,
    Confirmed,
    Delivered,
    Cancelled,
}

impl PurchaseOrderStatus {
    /// Forward one step at a time, or cancel before delivery.
    pub fn can_transition_to(&self, next: &PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Sent, Confirmed)
                | (Confirmed, Delivered)
                | (Draft, Cancelled)
                | (Sent, Cancelled)
                | (Confirmed, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Delivered | PurchaseOrderStatus::Cancelled
        )
    }

    /// Counted as "in progress" on the dashboard.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Draft | PurchaseOrderStatus::Sent | PurchaseOrderStatus::Confirmed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub description: String,
    pub quantity: u32,
    #[schema(value_type = String, example = "5800.00")]
    pub unit_price: Decimal,
    #[schema(value_type = String, example = "5800.00")]
    pub line_total: Decimal,
}

impl LineItem {
    pub fn new(
        description: String,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            line_total: super::checked_line_total(quantity, unit_price)?,
            description,
            quantity,
            unit_price,
        })
    }
}

/// Binding order issued against exactly one approved quotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub po_number: String,
    pub quotation_id: Uuid,
    pub rfq_id: Uuid,
    pub supplier_id: Uuid,
    pub created_by: Uuid,
    pub line_items: Vec<LineItem>,
    #[schema(value_type = String, example = "5800.00")]
    pub total: Decimal,
    pub currency: String,
    pub delivery_date: NaiveDate,
    pub status: PurchaseOrderStatus,
    pub cancellation_reason: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

super::impl_stored_entity!(PurchaseOrder, EntityKind::PurchaseOrder);

/// `PO-YYYYMMDD-XXXXXXXX`, the suffix taken from the order id.
pub fn generate_po_number(date: NaiveDate, id: Uuid) -> String {
    let simple = id.simple().to_string().to_uppercase();
    format!("PO-{}-{}", date.format("%Y%m%d"), &simple[..8])
}

impl PurchaseOrder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        quotation_id: Uuid,
        rfq_id: Uuid,
        supplier_id: Uuid,
        created_by: Uuid,
        line_items: Vec<LineItem>,
        currency: String,
        delivery_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Self, ServiceError> {
        let id = Uuid::new_v4();
        let total = super::checked_total(line_items.iter().map(|item| item.line_total))?;
        Ok(Self {
            id,
            po_number: generate_po_number(now.date_naive(), id),
            quotation_id,
            rfq_id,
            supplier_id,
            created_by,
            line_items,
            total,
            currency,
            delivery_date,
            status: PurchaseOrderStatus::Draft,
            cancellation_reason: None,
            sent_at: None,
            confirmed_at: None,
            delivered_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    fn transition(
        &mut self,
        next: PurchaseOrderStatus,
        action: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if !self.status.can_transition_to(&next) {
            return Err(ServiceError::invalid_transition(
                EntityKind::PurchaseOrder,
                self.id,
                self.status,
                action,
            ));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn send(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.transition(PurchaseOrderStatus::Sent, "send", now)?;
        self.sent_at = Some(now);
        Ok(())
    }

    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.transition(PurchaseOrderStatus::Confirmed, "confirm", now)?;
        self.confirmed_at = Some(now);
        Ok(())
    }

    pub fn mark_delivered(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.transition(PurchaseOrderStatus::Delivered, "mark delivered", now)?;
        self.delivered_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self, reason: String, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.transition(PurchaseOrderStatus::Cancelled, "cancel", now)?;
        self.cancellation_reason = Some(reason);
        Ok(())
    }
}
