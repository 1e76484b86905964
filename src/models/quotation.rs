use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{DocumentRef, EntityKind};
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
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuotationStatus {
    Submitted,
    Approved,
    Rejected,
}

impl QuotationStatus {
    pub fn can_transition_to(&self, next: &QuotationStatus) -> bool {
        matches!(
            (self, next),
            (QuotationStatus::Submitted, QuotationStatus::Approved)
                | (QuotationStatus::Submitted, QuotationStatus::Rejected)
        )
    }

    /// Approved and rejected quotations never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QuotationStatus::Submitted)
    }
}

/// A supplier's priced answer to an RFQ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Quotation {
    pub id: Uuid,
    pub rfq_id: Uuid,
    pub supplier_id: Uuid,
    pub submitted_by: Uuid,
    #[schema(value_type = String, example = "5800.00")]
    pub price: Decimal,
    pub currency: String,
    pub delivery_days: u32,
    pub conditions: String,
    pub documents: Vec<DocumentRef>,
    pub status: QuotationStatus,
    pub reviewed_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

super::impl_stored_entity!(Quotation, EntityKind::Quotation);

impl Quotation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rfq_id: Uuid,
        supplier_id: Uuid,
        submitted_by: Uuid,
        price: Decimal,
        currency: String,
        delivery_days: u32,
        conditions: String,
        documents: Vec<DocumentRef>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rfq_id,
            supplier_id,
            submitted_by,
            price,
            currency,
            delivery_days,
            conditions,
            documents,
            status: QuotationStatus::Submitted,
            reviewed_by: None,
            rejection_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Counts against the one-quotation-per-supplier rule.
    pub fn is_outstanding(&self) -> bool {
        self.status != QuotationStatus::Rejected
    }

    fn transition(&mut self, next: QuotationStatus, action: &str) -> Result<(), ServiceError> {
        if !self.status.can_transition_to(&next) {
            return Err(ServiceError::invalid_transition(
                EntityKind::Quotation,
                self.id,
                self.status,
                action,
            ));
        }
        self.status = next;
        Ok(())
    }

    pub fn approve(&mut self, reviewer: Uuid, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.transition(QuotationStatus::Approved, "approve")?;
        self.reviewed_by = Some(reviewer);
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(
        &mut self,
        reviewer: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.transition(QuotationStatus::Rejected, "reject")?;
        self.reviewed_by = Some(reviewer);
        self.rejection_reason = reason;
        self.updated_at = now;
        Ok(())
    }
}
