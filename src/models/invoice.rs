use chrono::{DateTime, NaiveDate, Utc};
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
pub enum InvoiceStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

impl InvoiceStatus {
    pub fn can_transition_to(&self, next: &InvoiceStatus) -> bool {
        matches!(
            (self, next),
            (InvoiceStatus::Pending, InvoiceStatus::Approved)
                | (InvoiceStatus::Pending, InvoiceStatus::Rejected)
                | (InvoiceStatus::Approved, InvoiceStatus::Paid)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Invoice {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub supplier_id: Uuid,
    pub invoice_number: String,
    #[schema(value_type = String, example = "5800.00")]
    pub amount: Decimal,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[schema(value_type = String, example = "0")]
    pub paid_amount: Decimal,
    pub documents: Vec<DocumentRef>,
    pub status: InvoiceStatus,
    pub submitted_by: Uuid,
    pub reviewed_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

super::impl_stored_entity!(Invoice, EntityKind::Invoice);

impl Invoice {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        purchase_order_id: Uuid,
        supplier_id: Uuid,
        invoice_number: String,
        amount: Decimal,
        currency: String,
        issue_date: NaiveDate,
        due_date: NaiveDate,
        documents: Vec<DocumentRef>,
        submitted_by: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            purchase_order_id,
            supplier_id,
            invoice_number,
            amount,
            currency,
            issue_date,
            due_date,
            paid_amount: Decimal::ZERO,
            documents,
            status: InvoiceStatus::Pending,
            submitted_by,
            reviewed_by: None,
            rejection_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn remaining(&self) -> Decimal {
        self.amount - self.paid_amount
    }

    fn transition(&mut self, next: InvoiceStatus, action: &str) -> Result<(), ServiceError> {
        if !self.status.can_transition_to(&next) {
            return Err(ServiceError::invalid_transition(
                EntityKind::Invoice,
                self.id,
                self.status,
                action,
            ));
        }
        self.status = next;
        Ok(())
    }

    pub fn approve(&mut self, reviewer: Uuid, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.transition(InvoiceStatus::Approved, "approve")?;
        self.reviewed_by = Some(reviewer);
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(
        &mut self,
        reviewer: Uuid,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.transition(InvoiceStatus::Rejected, "reject")?;
        self.reviewed_by = Some(reviewer);
        self.rejection_reason = Some(reason);
        self.updated_at = now;
        Ok(())
    }

    /// Adds a settled installment. Moves to `paid` once nothing remains.
    pub fn apply_payment(&mut self, amount: Decimal, now: DateTime<Utc>) -> Result<(), ServiceError> {
        if self.status != InvoiceStatus::Approved {
            return Err(ServiceError::invalid_transition(
                EntityKind::Invoice,
                self.id,
                self.status,
                "record a payment against",
            ));
        }
        if amount > self.remaining() {
            return Err(ServiceError::ValidationError(format!(
                "payment of {} exceeds the {} remaining on invoice {}",
                amount,
                self.remaining(),
                self.invoice_number
            )));
        }
        self.paid_amount += amount;
        if self.remaining().is_zero() {
            self.transition(InvoiceStatus::Paid, "settle")?;
        }
        self.updated_at = now;
        Ok(())
    }
}
