use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ContactInfo, EntityKind, SupplierDocuments};
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
pub enum SupplierStatus {
    Pending,
    Approved,
    Rejected,
}

impl SupplierStatus {
    pub fn can_transition_to(&self, next: &SupplierStatus) -> bool {
        matches!(
            (self, next),
            (SupplierStatus::Pending, SupplierStatus::Approved)
                | (SupplierStatus::Pending, SupplierStatus::Rejected)
        )
    }
}

/// A registered provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Supplier {
    pub id: Uuid,
    pub tax_id: String,
    pub business_name: String,
    pub address: String,
    pub contact: ContactInfo,
    pub documents: SupplierDocuments,
    pub status: SupplierStatus,
    /// Actor that registered the supplier and acts on its behalf.
    pub owner_id: Uuid,
    pub reviewed_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

super::impl_stored_entity!(Supplier, EntityKind::Supplier);

impl Supplier {
    pub fn new(
        tax_id: &str,
        business_name: String,
        address: String,
        contact: ContactInfo,
        documents: SupplierDocuments,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tax_id: Self::normalize_tax_id(tax_id),
            business_name,
            address,
            contact,
            documents,
            status: SupplierStatus::Pending,
            owner_id,
            reviewed_by: None,
            rejection_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Tax IDs compare case- and whitespace-insensitively.
    pub fn normalize_tax_id(tax_id: &str) -> String {
        tax_id
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase()
    }

    pub fn is_approved(&self) -> bool {
        self.status == SupplierStatus::Approved
    }

    fn transition(&mut self, next: SupplierStatus, action: &str) -> Result<(), ServiceError> {
        if !self.status.can_transition_to(&next) {
            return Err(ServiceError::invalid_transition(
                EntityKind::Supplier,
                self.id,
                self.status,
                action,
            ));
        }
        self.status = next;
        Ok(())
    }

    pub fn approve(&mut self, reviewer: Uuid, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.transition(SupplierStatus::Approved, "approve")?;
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
        self.transition(SupplierStatus::Rejected, "reject")?;
        self.reviewed_by = Some(reviewer);
        self.rejection_reason = Some(reason);
        self.updated_at = now;
        Ok(())
    }

    /// Contact details stay editable while pending and after approval.
    pub fn update_contact(
        &mut self,
        contact: ContactInfo,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if self.status == SupplierStatus::Rejected {
            return Err(ServiceError::invalid_transition(
                EntityKind::Supplier,
                self.id,
                self.status,
                "update contact of",
            ));
        }
        self.contact = contact;
        self.updated_at = now;
        Ok(())
    }
}
