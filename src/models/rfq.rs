use chrono::{DateTime, NaiveDate, Utc};
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
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RfqStatus {
    Open,
    Closed,
    Awarded,
}

impl RfqStatus {
    /// Nothing ever returns to `open`.
    pub fn can_transition_to(&self, next: &RfqStatus) -> bool {
        matches!(
            (self, next),
            (RfqStatus::Open, RfqStatus::Closed)
                | (RfqStatus::Open, RfqStatus::Awarded)
                | (RfqStatus::Closed, RfqStatus::Awarded)
        )
    }
}

/// Request for quotation issued by a purchaser to a set of invited suppliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rfq {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
    /// Last day on which quotations are accepted.
    pub deadline: NaiveDate,
    pub status: RfqStatus,
    pub created_by: Uuid,
    pub invited_supplier_ids: Vec<Uuid>,
    pub awarded_quotation_id: Option<Uuid>,
    pub closed_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

super::impl_stored_entity!(Rfq, EntityKind::Rfq);

impl Rfq {
    pub fn new(
        title: String,
        description: String,
        requirements: Vec<String>,
        deadline: NaiveDate,
        created_by: Uuid,
        mut invited_supplier_ids: Vec<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut seen = std::collections::HashSet::new();
        invited_supplier_ids.retain(|id| seen.insert(*id));

        Self {
            id: Uuid::new_v4(),
            title,
            description,
            requirements,
            deadline,
            status: RfqStatus::Open,
            created_by,
            invited_supplier_ids,
            awarded_quotation_id: None,
            closed_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_invited(&self, supplier_id: Uuid) -> bool {
        self.invited_supplier_ids.contains(&supplier_id)
    }

    /// Open and the deadline day has not passed.
    pub fn accepts_quotations(&self, today: NaiveDate) -> bool {
        self.status == RfqStatus::Open && today <= self.deadline
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.status == RfqStatus::Open && today > self.deadline
    }

    fn transition(&mut self, next: RfqStatus, action: &str) -> Result<(), ServiceError> {
        if !self.status.can_transition_to(&next) {
            return Err(ServiceError::invalid_transition(
                EntityKind::Rfq,
                self.id,
                self.status,
                action,
            ));
        }
        self.status = next;
        Ok(())
    }

    pub fn close(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.transition(RfqStatus::Closed, "close")?;
        self.closed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn award(&mut self, quotation_id: Uuid, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.transition(RfqStatus::Awarded, "award")?;
        self.awarded_quotation_id = Some(quotation_id);
        self.updated_at = now;
        Ok(())
    }
}
