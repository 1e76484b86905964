use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, warn};
use validator::ValidationError;

use crate::{
    clock::Clock,
    errors::ServiceError,
    events::{EventSender, TransitionEvent},
    store::{ChangeSet, EntityStore, LockRegistry, Record},
};

pub mod invoices;
pub mod payments;
pub mod purchaseorders;
pub mod quotations;
pub mod rfqs;
pub mod suppliers;

/// Everything a command needs to run.
#[derive(Clone)]
pub struct WorkflowContext {
    pub store: Arc<dyn EntityStore>,
    pub events: Arc<EventSender>,
    pub locks: LockRegistry,
    pub clock: Arc<dyn Clock>,
}

impl WorkflowContext {
    pub fn new(
        store: Arc<dyn EntityStore>,
        events: Arc<EventSender>,
        locks: LockRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            events,
            locks,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Commits the change set, then hands the events to the notification task.
    /// Events are only emitted once the commit has succeeded.
    pub async fn commit(
        &self,
        changes: ChangeSet,
        events: Vec<TransitionEvent>,
    ) -> Result<Vec<Record>, ServiceError> {
        let records = self.store.commit(changes).await.map_err(|e| {
            if e.is_client_error() {
                warn!(error = %e, "commit rejected");
            } else {
                error!(error = %e, "commit failed");
            }
            e
        })?;
        self.events.emit_all(events);
        Ok(records)
    }
}

/// Command trait for implementing the Command Pattern
///
/// Each command validates its input, asks the authorization gate, takes the lock
/// of its aggregate, checks state against the store and commits one change set.
/// Nothing is written when any step fails.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError>;
}

pub(crate) fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        let mut err = ValidationError::new("positive_amount");
        err.message = Some("amount must be greater than zero".into());
        return Err(err);
    }
    if amount.normalize().scale() > 2 {
        let mut err = ValidationError::new("amount_precision");
        err.message = Some("amount may have at most two decimal places".into());
        return Err(err);
    }
    if *amount > crate::models::MAX_AMOUNT {
        let mut err = ValidationError::new("amount_range");
        err.message = Some("amount exceeds the maximum of 999999999999.99".into());
        return Err(err);
    }
    Ok(())
}

pub(crate) fn validate_currency_code(code: &str) -> Result<(), ValidationError> {
    if crate::models::is_valid_currency(code) {
        Ok(())
    } else {
        let mut err = ValidationError::new("currency");
        err.message = Some("currency must be a 3-letter uppercase ISO-4217 code".into());
        Err(err)
    }
}

pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}
