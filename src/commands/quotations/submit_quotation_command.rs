use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{validate_currency_code, validate_positive_amount, Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{DocumentRef, EntityKind, Quotation, Rfq, Supplier},
    store::{committed, ChangeSet, EntityStoreExt},
};

#[derive(Debug, Clone, Validate)]
pub struct SubmitQuotationCommand {
    pub actor: Actor,
    pub rfq_id: Uuid,
    pub supplier_id: Uuid,
    #[validate(custom = "validate_positive_amount")]
    pub price: Decimal,
    #[validate(custom = "validate_currency_code")]
    pub currency: String,
    #[validate(range(min = 1, max = 3650, message = "Delivery days must be between 1 and 3650"))]
    pub delivery_days: u32,
    #[validate(length(max = 5000, message = "Conditions cannot exceed 5000 characters"))]
    pub conditions: String,
    pub documents: Vec<DocumentRef>,
}

#[async_trait]
impl Command for SubmitQuotationCommand {
    type Result = Quotation;

    #[instrument(skip(self, ctx), fields(rfq_id = %self.rfq_id, supplier_id = %self.supplier_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        if self.documents.iter().any(DocumentRef::is_blank) {
            return Err(ServiceError::ValidationError(
                "document references must not be blank".into(),
            ));
        }

        authorize(&self.actor, WorkflowCommand::SubmitQuotation, None)?;

        let _guard = ctx.locks.acquire(self.rfq_id).await;
        let rfq: Rfq = ctx.store.fetch(self.rfq_id).await?;
        let supplier: Supplier = ctx.store.fetch(self.supplier_id).await?;
        authorize(
            &self.actor,
            WorkflowCommand::SubmitQuotation,
            Some(supplier.owner_id),
        )?;

        if !rfq.accepts_quotations(ctx.today()) {
            warn!(rfq_id = %rfq.id, status = %rfq.status, deadline = %rfq.deadline, "RFQ no longer accepts quotations");
            let state = if rfq.status == crate::models::RfqStatus::Open {
                format!("past its deadline {}", rfq.deadline)
            } else {
                rfq.status.to_string()
            };
            return Err(ServiceError::invalid_transition(
                EntityKind::Rfq,
                rfq.id,
                state,
                "submit a quotation to",
            ));
        }
        if !supplier.is_approved() {
            return Err(ServiceError::ValidationError(format!(
                "supplier {} is {}, only approved suppliers can quote",
                supplier.id, supplier.status
            )));
        }
        if !rfq.is_invited(supplier.id) {
            return Err(ServiceError::ValidationError(format!(
                "supplier {} was not invited to RFQ {}",
                supplier.id, rfq.id
            )));
        }

        let quotation = Quotation::new(
            rfq.id,
            supplier.id,
            self.actor.id,
            self.price,
            self.currency.clone(),
            self.delivery_days,
            self.conditions.trim().to_string(),
            self.documents.clone(),
            ctx.now(),
        );
        let event = TransitionEvent::created(
            EntityKind::Quotation,
            quotation.id,
            quotation.status,
            Some(&self.actor),
            ctx.now(),
        )
        .within(rfq.id);

        let id = quotation.id;
        let records = ctx
            .commit(ChangeSet::new().insert(quotation), vec![event])
            .await?;
        let quotation: Quotation = committed(&records, id)?;

        info!(quotation_id = %quotation.id, price = %quotation.price, currency = %quotation.currency, "Quotation submitted");
        Ok(quotation)
    }
}
