use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{quotations::lock_for_review, validate_not_blank, Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{EntityKind, LineItem, PurchaseOrder, QuotationStatus, MAX_AMOUNT},
    store::{committed, ChangeSet, UniqueKey},
};

fn validate_unit_price(price: &Decimal) -> Result<(), ValidationError> {
    let message = if price.is_sign_negative() {
        "unit price cannot be negative"
    } else if *price > MAX_AMOUNT {
        "unit price exceeds the maximum amount"
    } else {
        return Ok(());
    };
    let mut err = ValidationError::new("unit_price");
    err.message = Some(message.into());
    Err(err)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LineItemInput {
    #[validate(
        length(min = 1, max = 500, message = "Line item description must be between 1 and 500 characters"),
        custom = "validate_not_blank"
    )]
    pub description: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    #[validate(custom = "validate_unit_price")]
    #[schema(value_type = String, example = "5800.00")]
    pub unit_price: Decimal,
}

/// Issues a draft purchase order from an approved quotation.
///
/// Without explicit line items the order gets a single line for the quoted
/// price. The delivery date defaults to today plus the quoted delivery days.
#[derive(Debug, Clone, Validate)]
pub struct GeneratePurchaseOrderCommand {
    pub actor: Actor,
    pub quotation_id: Uuid,
    #[validate(length(min = 1, message = "At least one line item is required when line items are given"))]
    pub line_items: Option<Vec<LineItemInput>>,
    pub delivery_date: Option<NaiveDate>,
}

impl GeneratePurchaseOrderCommand {
    fn validate_line_items(&self) -> Result<(), ServiceError> {
        for item in self.line_items.iter().flatten() {
            item.validate()?;
        }
        Ok(())
    }
}

#[async_trait]
impl Command for GeneratePurchaseOrderCommand {
    type Result = PurchaseOrder;

    #[instrument(skip(self, ctx), fields(quotation_id = %self.quotation_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        self.validate_line_items()?;
        authorize(&self.actor, WorkflowCommand::GeneratePurchaseOrder, None)?;

        let (_guard, quotation, rfq) = lock_for_review(ctx, self.quotation_id).await?;
        if quotation.status != QuotationStatus::Approved {
            return Err(ServiceError::invalid_transition(
                EntityKind::Quotation,
                quotation.id,
                quotation.status,
                "generate a purchase order from",
            ));
        }
        if let Some(existing) = ctx
            .store
            .lookup(&UniqueKey::PurchaseOrderSource(quotation.id))
            .await?
        {
            return Err(ServiceError::Conflict(format!(
                "quotation {} already has purchase order {}",
                quotation.id, existing
            )));
        }

        let today = ctx.today();
        let delivery_date = match self.delivery_date {
            Some(date) if date < today => {
                return Err(ServiceError::ValidationError(format!(
                    "delivery date {} is in the past",
                    date
                )))
            }
            Some(date) => date,
            None => today + Duration::days(i64::from(quotation.delivery_days)),
        };

        let line_items = match &self.line_items {
            Some(items) => items
                .iter()
                .map(|i| LineItem::new(i.description.trim().to_string(), i.quantity, i.unit_price))
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![LineItem::new(rfq.title.clone(), 1, quotation.price)?],
        };

        let order = PurchaseOrder::new(
            quotation.id,
            rfq.id,
            quotation.supplier_id,
            self.actor.id,
            line_items,
            quotation.currency.clone(),
            delivery_date,
            ctx.now(),
        )?;
        if order.total <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "purchase order total must be positive".into(),
            ));
        }
        let event = TransitionEvent::created(
            EntityKind::PurchaseOrder,
            order.id,
            order.status,
            Some(&self.actor),
            ctx.now(),
        );

        let id = order.id;
        let records = ctx.commit(ChangeSet::new().insert(order), vec![event]).await?;
        let order: PurchaseOrder = committed(&records, id)?;

        info!(
            purchase_order_id = %order.id,
            po_number = %order.po_number,
            total = %order.total,
            "Purchase order generated"
        );
        Ok(order)
    }
}
