use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{even_split, EntityKind, Invoice, InvoiceStatus, PaymentPlan},
    store::{committed, ChangeSet, EntityStoreExt, UniqueKey},
};

pub const MAX_INSTALLMENTS: u32 = 120;
pub const MAX_INTERVAL_DAYS: u32 = 366;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InstallmentInput {
    pub due_date: NaiveDate,
    #[schema(value_type = String, example = "2900.00")]
    pub amount: Decimal,
}

/// How the financed amount is spread over installments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanSchedule {
    /// Installments given one by one; they must add up to the amount financed.
    Explicit { installments: Vec<InstallmentInput> },
    /// `count` equal installments every `interval_days`, the last absorbing the
    /// rounding remainder.
    EvenSplit {
        count: u32,
        first_due_date: NaiveDate,
        interval_days: u32,
    },
}

impl PlanSchedule {
    pub fn resolve(&self, financed: Decimal) -> Result<Vec<(NaiveDate, Decimal)>, ServiceError> {
        match self {
            PlanSchedule::Explicit { installments } => {
                if installments.len() > MAX_INSTALLMENTS as usize {
                    return Err(ServiceError::ValidationError(format!(
                        "a payment plan allows at most {} installments",
                        MAX_INSTALLMENTS
                    )));
                }
                if let Some(bad) = installments.iter().find(|i| i.amount.normalize().scale() > 2) {
                    return Err(ServiceError::ValidationError(format!(
                        "installment amount {} has more than two decimal places",
                        bad.amount
                    )));
                }
                let mut schedule: Vec<_> =
                    installments.iter().map(|i| (i.due_date, i.amount)).collect();
                schedule.sort_by_key(|(due, _)| *due);
                Ok(schedule)
            }
            PlanSchedule::EvenSplit {
                count,
                first_due_date,
                interval_days,
            } => {
                if *count > MAX_INSTALLMENTS {
                    return Err(ServiceError::ValidationError(format!(
                        "a payment plan allows at most {} installments",
                        MAX_INSTALLMENTS
                    )));
                }
                if *count > 1 && *interval_days == 0 {
                    return Err(ServiceError::ValidationError(
                        "interval_days must be at least 1 for more than one installment".into(),
                    ));
                }
                if *interval_days > MAX_INTERVAL_DAYS {
                    return Err(ServiceError::ValidationError(format!(
                        "interval_days cannot exceed {}",
                        MAX_INTERVAL_DAYS
                    )));
                }
                let amounts = even_split(financed, *count)?;
                amounts
                    .into_iter()
                    .enumerate()
                    .map(|(idx, amount)| {
                        let offset = i64::from(*interval_days) * idx as i64;
                        first_due_date
                            .checked_add_signed(Duration::days(offset))
                            .map(|due| (due, amount))
                            .ok_or_else(|| {
                                ServiceError::ValidationError(format!(
                                    "installment {} falls outside the supported date range",
                                    idx + 1
                                ))
                            })
                    })
                    .collect()
            }
        }
    }
}

/// Finances what is left of an approved invoice.
#[derive(Debug, Clone)]
pub struct CreatePaymentPlanCommand {
    pub actor: Actor,
    pub invoice_id: Uuid,
    pub schedule: PlanSchedule,
}

#[async_trait]
impl Command for CreatePaymentPlanCommand {
    type Result = PaymentPlan;

    #[instrument(skip(self, ctx), fields(invoice_id = %self.invoice_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        if let PlanSchedule::EvenSplit { count: 0, .. } = self.schedule {
            return Err(ServiceError::ValidationError(
                "installment count must be at least 1".into(),
            ));
        }
        authorize(&self.actor, WorkflowCommand::CreatePaymentPlan, None)?;

        let _guard = ctx.locks.acquire(self.invoice_id).await;
        let invoice: Invoice = ctx.store.fetch(self.invoice_id).await?;
        if invoice.status != InvoiceStatus::Approved {
            return Err(ServiceError::invalid_transition(
                EntityKind::Invoice,
                invoice.id,
                invoice.status,
                "create a payment plan for",
            ));
        }
        if let Some(existing) = ctx
            .store
            .lookup(&UniqueKey::PaymentPlanInvoice(invoice.id))
            .await?
        {
            return Err(ServiceError::Conflict(format!(
                "invoice {} already has payment plan {}",
                invoice.id, existing
            )));
        }

        let financed = invoice.remaining();
        let schedule = self.schedule.resolve(financed)?;
        let plan = PaymentPlan::new(
            invoice.id,
            invoice.supplier_id,
            financed,
            invoice.currency.clone(),
            schedule,
            invoice.issue_date,
            self.actor.id,
            ctx.now(),
        )?;
        let event = TransitionEvent::created(
            EntityKind::PaymentPlan,
            plan.id,
            plan.status,
            Some(&self.actor),
            ctx.now(),
        );

        let id = plan.id;
        let records = ctx.commit(ChangeSet::new().insert(plan), vec![event]).await?;
        let plan: PaymentPlan = committed(&records, id)?;

        info!(
            payment_plan_id = %plan.id,
            financed = %plan.financed_amount,
            installments = plan.installments.len(),
            "Payment plan created"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, day).unwrap()
    }

    #[test]
    fn even_split_spaces_due_dates() {
        let schedule = PlanSchedule::EvenSplit {
            count: 3,
            first_due_date: date(1),
            interval_days: 10,
        };
        let resolved = schedule.resolve(dec!(100.00)).unwrap();
        assert_eq!(
            resolved,
            vec![
                (date(1), dec!(33.33)),
                (date(11), dec!(33.33)),
                (date(21), dec!(33.34)),
            ]
        );
    }

    #[test]
    fn explicit_installments_are_ordered_by_due_date() {
        let schedule = PlanSchedule::Explicit {
            installments: vec![
                InstallmentInput { due_date: date(20), amount: dec!(2900) },
                InstallmentInput { due_date: date(5), amount: dec!(2900) },
            ],
        };
        let resolved = schedule.resolve(dec!(5800)).unwrap();
        assert_eq!(resolved[0].0, date(5));
    }

    #[test]
    fn rejects_zero_interval_for_many_installments() {
        let schedule = PlanSchedule::EvenSplit {
            count: 2,
            first_due_date: date(1),
            interval_days: 0,
        };
        assert!(schedule.resolve(dec!(10)).is_err());
    }

    #[test]
    fn long_schedules_fail_without_panicking() {
        let unbounded = PlanSchedule::EvenSplit {
            count: 120,
            first_due_date: date(1),
            interval_days: u32::MAX,
        };
        assert!(matches!(
            unbounded.resolve(dec!(1200)),
            Err(ServiceError::ValidationError(_))
        ));

        let near_the_end = PlanSchedule::EvenSplit {
            count: 120,
            first_due_date: NaiveDate::MAX,
            interval_days: MAX_INTERVAL_DAYS,
        };
        assert!(matches!(
            near_the_end.resolve(dec!(1200)),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
