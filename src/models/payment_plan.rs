use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
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
pub enum PaymentStatus {
    Scheduled,
    Paid,
    Overdue,
}

impl PaymentStatus {
    pub fn can_transition_to(&self, next: &PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Scheduled, PaymentStatus::Paid)
                | (PaymentStatus::Scheduled, PaymentStatus::Overdue)
                | (PaymentStatus::Overdue, PaymentStatus::Paid)
        )
    }

    pub fn is_unpaid(&self) -> bool {
        !matches!(self, PaymentStatus::Paid)
    }
}

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
pub enum PaymentPlanStatus {
    Active,
    Completed,
}

/// One installment of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub sequence: u32,
    pub due_date: NaiveDate,
    #[schema(value_type = String, example = "2900.00")]
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub recorded_by: Option<Uuid>,
}

/// Splits an approved invoice's outstanding balance into installments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentPlan {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub supplier_id: Uuid,
    #[schema(value_type = String, example = "5800.00")]
    pub financed_amount: Decimal,
    pub currency: String,
    pub installments: Vec<Payment>,
    pub status: PaymentPlanStatus,
    pub created_by: Uuid,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

super::impl_stored_entity!(PaymentPlan, EntityKind::PaymentPlan);

/// Splits `total` into `count` two-decimal amounts that add up to `total`.
///
/// Every installment but the last is `total / count` truncated to cents; the last
/// one absorbs the remainder.
pub fn even_split(total: Decimal, count: u32) -> Result<Vec<Decimal>, ServiceError> {
    if count == 0 {
        return Err(ServiceError::ValidationError(
            "installment count must be at least 1".into(),
        ));
    }
    if total <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "amount to split must be positive".into(),
        ));
    }

    let n = Decimal::from(count);
    let base = (total / n).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    if base <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "{} cannot be split into {} positive installments",
            total, count
        )));
    }

    let mut amounts = vec![base; count as usize - 1];
    amounts.push(total - base * Decimal::from(count - 1));
    Ok(amounts)
}

impl PaymentPlan {
    /// Builds a plan from `(due_date, amount)` pairs, in order.
    ///
    /// Every amount must be positive, no due date may precede `earliest_due`, and
    /// the amounts must add up to `financed_amount` exactly.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        invoice_id: Uuid,
        supplier_id: Uuid,
        financed_amount: Decimal,
        currency: String,
        schedule: Vec<(NaiveDate, Decimal)>,
        earliest_due: NaiveDate,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Self, ServiceError> {
        if schedule.is_empty() {
            return Err(ServiceError::ValidationError(
                "a payment plan needs at least one installment".into(),
            ));
        }
        if let Some((_, amount)) = schedule.iter().find(|(_, amount)| *amount <= Decimal::ZERO) {
            return Err(ServiceError::ValidationError(format!(
                "installment amount {} must be positive",
                amount
            )));
        }
        if let Some((due, _)) = schedule.iter().find(|(due, _)| *due < earliest_due) {
            return Err(ServiceError::ValidationError(format!(
                "installment due {} precedes the invoice issue date {}",
                due, earliest_due
            )));
        }
        let sum = super::checked_total(schedule.iter().map(|(_, amount)| *amount))?;
        if sum != financed_amount {
            return Err(ServiceError::ValidationError(format!(
                "installments add up to {} but {} is financed",
                sum, financed_amount
            )));
        }

        let installments = schedule
            .into_iter()
            .enumerate()
            .map(|(idx, (due_date, amount))| Payment {
                id: Uuid::new_v4(),
                sequence: idx as u32 + 1,
                due_date,
                amount,
                status: PaymentStatus::Scheduled,
                paid_at: None,
                recorded_by: None,
            })
            .collect();

        Ok(Self {
            id: Uuid::new_v4(),
            invoice_id,
            supplier_id,
            financed_amount,
            currency,
            installments,
            status: PaymentPlanStatus::Active,
            created_by,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn installment(&self, payment_id: Uuid) -> Option<&Payment> {
        self.installments.iter().find(|p| p.id == payment_id)
    }

    pub fn paid_total(&self) -> Decimal {
        self.installments
            .iter()
            .filter(|p| p.status == PaymentStatus::Paid)
            .map(|p| p.amount)
            .sum()
    }

    pub fn remaining(&self) -> Decimal {
        self.financed_amount - self.paid_total()
    }

    pub fn overdue_installments(&self) -> impl Iterator<Item = &Payment> {
        self.installments
            .iter()
            .filter(|p| p.status == PaymentStatus::Overdue)
    }

    /// Marks one installment paid and returns its previous status.
    ///
    /// The amount must match the installment exactly; overdue installments are
    /// still payable.
    pub fn record_payment(
        &mut self,
        payment_id: Uuid,
        amount: Decimal,
        recorded_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PaymentStatus, ServiceError> {
        let installment = self
            .installments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| ServiceError::not_found(EntityKind::Payment, payment_id))?;

        if !installment.status.can_transition_to(&PaymentStatus::Paid) {
            return Err(ServiceError::invalid_transition(
                EntityKind::Payment,
                payment_id,
                installment.status,
                "record",
            ));
        }
        if amount != installment.amount {
            return Err(ServiceError::ValidationError(format!(
                "installment {} is for {}, got {}",
                installment.sequence, installment.amount, amount
            )));
        }

        let previous = installment.status;
        installment.status = PaymentStatus::Paid;
        installment.paid_at = Some(now);
        installment.recorded_by = Some(recorded_by);

        if self.installments.iter().all(|p| p.status == PaymentStatus::Paid) {
            self.status = PaymentPlanStatus::Completed;
        }
        self.updated_at = now;
        Ok(previous)
    }

    /// Flags scheduled installments whose due date is before `today`.
    /// Returns the ids that changed.
    pub fn mark_overdue(&mut self, today: NaiveDate, now: DateTime<Utc>) -> Vec<Uuid> {
        let changed: Vec<Uuid> = self
            .installments
            .iter_mut()
            .filter(|p| p.status == PaymentStatus::Scheduled && today > p.due_date)
            .map(|p| {
                p.status = PaymentStatus::Overdue;
                p.id
            })
            .collect();
        if !changed.is_empty() {
            self.updated_at = now;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, day).unwrap()
    }

    fn plan(amounts: &[Decimal], financed: Decimal) -> Result<PaymentPlan, ServiceError> {
        let schedule = amounts
            .iter()
            .enumerate()
            .map(|(i, a)| (date(10 + i as u32), *a))
            .collect();
        PaymentPlan::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            financed,
            "MXN".into(),
            schedule,
            date(1),
            Uuid::new_v4(),
            Utc::now(),
        )
    }

    #[test]
    fn even_split_puts_remainder_last() {
        assert_eq!(
            even_split(dec!(100), 3).unwrap(),
            vec![dec!(33.33), dec!(33.33), dec!(33.34)]
        );
        assert_eq!(even_split(dec!(5800), 2).unwrap(), vec![dec!(2900), dec!(2900)]);
        assert_matches!(even_split(dec!(0.01), 2), Err(ServiceError::ValidationError(_)));
        assert_matches!(even_split(dec!(10), 0), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn installments_must_sum_to_financed_amount() {
        assert_matches!(
            plan(&[dec!(2900), dec!(2899.99)], dec!(5800)),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            plan(&[dec!(5800), dec!(0)], dec!(5800)),
            Err(ServiceError::ValidationError(_))
        );
        let p = plan(&[dec!(2900), dec!(2900)], dec!(5800)).unwrap();
        assert_eq!(p.installments[1].sequence, 2);
    }

    #[test]
    fn overflowing_installments_are_rejected() {
        assert_matches!(
            plan(&[Decimal::MAX, Decimal::MAX], dec!(5800)),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn due_date_cannot_precede_issue_date() {
        let result = PaymentPlan::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(10),
            "MXN".into(),
            vec![(date(1), dec!(10))],
            date(2),
            Uuid::new_v4(),
            Utc::now(),
        );
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn overdue_installment_is_still_payable() {
        let mut p = plan(&[dec!(2900), dec!(2900)], dec!(5800)).unwrap();
        let changed = p.mark_overdue(date(11), Utc::now());
        assert_eq!(changed, vec![p.installments[0].id]);

        let first = p.installments[0].id;
        assert_matches!(
            p.record_payment(first, dec!(100), Uuid::new_v4(), Utc::now()),
            Err(ServiceError::ValidationError(_))
        );
        let previous = p
            .record_payment(first, dec!(2900), Uuid::new_v4(), Utc::now())
            .unwrap();
        assert_eq!(previous, PaymentStatus::Overdue);
        assert_matches!(
            p.record_payment(first, dec!(2900), Uuid::new_v4(), Utc::now()),
            Err(ServiceError::InvalidTransition(_))
        );
        assert_eq!(p.remaining(), dec!(2900));
        assert_eq!(p.status, PaymentPlanStatus::Active);

        let second = p.installments[1].id;
        p.record_payment(second, dec!(2900), Uuid::new_v4(), Utc::now())
            .unwrap();
        assert_eq!(p.status, PaymentPlanStatus::Completed);
    }
}
