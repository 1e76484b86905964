//! Read-side aggregation.
//!
//! Everything here works on one [`StoreSnapshot`], so a dashboard or report is
//! consistent with itself even while commands are committing.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    clock::Clock,
    errors::ServiceError,
    models::{
        checked_total, EntityKind, InvoiceStatus, PaymentPlan, PaymentStatus, PurchaseOrder,
        PurchaseOrderStatus, QuotationStatus, RfqStatus, SupplierStatus,
    },
    store::{EntityStore, StoreSnapshot},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub open_rfqs: usize,
    pub quotations_awaiting_review: usize,
    pub suppliers_pending_approval: usize,
    pub purchase_orders_in_progress: usize,
    pub pending_invoices: usize,
    pub approved_unpaid_invoices: usize,
    pub overdue_payments: usize,
    /// Remaining balance of approved invoices, per currency.
    #[schema(value_type = Object)]
    pub outstanding_by_currency: BTreeMap<String, Decimal>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentProgress {
    pub payment_plan_id: Uuid,
    pub invoice_id: Uuid,
    pub currency: String,
    #[schema(value_type = String)]
    pub financed: Decimal,
    #[schema(value_type = String)]
    pub paid: Decimal,
    #[schema(value_type = String)]
    pub remaining: Decimal,
    /// Whole percent paid, 0 to 100.
    pub percentage: u32,
    pub installments: usize,
    pub installments_paid: usize,
    pub installments_overdue: usize,
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
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportKind {
    ByProvider,
    ByMonth,
    ByStatus,
}

/// Inclusive range of purchase order creation dates. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, ServiceError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ServiceError::ValidationError(format!(
                    "report range starts {} after it ends {}",
                    from, to
                )));
            }
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.date_naive();
        self.from.map_or(true, |from| day >= from) && self.to.map_or(true, |to| day <= to)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReportRow {
    /// Supplier id, `YYYY-MM` or status name, depending on the report kind.
    pub key: String,
    pub label: String,
    pub currency: String,
    pub purchase_order_count: usize,
    #[schema(value_type = String)]
    pub purchase_order_total: Decimal,
    #[schema(value_type = String)]
    pub invoiced_total: Decimal,
    #[schema(value_type = String)]
    pub paid_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Report {
    pub kind: ReportKind,
    pub range: DateRange,
    pub rows: Vec<ReportRow>,
    pub generated_at: DateTime<Utc>,
}

/// Percent of `financed` covered by `paid`, rounded half away from zero and
/// capped at 100.
pub fn progress_percentage(paid: Decimal, financed: Decimal) -> u32 {
    if financed <= Decimal::ZERO {
        return 0;
    }
    if paid >= financed {
        return 100;
    }
    if paid <= Decimal::ZERO {
        return 0;
    }
    // paid / financed < 1 here, so scaling by 100 cannot overflow
    let pct = (paid / financed * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    pct.to_u32().unwrap_or(0)
}

/// What a provider is allowed to see in a snapshot.
struct Scope {
    suppliers: Option<HashSet<Uuid>>,
}

impl Scope {
    fn for_actor(actor: &Actor, snapshot: &StoreSnapshot) -> Self {
        if !actor.is_provider() {
            return Self { suppliers: None };
        }
        let owned = snapshot
            .suppliers
            .iter()
            .filter(|s| s.owner_id == actor.id)
            .map(|s| s.id)
            .collect();
        Self {
            suppliers: Some(owned),
        }
    }

    fn supplier(&self, id: Uuid) -> bool {
        self.suppliers.as_ref().map_or(true, |owned| owned.contains(&id))
    }

    fn any_supplier(&self, ids: &[Uuid]) -> bool {
        match &self.suppliers {
            None => true,
            Some(owned) => ids.iter().any(|id| owned.contains(id)),
        }
    }
}

#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Counters for the actor's dashboard. Providers only see their suppliers.
    #[instrument(skip(self, actor), fields(actor = %actor.id, role = %actor.role))]
    pub async fn dashboard_stats(&self, actor: &Actor) -> Result<DashboardStats, ServiceError> {
        let snapshot = self.store.snapshot().await?;
        compute_dashboard(&snapshot, actor, self.clock.now())
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn payment_progress(
        &self,
        actor: &Actor,
        plan_id: Uuid,
    ) -> Result<PaymentProgress, ServiceError> {
        let snapshot = self.store.snapshot().await?;
        let plan = snapshot
            .payment_plan(plan_id)
            .ok_or_else(|| ServiceError::not_found(EntityKind::PaymentPlan, plan_id))?;
        if !Scope::for_actor(actor, &snapshot).supplier(plan.supplier_id) {
            return Err(ServiceError::Unauthorized(format!(
                "payment plan {} does not belong to your suppliers",
                plan_id
            )));
        }
        Ok(compute_progress(plan))
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn report(
        &self,
        actor: &Actor,
        kind: ReportKind,
        range: DateRange,
    ) -> Result<Report, ServiceError> {
        authorize(actor, WorkflowCommand::ViewReports, None)?;
        let snapshot = self.store.snapshot().await?;
        let report = compute_report(&snapshot, kind, range, self.clock.now())?;
        info!(%kind, rows = report.rows.len(), "Report generated");
        Ok(report)
    }
}

pub fn compute_progress(plan: &PaymentPlan) -> PaymentProgress {
    let paid = plan.paid_total();
    PaymentProgress {
        payment_plan_id: plan.id,
        invoice_id: plan.invoice_id,
        currency: plan.currency.clone(),
        financed: plan.financed_amount,
        paid,
        remaining: plan.financed_amount - paid,
        percentage: progress_percentage(paid, plan.financed_amount),
        installments: plan.installments.len(),
        installments_paid: plan
            .installments
            .iter()
            .filter(|p| p.status == PaymentStatus::Paid)
            .count(),
        installments_overdue: plan.overdue_installments().count(),
    }
}

pub fn compute_dashboard(
    snapshot: &StoreSnapshot,
    actor: &Actor,
    generated_at: DateTime<Utc>,
) -> Result<DashboardStats, ServiceError> {
    let scope = Scope::for_actor(actor, snapshot);

    let mut outstanding_by_currency = BTreeMap::new();
    let mut approved_unpaid_invoices = 0;
    for invoice in snapshot
        .invoices
        .iter()
        .filter(|i| i.status == InvoiceStatus::Approved && scope.supplier(i.supplier_id))
    {
        approved_unpaid_invoices += 1;
        let outstanding = outstanding_by_currency
            .entry(invoice.currency.clone())
            .or_insert(Decimal::ZERO);
        *outstanding = add(*outstanding, invoice.remaining())?;
    }

    Ok(DashboardStats {
        open_rfqs: snapshot
            .rfqs
            .iter()
            .filter(|r| r.status == RfqStatus::Open && scope.any_supplier(&r.invited_supplier_ids))
            .count(),
        quotations_awaiting_review: snapshot
            .quotations
            .iter()
            .filter(|q| q.status == QuotationStatus::Submitted && scope.supplier(q.supplier_id))
            .count(),
        suppliers_pending_approval: snapshot
            .suppliers
            .iter()
            .filter(|s| s.status == SupplierStatus::Pending && scope.supplier(s.id))
            .count(),
        purchase_orders_in_progress: snapshot
            .purchase_orders
            .iter()
            .filter(|po| po.status.is_in_progress() && scope.supplier(po.supplier_id))
            .count(),
        pending_invoices: snapshot
            .invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Pending && scope.supplier(i.supplier_id))
            .count(),
        approved_unpaid_invoices,
        overdue_payments: snapshot
            .payment_plans
            .iter()
            .filter(|p| scope.supplier(p.supplier_id))
            .map(|p| p.overdue_installments().count())
            .sum(),
        outstanding_by_currency,
        generated_at,
    })
}

fn add(acc: Decimal, amount: Decimal) -> Result<Decimal, ServiceError> {
    checked_total([acc, amount])
}

#[derive(Default)]
struct Totals {
    label: String,
    count: usize,
    po_total: Decimal,
    invoiced: Decimal,
    paid: Decimal,
}

pub fn compute_report(
    snapshot: &StoreSnapshot,
    kind: ReportKind,
    range: DateRange,
    generated_at: DateTime<Utc>,
) -> Result<Report, ServiceError> {
    let mut groups: BTreeMap<(String, String), Totals> = BTreeMap::new();

    let orders = snapshot.purchase_orders.iter().filter(|po| {
        range.contains(po.created_at)
            && (kind == ReportKind::ByStatus || po.status != PurchaseOrderStatus::Cancelled)
    });
    for po in orders {
        let (key, label) = group_key(snapshot, kind, po);
        let totals = groups.entry((key, po.currency.clone())).or_default();
        totals.label = label;
        totals.count += 1;
        totals.po_total = add(totals.po_total, po.total)?;
        for invoice in snapshot
            .invoices
            .iter()
            .filter(|i| i.purchase_order_id == po.id && i.status != InvoiceStatus::Rejected)
        {
            totals.invoiced = add(totals.invoiced, invoice.amount)?;
            totals.paid = add(totals.paid, invoice.paid_amount)?;
        }
    }

    let rows = groups
        .into_iter()
        .map(|((key, currency), t)| ReportRow {
            key,
            label: t.label,
            currency,
            purchase_order_count: t.count,
            purchase_order_total: t.po_total,
            invoiced_total: t.invoiced,
            paid_total: t.paid,
        })
        .collect();

    Ok(Report {
        kind,
        range,
        rows,
        generated_at,
    })
}

fn group_key(snapshot: &StoreSnapshot, kind: ReportKind, po: &PurchaseOrder) -> (String, String) {
    match kind {
        ReportKind::ByProvider => {
            let label = snapshot
                .supplier(po.supplier_id)
                .map(|s| s.business_name.clone())
                .unwrap_or_else(|| po.supplier_id.to_string());
            (po.supplier_id.to_string(), label)
        }
        ReportKind::ByMonth => {
            let month = po.created_at.format("%Y-%m").to_string();
            (month.clone(), month)
        }
        ReportKind::ByStatus => (po.status.to_string(), po.status.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::models::{ContactInfo, DocumentRef, Invoice, LineItem, Supplier, SupplierDocuments};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, month, day, 12, 0, 0).unwrap()
    }

    fn supplier(name: &str, owner: Uuid) -> Supplier {
        let doc = DocumentRef::new("doc");
        Supplier::new(
            &format!("RFC{}", &Uuid::new_v4().simple().to_string()[..9]),
            name.to_string(),
            "Av. Reforma 1".into(),
            ContactInfo {
                name: "Ana".into(),
                email: "ana@example.com".into(),
                phone: "5555555555".into(),
            },
            SupplierDocuments {
                fiscal_situation: doc.clone(),
                constitutive_act: doc.clone(),
                tax_opinion: doc.clone(),
                legal_representative_id: doc,
            },
            owner,
            at(1, 1),
        )
    }

    fn order(supplier_id: Uuid, total: Decimal, created: DateTime<Utc>) -> PurchaseOrder {
        PurchaseOrder::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            supplier_id,
            Uuid::new_v4(),
            vec![LineItem::new("Paper".into(), 1, total).unwrap()],
            "MXN".into(),
            created.date_naive(),
            created,
        )
        .unwrap()
    }

    fn invoice(po: &PurchaseOrder, amount: Decimal, paid: Decimal) -> Invoice {
        let mut invoice = Invoice::new(
            po.id,
            po.supplier_id,
            format!("F-{}", Uuid::new_v4()),
            amount,
            po.currency.clone(),
            po.created_at.date_naive(),
            po.created_at.date_naive(),
            Vec::new(),
            Uuid::new_v4(),
            po.created_at,
        );
        invoice.approve(Uuid::new_v4(), po.created_at).unwrap();
        if paid > Decimal::ZERO {
            invoice.apply_payment(paid, po.created_at).unwrap();
        }
        invoice
    }

    #[test]
    fn percentage_rounds_half_away_from_zero_and_caps() {
        assert_eq!(progress_percentage(dec!(0), dec!(5800)), 0);
        assert_eq!(progress_percentage(dec!(2900), dec!(5800)), 50);
        assert_eq!(progress_percentage(dec!(1), dec!(200)), 1);
        assert_eq!(progress_percentage(dec!(1), dec!(3)), 33);
        assert_eq!(progress_percentage(dec!(2), dec!(3)), 67);
        assert_eq!(progress_percentage(dec!(7000), dec!(5800)), 100);
    }

    #[test]
    fn percentage_handles_the_top_of_the_decimal_range() {
        let huge = Decimal::from_i128_with_scale(10i128.pow(27), 0);
        assert_eq!(progress_percentage(huge, huge), 100);
        assert_eq!(progress_percentage(huge / dec!(2), huge), 50);
        assert_eq!(progress_percentage(Decimal::MAX - Decimal::ONE, Decimal::MAX), 100);
    }

    #[test]
    fn aggregate_overflow_is_an_error() {
        let s1 = supplier("Grande", Uuid::new_v4());
        let half = Decimal::MAX / dec!(2);
        let po1 = order(s1.id, half, at(3, 1));
        let po2 = order(s1.id, half, at(3, 2));
        let po3 = order(s1.id, half, at(3, 3));
        let snapshot = StoreSnapshot {
            invoices: vec![
                invoice(&po1, half, dec!(0)),
                invoice(&po2, half, dec!(0)),
                invoice(&po3, half, dec!(0)),
            ],
            purchase_orders: vec![po1, po2, po3],
            suppliers: vec![s1],
            ..Default::default()
        };

        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        assert!(matches!(
            compute_dashboard(&snapshot, &admin, at(3, 4)),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            compute_report(&snapshot, ReportKind::ByProvider, DateRange::default(), at(3, 4)),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn report_groups_by_provider_and_skips_cancelled() {
        let s1 = supplier("Papelera del Norte", Uuid::new_v4());
        let s2 = supplier("Oficinas Sur", Uuid::new_v4());
        let po1 = order(s1.id, dec!(5800), at(3, 2));
        let po2 = order(s1.id, dec!(200), at(3, 20));
        let mut po3 = order(s2.id, dec!(999), at(3, 5));
        po3.cancel("budget".into(), at(3, 6)).unwrap();

        let snapshot = StoreSnapshot {
            invoices: vec![invoice(&po1, dec!(5800), dec!(2900))],
            suppliers: vec![s1.clone(), s2],
            purchase_orders: vec![po1, po2, po3],
            ..Default::default()
        };

        let report =
            compute_report(&snapshot, ReportKind::ByProvider, DateRange::default(), at(4, 1))
                .unwrap();
        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!(row.label, "Papelera del Norte");
        assert_eq!(row.purchase_order_count, 2);
        assert_eq!(row.purchase_order_total, dec!(6000));
        assert_eq!(row.invoiced_total, dec!(5800));
        assert_eq!(row.paid_total, dec!(2900));

        let by_status =
            compute_report(&snapshot, ReportKind::ByStatus, DateRange::default(), at(4, 1))
                .unwrap();
        let keys: Vec<_> = by_status.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["cancelled", "draft"]);
    }

    #[test]
    fn report_respects_the_date_range() {
        let s1 = supplier("Papelera del Norte", Uuid::new_v4());
        let snapshot = StoreSnapshot {
            purchase_orders: vec![
                order(s1.id, dec!(10), at(2, 28)),
                order(s1.id, dec!(20), at(3, 1)),
                order(s1.id, dec!(30), at(4, 1)),
            ],
            suppliers: vec![s1],
            ..Default::default()
        };
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 3, 1),
            NaiveDate::from_ymd_opt(2026, 3, 31),
        )
        .unwrap();
        let report = compute_report(&snapshot, ReportKind::ByMonth, range, at(5, 1)).unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].key, "2026-03");
        assert_eq!(report.rows[0].purchase_order_total, dec!(20));

        assert!(DateRange::new(
            NaiveDate::from_ymd_opt(2026, 4, 1),
            NaiveDate::from_ymd_opt(2026, 3, 1)
        )
        .is_err());
    }

    #[test]
    fn providers_only_count_their_own_suppliers() {
        let owner = Uuid::new_v4();
        let mine = supplier("Mine", owner);
        let theirs = supplier("Theirs", Uuid::new_v4());
        let po_mine = order(mine.id, dec!(100), at(3, 1));
        let po_theirs = order(theirs.id, dec!(300), at(3, 1));
        let snapshot = StoreSnapshot {
            invoices: vec![
                invoice(&po_mine, dec!(100), dec!(40)),
                invoice(&po_theirs, dec!(300), dec!(0)),
            ],
            purchase_orders: vec![po_mine, po_theirs],
            suppliers: vec![mine, theirs],
            ..Default::default()
        };

        let provider = Actor::new(owner, Role::Provider);
        let stats = compute_dashboard(&snapshot, &provider, at(3, 2)).unwrap();
        assert_eq!(stats.suppliers_pending_approval, 1);
        assert_eq!(stats.purchase_orders_in_progress, 1);
        assert_eq!(stats.approved_unpaid_invoices, 1);
        assert_eq!(stats.outstanding_by_currency.get("MXN"), Some(&dec!(60)));

        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        let stats = compute_dashboard(&snapshot, &admin, at(3, 2)).unwrap();
        assert_eq!(stats.suppliers_pending_approval, 2);
        assert_eq!(stats.outstanding_by_currency.get("MXN"), Some(&dec!(360)));
    }
}
