//! Entity persistence.
//!
//! [`EntityStore`] is the seam between the workflow and storage. Commands read
//! entities, build a [`ChangeSet`] and commit it in one step; the store applies it
//! all or nothing, checking optimistic versions and the secondary unique indexes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{
    EntityKind, Invoice, PaymentPlan, PurchaseOrder, Quotation, Rfq, StoredEntity, Supplier,
};

pub mod locks;
pub mod memory;

pub use locks::{LockGuard, LockRegistry};
pub use memory::InMemoryStore;

/// Any stored entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "kind", content = "entity", rename_all = "snake_case")]
pub enum Record {
    Supplier(Supplier),
    Rfq(Rfq),
    Quotation(Quotation),
    PurchaseOrder(PurchaseOrder),
    Invoice(Invoice),
    PaymentPlan(PaymentPlan),
}

macro_rules! for_each_record {
    ($record:expr, $inner:ident => $body:expr) => {
        match $record {
            Record::Supplier($inner) => $body,
            Record::Rfq($inner) => $body,
            Record::Quotation($inner) => $body,
            Record::PurchaseOrder($inner) => $body,
            Record::Invoice($inner) => $body,
            Record::PaymentPlan($inner) => $body,
        }
    };
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Supplier(_) => EntityKind::Supplier,
            Record::Rfq(_) => EntityKind::Rfq,
            Record::Quotation(_) => EntityKind::Quotation,
            Record::PurchaseOrder(_) => EntityKind::PurchaseOrder,
            Record::Invoice(_) => EntityKind::Invoice,
            Record::PaymentPlan(_) => EntityKind::PaymentPlan,
        }
    }

    pub fn id(&self) -> Uuid {
        for_each_record!(self, e => e.id())
    }

    pub fn version(&self) -> i32 {
        for_each_record!(self, e => e.version())
    }

    pub(crate) fn set_version(&mut self, version: i32) {
        for_each_record!(self, e => e.set_version(version))
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        for_each_record!(self, e => e.created_at())
    }

    pub fn status_name(&self) -> &str {
        for_each_record!(self, e => e.status_name())
    }

    /// The supplier this record belongs to (a supplier belongs to itself).
    pub fn supplier_id(&self) -> Option<Uuid> {
        match self {
            Record::Supplier(s) => Some(s.id),
            Record::Rfq(_) => None,
            Record::Quotation(q) => Some(q.supplier_id),
            Record::PurchaseOrder(po) => Some(po.supplier_id),
            Record::Invoice(inv) => Some(inv.supplier_id),
            Record::PaymentPlan(plan) => Some(plan.supplier_id),
        }
    }

    pub fn rfq_id(&self) -> Option<Uuid> {
        match self {
            Record::Quotation(q) => Some(q.rfq_id),
            Record::PurchaseOrder(po) => Some(po.rfq_id),
            _ => None,
        }
    }

    pub fn purchase_order_id(&self) -> Option<Uuid> {
        match self {
            Record::Invoice(inv) => Some(inv.purchase_order_id),
            _ => None,
        }
    }

    pub fn invoice_id(&self) -> Option<Uuid> {
        match self {
            Record::PaymentPlan(plan) => Some(plan.invoice_id),
            _ => None,
        }
    }

    /// The actor that created the record.
    pub fn created_by(&self) -> Uuid {
        match self {
            Record::Supplier(s) => s.owner_id,
            Record::Rfq(r) => r.created_by,
            Record::Quotation(q) => q.submitted_by,
            Record::PurchaseOrder(po) => po.created_by,
            Record::Invoice(inv) => inv.submitted_by,
            Record::PaymentPlan(plan) => plan.created_by,
        }
    }

    /// Secondary index entries this record currently claims.
    pub fn unique_keys(&self) -> Vec<UniqueKey> {
        match self {
            Record::Supplier(s) if s.status != crate::models::SupplierStatus::Rejected => {
                vec![UniqueKey::SupplierTaxId(s.tax_id.clone())]
            }
            Record::Supplier(_) | Record::Rfq(_) => Vec::new(),
            Record::Quotation(q) if q.is_outstanding() => vec![UniqueKey::QuotationSlot {
                rfq_id: q.rfq_id,
                supplier_id: q.supplier_id,
            }],
            Record::Quotation(_) => Vec::new(),
            Record::PurchaseOrder(po) => vec![
                UniqueKey::PurchaseOrderNumber(po.po_number.clone()),
                UniqueKey::PurchaseOrderSource(po.quotation_id),
            ],
            Record::Invoice(inv) => vec![UniqueKey::InvoiceNumber(inv.invoice_number.clone())],
            Record::PaymentPlan(plan) => std::iter::once(UniqueKey::PaymentPlanInvoice(plan.invoice_id))
                .chain(
                    plan.installments
                        .iter()
                        .map(|p| UniqueKey::PaymentInstallment(p.id)),
                )
                .collect(),
        }
    }
}

macro_rules! record_conversions {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Record {
                fn from(entity: $ty) -> Self {
                    Record::$variant(entity)
                }
            }

            impl TryFrom<Record> for $ty {
                type Error = ServiceError;

                fn try_from(record: Record) -> Result<Self, Self::Error> {
                    match record {
                        Record::$variant(entity) => Ok(entity),
                        other => Err(ServiceError::InternalError(format!(
                            "expected {} record, found {}",
                            <$ty as StoredEntity>::KIND,
                            other.kind()
                        ))),
                    }
                }
            }
        )*
    };
}

record_conversions!(
    Supplier => Supplier,
    Rfq => Rfq,
    Quotation => Quotation,
    PurchaseOrder => PurchaseOrder,
    Invoice => Invoice,
    PaymentPlan => PaymentPlan,
);

/// Secondary unique indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UniqueKey {
    /// Normalized tax id of a supplier that is not rejected.
    SupplierTaxId(String),
    InvoiceNumber(String),
    PurchaseOrderNumber(String),
    /// At most one non-rejected quotation per supplier and RFQ.
    QuotationSlot { rfq_id: Uuid, supplier_id: Uuid },
    /// One purchase order per quotation.
    PurchaseOrderSource(Uuid),
    /// One payment plan per invoice.
    PaymentPlanInvoice(Uuid),
    /// Installment id, resolving to its plan.
    PaymentInstallment(Uuid),
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueKey::SupplierTaxId(tax_id) => {
                write!(f, "a supplier with tax id {} is already registered", tax_id)
            }
            UniqueKey::InvoiceNumber(number) => write!(f, "invoice number {} is taken", number),
            UniqueKey::PurchaseOrderNumber(number) => {
                write!(f, "purchase order number {} is taken", number)
            }
            UniqueKey::QuotationSlot {
                rfq_id,
                supplier_id,
            } => write!(
                f,
                "supplier {} already has an outstanding quotation for rfq {}",
                supplier_id, rfq_id
            ),
            UniqueKey::PurchaseOrderSource(quotation_id) => write!(
                f,
                "a purchase order was already generated from quotation {}",
                quotation_id
            ),
            UniqueKey::PaymentPlanInvoice(invoice_id) => {
                write!(f, "invoice {} already has a payment plan", invoice_id)
            }
            UniqueKey::PaymentInstallment(payment_id) => {
                write!(f, "installment id {} is already in use", payment_id)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Change {
    Insert(Record),
    /// Replaces the stored record if its version still equals `expected_version`.
    Update { record: Record, expected_version: i32 },
}

impl Change {
    pub fn record(&self) -> &Record {
        match self {
            Change::Insert(record) | Change::Update { record, .. } => record,
        }
    }
}

/// The writes of one command, committed atomically.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, entity: impl Into<Record>) -> Self {
        self.push_insert(entity);
        self
    }

    /// Update guarded by the version the entity was loaded with.
    pub fn update(mut self, entity: impl Into<Record>) -> Self {
        self.push_update(entity);
        self
    }

    pub fn push_insert(&mut self, entity: impl Into<Record>) {
        self.changes.push(Change::Insert(entity.into()));
    }

    pub fn push_update(&mut self, entity: impl Into<Record>) {
        let record = entity.into();
        let expected_version = record.version();
        self.changes.push(Change::Update {
            record,
            expected_version,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

/// Query criteria. Every set field must match.
#[derive(Debug, Clone)]
pub struct EntityFilter {
    pub kind: EntityKind,
    pub status: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub rfq_id: Option<Uuid>,
    pub purchase_order_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl EntityFilter {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            status: None,
            supplier_id: None,
            rfq_id: None,
            purchase_order_id: None,
            invoice_id: None,
            created_by: None,
            created_from: None,
            created_to: None,
        }
    }

    pub fn status(mut self, status: impl AsRef<str>) -> Self {
        self.status = Some(status.as_ref().to_string());
        self
    }

    pub fn supplier(mut self, supplier_id: Uuid) -> Self {
        self.supplier_id = Some(supplier_id);
        self
    }

    pub fn rfq(mut self, rfq_id: Uuid) -> Self {
        self.rfq_id = Some(rfq_id);
        self
    }

    pub fn purchase_order(mut self, purchase_order_id: Uuid) -> Self {
        self.purchase_order_id = Some(purchase_order_id);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.kind() == self.kind
            && self
                .status
                .as_deref()
                .map_or(true, |s| record.status_name() == s)
            && self
                .supplier_id
                .map_or(true, |id| record.supplier_id() == Some(id))
            && self.rfq_id.map_or(true, |id| record.rfq_id() == Some(id))
            && self
                .purchase_order_id
                .map_or(true, |id| record.purchase_order_id() == Some(id))
            && self
                .invoice_id
                .map_or(true, |id| record.invoice_id() == Some(id))
            && self
                .created_by
                .map_or(true, |id| record.created_by() == id)
            && self
                .created_from
                .map_or(true, |from| record.created_at() >= from)
            && self.created_to.map_or(true, |to| record.created_at() <= to)
    }
}

/// Point-in-time copy of every collection. Also the on-disk snapshot format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    pub suppliers: Vec<Supplier>,
    pub rfqs: Vec<Rfq>,
    pub quotations: Vec<Quotation>,
    pub purchase_orders: Vec<PurchaseOrder>,
    pub invoices: Vec<Invoice>,
    pub payment_plans: Vec<PaymentPlan>,
}

impl StoreSnapshot {
    pub fn push(&mut self, record: Record) {
        match record {
            Record::Supplier(e) => self.suppliers.push(e),
            Record::Rfq(e) => self.rfqs.push(e),
            Record::Quotation(e) => self.quotations.push(e),
            Record::PurchaseOrder(e) => self.purchase_orders.push(e),
            Record::Invoice(e) => self.invoices.push(e),
            Record::PaymentPlan(e) => self.payment_plans.push(e),
        }
    }

    pub fn into_records(self) -> impl Iterator<Item = Record> {
        self.suppliers
            .into_iter()
            .map(Record::from)
            .chain(self.rfqs.into_iter().map(Record::from))
            .chain(self.quotations.into_iter().map(Record::from))
            .chain(self.purchase_orders.into_iter().map(Record::from))
            .chain(self.invoices.into_iter().map(Record::from))
            .chain(self.payment_plans.into_iter().map(Record::from))
    }

    pub fn supplier(&self, id: Uuid) -> Option<&Supplier> {
        self.suppliers.iter().find(|s| s.id == id)
    }

    pub fn invoice(&self, id: Uuid) -> Option<&Invoice> {
        self.invoices.iter().find(|i| i.id == id)
    }

    pub fn payment_plan(&self, id: Uuid) -> Option<&PaymentPlan> {
        self.payment_plans.iter().find(|p| p.id == id)
    }
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// `NotFound` when no record of `kind` has `id`.
    async fn get(&self, kind: EntityKind, id: Uuid) -> Result<Record, ServiceError>;

    /// Matching records ordered by creation time.
    async fn query(&self, filter: &EntityFilter) -> Result<Vec<Record>, ServiceError>;

    /// Applies every change or none. Returns the records as stored, with
    /// their new versions.
    async fn commit(&self, changes: ChangeSet) -> Result<Vec<Record>, ServiceError>;

    async fn lookup(&self, key: &UniqueKey) -> Result<Option<Uuid>, ServiceError>;

    async fn snapshot(&self) -> Result<StoreSnapshot, ServiceError>;
}

/// Typed helpers over any [`EntityStore`].
#[async_trait]
pub trait EntityStoreExt: EntityStore {
    async fn fetch<T>(&self, id: Uuid) -> Result<T, ServiceError>
    where
        T: StoredEntity + TryFrom<Record, Error = ServiceError>,
    {
        let record = self.get(T::KIND, id).await?;
        T::try_from(record)
    }

    async fn find<T>(&self, filter: &EntityFilter) -> Result<Vec<T>, ServiceError>
    where
        T: StoredEntity + TryFrom<Record, Error = ServiceError>,
    {
        self.query(filter)
            .await?
            .into_iter()
            .map(T::try_from)
            .collect()
    }
}

impl<S: EntityStore + ?Sized> EntityStoreExt for S {}

/// Pulls the single committed record of type `T` with `id` out of a commit result.
pub fn committed<T>(records: &[Record], id: Uuid) -> Result<T, ServiceError>
where
    T: StoredEntity + TryFrom<Record, Error = ServiceError>,
{
    records
        .iter()
        .find(|r| r.id() == id)
        .cloned()
        .ok_or_else(|| ServiceError::InternalError(format!("record {} missing from commit", id)))
        .and_then(T::try_from)
}
