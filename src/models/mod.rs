//! Domain entities of the procurement lifecycle and their state machines.
//!
//! Every entity carries an immutable `id`, a `version` bumped by the store on each
//! update, and `created_at`/`updated_at` timestamps. Status enums expose
//! `can_transition_to`, and the entity methods that move between states refuse
//! anything the lifecycle does not allow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod common;
pub mod invoice;
pub mod payment_plan;
pub mod purchase_order;
pub mod quotation;
pub mod rfq;
pub mod supplier;

pub use common::{
    checked_line_total, checked_total, is_valid_currency, ContactInfo, DocumentRef,
    SupplierDocuments, MAX_AMOUNT,
};
pub use invoice::{Invoice, InvoiceStatus};
pub use payment_plan::{even_split, Payment, PaymentPlan, PaymentPlanStatus, PaymentStatus};
pub use purchase_order::{generate_po_number, LineItem, PurchaseOrder, PurchaseOrderStatus};
pub use quotation::{Quotation, QuotationStatus};
pub use rfq::{Rfq, RfqStatus};
pub use supplier::{Supplier, SupplierStatus};

/// The kinds of entity the workflow knows about.
///
/// Installments (`Payment`) are stored inside their owning [`PaymentPlan`]; they
/// have their own kind so transition events and lookups can address them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Supplier,
    Rfq,
    Quotation,
    PurchaseOrder,
    Invoice,
    PaymentPlan,
    Payment,
}

impl EntityKind {
    /// Kinds that have their own collection in the store.
    pub const STORED: [EntityKind; 6] = [
        EntityKind::Supplier,
        EntityKind::Rfq,
        EntityKind::Quotation,
        EntityKind::PurchaseOrder,
        EntityKind::Invoice,
        EntityKind::PaymentPlan,
    ];

    pub fn is_stored(&self) -> bool {
        !matches!(self, EntityKind::Payment)
    }
}

/// Common accessors the store needs on every persisted entity.
pub trait StoredEntity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;
    fn version(&self) -> i32;
    fn set_version(&mut self, version: i32);
    fn created_at(&self) -> DateTime<Utc>;
    /// Status as its snake_case name.
    fn status_name(&self) -> &str;
}

macro_rules! impl_stored_entity {
    ($ty:ty, $kind:expr) => {
        impl $crate::models::StoredEntity for $ty {
            const KIND: $crate::models::EntityKind = $kind;

            fn id(&self) -> uuid::Uuid {
                self.id
            }

            fn version(&self) -> i32 {
                self.version
            }

            fn set_version(&mut self, version: i32) {
                self.version = version;
            }

            fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
                self.created_at
            }

            fn status_name(&self) -> &str {
                self.status.as_ref()
            }
        }
    };
}

pub(crate) use impl_stored_entity;
