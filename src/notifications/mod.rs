use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{Actor, Role};
use crate::errors::ServiceError;
use crate::events::{EventHandler, TransitionEvent};
use crate::models::{EntityKind, Rfq, Supplier};
use crate::store::{EntityStore, EntityStoreExt};

/// Who a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Recipient {
    User(Uuid),
    Role(Role),
}

impl Recipient {
    pub fn includes(&self, actor: &Actor) -> bool {
        match self {
            Recipient::User(id) => *id == actor.id,
            Recipient::Role(role) => *role == actor.role,
        }
    }
}

/// Types of notifications
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationType {
    SupplierRegistered,
    SupplierReviewed,
    RfqOpened,
    RfqClosed,
    QuotationSubmitted,
    QuotationReviewed,
    PurchaseOrderUpdate,
    InvoiceSubmitted,
    InvoiceUpdate,
    PaymentPlanCreated,
    PaymentRecorded,
    PaymentOverdue,
}

/// Represents a notification
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: Recipient,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: Recipient,
        notification_type: NotificationType,
        event: &TransitionEvent,
        message: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient,
            notification_type,
            entity_kind: event.kind,
            entity_id: event.id,
            message,
            read: false,
            created_at: event.occurred_at,
        }
    }
}

/// Notification service errors
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification not found: {0}")]
    NotFound(Uuid),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<NotificationError> for ServiceError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound(id) => ServiceError::not_found("notification", id),
            NotificationError::Internal(msg) => ServiceError::InternalError(msg),
        }
    }
}

/// Trait for notification service operations
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError>;

    /// Newest first: everything addressed to the actor or the actor's role.
    async fn list_for(
        &self,
        actor: &Actor,
        limit: usize,
    ) -> Result<Vec<Notification>, NotificationError>;

    /// Only notifications visible to `actor` can be marked.
    async fn mark_as_read(
        &self,
        actor: &Actor,
        notification_id: Uuid,
    ) -> Result<Notification, NotificationError>;
}

pub const DEFAULT_INBOX_CAPACITY: usize = 500;

/// Inbox kept in process memory, one bounded queue per recipient.
///
/// A full queue drops its oldest read notification, or its oldest one when
/// everything is unread.
#[derive(Debug, Clone)]
pub struct InMemoryNotificationService {
    inboxes: Arc<DashMap<Recipient, VecDeque<Notification>>>,
    capacity: usize,
}

impl Default for InMemoryNotificationService {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_INBOX_CAPACITY)
    }
}

impl InMemoryNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inboxes: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.inboxes.iter().map(|inbox| inbox.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn recipients_of(actor: &Actor) -> [Recipient; 2] {
        [Recipient::User(actor.id), Recipient::Role(actor.role)]
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        debug!(id = %notification.id, kind = %notification.notification_type, "notification stored");
        let mut inbox = self
            .inboxes
            .entry(notification.recipient.clone())
            .or_default();
        if inbox.len() >= self.capacity {
            let evict = inbox.iter().position(|n| n.read).unwrap_or(0);
            if let Some(dropped) = inbox.remove(evict) {
                debug!(id = %dropped.id, "notification evicted from full inbox");
            }
        }
        inbox.push_back(notification);
        Ok(())
    }

    async fn list_for(
        &self,
        actor: &Actor,
        limit: usize,
    ) -> Result<Vec<Notification>, NotificationError> {
        let mut visible: Vec<Notification> = Self::recipients_of(actor)
            .iter()
            .filter_map(|recipient| self.inboxes.get(recipient))
            .flat_map(|inbox| inbox.iter().cloned().collect::<Vec<_>>())
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        visible.truncate(limit);
        Ok(visible)
    }

    async fn mark_as_read(
        &self,
        actor: &Actor,
        notification_id: Uuid,
    ) -> Result<Notification, NotificationError> {
        for recipient in Self::recipients_of(actor) {
            if let Some(mut inbox) = self.inboxes.get_mut(&recipient) {
                if let Some(note) = inbox.iter_mut().find(|n| n.id == notification_id) {
                    note.read = true;
                    return Ok(note.clone());
                }
            }
        }
        Err(NotificationError::NotFound(notification_id))
    }
}

/// Turns committed transitions into notifications for the affected actors.
pub struct NotificationEmitter {
    store: Arc<dyn EntityStore>,
    notifications: Arc<dyn NotificationService>,
}

impl NotificationEmitter {
    pub fn new(store: Arc<dyn EntityStore>, notifications: Arc<dyn NotificationService>) -> Self {
        Self {
            store,
            notifications,
        }
    }

    async fn supplier_owner(&self, supplier_id: Uuid) -> Result<Recipient, ServiceError> {
        let supplier: Supplier = self.store.fetch(supplier_id).await?;
        Ok(Recipient::User(supplier.owner_id))
    }

    async fn owner_of_record(&self, kind: EntityKind, id: Uuid) -> Result<Recipient, ServiceError> {
        let record = self.store.get(kind, id).await?;
        match record.supplier_id() {
            Some(supplier_id) => self.supplier_owner(supplier_id).await,
            None => Err(ServiceError::InternalError(format!(
                "{} {} has no supplier",
                kind, id
            ))),
        }
    }

    /// Recipients, type and message for one event; empty when nobody is told.
    pub async fn route(
        &self,
        event: &TransitionEvent,
    ) -> Result<Vec<(Recipient, NotificationType, String)>, ServiceError> {
        let to = event.to.as_str();
        let routed = match (event.kind, to) {
            (EntityKind::Supplier, "pending") if event.is_creation() => {
                let msg = format!("Supplier {} registered and awaits review", event.id);
                vec![
                    (Recipient::Role(Role::Admin), NotificationType::SupplierRegistered, msg.clone()),
                    (Recipient::Role(Role::Purchaser), NotificationType::SupplierRegistered, msg),
                ]
            }
            (EntityKind::Supplier, "approved" | "rejected") => vec![(
                self.supplier_owner(event.id).await?,
                NotificationType::SupplierReviewed,
                format!("Your supplier registration was {}", to),
            )],
            (EntityKind::Rfq, "open" | "closed") => {
                let rfq: Rfq = self.store.fetch(event.id).await?;
                let notification_type = if to == "open" {
                    NotificationType::RfqOpened
                } else {
                    NotificationType::RfqClosed
                };
                let mut routed = Vec::with_capacity(rfq.invited_supplier_ids.len());
                for supplier_id in &rfq.invited_supplier_ids {
                    routed.push((
                        self.supplier_owner(*supplier_id).await?,
                        notification_type,
                        format!("RFQ \"{}\" is now {}", rfq.title, to),
                    ));
                }
                routed
            }
            (EntityKind::Quotation, "submitted") => {
                let record = self.store.get(EntityKind::Quotation, event.id).await?;
                let rfq_id = record.rfq_id().unwrap_or_default();
                let rfq = self.store.get(EntityKind::Rfq, rfq_id).await?;
                vec![(
                    Recipient::User(rfq.created_by()),
                    NotificationType::QuotationSubmitted,
                    format!("A quotation was submitted for RFQ {}", rfq_id),
                )]
            }
            (EntityKind::Quotation, "approved" | "rejected") => vec![(
                self.owner_of_record(EntityKind::Quotation, event.id).await?,
                NotificationType::QuotationReviewed,
                format!("Your quotation {} was {}", event.id, to),
            )],
            (EntityKind::PurchaseOrder, "sent" | "delivered" | "cancelled") => vec![(
                self.owner_of_record(EntityKind::PurchaseOrder, event.id).await?,
                NotificationType::PurchaseOrderUpdate,
                format!("Purchase order {} is now {}", event.id, to),
            )],
            (EntityKind::PurchaseOrder, "confirmed") => {
                let po = self.store.get(EntityKind::PurchaseOrder, event.id).await?;
                vec![(
                    Recipient::User(po.created_by()),
                    NotificationType::PurchaseOrderUpdate,
                    format!("Supplier confirmed purchase order {}", event.id),
                )]
            }
            (EntityKind::Invoice, "pending") if event.is_creation() => vec![(
                Recipient::Role(Role::Finance),
                NotificationType::InvoiceSubmitted,
                format!("Invoice {} awaits review", event.id),
            )],
            (EntityKind::Invoice, "approved" | "rejected" | "paid") => vec![(
                self.owner_of_record(EntityKind::Invoice, event.id).await?,
                NotificationType::InvoiceUpdate,
                format!("Your invoice {} is now {}", event.id, to),
            )],
            (EntityKind::PaymentPlan, _) if event.is_creation() => vec![(
                self.owner_of_record(EntityKind::PaymentPlan, event.id).await?,
                NotificationType::PaymentPlanCreated,
                format!("A payment plan {} was created for your invoice", event.id),
            )],
            (EntityKind::Payment, "paid") => match event.parent_id {
                Some(plan_id) => vec![(
                    self.owner_of_record(EntityKind::PaymentPlan, plan_id).await?,
                    NotificationType::PaymentRecorded,
                    format!("Installment {} was paid", event.id),
                )],
                None => Vec::new(),
            },
            (EntityKind::Payment, "overdue") => vec![(
                Recipient::Role(Role::Finance),
                NotificationType::PaymentOverdue,
                format!("Installment {} is overdue", event.id),
            )],
            _ => Vec::new(),
        };
        Ok(routed)
    }
}

#[async_trait]
impl EventHandler for NotificationEmitter {
    #[instrument(skip_all, fields(kind = %event.kind, id = %event.id, to = %event.to))]
    async fn handle_event(&self, event: &TransitionEvent) -> Result<(), ServiceError> {
        for (recipient, notification_type, message) in self.route(event).await? {
            self.notifications
                .send(Notification::new(recipient, notification_type, event, message))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(recipient: Recipient) -> Notification {
        let event = TransitionEvent::created(
            EntityKind::Invoice,
            Uuid::new_v4(),
            "pending",
            None,
            Utc::now(),
        );
        Notification::new(
            recipient,
            NotificationType::InvoiceSubmitted,
            &event,
            "Invoice awaits review".into(),
        )
    }

    #[tokio::test]
    async fn actors_see_their_own_and_their_roles_notifications() {
        let service = InMemoryNotificationService::new();
        let finance = Actor::new(Uuid::new_v4(), Role::Finance);
        let purchaser = Actor::new(Uuid::new_v4(), Role::Purchaser);

        service.send(note(Recipient::Role(Role::Finance))).await.unwrap();
        service.send(note(Recipient::User(finance.id))).await.unwrap();
        service.send(note(Recipient::User(purchaser.id))).await.unwrap();

        assert_eq!(service.list_for(&finance, 50).await.unwrap().len(), 2);
        assert_eq!(service.list_for(&purchaser, 50).await.unwrap().len(), 1);
        assert_eq!(service.list_for(&finance, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cannot_mark_someone_elses_notification() {
        let service = InMemoryNotificationService::new();
        let owner = Actor::new(Uuid::new_v4(), Role::Provider);
        let other = Actor::new(Uuid::new_v4(), Role::Provider);
        let n = note(Recipient::User(owner.id));
        let id = n.id;
        service.send(n).await.unwrap();

        assert!(matches!(
            service.mark_as_read(&other, id).await,
            Err(NotificationError::NotFound(_))
        ));
        assert!(service.mark_as_read(&owner, id).await.unwrap().read);
    }

    #[tokio::test]
    async fn full_inboxes_drop_read_notifications_first() {
        let service = InMemoryNotificationService::with_capacity(3);
        let owner = Actor::new(Uuid::new_v4(), Role::Provider);
        let notes: Vec<Notification> = (0..3).map(|_| note(Recipient::User(owner.id))).collect();
        let ids: Vec<Uuid> = notes.iter().map(|n| n.id).collect();
        for n in notes {
            service.send(n).await.unwrap();
        }
        service.mark_as_read(&owner, ids[1]).await.unwrap();

        service.send(note(Recipient::User(owner.id))).await.unwrap();
        let kept: Vec<Uuid> = service
            .list_for(&owner, 10)
            .await
            .unwrap()
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(kept.len(), 3);
        assert!(!kept.contains(&ids[1]));
        assert!(kept.contains(&ids[0]));

        // all unread now, so the oldest goes
        service.send(note(Recipient::User(owner.id))).await.unwrap();
        let kept: Vec<Uuid> = service
            .list_for(&owner, 10)
            .await
            .unwrap()
            .iter()
            .map(|n| n.id)
            .collect();
        assert!(!kept.contains(&ids[0]));
        assert!(kept.contains(&ids[2]));
        assert_eq!(service.len(), 3);
    }
}
