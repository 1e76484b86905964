use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::Actor;
use crate::errors::ServiceError;
use crate::models::EntityKind;

/// A committed state change of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub kind: EntityKind,
    pub id: Uuid,
    /// Containing aggregate: the RFQ of a quotation, the plan of an installment.
    pub parent_id: Option<Uuid>,
    /// `None` when the entity was just created.
    pub from: Option<String>,
    pub to: String,
    /// `None` for system sweeps.
    pub actor: Option<Actor>,
    pub occurred_at: DateTime<Utc>,
}

impl TransitionEvent {
    pub fn created(
        kind: EntityKind,
        id: Uuid,
        status: impl AsRef<str>,
        actor: Option<&Actor>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            id,
            parent_id: None,
            from: None,
            to: status.as_ref().to_string(),
            actor: actor.cloned(),
            occurred_at,
        }
    }

    pub fn changed(
        kind: EntityKind,
        id: Uuid,
        from: impl AsRef<str>,
        to: impl AsRef<str>,
        actor: Option<&Actor>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            id,
            parent_id: None,
            from: Some(from.as_ref().to_string()),
            to: to.as_ref().to_string(),
            actor: actor.cloned(),
            occurred_at,
        }
    }

    pub fn within(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn is_creation(&self) -> bool {
        self.from.is_none()
    }
}

/// Non-blocking handoff of committed transitions to the notification task.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<TransitionEvent>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<TransitionEvent>) -> Self {
        Self { sender }
    }

    /// Sender plus the receiving end for [`process_events`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TransitionEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Hands the event over without waiting. A full or closed channel is logged
    /// and the event dropped; the command that produced it has already committed.
    pub fn emit(&self, event: TransitionEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => warn!(
                kind = %event.kind,
                id = %event.id,
                to = %event.to,
                "event channel full; notification dropped"
            ),
            Err(TrySendError::Closed(event)) => warn!(
                kind = %event.kind,
                id = %event.id,
                to = %event.to,
                "event channel closed; notification dropped"
            ),
        }
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = TransitionEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

// Handlers implementing this trait process committed transitions asynchronously.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &TransitionEvent) -> Result<(), ServiceError>;
}

/// Drains the channel, fanning each event out to every handler.
/// Handler failures are logged; the loop ends when all senders are gone.
pub async fn process_events(
    mut rx: mpsc::Receiver<TransitionEvent>,
    handlers: Vec<Arc<dyn EventHandler>>,
) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!(kind = %event.kind, id = %event.id, to = %event.to, "processing transition event");

        let results = join_all(handlers.iter().map(|h| h.handle_event(&event))).await;
        for result in results {
            if let Err(e) = result {
                error!(
                    kind = %event.kind,
                    id = %event.id,
                    error = %e,
                    "event handler failed"
                );
            }
        }
    }

    info!("Event processing loop stopped");
}
