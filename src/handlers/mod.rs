//! HTTP handlers, one module per resource. Every handler resolves the
//! caller through [`crate::auth::AuthenticatedActor`] and delegates to the
//! workflow engine or the read-side services on [`crate::AppState`].

pub mod common;
pub mod entities;
pub mod health;
pub mod invoices;
pub mod notifications;
pub mod payments;
pub mod purchase_orders;
pub mod quotations;
pub mod reports;
pub mod rfqs;
pub mod suppliers;
