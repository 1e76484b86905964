#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::{Duration, NaiveDate};
use procurement_api::{
    auth::{Actor, Role},
    clock::{Clock, FixedClock},
    commands::{
        quotations::SubmitQuotationCommand,
        rfqs::CreateRfqCommand,
        suppliers::{ApproveSupplierCommand, RegisterSupplierCommand},
    },
    config::AppConfig,
    models::{ContactInfo, DocumentRef, Quotation, Rfq, Supplier, SupplierDocuments},
    services::WorkflowEngine,
    store::{EntityStore, InMemoryStore},
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "k9-QzT4r-83vn-Lp0a-Ww2e-Hs7u-Jd1c-Xy";

/// Monday 2 March 2026, the harness's "today".
pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
}

pub fn test_config() -> AppConfig {
    AppConfig::new(
        TEST_SECRET.to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    )
}

pub fn admin() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Admin).with_name("Ada")
}

pub fn purchaser() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Purchaser).with_name("Pablo")
}

pub fn finance() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Finance).with_name("Fernanda")
}

pub fn provider() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Provider).with_name("Sofia")
}

pub fn contact(name: &str) -> ContactInfo {
    ContactInfo {
        name: name.to_string(),
        email: format!(
            "{}@supplier.example.com",
            name.to_lowercase().split_whitespace().collect::<Vec<_>>().join(".")
        ),
        phone: "+52 55 1234 5678".to_string(),
    }
}

pub fn documents() -> SupplierDocuments {
    SupplierDocuments {
        fiscal_situation: DocumentRef::new("docs/fiscal.pdf"),
        constitutive_act: DocumentRef::new("docs/act.pdf"),
        tax_opinion: DocumentRef::new("docs/opinion.pdf"),
        legal_representative_id: DocumentRef::new("docs/rep-id.pdf"),
    }
}

/// Application state over an in-memory store and a clock the test controls.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(store: Arc<InMemoryStore>) -> Self {
        let clock = Arc::new(FixedClock::on(start_date()));
        let state = AppState::bootstrap(
            test_config(),
            store.clone() as Arc<dyn EntityStore>,
            clock.clone() as Arc<dyn Clock>,
        );
        let router = procurement_api::build_router(state.clone());
        Self {
            state,
            store,
            clock,
            router,
        }
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.state.workflow
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }

    pub fn token(&self, actor: &Actor) -> String {
        self.state
            .auth
            .issue_token(actor)
            .expect("token should be issued")
    }

    pub async fn register_supplier(&self, owner: &Actor, tax_id: &str, name: &str) -> Supplier {
        self.engine()
            .register_supplier(RegisterSupplierCommand {
                actor: owner.clone(),
                tax_id: tax_id.to_string(),
                business_name: name.to_string(),
                address: "Av. Reforma 100, CDMX".to_string(),
                contact: contact(name),
                documents: documents(),
            })
            .await
            .expect("supplier should register")
    }

    pub async fn approved_supplier(
        &self,
        owner: &Actor,
        reviewer: &Actor,
        tax_id: &str,
        name: &str,
    ) -> Supplier {
        let supplier = self.register_supplier(owner, tax_id, name).await;
        self.engine()
            .approve_supplier(ApproveSupplierCommand {
                actor: reviewer.clone(),
                supplier_id: supplier.id,
            })
            .await
            .expect("supplier should be approved")
    }

    pub async fn open_rfq(&self, purchaser: &Actor, title: &str, invited: &[Uuid]) -> Rfq {
        self.engine()
            .create_rfq(CreateRfqCommand {
                actor: purchaser.clone(),
                title: title.to_string(),
                description: format!("{} for the second quarter", title),
                requirements: vec!["Delivery to main office".to_string()],
                deadline: self.today() + Duration::days(30),
                invited_supplier_ids: invited.to_vec(),
            })
            .await
            .expect("RFQ should open")
    }

    pub async fn quote(
        &self,
        provider: &Actor,
        rfq_id: Uuid,
        supplier_id: Uuid,
        price: Decimal,
        delivery_days: u32,
    ) -> Quotation {
        self.engine()
            .submit_quotation(submit_quotation(provider, rfq_id, supplier_id, price, delivery_days))
            .await
            .expect("quotation should be submitted")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_raw(&self, method: Method, uri: &str, raw: &str, token: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", "application/json")
            .body(Body::from(raw.to_string()))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub fn submit_quotation(
    provider: &Actor,
    rfq_id: Uuid,
    supplier_id: Uuid,
    price: Decimal,
    delivery_days: u32,
) -> SubmitQuotationCommand {
    SubmitQuotationCommand {
        actor: provider.clone(),
        rfq_id,
        supplier_id,
        price,
        currency: "MXN".to_string(),
        delivery_days,
        conditions: "Net 30".to_string(),
        documents: vec![DocumentRef::new("quotes/quote.pdf")],
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
