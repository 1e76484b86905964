//! End-to-end tests for the procurement workflow, driven through the engine.
//!
//! Covers the full journey from supplier onboarding to the last installment,
//! plus the guards on each step: single award per RFQ, forward-only purchase
//! orders, invoice gating, plan conservation and the deadline/overdue sweeps.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Duration;
use common::{finance, provider, purchaser, submit_quotation, TestApp};
use procurement_api::{
    auth::{Actor, Role},
    commands::{
        invoices::{ApproveInvoiceCommand, RejectInvoiceCommand, SubmitInvoiceCommand},
        payments::{
            CreatePaymentPlanCommand, InstallmentInput, PlanSchedule, RecordPaymentCommand,
        },
        purchaseorders::{
            CancelPurchaseOrderCommand, ConfirmPurchaseOrderCommand, GeneratePurchaseOrderCommand,
            LineItemInput, MarkDeliveredCommand, SendPurchaseOrderCommand,
        },
        quotations::{ApproveQuotationCommand, RejectQuotationCommand},
        rfqs::CloseRfqCommand,
        suppliers::{RejectSupplierCommand, UpdateSupplierContactCommand},
    },
    errors::ServiceError,
    models::{
        ContactInfo, DocumentRef, EntityKind, Invoice, InvoiceStatus, PaymentPlan, PaymentPlanStatus,
        PaymentStatus, PurchaseOrder, PurchaseOrderStatus, QuotationStatus, Rfq, RfqStatus,
        SupplierStatus,
    },
    notifications::{NotificationType, Recipient},
    services::queries::ListFilter,
    store::{EntityStore, EntityStoreExt, InMemoryStore},
};
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// One purchaser, two approved suppliers and an open "Office Supplies" RFQ
/// with a quotation from each.
struct Quoted {
    app: TestApp,
    purchaser: Actor,
    provider1: Actor,
    provider2: Actor,
    supplier1: Uuid,
    supplier2: Uuid,
    rfq: Rfq,
    q1: Uuid,
    q2: Uuid,
}

async fn quoted() -> Quoted {
    let app = TestApp::new();
    let purchaser = purchaser();
    let provider1 = provider();
    let provider2 = provider();
    let s1 = app
        .approved_supplier(&provider1, &purchaser, "AAA010101AAA", "Papeleria Norte")
        .await;
    let s2 = app
        .approved_supplier(&provider2, &purchaser, "BBB020202BBB", "Oficinas del Sur")
        .await;
    let rfq = app
        .open_rfq(&purchaser, "Office Supplies", &[s1.id, s2.id])
        .await;
    let q1 = app.quote(&provider1, rfq.id, s1.id, dec!(5800), 7).await;
    let q2 = app.quote(&provider2, rfq.id, s2.id, dec!(6200), 5).await;

    Quoted {
        app,
        purchaser,
        provider1,
        provider2,
        supplier1: s1.id,
        supplier2: s2.id,
        rfq,
        q1: q1.id,
        q2: q2.id,
    }
}

async fn approve(q: &Quoted, quotation_id: Uuid) -> Result<(), ServiceError> {
    q.app
        .engine()
        .approve_quotation(ApproveQuotationCommand {
            actor: q.purchaser.clone(),
            quotation_id,
        })
        .await
        .map(|_| ())
}

async fn generate(q: &Quoted, quotation_id: Uuid) -> Result<PurchaseOrder, ServiceError> {
    q.app
        .engine()
        .generate_purchase_order(GeneratePurchaseOrderCommand {
            actor: q.purchaser.clone(),
            quotation_id,
            line_items: None,
            delivery_date: None,
        })
        .await
}

/// Awarded to supplier 1 with its purchase order delivered.
async fn delivered() -> (Quoted, PurchaseOrder) {
    let q = quoted().await;
    approve(&q, q.q1).await.unwrap();
    let po = generate(&q, q.q1).await.unwrap();
    let engine = q.app.engine();
    engine
        .send_purchase_order(SendPurchaseOrderCommand {
            actor: q.purchaser.clone(),
            purchase_order_id: po.id,
        })
        .await
        .unwrap();
    engine
        .confirm_purchase_order(ConfirmPurchaseOrderCommand {
            actor: q.provider1.clone(),
            purchase_order_id: po.id,
        })
        .await
        .unwrap();
    let po = engine
        .mark_delivered(MarkDeliveredCommand {
            actor: q.purchaser.clone(),
            purchase_order_id: po.id,
        })
        .await
        .unwrap();
    (q, po)
}

fn invoice_command(q: &Quoted, po: &PurchaseOrder, number: &str, amount: Decimal) -> SubmitInvoiceCommand {
    SubmitInvoiceCommand {
        actor: q.provider1.clone(),
        purchase_order_id: po.id,
        invoice_number: number.to_string(),
        amount,
        issue_date: q.app.today(),
        due_date: q.app.today() + Duration::days(30),
        documents: vec![DocumentRef::new("invoices/f-1.xml")],
    }
}

/// Delivered, invoiced for the full total and approved by finance.
async fn approved_invoice() -> (Quoted, Actor, Invoice) {
    let (q, po) = delivered().await;
    let finance = finance();
    let invoice = q
        .app
        .engine()
        .submit_invoice(invoice_command(&q, &po, "F-2026-0001", dec!(5800)))
        .await
        .unwrap();
    let invoice = q
        .app
        .engine()
        .approve_invoice(ApproveInvoiceCommand {
            actor: finance.clone(),
            invoice_id: invoice.id,
        })
        .await
        .unwrap();
    (q, finance, invoice)
}

fn two_halves(q: &Quoted) -> PlanSchedule {
    PlanSchedule::Explicit {
        installments: vec![
            InstallmentInput {
                due_date: q.app.today() + Duration::days(30),
                amount: dec!(2900.00),
            },
            InstallmentInput {
                due_date: q.app.today() + Duration::days(60),
                amount: dec!(2900.00),
            },
        ],
    }
}

async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..50 {
        if check().await {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}

// ==================== Full scenario ====================

#[tokio::test]
async fn office_supplies_scenario_runs_to_paid() {
    let q = quoted().await;
    let engine = q.app.engine();

    let award = engine
        .approve_quotation(ApproveQuotationCommand {
            actor: q.purchaser.clone(),
            quotation_id: q.q1,
        })
        .await
        .unwrap();
    assert_eq!(award.quotation.status, QuotationStatus::Approved);
    assert_eq!(award.rfq.status, RfqStatus::Awarded);
    assert_eq!(award.rfq.awarded_quotation_id, Some(q.q1));
    assert_eq!(award.rejected_quotation_ids, vec![q.q2]);

    let po = generate(&q, q.q1).await.unwrap();
    assert_eq!(po.status, PurchaseOrderStatus::Draft);
    assert_eq!(po.total, dec!(5800));
    assert_eq!(po.supplier_id, q.supplier1);
    assert_eq!(po.delivery_date, q.app.today() + Duration::days(7));

    let po = engine
        .send_purchase_order(SendPurchaseOrderCommand {
            actor: q.purchaser.clone(),
            purchase_order_id: po.id,
        })
        .await
        .unwrap();
    assert_eq!(po.status, PurchaseOrderStatus::Sent);
    let po = engine
        .confirm_purchase_order(ConfirmPurchaseOrderCommand {
            actor: q.provider1.clone(),
            purchase_order_id: po.id,
        })
        .await
        .unwrap();
    assert_eq!(po.status, PurchaseOrderStatus::Confirmed);
    let po = engine
        .mark_delivered(MarkDeliveredCommand {
            actor: q.purchaser.clone(),
            purchase_order_id: po.id,
        })
        .await
        .unwrap();
    assert_eq!(po.status, PurchaseOrderStatus::Delivered);

    let invoice = engine
        .submit_invoice(invoice_command(&q, &po, "F-2026-0001", dec!(5800)))
        .await
        .unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.currency, po.currency);

    let finance = finance();
    let invoice = engine
        .approve_invoice(ApproveInvoiceCommand {
            actor: finance.clone(),
            invoice_id: invoice.id,
        })
        .await
        .unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Approved);

    let plan = engine
        .create_payment_plan(CreatePaymentPlanCommand {
            actor: finance.clone(),
            invoice_id: invoice.id,
            schedule: two_halves(&q),
        })
        .await
        .unwrap();
    assert_eq!(plan.financed_amount, dec!(5800));
    let sum: Decimal = plan.installments.iter().map(|p| p.amount).sum();
    assert_eq!(sum, plan.financed_amount);

    let first = engine
        .record_payment(RecordPaymentCommand {
            actor: finance.clone(),
            payment_id: plan.installments[0].id,
            amount: dec!(2900.00),
        })
        .await
        .unwrap();
    assert_eq!(first.invoice.status, InvoiceStatus::Approved);
    assert_eq!(first.payment_plan.status, PaymentPlanStatus::Active);

    let second = engine
        .record_payment(RecordPaymentCommand {
            actor: finance.clone(),
            payment_id: plan.installments[1].id,
            amount: dec!(2900.00),
        })
        .await
        .unwrap();
    assert_eq!(second.invoice.status, InvoiceStatus::Paid);
    assert_eq!(second.invoice.paid_amount, dec!(5800));
    assert_eq!(second.payment_plan.status, PaymentPlanStatus::Completed);
    assert!(second
        .payment_plan
        .installments
        .iter()
        .all(|p| p.status == PaymentStatus::Paid));

    let progress = q
        .app
        .state
        .analytics
        .payment_progress(&finance, plan.id)
        .await
        .unwrap();
    assert_eq!(progress.percentage, 100);
    assert_eq!(progress.remaining, Decimal::ZERO);
}

// ==================== Single winner ====================

#[tokio::test]
async fn second_approval_on_awarded_rfq_fails() {
    let q = quoted().await;
    approve(&q, q.q1).await.unwrap();

    assert_matches!(approve(&q, q.q2).await, Err(ServiceError::InvalidTransition(_)));

    let q2 = q
        .app
        .store
        .fetch::<procurement_api::models::Quotation>(q.q2)
        .await
        .unwrap();
    assert_eq!(q2.status, QuotationStatus::Rejected);
    assert!(q2.rejection_reason.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_award_exactly_one_quotation() {
    let q = Arc::new(quoted().await);

    let handles: Vec<_> = [q.q1, q.q2]
        .into_iter()
        .map(|id| {
            let q = q.clone();
            tokio::spawn(async move { approve(&q, id).await })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => wins += 1,
            Err(e) => assert_matches!(e, ServiceError::InvalidTransition(_)),
        }
    }
    assert_eq!(wins, 1);

    let quotations = q
        .app
        .store
        .find::<procurement_api::models::Quotation>(
            &procurement_api::store::EntityFilter::new(EntityKind::Quotation).rfq(q.rfq.id),
        )
        .await
        .unwrap();
    let approved = quotations
        .iter()
        .filter(|q| q.status == QuotationStatus::Approved)
        .count();
    assert_eq!(approved, 1);
    assert_eq!(quotations.len() - approved, 1);
}

// ==================== Guards ====================

#[tokio::test]
async fn purchase_order_requires_an_approved_quotation() {
    let q = quoted().await;
    assert_matches!(generate(&q, q.q1).await, Err(ServiceError::InvalidTransition(_)));

    approve(&q, q.q1).await.unwrap();
    assert_matches!(generate(&q, q.q2).await, Err(ServiceError::InvalidTransition(_)));

    generate(&q, q.q1).await.unwrap();
    assert_matches!(generate(&q, q.q1).await, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn purchase_order_lifecycle_only_moves_forward() {
    let q = quoted().await;
    approve(&q, q.q1).await.unwrap();
    let po = generate(&q, q.q1).await.unwrap();
    let engine = q.app.engine();

    let deliver = || MarkDeliveredCommand {
        actor: q.purchaser.clone(),
        purchase_order_id: po.id,
    };
    assert_matches!(
        engine.mark_delivered(deliver()).await,
        Err(ServiceError::InvalidTransition(_))
    );

    engine
        .send_purchase_order(SendPurchaseOrderCommand {
            actor: q.purchaser.clone(),
            purchase_order_id: po.id,
        })
        .await
        .unwrap();
    assert_matches!(
        engine
            .send_purchase_order(SendPurchaseOrderCommand {
                actor: q.purchaser.clone(),
                purchase_order_id: po.id,
            })
            .await,
        Err(ServiceError::InvalidTransition(_))
    );

    let cancelled = engine
        .cancel_purchase_order(CancelPurchaseOrderCommand {
            actor: q.purchaser.clone(),
            purchase_order_id: po.id,
            reason: "budget withdrawn".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(cancelled.status, PurchaseOrderStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("budget withdrawn"));

    assert_matches!(
        engine
            .confirm_purchase_order(ConfirmPurchaseOrderCommand {
                actor: q.provider1.clone(),
                purchase_order_id: po.id,
            })
            .await,
        Err(ServiceError::InvalidTransition(_))
    );
}

#[tokio::test]
async fn oversized_line_items_are_rejected() {
    let q = quoted().await;
    approve(&q, q.q1).await.unwrap();
    let line = |quantity: u32, unit_price: Decimal| LineItemInput {
        description: "Paper".into(),
        quantity,
        unit_price,
    };

    let result = q
        .app
        .engine()
        .generate_purchase_order(GeneratePurchaseOrderCommand {
            actor: q.purchaser.clone(),
            quotation_id: q.q1,
            line_items: Some(vec![line(10, Decimal::from_i128_with_scale(10i128.pow(28), 0))]),
            delivery_date: None,
        })
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let po = q
        .app
        .engine()
        .generate_purchase_order(GeneratePurchaseOrderCommand {
            actor: q.purchaser.clone(),
            quotation_id: q.q1,
            line_items: Some(vec![line(u32::MAX, dec!(999999999999.99))]),
            delivery_date: None,
        })
        .await
        .unwrap();
    assert_eq!(po.total, Decimal::from(u32::MAX) * dec!(999999999999.99));
}

#[tokio::test]
async fn delivered_purchase_order_cannot_be_cancelled() {
    let (q, po) = delivered().await;
    assert_matches!(
        q.app
            .engine()
            .cancel_purchase_order(CancelPurchaseOrderCommand {
                actor: q.purchaser.clone(),
                purchase_order_id: po.id,
                reason: "too late".to_string(),
            })
            .await,
        Err(ServiceError::InvalidTransition(_))
    );
}

#[tokio::test]
async fn invoices_wait_for_delivery() {
    let q = quoted().await;
    approve(&q, q.q1).await.unwrap();
    let po = generate(&q, q.q1).await.unwrap();

    assert_matches!(
        q.app
            .engine()
            .submit_invoice(invoice_command(&q, &po, "F-EARLY", dec!(5800)))
            .await,
        Err(ServiceError::InvalidTransition(_))
    );
}

#[tokio::test]
async fn several_invoices_per_order_but_unique_numbers() {
    let (q, po) = delivered().await;
    let engine = q.app.engine();

    engine
        .submit_invoice(invoice_command(&q, &po, "F-1", dec!(2000)))
        .await
        .unwrap();
    engine
        .submit_invoice(invoice_command(&q, &po, "F-2", dec!(3800)))
        .await
        .unwrap();
    assert_matches!(
        engine
            .submit_invoice(invoice_command(&q, &po, "F-1", dec!(100)))
            .await,
        Err(ServiceError::Conflict(_))
    );
}

#[rstest]
#[case::zero(dec!(0))]
#[case::negative(dec!(-10))]
#[case::three_decimals(dec!(10.001))]
#[case::above_ceiling(dec!(1000000000000.00))]
#[tokio::test]
async fn invoice_amounts_are_validated(#[case] amount: Decimal) {
    let (q, po) = delivered().await;
    assert_matches!(
        q.app
            .engine()
            .submit_invoice(invoice_command(&q, &po, "F-BAD", amount))
            .await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn rejecting_a_reviewed_quotation_is_an_error() {
    let q = quoted().await;
    approve(&q, q.q1).await.unwrap();
    let engine = q.app.engine();

    for id in [q.q1, q.q2] {
        assert_matches!(
            engine
                .reject_quotation(RejectQuotationCommand {
                    actor: q.purchaser.clone(),
                    quotation_id: id,
                    reason: Some("changed our mind".to_string()),
                })
                .await,
            Err(ServiceError::InvalidTransition(_))
        );
    }
}

#[tokio::test]
async fn rejected_invoice_cannot_get_a_plan() {
    let (q, po) = delivered().await;
    let finance = finance();
    let engine = q.app.engine();
    let invoice = engine
        .submit_invoice(invoice_command(&q, &po, "F-REJ", dec!(5800)))
        .await
        .unwrap();
    engine
        .reject_invoice(RejectInvoiceCommand {
            actor: finance.clone(),
            invoice_id: invoice.id,
            reason: "wrong tax regime".to_string(),
        })
        .await
        .unwrap();

    assert_matches!(
        engine
            .create_payment_plan(CreatePaymentPlanCommand {
                actor: finance,
                invoice_id: invoice.id,
                schedule: two_halves(&q),
            })
            .await,
        Err(ServiceError::InvalidTransition(_))
    );
}

// ==================== Payment plans ====================

#[tokio::test]
async fn installments_must_add_up_to_the_invoice() {
    let (q, finance, invoice) = approved_invoice().await;
    let short = PlanSchedule::Explicit {
        installments: vec![InstallmentInput {
            due_date: q.app.today() + Duration::days(30),
            amount: dec!(5799.99),
        }],
    };
    assert_matches!(
        q.app
            .engine()
            .create_payment_plan(CreatePaymentPlanCommand {
                actor: finance,
                invoice_id: invoice.id,
                schedule: short,
            })
            .await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn one_plan_per_invoice() {
    let (q, finance, invoice) = approved_invoice().await;
    let engine = q.app.engine();
    engine
        .create_payment_plan(CreatePaymentPlanCommand {
            actor: finance.clone(),
            invoice_id: invoice.id,
            schedule: two_halves(&q),
        })
        .await
        .unwrap();
    assert_matches!(
        engine
            .create_payment_plan(CreatePaymentPlanCommand {
                actor: finance,
                invoice_id: invoice.id,
                schedule: two_halves(&q),
            })
            .await,
        Err(ServiceError::Conflict(_))
    );
}

#[tokio::test]
async fn even_split_absorbs_rounding_in_the_last_installment() {
    let (q, finance, invoice) = approved_invoice().await;
    let plan: PaymentPlan = q
        .app
        .engine()
        .create_payment_plan(CreatePaymentPlanCommand {
            actor: finance,
            invoice_id: invoice.id,
            schedule: PlanSchedule::EvenSplit {
                count: 3,
                first_due_date: q.app.today() + Duration::days(15),
                interval_days: 30,
            },
        })
        .await
        .unwrap();

    let amounts: Vec<Decimal> = plan.installments.iter().map(|p| p.amount).collect();
    assert_eq!(amounts, vec![dec!(1933.33), dec!(1933.33), dec!(1933.34)]);
    assert_eq!(
        plan.installments[2].due_date,
        q.app.today() + Duration::days(75)
    );
}

#[tokio::test]
async fn unbounded_installment_intervals_are_rejected() {
    let (q, finance, invoice) = approved_invoice().await;
    let result = q
        .app
        .engine()
        .create_payment_plan(CreatePaymentPlanCommand {
            actor: finance,
            invoice_id: invoice.id,
            schedule: PlanSchedule::EvenSplit {
                count: 120,
                first_due_date: q.app.today(),
                interval_days: u32::MAX,
            },
        })
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn payments_must_match_the_installment_and_happen_once() {
    let (q, finance, invoice) = approved_invoice().await;
    let engine = q.app.engine();
    let plan = engine
        .create_payment_plan(CreatePaymentPlanCommand {
            actor: finance.clone(),
            invoice_id: invoice.id,
            schedule: two_halves(&q),
        })
        .await
        .unwrap();
    let payment_id = plan.installments[0].id;

    assert_matches!(
        engine
            .record_payment(RecordPaymentCommand {
                actor: finance.clone(),
                payment_id,
                amount: dec!(1000),
            })
            .await,
        Err(ServiceError::ValidationError(_))
    );
    engine
        .record_payment(RecordPaymentCommand {
            actor: finance.clone(),
            payment_id,
            amount: dec!(2900.00),
        })
        .await
        .unwrap();
    assert_matches!(
        engine
            .record_payment(RecordPaymentCommand {
                actor: finance.clone(),
                payment_id,
                amount: dec!(2900.00),
            })
            .await,
        Err(ServiceError::InvalidTransition(_))
    );
    assert_matches!(
        engine
            .record_payment(RecordPaymentCommand {
                actor: finance,
                payment_id: Uuid::new_v4(),
                amount: dec!(2900.00),
            })
            .await,
        Err(ServiceError::NotFound(_))
    );
}

// ==================== Authorization ====================

#[tokio::test]
async fn roles_outside_the_gate_are_refused() {
    let q = quoted().await;
    let engine = q.app.engine();

    assert_matches!(
        engine
            .approve_quotation(ApproveQuotationCommand {
                actor: q.provider1.clone(),
                quotation_id: q.q1,
            })
            .await,
        Err(ServiceError::Unauthorized(_))
    );
    assert_matches!(
        engine
            .close_rfq(CloseRfqCommand {
                actor: finance(),
                rfq_id: q.rfq.id,
            })
            .await,
        Err(ServiceError::Unauthorized(_))
    );
}

#[tokio::test]
async fn providers_only_act_for_their_own_suppliers() {
    let q = quoted().await;
    approve(&q, q.q1).await.unwrap();
    let po = generate(&q, q.q1).await.unwrap();
    q.app
        .engine()
        .send_purchase_order(SendPurchaseOrderCommand {
            actor: q.purchaser.clone(),
            purchase_order_id: po.id,
        })
        .await
        .unwrap();

    assert_matches!(
        q.app
            .engine()
            .confirm_purchase_order(ConfirmPurchaseOrderCommand {
                actor: q.provider2.clone(),
                purchase_order_id: po.id,
            })
            .await,
        Err(ServiceError::Unauthorized(_))
    );

    // Quoting in the name of someone else's supplier
    let other_rfq = q
        .app
        .open_rfq(&q.purchaser, "Toner", &[q.supplier1, q.supplier2])
        .await;
    assert_matches!(
        q.app
            .engine()
            .submit_quotation(submit_quotation(&q.provider2, other_rfq.id, q.supplier1, dec!(10), 3))
            .await,
        Err(ServiceError::Unauthorized(_))
    );
}

#[tokio::test]
async fn provider_reads_are_scoped_to_owned_suppliers() {
    let q = quoted().await;
    let queries = &q.app.state.queries;

    let visible = queries
        .list_entities(&q.provider1, EntityKind::Quotation, &ListFilter::default())
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id(), q.q1);

    assert_matches!(
        queries.get_entity(&q.provider1, EntityKind::Quotation, q.q2).await,
        Err(ServiceError::Unauthorized(_))
    );

    let everything = queries
        .list_entities(&q.purchaser, EntityKind::Quotation, &ListFilter::default())
        .await
        .unwrap();
    assert_eq!(everything.len(), 2);
}

// ==================== Suppliers and RFQs ====================

#[tokio::test]
async fn only_approved_suppliers_are_invited_or_quote() {
    let app = TestApp::new();
    let purchaser = purchaser();
    let owner = provider();
    let pending = app.register_supplier(&owner, "CCC030303CCC", "Pendiente SA").await;
    assert_eq!(pending.status, SupplierStatus::Pending);

    let rejected = app
        .engine()
        .reject_supplier(RejectSupplierCommand {
            actor: purchaser.clone(),
            supplier_id: pending.id,
            reason: "expired tax opinion".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(rejected.status, SupplierStatus::Rejected);

    let result = app
        .engine()
        .create_rfq(procurement_api::commands::rfqs::CreateRfqCommand {
            actor: purchaser,
            title: "Chairs".to_string(),
            description: String::new(),
            requirements: vec!["Ergonomic".to_string()],
            deadline: app.today() + Duration::days(10),
            invited_supplier_ids: vec![rejected.id],
        })
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    // A rejected registration frees its tax id
    let again = app.register_supplier(&owner, "ccc030303ccc", "Pendiente SA").await;
    assert_eq!(again.tax_id, "CCC030303CCC");
}

#[tokio::test]
async fn duplicate_tax_ids_conflict() {
    let app = TestApp::new();
    let owner = provider();
    app.register_supplier(&owner, "DDD040404DDD", "Primero").await;
    let result = app
        .engine()
        .register_supplier(procurement_api::commands::suppliers::RegisterSupplierCommand {
            actor: provider(),
            tax_id: "DDD 040404 DDD".to_string(),
            business_name: "Segundo".to_string(),
            address: "Calle 1".to_string(),
            contact: common::contact("Segundo"),
            documents: common::documents(),
        })
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn owners_update_their_contact_details() {
    let app = TestApp::new();
    let owner = provider();
    let supplier = app.register_supplier(&owner, "FFF060606FFF", "Contacto SA").await;

    let update = |actor: Actor, phone: &str| UpdateSupplierContactCommand {
        actor,
        supplier_id: supplier.id,
        contact: ContactInfo {
            phone: phone.to_string(),
            ..common::contact("Contacto")
        },
    };

    let updated = app
        .engine()
        .update_supplier_contact(update(owner.clone(), "+52 81 8000 1111"))
        .await
        .unwrap();
    assert_eq!(updated.contact.phone, "+52 81 8000 1111");
    assert_eq!(updated.version, supplier.version + 1);
    assert_eq!(updated.status, SupplierStatus::Pending);

    assert_matches!(
        app.engine()
            .update_supplier_contact(update(provider(), "+52 81 8000 2222"))
            .await,
        Err(ServiceError::Unauthorized(_))
    );
    assert_matches!(
        app.engine()
            .update_supplier_contact(update(owner, "12"))
            .await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn one_outstanding_quotation_per_supplier() {
    let q = quoted().await;
    let result = q
        .app
        .engine()
        .submit_quotation(submit_quotation(&q.provider1, q.rfq.id, q.supplier1, dec!(5500), 6))
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
}

// ==================== Sweeps ====================

#[tokio::test]
async fn expired_rfqs_are_closed_by_the_sweep() {
    let q = quoted().await;
    q.app.advance_days(31);

    let late = q
        .app
        .engine()
        .submit_quotation(submit_quotation(&q.provider1, q.rfq.id, q.supplier1, dec!(1), 1))
        .await;
    assert_matches!(late, Err(ServiceError::InvalidTransition(_)));

    let report = q.app.engine().run_sweeps().await.unwrap();
    assert_eq!(report.closed_rfqs, vec![q.rfq.id]);

    let rfq: Rfq = q.app.store.fetch(q.rfq.id).await.unwrap();
    assert_eq!(rfq.status, RfqStatus::Closed);

    // Closed RFQs still take a decision on quotations already submitted
    approve(&q, q.q2).await.unwrap();

    let again = q.app.engine().run_sweeps().await.unwrap();
    assert!(again.closed_rfqs.is_empty());
}

#[tokio::test]
async fn late_installments_are_flagged_overdue_and_still_payable() {
    let (q, finance, invoice) = approved_invoice().await;
    let engine = q.app.engine();
    let plan = engine
        .create_payment_plan(CreatePaymentPlanCommand {
            actor: finance.clone(),
            invoice_id: invoice.id,
            schedule: two_halves(&q),
        })
        .await
        .unwrap();

    q.app.advance_days(31);
    let flagged = engine.mark_overdue_payments(q.app.today()).await.unwrap();
    assert_eq!(flagged, vec![plan.installments[0].id]);

    let stored: PaymentPlan = q.app.store.fetch(plan.id).await.unwrap();
    assert_eq!(stored.installments[0].status, PaymentStatus::Overdue);
    assert_eq!(stored.installments[1].status, PaymentStatus::Scheduled);

    let stats = q.app.state.analytics.dashboard_stats(&finance).await.unwrap();
    assert_eq!(stats.overdue_payments, 1);

    let paid = engine
        .record_payment(RecordPaymentCommand {
            actor: finance,
            payment_id: plan.installments[0].id,
            amount: dec!(2900.00),
        })
        .await
        .unwrap();
    assert_eq!(paid.payment_plan.installments[0].status, PaymentStatus::Paid);

    assert!(engine
        .mark_overdue_payments(q.app.today())
        .await
        .unwrap()
        .is_empty());
}

// ==================== Notifications ====================

#[tokio::test]
async fn reviews_notify_the_supplier_owners() {
    let q = quoted().await;
    approve(&q, q.q1).await.unwrap();
    let notifications = q.app.state.notifications.clone();

    let provider2 = q.provider2.clone();
    let told = eventually(|| {
        let notifications = notifications.clone();
        let provider2 = provider2.clone();
        async move {
            notifications
                .list_for(&provider2, 50)
                .await
                .unwrap()
                .iter()
                .any(|n| n.notification_type == NotificationType::QuotationReviewed)
        }
    })
    .await;
    assert!(told, "losing supplier should hear about the rejection");

    let purchaser_inbox = notifications.list_for(&q.purchaser, 50).await.unwrap();
    let submitted = purchaser_inbox
        .iter()
        .filter(|n| n.notification_type == NotificationType::QuotationSubmitted)
        .count();
    assert_eq!(submitted, 2);
    assert!(purchaser_inbox
        .iter()
        .all(|n| n.recipient == Recipient::User(q.purchaser.id)
            || n.recipient == Recipient::Role(Role::Purchaser)));
}

// ==================== Persistence ====================

#[tokio::test]
async fn snapshot_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("procurement.json");

    let supplier_id = {
        let store = Arc::new(InMemoryStore::open(&path).await.unwrap());
        let app = TestApp::with_store(store);
        app.approved_supplier(&provider(), &purchaser(), "EEE050505EEE", "Persistente")
            .await
            .id
    };

    let reopened = Arc::new(InMemoryStore::open(&path).await.unwrap());
    let record = reopened.get(EntityKind::Supplier, supplier_id).await.unwrap();
    assert_eq!(record.status_name(), "approved");
    assert_eq!(record.version(), 2);

    let app = TestApp::with_store(reopened);
    let duplicate = app
        .engine()
        .register_supplier(procurement_api::commands::suppliers::RegisterSupplierCommand {
            actor: provider(),
            tax_id: "EEE050505EEE".to_string(),
            business_name: "Copia".to_string(),
            address: "Calle 2".to_string(),
            contact: common::contact("Copia"),
            documents: common::documents(),
        })
        .await;
    assert_matches!(duplicate, Err(ServiceError::Conflict(_)));
}
