use chrono::NaiveDate;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    commands::{
        invoices::{ApproveInvoiceCommand, RejectInvoiceCommand, SubmitInvoiceCommand},
        payments::{
            CreatePaymentPlanCommand, MarkOverduePaymentsCommand, RecordPaymentCommand,
            RecordPaymentResult,
        },
        purchaseorders::{
            CancelPurchaseOrderCommand, ConfirmPurchaseOrderCommand, GeneratePurchaseOrderCommand,
            MarkDeliveredCommand, SendPurchaseOrderCommand,
        },
        quotations::{
            ApproveQuotationCommand, ApproveQuotationResult, RejectQuotationCommand,
            SubmitQuotationCommand,
        },
        rfqs::{CloseExpiredRfqsCommand, CloseRfqCommand, CreateRfqCommand},
        suppliers::{
            ApproveSupplierCommand, RegisterSupplierCommand, RejectSupplierCommand,
            UpdateSupplierContactCommand,
        },
        Command, WorkflowContext,
    },
    errors::ServiceError,
    models::{Invoice, PaymentPlan, PurchaseOrder, Quotation, Rfq, Supplier},
};

/// Entry point for every state change in the procurement workflow.
///
/// One method per command; each runs the command against the shared context.
#[derive(Clone)]
pub struct WorkflowEngine {
    ctx: WorkflowContext,
}

impl WorkflowEngine {
    pub fn new(ctx: WorkflowContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.ctx
    }

    pub async fn execute<C: Command>(&self, command: C) -> Result<C::Result, ServiceError> {
        command.execute(&self.ctx).await
    }

    // Suppliers

    #[instrument(skip_all)]
    pub async fn register_supplier(
        &self,
        command: RegisterSupplierCommand,
    ) -> Result<Supplier, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn approve_supplier(
        &self,
        command: ApproveSupplierCommand,
    ) -> Result<Supplier, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn reject_supplier(
        &self,
        command: RejectSupplierCommand,
    ) -> Result<Supplier, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn update_supplier_contact(
        &self,
        command: UpdateSupplierContactCommand,
    ) -> Result<Supplier, ServiceError> {
        self.execute(command).await
    }

    // RFQs and quotations

    #[instrument(skip_all)]
    pub async fn create_rfq(&self, command: CreateRfqCommand) -> Result<Rfq, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn close_rfq(&self, command: CloseRfqCommand) -> Result<Rfq, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn submit_quotation(
        &self,
        command: SubmitQuotationCommand,
    ) -> Result<Quotation, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn approve_quotation(
        &self,
        command: ApproveQuotationCommand,
    ) -> Result<ApproveQuotationResult, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn reject_quotation(
        &self,
        command: RejectQuotationCommand,
    ) -> Result<Quotation, ServiceError> {
        self.execute(command).await
    }

    // Purchase orders

    #[instrument(skip_all)]
    pub async fn generate_purchase_order(
        &self,
        command: GeneratePurchaseOrderCommand,
    ) -> Result<PurchaseOrder, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn send_purchase_order(
        &self,
        command: SendPurchaseOrderCommand,
    ) -> Result<PurchaseOrder, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn confirm_purchase_order(
        &self,
        command: ConfirmPurchaseOrderCommand,
    ) -> Result<PurchaseOrder, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn mark_delivered(
        &self,
        command: MarkDeliveredCommand,
    ) -> Result<PurchaseOrder, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn cancel_purchase_order(
        &self,
        command: CancelPurchaseOrderCommand,
    ) -> Result<PurchaseOrder, ServiceError> {
        self.execute(command).await
    }

    // Invoices and payments

    #[instrument(skip_all)]
    pub async fn submit_invoice(
        &self,
        command: SubmitInvoiceCommand,
    ) -> Result<Invoice, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn approve_invoice(
        &self,
        command: ApproveInvoiceCommand,
    ) -> Result<Invoice, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn reject_invoice(
        &self,
        command: RejectInvoiceCommand,
    ) -> Result<Invoice, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn create_payment_plan(
        &self,
        command: CreatePaymentPlanCommand,
    ) -> Result<PaymentPlan, ServiceError> {
        self.execute(command).await
    }

    #[instrument(skip_all)]
    pub async fn record_payment(
        &self,
        command: RecordPaymentCommand,
    ) -> Result<RecordPaymentResult, ServiceError> {
        self.execute(command).await
    }

    // System sweeps

    pub async fn close_expired_rfqs(&self, today: NaiveDate) -> Result<Vec<Uuid>, ServiceError> {
        self.execute(CloseExpiredRfqsCommand { today }).await
    }

    pub async fn mark_overdue_payments(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<Uuid>, ServiceError> {
        self.execute(MarkOverduePaymentsCommand { today }).await
    }

    /// Runs both sweeps for the clock's current day and drops idle locks.
    pub async fn run_sweeps(&self) -> Result<SweepReport, ServiceError> {
        let today = self.ctx.today();
        let closed_rfqs = self.close_expired_rfqs(today).await?;
        let overdue_payments = self.mark_overdue_payments(today).await?;
        self.ctx.locks.prune();
        Ok(SweepReport {
            today,
            closed_rfqs,
            overdue_payments,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    pub today: NaiveDate,
    pub closed_rfqs: Vec<Uuid>,
    pub overdue_payments: Vec<Uuid>,
}
