use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;

/// Largest single monetary input (price, invoice amount, payment) accepted.
pub const MAX_AMOUNT: Decimal = dec!(999999999999.99);

/// Opaque pointer to a document held elsewhere (object key, URL, archive id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct DocumentRef(pub String);

impl DocumentRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ContactInfo {
    #[validate(length(min = 1, max = 120, message = "Contact name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid contact email"))]
    pub email: String,
    #[validate(length(min = 7, max = 20, message = "Contact phone must be 7-20 characters"))]
    pub phone: String,
}

/// The four documents a supplier must provide to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SupplierDocuments {
    pub fiscal_situation: DocumentRef,
    pub constitutive_act: DocumentRef,
    pub tax_opinion: DocumentRef,
    pub legal_representative_id: DocumentRef,
}

impl SupplierDocuments {
    /// Names of the documents whose reference is blank.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("fiscal_situation", &self.fiscal_situation),
            ("constitutive_act", &self.constitutive_act),
            ("tax_opinion", &self.tax_opinion),
            ("legal_representative_id", &self.legal_representative_id),
        ]
        .into_iter()
        .filter(|(_, doc)| doc.is_blank())
        .map(|(name, _)| name)
        .collect()
    }
}

/// ISO-4217 shape check: three uppercase ASCII letters.
pub fn is_valid_currency(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

/// `quantity * unit_price`, failing instead of overflowing.
pub fn checked_line_total(quantity: u32, unit_price: Decimal) -> Result<Decimal, ServiceError> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or_else(|| amount_overflow("line total"))
}

/// Sum of `amounts`, failing instead of overflowing.
pub fn checked_total<I>(amounts: I) -> Result<Decimal, ServiceError>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .ok_or_else(|| amount_overflow("total"))
}

pub(crate) fn amount_overflow(what: &str) -> ServiceError {
    ServiceError::ValidationError(format!("{} exceeds the supported amount range", what))
}
