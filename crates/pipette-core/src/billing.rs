//! Invoices for ordered tests and the payments made against them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::error::PipetteError;
use crate::templates::schema::TestTemplate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentType {
    #[default]
    Cash,
    Card,
    Online,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Partial,
    Completed,
    /// The payment gateway reported a failed charge.
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Partial => write!(f, "Partial"),
            PaymentStatus::Completed => write!(f, "Completed"),
            PaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// One ordered test on an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    pub template_id: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub user_id: String,
    pub test_templates: Vec<InvoiceLine>,
    #[serde(default)]
    pub payment_type: PaymentType,
    pub amount: Decimal,
    pub paying_amount: Decimal,
    pub due_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_full_payment: bool,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub stripe_payment_id: Option<String>,
}

impl Invoice {
    /// Raise an invoice for the given templates with an upfront payment.
    pub fn new(
        user_id: &str,
        template_ids: &[&str],
        amount: Decimal,
        paying_amount: Decimal,
        payment_type: PaymentType,
    ) -> Result<Self, PipetteError> {
        if template_ids.is_empty() {
            return Err(PipetteError::Invoice("an invoice needs at least one test".into()));
        }
        if amount < Decimal::ZERO || paying_amount < Decimal::ZERO {
            return Err(PipetteError::Invoice(format!(
                "amounts must not be negative (amount {amount}, paying {paying_amount})"
            )));
        }
        if paying_amount > amount {
            return Err(PipetteError::Invoice(format!(
                "paying amount {paying_amount} exceeds invoice amount {amount}"
            )));
        }

        let due_amount = amount - paying_amount;
        let payment_status = if paying_amount.is_zero() && !amount.is_zero() {
            PaymentStatus::Pending
        } else if due_amount.is_zero() {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Partial
        };

        Ok(Self {
            user_id: user_id.to_string(),
            test_templates: template_ids
                .iter()
                .map(|id| InvoiceLine {
                    template_id: id.to_string(),
                    completed: false,
                })
                .collect(),
            payment_type,
            amount,
            paying_amount,
            due_amount,
            notes: None,
            is_full_payment: due_amount.is_zero(),
            payment_status,
            stripe_payment_id: None,
        })
    }

    /// Record the total paid so far. Anything still owed leaves the invoice
    /// partially paid. Paying more than the invoice amount is an error, as
    /// in [`Invoice::new`].
    pub fn record_payment(&mut self, amount_paid: Decimal) -> Result<(), PipetteError> {
        if amount_paid < Decimal::ZERO {
            return Err(PipetteError::Invoice(format!(
                "payment must not be negative (got {amount_paid})"
            )));
        }
        if amount_paid > self.amount {
            return Err(PipetteError::Invoice(format!(
                "payment {amount_paid} exceeds invoice amount {}",
                self.amount
            )));
        }

        let remaining = self.amount - amount_paid;
        self.paying_amount = amount_paid;
        self.due_amount = remaining;
        self.is_full_payment = remaining.is_zero();
        self.payment_status = if remaining > Decimal::ZERO {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Completed
        };
        info!(user = %self.user_id, paid = %amount_paid, due = %remaining, status = %self.payment_status, "payment recorded");
        Ok(())
    }

    /// Mark an ordered test as done. Once every test is done the invoice is
    /// completed.
    pub fn complete_test(&mut self, template_id: &str) -> Result<(), PipetteError> {
        let line = self
            .test_templates
            .iter_mut()
            .find(|l| l.template_id == template_id)
            .ok_or_else(|| PipetteError::InvoiceLineNotFound(template_id.to_string()))?;
        line.completed = true;

        if self.all_tests_completed() {
            self.payment_status = PaymentStatus::Completed;
        }
        Ok(())
    }

    pub fn all_tests_completed(&self) -> bool {
        self.test_templates.iter().all(|l| l.completed)
    }

    /// The payment gateway confirmed the charge.
    pub fn mark_gateway_success(&mut self, payment_id: &str) {
        self.stripe_payment_id = Some(payment_id.to_string());
        self.paying_amount = self.amount;
        self.due_amount = Decimal::ZERO;
        self.is_full_payment = true;
        self.payment_status = PaymentStatus::Completed;
    }

    /// The payment gateway rejected the charge.
    pub fn mark_gateway_failure(&mut self) {
        self.payment_status = PaymentStatus::Failed;
    }
}

/// Total price of a set of templates.
pub fn invoice_total<'a>(templates: impl IntoIterator<Item = &'a TestTemplate>) -> Decimal {
    templates.into_iter().map(|t| t.price).sum()
}
