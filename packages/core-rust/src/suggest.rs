//! Update batches derived from a customer's payment schedule.
//!
//! The case screen offers one-click fills such as "apply next pending
//! installment" or "apply full outstanding amount". Each produces an
//! [`UpdateBatch`] for the merge channel; an empty batch means there is
//! nothing to suggest.

use serde::{Deserialize, Serialize};

use crate::merge::UpdateBatch;
use crate::types::FieldValue;

/// Payment state of one installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallmentStatus {
    #[serde(alias = "PENDIENTE")]
    Pending,
    #[serde(alias = "PAGADO", alias = "PAGADA")]
    Paid,
    #[serde(alias = "VENCIDO", alias = "VENCIDA")]
    Overdue,
    #[serde(alias = "ANULADO", alias = "ANULADA")]
    Cancelled,
}

impl InstallmentStatus {
    /// Whether the installment still has to be paid.
    #[must_use]
    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::Pending | Self::Overdue)
    }
}

/// One installment of a payment schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installment {
    pub installment_number: u32,
    pub amount: f64,
    /// ISO-8601 due date.
    pub due_date: String,
    pub status: InstallmentStatus,
}

/// Active payment schedule of a customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentPlan {
    pub installments: Vec<Installment>,
}

impl InstallmentPlan {
    #[must_use]
    pub fn new(installments: Vec<Installment>) -> Self {
        Self { installments }
    }

    /// Lowest-numbered installment that is still outstanding.
    #[must_use]
    pub fn next_pending(&self) -> Option<&Installment> {
        self.installments
            .iter()
            .filter(|i| i.status.is_outstanding())
            .min_by_key(|i| i.installment_number)
    }

    /// Sum of all outstanding installment amounts, rounded to cents.
    #[must_use]
    pub fn outstanding(&self) -> f64 {
        let total: f64 = self
            .installments
            .iter()
            .filter(|i| i.status.is_outstanding())
            .map(|i| i.amount)
            .sum();
        round_cents(total)
    }

    /// Suggests the next pending installment's amount for `field_id`.
    #[must_use]
    pub fn next_pending_amount(&self, field_id: &str) -> UpdateBatch {
        match self.next_pending() {
            Some(installment) => {
                UpdateBatch::new().with(field_id, FieldValue::Number(installment.amount))
            }
            None => UpdateBatch::new(),
        }
    }

    /// Suggests the full outstanding amount for `field_id`.
    #[must_use]
    pub fn outstanding_amount(&self, field_id: &str) -> UpdateBatch {
        let total = self.outstanding();
        if total > 0.0 {
            UpdateBatch::new().with(field_id, FieldValue::Number(total))
        } else {
            UpdateBatch::new()
        }
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
