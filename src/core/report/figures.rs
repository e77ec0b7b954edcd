//! Financial figures of a report.

use crate::models::{ExpenseRecord, InvoiceStatus, ResourceRequest, round_cents};

/// Who owes whom once invoiced spending is compared with the funds received.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BalanceOutcome {
    /// Invoiced spending exceeded the funds; the organisation pays the person back
    ReimburseToPerson(f64),
    /// Funds exceeded invoiced spending; the person returns the difference
    RefundToOrganisation(f64),
    /// Spending matched the funds exactly
    Settled,
}

impl BalanceOutcome {
    /// Row label used in both outputs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ReimburseToPerson(_) => "Reimbursement to person",
            Self::RefundToOrganisation(_) => "Refund to organisation",
            Self::Settled => "Balance",
        }
    }

    /// Absolute amount of the balance.
    #[must_use]
    pub const fn amount(&self) -> f64 {
        match self {
            Self::ReimburseToPerson(amount) | Self::RefundToOrganisation(amount) => *amount,
            Self::Settled => 0.0,
        }
    }
}

/// Totals shown in the summary block of every output.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFigures {
    /// Sum of records with a receipt
    pub sum_with_receipt: f64,
    /// Sum of records without a receipt
    pub sum_without_receipt: f64,
    /// `sum_with_receipt + sum_without_receipt`
    pub grand_total: f64,
    /// Requested total of the linked request
    pub received_amount: Option<f64>,
    /// Amount the organisation owes the person
    pub reimburse_to_person: f64,
    /// Amount the person owes the organisation
    pub refund_to_org: f64,
}

impl ReportFigures {
    /// Computes the figures for `records` against an optional linked request.
    ///
    /// At most one of `reimburse_to_person` and `refund_to_org` is positive.
    #[must_use]
    pub fn compute(records: &[ExpenseRecord], linked_request: Option<&ResourceRequest>) -> Self {
        let sum_for = |status: InvoiceStatus| {
            round_cents(
                records
                    .iter()
                    .filter(|record| record.invoice_status() == status)
                    .map(|record| record.amount)
                    .sum(),
            )
        };
        let sum_with_receipt = sum_for(InvoiceStatus::WithReceipt);
        let sum_without_receipt = sum_for(InvoiceStatus::WithoutReceipt);
        let received_amount = linked_request.map(|request| request.requested_total);

        let (reimburse_to_person, refund_to_org) = received_amount.map_or((0.0, 0.0), |received| {
            let delta = round_cents(sum_with_receipt - received);
            (delta.max(0.0), (-delta).max(0.0))
        });

        Self {
            sum_with_receipt,
            sum_without_receipt,
            grand_total: round_cents(sum_with_receipt + sum_without_receipt),
            received_amount,
            reimburse_to_person,
            refund_to_org,
        }
    }

    /// The balance against the linked request, if one was given.
    #[must_use]
    pub fn balance(&self) -> Option<BalanceOutcome> {
        self.received_amount?;
        Some(if self.reimburse_to_person > 0.0 {
            BalanceOutcome::ReimburseToPerson(self.reimburse_to_person)
        } else if self.refund_to_org > 0.0 {
            BalanceOutcome::RefundToOrganisation(self.refund_to_org)
        } else {
            BalanceOutcome::Settled
        })
    }
}
