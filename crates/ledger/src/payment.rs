//! Payment ledger.
//!
//! Payments settle an invoice's open balance. The bound is the live
//! balance computed inside the same transaction that records the payment,
//! so the check and the write cannot be split by another mutation. A
//! payment carries a `PAY-{invoice}-{seq:03}` label derived from the
//! invoice's live payment count; labels are for documents, not lookup.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use officine_core::{DomainError, DomainResult, InvoiceId, PaymentId};

use crate::store::SupplierAccounts;
use crate::view;

/// How the money moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Cheque,
    BankTransfer,
    MobileMoney,
}

impl core::fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            PaymentMode::Cash => "cash",
            PaymentMode::Cheque => "cheque",
            PaymentMode::BankTransfer => "bank transfer",
            PaymentMode::MobileMoney => "mobile money",
        })
    }
}

/// One recorded payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub number: String,
    /// Position among the invoice's payments when recorded, starting at 1.
    pub sequence: u32,
    /// Amount paid, minor units.
    pub amount: i64,
    pub mode: PaymentMode,
    /// Cheque or transfer reference, when the mode has one.
    pub reference: Option<String>,
    pub observation: Option<String>,
    /// Value date of the payment.
    pub date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
}

/// Input for [`SupplierAccounts::record_payment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInput {
    pub amount: i64,
    pub mode: PaymentMode,
    pub reference: Option<String>,
    pub observation: Option<String>,
    pub date: NaiveDate,
}

pub(crate) fn payment_number(invoice_number: &str, sequence: u32) -> String {
    format!("PAY-{invoice_number}-{sequence:03}")
}

impl SupplierAccounts {
    /// Record a payment against an invoice, bounded by its open balance at
    /// the moment of recording.
    pub fn record_payment(
        &mut self,
        invoice_id: InvoiceId,
        input: PaymentInput,
    ) -> DomainResult<PaymentId> {
        if input.amount <= 0 {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        let amount = input.amount;
        let id = self.transaction(|state| {
            let invoice = state.invoice(invoice_id)?.clone();
            let ledger = view::compute_invoice_ledger(state, invoice_id)?;
            if input.amount > ledger.balance {
                return Err(DomainError::validation(format!(
                    "payment of {} exceeds the open balance of {} on invoice {}",
                    input.amount, ledger.balance, invoice.number
                )));
            }
            let sequence = state.payments_of_invoice(invoice_id).len() as u32 + 1;
            let id = state.sequences.next_payment();
            state.payments.insert(
                id,
                Payment {
                    id,
                    invoice_id,
                    number: payment_number(&invoice.number, sequence),
                    sequence,
                    amount: input.amount,
                    mode: input.mode,
                    reference: input.reference,
                    observation: input.observation,
                    date: input.date,
                    recorded_at: Utc::now(),
                },
            );
            Ok(id)
        })?;
        info!(payment_id = %id, invoice_id = %invoice_id, amount, "payment recorded");
        Ok(id)
    }

    /// Delete a payment, reopening that much of the invoice's balance.
    pub fn delete_payment(&mut self, payment_id: PaymentId) -> DomainResult<()> {
        self.transaction(|state| {
            state.payment(payment_id)?;
            state.payments.remove(&payment_id);
            Ok(())
        })?;
        info!(payment_id = %payment_id, "payment deleted");
        Ok(())
    }

    pub fn payment(&self, id: PaymentId) -> DomainResult<&Payment> {
        self.state().payment(id)
    }

    /// Payments of one invoice, oldest first.
    pub fn payments_of_invoice(&self, invoice_id: InvoiceId) -> DomainResult<Vec<&Payment>> {
        self.state().invoice(invoice_id)?;
        Ok(self.state().payments_of_invoice(invoice_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit::Resolution;
    use crate::delivery::NewDeliveryLine;
    use crate::returns::{ReturnLineInput, ReturnReason};
    use officine_core::ArticleId;

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    struct Fixture {
        accounts: SupplierAccounts,
        invoice: InvoiceId,
        article: ArticleId,
    }

    /// One invoice of 10 x 1000.00, gross 10,000.00.
    fn fixture() -> Fixture {
        let mut accounts = SupplierAccounts::new();
        let supplier = accounts.register_supplier("Laborex").unwrap();
        let article = accounts
            .register_article("Amoxicillin 1g", 100_000, 140_000, 0)
            .unwrap();
        let invoice = accounts
            .create_invoice(supplier, "BL-2024-001", test_date())
            .unwrap();
        accounts
            .add_line(
                invoice,
                NewDeliveryLine {
                    article_id: article,
                    qty: 10,
                    unit_cost: 100_000,
                    unit_price: 140_000,
                    vat_rate_bp: 0,
                    expiry: None,
                },
            )
            .unwrap();
        Fixture {
            accounts,
            invoice,
            article,
        }
    }

    fn cash(amount: i64) -> PaymentInput {
        PaymentInput {
            amount,
            mode: PaymentMode::Cash,
            reference: None,
            observation: None,
            date: test_date(),
        }
    }

    #[test]
    fn record_labels_payments_in_sequence() {
        let mut f = fixture();
        let first = f.accounts.record_payment(f.invoice, cash(40_000)).unwrap();
        let second = f
            .accounts
            .record_payment(
                f.invoice,
                PaymentInput {
                    amount: 25_000,
                    mode: PaymentMode::Cheque,
                    reference: Some("CHQ-5512".to_owned()),
                    observation: None,
                    date: test_date(),
                },
            )
            .unwrap();

        let payment = f.accounts.payment(first).unwrap();
        assert_eq!(payment.number, "PAY-BL-2024-001-001");
        assert_eq!(payment.sequence, 1);
        assert_eq!(payment.amount, 40_000);
        let payment = f.accounts.payment(second).unwrap();
        assert_eq!(payment.number, "PAY-BL-2024-001-002");
        assert_eq!(payment.reference.as_deref(), Some("CHQ-5512"));

        let history = f.accounts.payments_of_invoice(f.invoice).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, first);
    }

    #[test]
    fn record_rejects_non_positive_amounts() {
        let mut f = fixture();
        for amount in [0, -500] {
            match f.accounts.record_payment(f.invoice, cash(amount)).unwrap_err() {
                DomainError::Validation(msg) => assert!(msg.contains("positive")),
                _ => panic!("Expected Validation error for amount {amount}"),
            }
        }
    }

    #[test]
    fn record_rejects_unknown_invoices() {
        let mut f = fixture();
        match f
            .accounts
            .record_payment(InvoiceId::new(99), cash(1000))
            .unwrap_err()
        {
            DomainError::NotFound(_) => {}
            _ => panic!("Expected NotFound error for unknown invoice"),
        }
    }

    #[test]
    fn record_is_bounded_by_the_open_balance() {
        let mut f = fixture();
        f.accounts.record_payment(f.invoice, cash(600_000)).unwrap();
        // 400_000 left; paying it exactly is fine
        f.accounts.record_payment(f.invoice, cash(400_000)).unwrap();
        // and one more centime is not
        match f.accounts.record_payment(f.invoice, cash(1)).unwrap_err() {
            DomainError::Validation(msg) => assert!(msg.contains("exceeds the open balance")),
            _ => panic!("Expected Validation error past the balance"),
        }
        assert_eq!(f.accounts.payments_of_invoice(f.invoice).unwrap().len(), 2);
    }

    #[test]
    fn deductions_shrink_the_bound() {
        let mut f = fixture();
        let return_id = f
            .accounts
            .create_return_note(
                f.invoice,
                test_date(),
                vec![ReturnLineInput {
                    article_id: f.article,
                    qty: 2,
                    reason: ReturnReason::Expired,
                }],
            )
            .unwrap();
        let credit = f.accounts.create_credit_note(return_id, test_date()).unwrap();
        f.accounts.set_all_resolutions(credit, Resolution::Deducted).unwrap();
        f.accounts.validate_credit_note(credit, None).unwrap();

        // gross 1_000_000 minus 200_000 deducted leaves 800_000 payable
        match f.accounts.record_payment(f.invoice, cash(800_001)).unwrap_err() {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error past the deducted balance"),
        }
        f.accounts.record_payment(f.invoice, cash(800_000)).unwrap();
    }

    #[test]
    fn delete_reopens_the_balance() {
        let mut f = fixture();
        let id = f.accounts.record_payment(f.invoice, cash(1_000_000)).unwrap();
        match f.accounts.record_payment(f.invoice, cash(1)).unwrap_err() {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error on a settled invoice"),
        }

        f.accounts.delete_payment(id).unwrap();
        match f.accounts.payment(id).unwrap_err() {
            DomainError::NotFound(_) => {}
            _ => panic!("Expected NotFound error for deleted payment"),
        }
        f.accounts.record_payment(f.invoice, cash(1_000_000)).unwrap();
    }

    #[test]
    fn sequence_counts_live_payments_only() {
        let mut f = fixture();
        f.accounts.record_payment(f.invoice, cash(10_000)).unwrap();
        let second = f.accounts.record_payment(f.invoice, cash(10_000)).unwrap();
        f.accounts.record_payment(f.invoice, cash(10_000)).unwrap();
        f.accounts.delete_payment(second).unwrap();

        // labels come from the live count; a reused label is not an error
        let replacement = f.accounts.record_payment(f.invoice, cash(10_000)).unwrap();
        let payment = f.accounts.payment(replacement).unwrap();
        assert_eq!(payment.sequence, 3);
        assert_eq!(payment.number, "PAY-BL-2024-001-003");
    }
}
