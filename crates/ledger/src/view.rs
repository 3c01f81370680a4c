//! Ledger view.
//!
//! Every figure here is recomputed from the live records on each read;
//! nothing is cached on the invoice. An invoice's position is
//! `gross - deductions = net`, `net - paid = balance`, where deductions
//! are the `Deducted` lines of validated credit notes and paid is the sum
//! of recorded payments. Settlement tolerates rounding dust: an invoice
//! within half a unit of its net counts as paid.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use officine_core::money::{self, PAID_TOLERANCE};
use officine_core::{DomainResult, InvoiceId, PaymentId, SupplierId};

use crate::credit::{CreditStatus, Resolution};
use crate::payment::PaymentMode;
use crate::store::{AccountsState, SupplierAccounts};

/// How settled an invoice is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Unpaid,
    Partial,
    Paid,
}

impl SettlementStatus {
    /// Every status, in reporting order.
    pub const ALL: [SettlementStatus; 3] = [
        SettlementStatus::Unpaid,
        SettlementStatus::Partial,
        SettlementStatus::Paid,
    ];
}

impl core::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            SettlementStatus::Unpaid => "unpaid",
            SettlementStatus::Partial => "partial",
            SettlementStatus::Paid => "paid",
        })
    }
}

/// Classify a paid amount against a net. Nothing paid is `Unpaid`; paid
/// to within [`PAID_TOLERANCE`] of the net is `Paid`; anything between is
/// `Partial`.
pub fn settlement_status(net: i64, paid: i64) -> SettlementStatus {
    if paid == 0 {
        SettlementStatus::Unpaid
    } else if paid >= net - PAID_TOLERANCE {
        SettlementStatus::Paid
    } else {
        SettlementStatus::Partial
    }
}

/// One invoice's recomputed position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLedger {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub date: NaiveDate,
    /// Sum of delivery line totals, minor units.
    pub gross: i64,
    /// Deducted credit value, minor units.
    pub deductions: i64,
    /// `gross - deductions`, minor units.
    pub net: i64,
    /// Sum of payments, minor units.
    pub paid: i64,
    /// `net - paid`, minor units.
    pub balance: i64,
    pub payment_count: usize,
    pub status: SettlementStatus,
}

/// Row selection for ledger listings. Date bounds are inclusive and apply
/// to the invoice date, except in [`SupplierAccounts::payment_history`]
/// where they apply to the payment date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub supplier: Option<SupplierId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl LedgerFilter {
    fn covers(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

/// Column sums over a set of ledger rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub invoice_count: usize,
    pub gross: i64,
    pub deductions: i64,
    pub net: i64,
    pub paid: i64,
    pub balance: i64,
}

/// Rows of one settlement status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub status: SettlementStatus,
    pub invoice_count: usize,
    pub balance: i64,
}

/// What one supplier is still owed, summed over its open invoices.
/// Settled paper stays out of the sums and the count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierBalance {
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub invoice_count: usize,
    pub net: i64,
    pub paid: i64,
    pub balance: i64,
}

/// Totals, by-status breakdown, and ranked supplier debts for a filtered
/// slice of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsAggregate {
    pub totals: LedgerTotals,
    /// Non-empty statuses in `Unpaid`, `Partial`, `Paid` order.
    pub by_status: Vec<StatusBreakdown>,
    /// Suppliers still owed something, largest balance first.
    pub by_supplier: Vec<SupplierBalance>,
}

/// One payment in a history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub number: String,
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub amount: i64,
    pub mode: PaymentMode,
    pub reference: Option<String>,
    pub date: NaiveDate,
}

/// Recompute one invoice's position from the records as they stand.
pub(crate) fn compute_invoice_ledger(
    state: &AccountsState,
    invoice_id: InvoiceId,
) -> DomainResult<InvoiceLedger> {
    let invoice = state.invoice(invoice_id)?;
    let supplier = state.suppliers.supplier(invoice.supplier_id)?;

    let mut deductions = 0_i64;
    for credit in state.credit_notes.values() {
        if credit.invoice_id != invoice_id || credit.status != CreditStatus::Validated {
            continue;
        }
        for line in &credit.lines {
            if line.resolution == Some(Resolution::Deducted) {
                deductions = money::add_amounts(deductions, line.total)?;
            }
        }
    }

    let payments = state.payments_of_invoice(invoice_id);
    let mut paid = 0_i64;
    for payment in &payments {
        paid = money::add_amounts(paid, payment.amount)?;
    }

    let net = money::sub_amounts(invoice.gross, deductions)?;
    let balance = money::sub_amounts(net, paid)?;
    Ok(InvoiceLedger {
        invoice_id,
        number: invoice.number.clone(),
        supplier_id: invoice.supplier_id,
        supplier_name: supplier.name.clone(),
        date: invoice.date,
        gross: invoice.gross,
        deductions,
        net,
        paid,
        balance,
        payment_count: payments.len(),
        status: settlement_status(net, paid),
    })
}

impl SupplierAccounts {
    /// One invoice's position.
    pub fn invoice_ledger(&self, invoice_id: InvoiceId) -> DomainResult<InvoiceLedger> {
        compute_invoice_ledger(self.state(), invoice_id)
    }

    /// Positions of the invoices the filter selects, most recent invoice
    /// date first.
    pub fn invoice_ledgers(&self, filter: &LedgerFilter) -> DomainResult<Vec<InvoiceLedger>> {
        let state = self.state();
        if let Some(supplier_id) = filter.supplier {
            state.suppliers.supplier(supplier_id)?;
        }
        let mut rows = Vec::new();
        for invoice in state.invoices.values() {
            if let Some(supplier_id) = filter.supplier {
                if invoice.supplier_id != supplier_id {
                    continue;
                }
            }
            if !filter.covers(invoice.date) {
                continue;
            }
            rows.push(compute_invoice_ledger(state, invoice.id)?);
        }
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.invoice_id.cmp(&a.invoice_id)));
        Ok(rows)
    }

    /// Totals, status breakdown, and ranked supplier debts over the
    /// filtered ledger.
    pub fn aggregate(&self, filter: &LedgerFilter) -> DomainResult<AccountsAggregate> {
        let rows = self.invoice_ledgers(filter)?;

        let mut totals = LedgerTotals::default();
        for row in &rows {
            totals.invoice_count += 1;
            totals.gross = money::add_amounts(totals.gross, row.gross)?;
            totals.deductions = money::add_amounts(totals.deductions, row.deductions)?;
            totals.net = money::add_amounts(totals.net, row.net)?;
            totals.paid = money::add_amounts(totals.paid, row.paid)?;
            totals.balance = money::add_amounts(totals.balance, row.balance)?;
        }

        let mut by_status = Vec::new();
        for status in SettlementStatus::ALL {
            let mut invoice_count = 0_usize;
            let mut balance = 0_i64;
            for row in rows.iter().filter(|row| row.status == status) {
                invoice_count += 1;
                balance = money::add_amounts(balance, row.balance)?;
            }
            if invoice_count > 0 {
                by_status.push(StatusBreakdown {
                    status,
                    invoice_count,
                    balance,
                });
            }
        }

        let mut debts: BTreeMap<SupplierId, SupplierBalance> = BTreeMap::new();
        for row in rows.iter().filter(|row| row.balance > 0) {
            let entry = debts.entry(row.supplier_id).or_insert_with(|| SupplierBalance {
                supplier_id: row.supplier_id,
                supplier_name: row.supplier_name.clone(),
                invoice_count: 0,
                net: 0,
                paid: 0,
                balance: 0,
            });
            entry.invoice_count += 1;
            entry.net = money::add_amounts(entry.net, row.net)?;
            entry.paid = money::add_amounts(entry.paid, row.paid)?;
            entry.balance = money::add_amounts(entry.balance, row.balance)?;
        }
        let mut by_supplier: Vec<SupplierBalance> = debts.into_values().collect();
        by_supplier.sort_by(|a, b| {
            b.balance
                .cmp(&a.balance)
                .then(a.supplier_id.cmp(&b.supplier_id))
        });

        Ok(AccountsAggregate {
            totals,
            by_status,
            by_supplier,
        })
    }

    /// Payments the filter selects, most recent payment date first. Date
    /// bounds apply to the payment date, not the invoice date.
    pub fn payment_history(&self, filter: &LedgerFilter) -> DomainResult<Vec<PaymentRecord>> {
        let state = self.state();
        if let Some(supplier_id) = filter.supplier {
            state.suppliers.supplier(supplier_id)?;
        }
        let mut rows = Vec::new();
        for payment in state.payments.values() {
            let invoice = state.invoice(payment.invoice_id)?;
            if let Some(supplier_id) = filter.supplier {
                if invoice.supplier_id != supplier_id {
                    continue;
                }
            }
            if !filter.covers(payment.date) {
                continue;
            }
            let supplier = state.suppliers.supplier(invoice.supplier_id)?;
            rows.push(PaymentRecord {
                payment_id: payment.id,
                number: payment.number.clone(),
                invoice_id: invoice.id,
                invoice_number: invoice.number.clone(),
                supplier_id: invoice.supplier_id,
                supplier_name: supplier.name.clone(),
                amount: payment.amount,
                mode: payment.mode,
                reference: payment.reference.clone(),
                date: payment.date,
            });
        }
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.payment_id.cmp(&a.payment_id)));
        Ok(rows)
    }
}
