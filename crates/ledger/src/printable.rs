//! Print assemblies.
//!
//! Flat, render-ready views of the documents the back office prints:
//! delivery invoices with stock and margin columns, return and credit
//! notes, payment receipts, supplier statements, and per-invoice
//! settlement and situation sheets. Assembled on demand from the live
//! records; amounts stay in minor units and rendering is the caller's
//! business.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use officine_core::money;
use officine_core::{CreditNoteId, DomainResult, InvoiceId, PaymentId, ReturnNoteId};

use crate::credit::{CreditStatus, Resolution};
use crate::payment::PaymentMode;
use crate::returns::ReturnReason;
use crate::store::SupplierAccounts;
use crate::view::{self, InvoiceLedger, LedgerFilter, LedgerTotals, StatusBreakdown};

/// `part / whole` in basis points, truncated toward zero.
fn ratio_bp(part: i64, whole: i64) -> i64 {
    if whole == 0 {
        return 0;
    }
    let wide = i128::from(part) * 10_000 / i128::from(whole);
    wide.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// One delivery line with its stock and margin columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintableInvoiceLine {
    pub designation: String,
    pub qty: i64,
    pub unit_cost: i64,
    pub unit_price: i64,
    pub vat_rate_bp: u32,
    pub expiry: Option<NaiveDate>,
    /// On-hand quantity the line found, from the current level.
    pub stock_before: i64,
    pub stock_after: i64,
    /// `qty * unit_cost`, minor units.
    pub purchase_total: i64,
    /// `qty * unit_price`, minor units.
    pub sale_total: i64,
    pub margin: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintableInvoiceTotals {
    /// VAT-inclusive purchase value, minor units.
    pub gross: i64,
    pub excl_vat: i64,
    pub vat: i64,
    /// Shelf value at sale prices, minor units.
    pub sale_value: i64,
    pub margin: i64,
    pub margin_rate_bp: i64,
    /// Units delivered, all lines together.
    pub total_qty: i64,
    pub line_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintableInvoice {
    pub number: String,
    pub supplier_name: String,
    pub date: NaiveDate,
    pub lines: Vec<PrintableInvoiceLine>,
    pub totals: PrintableInvoiceTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintableReturnLine {
    pub designation: String,
    pub qty: i64,
    pub unit_cost: i64,
    pub reason: ReturnReason,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintableReturnNote {
    pub number: String,
    pub invoice_number: String,
    pub supplier_name: String,
    pub date: NaiveDate,
    pub lines: Vec<PrintableReturnLine>,
    pub total: i64,
    /// Units going back, all lines together.
    pub total_qty: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintableCreditLine {
    pub designation: String,
    pub qty: i64,
    pub unit_price: i64,
    pub resolution: Option<Resolution>,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintableCreditNote {
    pub number: String,
    pub invoice_number: String,
    pub supplier_name: String,
    pub date: NaiveDate,
    pub status: CreditStatus,
    pub observation: Option<String>,
    pub lines: Vec<PrintableCreditLine>,
    pub total: i64,
}

/// Receipt for one payment, with the balance left after it as of now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintableReceipt {
    pub number: String,
    pub invoice_number: String,
    pub supplier_name: String,
    pub date: NaiveDate,
    pub amount: i64,
    pub mode: PaymentMode,
    pub reference: Option<String>,
    pub observation: Option<String>,
    pub balance_remaining: i64,
}

/// One payment in a settlement or situation sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRow {
    pub number: String,
    pub sequence: u32,
    pub amount: i64,
    pub mode: PaymentMode,
    pub reference: Option<String>,
    pub date: NaiveDate,
}

/// Settlement sheet of one invoice: its payments, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintableSettlement {
    pub invoice_number: String,
    pub supplier_name: String,
    pub date: NaiveDate,
    pub net: i64,
    pub payments: Vec<PaymentRow>,
    pub total_paid: i64,
    pub balance: i64,
}

/// One deducted credit line in a situation sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionRow {
    pub credit_number: String,
    pub credit_date: NaiveDate,
    pub designation: String,
    pub qty: i64,
    pub unit_price: i64,
    pub total: i64,
}

/// Full situation of one invoice: its position, what was deducted, what
/// was paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintableSituation {
    pub ledger: InvoiceLedger,
    pub deductions: Vec<DeductionRow>,
    pub payments: Vec<PaymentRow>,
}

/// Supplier statement over a filtered slice of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintableStatement {
    pub supplier_name: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub rows: Vec<InvoiceLedger>,
    pub totals: LedgerTotals,
    pub by_status: Vec<StatusBreakdown>,
}

impl SupplierAccounts {
    /// Assemble a delivery invoice for printing.
    pub fn print_invoice(&self, invoice_id: InvoiceId) -> DomainResult<PrintableInvoice> {
        let state = self.state();
        let invoice = state.invoice(invoice_id)?;
        let supplier = state.suppliers.supplier(invoice.supplier_id)?;

        let mut lines = Vec::new();
        let mut excl = 0_i64;
        let mut sale_value = 0_i64;
        let mut total_qty = 0_i64;
        for line in state.lines_of_invoice(invoice_id) {
            let article = state.articles.article(line.article_id)?;
            let on_hand = state.stock.quantity(line.article_id)?;
            let sale_total = money::line_total(line.qty, line.unit_price)?;
            let margin = money::sub_amounts(sale_total, line.total)?;
            excl = money::add_amounts(excl, money::excl_vat(line.total, line.vat_rate_bp))?;
            sale_value = money::add_amounts(sale_value, sale_total)?;
            total_qty += line.qty;
            lines.push(PrintableInvoiceLine {
                designation: article.designation.clone(),
                qty: line.qty,
                unit_cost: line.unit_cost,
                unit_price: line.unit_price,
                vat_rate_bp: line.vat_rate_bp,
                expiry: line.expiry,
                stock_before: on_hand - line.qty,
                stock_after: on_hand,
                purchase_total: line.total,
                sale_total,
                margin,
            });
        }
        let vat = money::sub_amounts(invoice.gross, excl)?;
        let margin = money::sub_amounts(sale_value, invoice.gross)?;
        let line_count = lines.len();
        Ok(PrintableInvoice {
            number: invoice.number.clone(),
            supplier_name: supplier.name.clone(),
            date: invoice.date,
            lines,
            totals: PrintableInvoiceTotals {
                gross: invoice.gross,
                excl_vat: excl,
                vat,
                sale_value,
                margin,
                margin_rate_bp: ratio_bp(margin, invoice.gross),
                total_qty,
                line_count,
            },
        })
    }

    /// Assemble a return note for printing.
    pub fn print_return_note(&self, return_id: ReturnNoteId) -> DomainResult<PrintableReturnNote> {
        let state = self.state();
        let note = state.return_note(return_id)?;
        let invoice = state.invoice(note.invoice_id)?;
        let supplier = state.suppliers.supplier(invoice.supplier_id)?;

        let mut lines = Vec::new();
        let mut total_qty = 0_i64;
        for line in state.lines_of_return(return_id) {
            let article = state.articles.article(line.article_id)?;
            total_qty += line.qty;
            lines.push(PrintableReturnLine {
                designation: article.designation.clone(),
                qty: line.qty,
                unit_cost: line.unit_cost,
                reason: line.reason,
                total: line.total,
            });
        }
        Ok(PrintableReturnNote {
            number: note.number.clone(),
            invoice_number: invoice.number.clone(),
            supplier_name: supplier.name.clone(),
            date: note.date,
            lines,
            total: note.total,
            total_qty,
        })
    }

    /// Assemble a credit note for printing. Draft notes print with their
    /// unresolved lines.
    pub fn print_credit_note(&self, credit_id: CreditNoteId) -> DomainResult<PrintableCreditNote> {
        let state = self.state();
        let credit = state.credit_note(credit_id)?;
        let invoice = state.invoice(credit.invoice_id)?;
        let supplier = state.suppliers.supplier(invoice.supplier_id)?;

        let mut lines = Vec::new();
        for line in &credit.lines {
            let article = state.articles.article(line.article_id)?;
            lines.push(PrintableCreditLine {
                designation: article.designation.clone(),
                qty: line.qty,
                unit_price: line.unit_price,
                resolution: line.resolution,
                total: line.total,
            });
        }
        Ok(PrintableCreditNote {
            number: credit.number.clone(),
            invoice_number: invoice.number.clone(),
            supplier_name: supplier.name.clone(),
            date: credit.date,
            status: credit.status,
            observation: credit.observation.clone(),
            lines,
            total: credit.total,
        })
    }

    /// Assemble a payment receipt, with the invoice's balance as of now.
    pub fn print_receipt(&self, payment_id: PaymentId) -> DomainResult<PrintableReceipt> {
        let state = self.state();
        let payment = state.payment(payment_id)?;
        let invoice = state.invoice(payment.invoice_id)?;
        let supplier = state.suppliers.supplier(invoice.supplier_id)?;
        let ledger = view::compute_invoice_ledger(state, payment.invoice_id)?;
        Ok(PrintableReceipt {
            number: payment.number.clone(),
            invoice_number: invoice.number.clone(),
            supplier_name: supplier.name.clone(),
            date: payment.date,
            amount: payment.amount,
            mode: payment.mode,
            reference: payment.reference.clone(),
            observation: payment.observation.clone(),
            balance_remaining: ledger.balance,
        })
    }

    /// Assemble an invoice's settlement sheet.
    pub fn print_settlement(&self, invoice_id: InvoiceId) -> DomainResult<PrintableSettlement> {
        let state = self.state();
        let ledger = view::compute_invoice_ledger(state, invoice_id)?;
        let payments = state
            .payments_of_invoice(invoice_id)
            .into_iter()
            .map(|payment| PaymentRow {
                number: payment.number.clone(),
                sequence: payment.sequence,
                amount: payment.amount,
                mode: payment.mode,
                reference: payment.reference.clone(),
                date: payment.date,
            })
            .collect();
        Ok(PrintableSettlement {
            invoice_number: ledger.number,
            supplier_name: ledger.supplier_name,
            date: ledger.date,
            net: ledger.net,
            payments,
            total_paid: ledger.paid,
            balance: ledger.balance,
        })
    }

    /// Assemble an invoice's full situation: position, deducted credit
    /// lines, payments.
    pub fn print_situation(&self, invoice_id: InvoiceId) -> DomainResult<PrintableSituation> {
        let state = self.state();
        let ledger = view::compute_invoice_ledger(state, invoice_id)?;

        let mut deductions = Vec::new();
        for credit in state.credit_notes.values() {
            if credit.invoice_id != invoice_id || credit.status != CreditStatus::Validated {
                continue;
            }
            for line in &credit.lines {
                if line.resolution != Some(Resolution::Deducted) {
                    continue;
                }
                let article = state.articles.article(line.article_id)?;
                deductions.push(DeductionRow {
                    credit_number: credit.number.clone(),
                    credit_date: credit.date,
                    designation: article.designation.clone(),
                    qty: line.qty,
                    unit_price: line.unit_price,
                    total: line.total,
                });
            }
        }
        let payments = state
            .payments_of_invoice(invoice_id)
            .into_iter()
            .map(|payment| PaymentRow {
                number: payment.number.clone(),
                sequence: payment.sequence,
                amount: payment.amount,
                mode: payment.mode,
                reference: payment.reference.clone(),
                date: payment.date,
            })
            .collect();
        Ok(PrintableSituation {
            ledger,
            deductions,
            payments,
        })
    }

    /// Assemble a supplier statement over the filtered ledger.
    pub fn print_statement(&self, filter: &LedgerFilter) -> DomainResult<PrintableStatement> {
        let supplier_name = match filter.supplier {
            Some(supplier_id) => Some(self.state().suppliers.supplier(supplier_id)?.name.clone()),
            None => None,
        };
        let rows = self.invoice_ledgers(filter)?;
        let aggregate = self.aggregate(filter)?;
        Ok(PrintableStatement {
            supplier_name,
            from: filter.from,
            to: filter.to,
            rows,
            totals: aggregate.totals,
            by_status: aggregate.by_status,
        })
    }
}
