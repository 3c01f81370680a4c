//! Return note engine.
//!
//! A return note sends part of a delivery back to the supplier. Lines are
//! drafted against an invoice located by number fragment, bounded by the
//! quantity still available to return (delivered minus what earlier notes
//! already claimed, per article), and each line takes its unit cost from
//! the delivery line it gives back. Stock drops when goods leave and is
//! restored when lines or whole notes are removed.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use officine_core::money;
use officine_core::{
    ArticleId, DomainError, DomainResult, InvoiceId, ReturnLineId, ReturnNoteId, SupplierId,
};

use crate::store::SupplierAccounts;

/// Why goods go back to the supplier. A closed set; every stored line
/// carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnReason {
    Expired,
    Broken,
    Damaged,
    InvoicedNotDelivered,
    GoodCondition,
    DeliveredNotInvoiced,
}

impl ReturnReason {
    /// Every reason, in drafting-surface order.
    pub const ALL: [ReturnReason; 6] = [
        ReturnReason::Expired,
        ReturnReason::Broken,
        ReturnReason::Damaged,
        ReturnReason::InvoicedNotDelivered,
        ReturnReason::GoodCondition,
        ReturnReason::DeliveredNotInvoiced,
    ];
}

impl core::fmt::Display for ReturnReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ReturnReason::Expired => "expired",
            ReturnReason::Broken => "broken",
            ReturnReason::Damaged => "damaged",
            ReturnReason::InvoicedNotDelivered => "invoiced not delivered",
            ReturnReason::GoodCondition => "good condition",
            ReturnReason::DeliveredNotInvoiced => "delivered not invoiced",
        })
    }
}

/// Header of a return note. The number is the invoice number with an `-R`
/// suffix: a document label, not a key, so several notes on one invoice
/// share it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnNote {
    pub id: ReturnNoteId,
    pub invoice_id: InvoiceId,
    pub number: String,
    pub date: NaiveDate,
    /// Sum of line totals, minor units.
    pub total: i64,
}

/// One returned article on a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub id: ReturnLineId,
    pub return_id: ReturnNoteId,
    pub article_id: ArticleId,
    pub qty: i64,
    /// Unit cost frozen from the invoice's delivery line, minor units.
    pub unit_cost: i64,
    pub reason: ReturnReason,
    /// `qty * unit_cost`, minor units.
    pub total: i64,
}

/// One drafted row for [`SupplierAccounts::create_return_note`]. Rows with
/// `qty == 0` are skipped, so a drafting surface can submit one row per
/// delivery line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLineInput {
    pub article_id: ArticleId,
    pub qty: i64,
    pub reason: ReturnReason,
}

/// An invoice located for drafting a return, with per-article availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedDelivery {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub date: NaiveDate,
    pub gross: i64,
    pub lines: Vec<ReturnableLine>,
}

/// One distinct article of a located invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnableLine {
    pub article_id: ArticleId,
    pub designation: String,
    /// Quantity delivered on the invoice, across its lines.
    pub delivered_qty: i64,
    /// Quantity already claimed by the invoice's return notes.
    pub already_returned: i64,
    /// `delivered - already returned`, floored at zero.
    pub available_qty: i64,
    /// Unit cost of the first delivery line carrying the article.
    pub unit_cost: i64,
}

pub(crate) fn return_number(invoice_number: &str) -> String {
    format!("{invoice_number}-R")
}

impl SupplierAccounts {
    /// Find the first live invoice whose number contains the fragment,
    /// case-insensitively, annotated with what is still available to return.
    pub fn locate_delivery(&self, fragment: &str) -> DomainResult<LocatedDelivery> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Err(DomainError::validation("search fragment cannot be empty"));
        }
        let needle = fragment.to_lowercase();
        let state = self.state();
        let invoice = state
            .invoices
            .values()
            .find(|invoice| invoice.number.to_lowercase().contains(&needle))
            .ok_or_else(|| {
                DomainError::not_found(format!("no invoice number matches \"{fragment}\""))
            })?;

        // one row per distinct article, in first-appearance order
        let mut lines: Vec<ReturnableLine> = Vec::new();
        for line in state.lines_of_invoice(invoice.id) {
            if lines.iter().any(|row| row.article_id == line.article_id) {
                continue;
            }
            let delivered = state.delivered_qty(invoice.id, line.article_id);
            let already = state.returned_qty(invoice.id, line.article_id);
            let article = state.articles.article(line.article_id)?;
            lines.push(ReturnableLine {
                article_id: line.article_id,
                designation: article.designation.clone(),
                delivered_qty: delivered,
                already_returned: already,
                available_qty: (delivered - already).max(0),
                unit_cost: line.unit_cost,
            });
        }
        let supplier = state.suppliers.supplier(invoice.supplier_id)?;
        Ok(LocatedDelivery {
            invoice_id: invoice.id,
            number: invoice.number.clone(),
            supplier_id: invoice.supplier_id,
            supplier_name: supplier.name.clone(),
            date: invoice.date,
            gross: invoice.gross,
            lines,
        })
    }

    /// Record a return against an invoice. Rows with zero quantity are
    /// skipped; every retained row is bounded by the quantity still
    /// available for its article, counted across the invoice's other
    /// return notes and the rest of the batch.
    pub fn create_return_note(
        &mut self,
        invoice_id: InvoiceId,
        date: NaiveDate,
        lines: Vec<ReturnLineInput>,
    ) -> DomainResult<ReturnNoteId> {
        if lines.iter().any(|input| input.qty < 0) {
            return Err(DomainError::validation("return quantity cannot be negative"));
        }
        let retained: Vec<ReturnLineInput> =
            lines.into_iter().filter(|input| input.qty > 0).collect();
        if retained.is_empty() {
            return Err(DomainError::validation(
                "return note needs at least one line with a positive quantity",
            ));
        }
        let id = self.transaction(|state| {
            let invoice = state.invoice(invoice_id)?.clone();

            let mut claimed: BTreeMap<ArticleId, i64> = BTreeMap::new();
            for input in &retained {
                let delivered = state.delivered_qty(invoice_id, input.article_id);
                if delivered == 0 {
                    return Err(DomainError::not_found(format!(
                        "article {} is not on invoice {}",
                        input.article_id, invoice.number
                    )));
                }
                let already = state.returned_qty(invoice_id, input.article_id);
                let pending = claimed.entry(input.article_id).or_insert(0);
                let available = delivered - already - *pending;
                if input.qty > available {
                    return Err(DomainError::validation(format!(
                        "return quantity {} exceeds the {} available for article {}",
                        input.qty,
                        available.max(0),
                        input.article_id
                    )));
                }
                *pending += input.qty;
            }

            let id = state.sequences.next_return_note();
            let number = return_number(&invoice.number);
            let mut total = 0_i64;
            for input in &retained {
                let unit_cost = state
                    .first_delivery_line(invoice_id, input.article_id)
                    .map(|line| line.unit_cost)
                    .ok_or_else(|| {
                        DomainError::not_found(format!(
                            "article {} is not on invoice {}",
                            input.article_id, invoice.number
                        ))
                    })?;
                let line_total = money::line_total(input.qty, unit_cost)?;
                state.stock.adjust(input.article_id, -input.qty)?;
                let line_id = state.sequences.next_return_line();
                state.return_lines.insert(
                    line_id,
                    ReturnLine {
                        id: line_id,
                        return_id: id,
                        article_id: input.article_id,
                        qty: input.qty,
                        unit_cost,
                        reason: input.reason,
                        total: line_total,
                    },
                );
                total = money::add_amounts(total, line_total)?;
            }
            state.return_notes.insert(
                id,
                ReturnNote {
                    id,
                    invoice_id,
                    number,
                    date,
                    total,
                },
            );
            Ok(id)
        })?;
        info!(return_id = %id, invoice_id = %invoice_id, "return note created");
        Ok(id)
    }

    /// Change a line's quantity and reason. Stock moves by the signed
    /// delta; the availability bound is recomputed without this line.
    pub fn edit_return_line(
        &mut self,
        line_id: ReturnLineId,
        qty: i64,
        reason: ReturnReason,
    ) -> DomainResult<()> {
        if qty <= 0 {
            return Err(DomainError::validation("return quantity must be positive"));
        }
        self.transaction(|state| {
            let line = state.return_line(line_id)?.clone();
            let note = state.return_note(line.return_id)?.clone();
            if state.credit_for_return(note.id).is_some() {
                return Err(DomainError::integrity(format!(
                    "return note {} has a credit note; its lines are sealed",
                    note.number
                )));
            }
            let delivered = state.delivered_qty(note.invoice_id, line.article_id);
            let returned_other =
                state.returned_qty(note.invoice_id, line.article_id) - line.qty;
            let available = delivered - returned_other;
            if qty > available {
                return Err(DomainError::validation(format!(
                    "return quantity {qty} exceeds the {} available for article {}",
                    available.max(0),
                    line.article_id
                )));
            }
            let delta = qty - line.qty;
            if delta != 0 {
                state.stock.adjust(line.article_id, -delta)?;
            }
            let new_total = money::line_total(qty, line.unit_cost)?;
            {
                let note = state.return_note_mut(line.return_id)?;
                let remainder = money::sub_amounts(note.total, line.total)?;
                note.total = money::add_amounts(remainder, new_total)?;
            }
            let stored = state
                .return_lines
                .get_mut(&line_id)
                .ok_or_else(|| DomainError::not_found(format!("return line {line_id}")))?;
            stored.qty = qty;
            stored.reason = reason;
            stored.total = new_total;
            Ok(())
        })?;
        debug!(line_id = %line_id, qty, "return line edited");
        Ok(())
    }

    /// Drop one line, putting its quantity back on the shelf. The note may
    /// be left with no lines.
    pub fn remove_return_line(&mut self, line_id: ReturnLineId) -> DomainResult<()> {
        self.transaction(|state| {
            let line = state.return_line(line_id)?.clone();
            let note = state.return_note(line.return_id)?.clone();
            if state.credit_for_return(note.id).is_some() {
                return Err(DomainError::integrity(format!(
                    "return note {} has a credit note; its lines are sealed",
                    note.number
                )));
            }
            state.stock.adjust(line.article_id, line.qty)?;
            {
                let note = state.return_note_mut(line.return_id)?;
                note.total = money::sub_amounts(note.total, line.total)?;
            }
            state.return_lines.remove(&line_id);
            Ok(())
        })?;
        debug!(line_id = %line_id, "return line removed");
        Ok(())
    }

    /// Delete a whole note, restoring the stock of every line. Refused
    /// while a credit note references it.
    pub fn delete_return_note(&mut self, return_id: ReturnNoteId) -> DomainResult<()> {
        self.transaction(|state| {
            let note = state.return_note(return_id)?.clone();
            if state.credit_for_return(return_id).is_some() {
                return Err(DomainError::conflict(format!(
                    "return note {} has a credit note; delete it first",
                    note.number
                )));
            }
            let lines: Vec<ReturnLine> =
                state.lines_of_return(return_id).into_iter().cloned().collect();
            for line in &lines {
                state.stock.adjust(line.article_id, line.qty)?;
                state.return_lines.remove(&line.id);
            }
            state.return_notes.remove(&return_id);
            Ok(())
        })?;
        info!(return_id = %return_id, "return note deleted");
        Ok(())
    }

    pub fn return_note(&self, id: ReturnNoteId) -> DomainResult<&ReturnNote> {
        self.state().return_note(id)
    }

    /// Lines of one note, in line-id order.
    pub fn return_lines(&self, return_id: ReturnNoteId) -> DomainResult<Vec<&ReturnLine>> {
        self.state().return_note(return_id)?;
        Ok(self.state().lines_of_return(return_id))
    }

    pub fn return_notes_of_invoice(&self, invoice_id: InvoiceId) -> DomainResult<Vec<&ReturnNote>> {
        self.state().invoice(invoice_id)?;
        Ok(self.state().return_notes_of_invoice(invoice_id))
    }
}
