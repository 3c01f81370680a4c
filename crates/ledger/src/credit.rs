//! Credit note engine.
//!
//! A credit note is the supplier's answer to a return note: one note per
//! return, drafted with a copy of the return's lines and no resolutions,
//! then validated once every line says what the supplier did about it.
//! Validation is the only transition; it replays `Replaced` lines into
//! stock, turns `Deducted` lines into invoice deductions (through the
//! ledger view), and leaves an audit trail of stock movements.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use officine_core::money;
use officine_core::{
    ArticleId, CreditNoteId, DomainError, DomainResult, InvoiceId, MovementId, ReturnNoteId,
};

use crate::store::SupplierAccounts;

/// What the supplier did about one returned line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Refused the claim. No goods, no money.
    Rejected,
    /// Sent replacement goods. Stock goes back up at validation.
    Replaced,
    /// Credited the value against the invoice. Money, not goods.
    Deducted,
}

impl core::fmt::Display for Resolution {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Resolution::Rejected => "rejected",
            Resolution::Replaced => "replaced",
            Resolution::Deducted => "deducted",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    Draft,
    Validated,
}

impl core::fmt::Display for CreditStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            CreditStatus::Draft => "draft",
            CreditStatus::Validated => "validated",
        })
    }
}

/// One line of a credit note, copied from the return note at creation and
/// addressed by index within the note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLine {
    pub article_id: ArticleId,
    pub qty: i64,
    /// The return line's unit cost, minor units.
    pub unit_price: i64,
    pub resolution: Option<Resolution>,
    /// `qty * unit_price`, minor units.
    pub total: i64,
}

/// Credit note header and lines. The number is the invoice number with an
/// `-A` suffix, a label like the return note's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNote {
    pub id: CreditNoteId,
    pub return_id: ReturnNoteId,
    pub invoice_id: InvoiceId,
    pub number: String,
    pub date: NaiveDate,
    pub status: CreditStatus,
    pub observation: Option<String>,
    pub lines: Vec<CreditLine>,
    /// Sum of line totals, minor units.
    pub total: i64,
}

/// Movement kinds traced at validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Replaced,
    Deducted,
}

/// Audit row written by [`SupplierAccounts::validate_credit_note`], one per
/// non-rejected line. `Deducted` rows carry `before == after`; nothing
/// moved, but the trail shows the line was settled in money.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub credit_id: CreditNoteId,
    pub line_index: usize,
    pub article_id: ArticleId,
    pub qty: i64,
    pub kind: MovementKind,
    pub before: i64,
    pub after: i64,
    pub recorded_at: DateTime<Utc>,
}

pub(crate) fn credit_number(invoice_number: &str) -> String {
    format!("{invoice_number}-A")
}

impl SupplierAccounts {
    /// Draft a credit note for a return. One per return note; the return
    /// must still have lines.
    pub fn create_credit_note(
        &mut self,
        return_id: ReturnNoteId,
        date: NaiveDate,
    ) -> DomainResult<CreditNoteId> {
        let id = self.transaction(|state| {
            let note = state.return_note(return_id)?.clone();
            if let Some(existing) = state.credit_for_return(return_id) {
                return Err(DomainError::conflict(format!(
                    "return note {} already has credit note {}",
                    note.number, existing.number
                )));
            }
            let return_lines = state.lines_of_return(return_id);
            if return_lines.is_empty() {
                return Err(DomainError::validation(format!(
                    "return note {} has no lines to credit",
                    note.number
                )));
            }
            let invoice = state.invoice(note.invoice_id)?.clone();
            let mut lines = Vec::with_capacity(return_lines.len());
            let mut total = 0_i64;
            for line in return_lines {
                lines.push(CreditLine {
                    article_id: line.article_id,
                    qty: line.qty,
                    unit_price: line.unit_cost,
                    resolution: None,
                    total: line.total,
                });
                total = money::add_amounts(total, line.total)?;
            }
            let id = state.sequences.next_credit_note();
            state.credit_notes.insert(
                id,
                CreditNote {
                    id,
                    return_id,
                    invoice_id: note.invoice_id,
                    number: credit_number(&invoice.number),
                    date,
                    status: CreditStatus::Draft,
                    observation: None,
                    lines,
                    total,
                },
            );
            Ok(id)
        })?;
        info!(credit_id = %id, return_id = %return_id, "credit note created");
        Ok(id)
    }

    /// Set one line's resolution. Frozen once the note is validated.
    pub fn set_line_resolution(
        &mut self,
        credit_id: CreditNoteId,
        line_index: usize,
        resolution: Resolution,
    ) -> DomainResult<()> {
        self.transaction(|state| {
            let credit = state.credit_note_mut(credit_id)?;
            if credit.status == CreditStatus::Validated {
                return Err(DomainError::integrity(format!(
                    "credit note {} is validated; resolutions are frozen",
                    credit.number
                )));
            }
            let number = credit.number.clone();
            let line = credit.lines.get_mut(line_index).ok_or_else(|| {
                DomainError::not_found(format!("line {line_index} of credit note {number}"))
            })?;
            line.resolution = Some(resolution);
            Ok(())
        })?;
        debug!(credit_id = %credit_id, line_index, "credit line resolved");
        Ok(())
    }

    /// Set every line to the same resolution.
    pub fn set_all_resolutions(
        &mut self,
        credit_id: CreditNoteId,
        resolution: Resolution,
    ) -> DomainResult<()> {
        self.transaction(|state| {
            let credit = state.credit_note_mut(credit_id)?;
            if credit.status == CreditStatus::Validated {
                return Err(DomainError::integrity(format!(
                    "credit note {} is validated; resolutions are frozen",
                    credit.number
                )));
            }
            for line in &mut credit.lines {
                line.resolution = Some(resolution);
            }
            Ok(())
        })?;
        debug!(credit_id = %credit_id, "all credit lines resolved");
        Ok(())
    }

    /// Validate the note: every line must be resolved. `Replaced` lines put
    /// their quantity back on the shelf, `Deducted` lines start counting
    /// against the invoice, `Rejected` lines do nothing. Applied whole or
    /// not at all.
    pub fn validate_credit_note(
        &mut self,
        credit_id: CreditNoteId,
        observation: Option<String>,
    ) -> DomainResult<()> {
        self.transaction(|state| {
            let credit = state.credit_note(credit_id)?.clone();
            if credit.status == CreditStatus::Validated {
                return Err(DomainError::integrity(format!(
                    "credit note {} is already validated",
                    credit.number
                )));
            }
            let recorded_at = Utc::now();
            for (line_index, line) in credit.lines.iter().enumerate() {
                let resolution = line.resolution.ok_or_else(|| {
                    DomainError::validation(format!(
                        "line {line_index} of credit note {} has no resolution",
                        credit.number
                    ))
                })?;
                let (kind, level) = match resolution {
                    Resolution::Rejected => continue,
                    Resolution::Replaced => (
                        MovementKind::Replaced,
                        state.stock.adjust(line.article_id, line.qty)?,
                    ),
                    Resolution::Deducted => {
                        let on_hand = state.stock.quantity(line.article_id)?;
                        (
                            MovementKind::Deducted,
                            officine_registry::StockLevel {
                                before: on_hand,
                                after: on_hand,
                            },
                        )
                    }
                };
                let id = state.sequences.next_movement();
                state.movements.insert(
                    id,
                    StockMovement {
                        id,
                        credit_id,
                        line_index,
                        article_id: line.article_id,
                        qty: line.qty,
                        kind,
                        before: level.before,
                        after: level.after,
                        recorded_at,
                    },
                );
            }
            let credit = state.credit_note_mut(credit_id)?;
            credit.status = CreditStatus::Validated;
            credit.observation = observation;
            Ok(())
        })?;
        info!(credit_id = %credit_id, "credit note validated");
        Ok(())
    }

    /// Delete a credit note. A validated note takes its `Replaced`
    /// quantities back off the shelf and drops its audit rows first; the
    /// whole reversal succeeds or nothing changes.
    pub fn delete_credit_note(&mut self, credit_id: CreditNoteId) -> DomainResult<()> {
        self.transaction(|state| {
            let credit = state.credit_note(credit_id)?.clone();
            if credit.status == CreditStatus::Validated {
                for line in &credit.lines {
                    if line.resolution == Some(Resolution::Replaced) {
                        state.stock.adjust(line.article_id, -line.qty)?;
                    }
                }
                let stale: Vec<MovementId> = state
                    .movements
                    .values()
                    .filter(|movement| movement.credit_id == credit_id)
                    .map(|movement| movement.id)
                    .collect();
                for id in stale {
                    state.movements.remove(&id);
                }
            }
            state.credit_notes.remove(&credit_id);
            Ok(())
        })?;
        info!(credit_id = %credit_id, "credit note deleted");
        Ok(())
    }

    pub fn credit_note(&self, id: CreditNoteId) -> DomainResult<&CreditNote> {
        self.state().credit_note(id)
    }

    /// The credit note drafted for a return, if any.
    pub fn credit_note_for_return(
        &self,
        return_id: ReturnNoteId,
    ) -> DomainResult<Option<&CreditNote>> {
        self.state().return_note(return_id)?;
        Ok(self.state().credit_for_return(return_id))
    }

    /// Every credit note, in id order.
    pub fn credit_notes(&self) -> Vec<&CreditNote> {
        self.state().credit_notes.values().collect()
    }

    /// Audit trail, newest first.
    pub fn stock_movements(&self) -> Vec<&StockMovement> {
        self.state().movements.values().rev().collect()
    }

    /// Audit trail of one article, newest first.
    pub fn stock_movements_for(&self, article_id: ArticleId) -> DomainResult<Vec<&StockMovement>> {
        self.state().articles.article(article_id)?;
        Ok(self
            .state()
            .movements
            .values()
            .rev()
            .filter(|movement| movement.article_id == article_id)
            .collect())
    }
}
