//! The record store behind the supplier accounts façade.
//!
//! `AccountsState` owns every collection: the three registries (articles,
//! suppliers, stock) and the document records (invoices, lines, return
//! notes, credit notes, payments, stock movements, the deleted-invoice
//! archive), all keyed by surrogate integer ids from per-collection
//! sequences. The façade is single-writer and synchronous: `&mut self`
//! mutations, `&self` queries, no interior mutability.
//!
//! Multi-record mutations run through [`SupplierAccounts::transaction`]:
//! the state is snapshotted, the closure runs against the draft, and the
//! draft replaces the live state only on `Ok`. The first failing step
//! therefore discards every partial write, and the caller observes a clean
//! error with the store exactly as before the call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use officine_core::{
    ArchiveId, ArticleId, CreditNoteId, DeliveryLineId, DomainError, DomainResult, InvoiceId,
    MovementId, PaymentId, ReturnLineId, ReturnNoteId, SupplierId,
};
use officine_registry::{
    Article, ArticleRegistry, StockLevel, StockRegister, Supplier, SupplierRegistry,
};

use crate::credit::{CreditNote, StockMovement};
use crate::delivery::{DeletedInvoice, DeliveryInvoice, DeliveryLine};
use crate::payment::Payment;
use crate::returns::{ReturnLine, ReturnNote};

/// Per-collection id sequences. Ids are allocated inside transactions, so a
/// rolled-back mutation also rolls its sequence back and ids stay dense.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Sequences {
    invoices: u32,
    delivery_lines: u32,
    return_notes: u32,
    return_lines: u32,
    credit_notes: u32,
    payments: u32,
    movements: u32,
    archives: u32,
}

impl Sequences {
    pub(crate) fn next_invoice(&mut self) -> InvoiceId {
        self.invoices += 1;
        InvoiceId::new(self.invoices)
    }

    pub(crate) fn next_delivery_line(&mut self) -> DeliveryLineId {
        self.delivery_lines += 1;
        DeliveryLineId::new(self.delivery_lines)
    }

    pub(crate) fn next_return_note(&mut self) -> ReturnNoteId {
        self.return_notes += 1;
        ReturnNoteId::new(self.return_notes)
    }

    pub(crate) fn next_return_line(&mut self) -> ReturnLineId {
        self.return_lines += 1;
        ReturnLineId::new(self.return_lines)
    }

    pub(crate) fn next_credit_note(&mut self) -> CreditNoteId {
        self.credit_notes += 1;
        CreditNoteId::new(self.credit_notes)
    }

    pub(crate) fn next_payment(&mut self) -> PaymentId {
        self.payments += 1;
        PaymentId::new(self.payments)
    }

    pub(crate) fn next_movement(&mut self) -> MovementId {
        self.movements += 1;
        MovementId::new(self.movements)
    }

    pub(crate) fn next_archive(&mut self) -> ArchiveId {
        self.archives += 1;
        ArchiveId::new(self.archives)
    }
}

/// Everything the engine owns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsState {
    pub(crate) suppliers: SupplierRegistry,
    pub(crate) articles: ArticleRegistry,
    pub(crate) stock: StockRegister,
    pub(crate) invoices: BTreeMap<InvoiceId, DeliveryInvoice>,
    pub(crate) delivery_lines: BTreeMap<DeliveryLineId, DeliveryLine>,
    pub(crate) return_notes: BTreeMap<ReturnNoteId, ReturnNote>,
    pub(crate) return_lines: BTreeMap<ReturnLineId, ReturnLine>,
    pub(crate) credit_notes: BTreeMap<CreditNoteId, CreditNote>,
    pub(crate) payments: BTreeMap<PaymentId, Payment>,
    pub(crate) movements: BTreeMap<MovementId, StockMovement>,
    pub(crate) archive: BTreeMap<ArchiveId, DeletedInvoice>,
    pub(crate) sequences: Sequences,
}

impl AccountsState {
    pub(crate) fn invoice(&self, id: InvoiceId) -> DomainResult<&DeliveryInvoice> {
        self.invoices
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("invoice {id}")))
    }

    pub(crate) fn invoice_mut(&mut self, id: InvoiceId) -> DomainResult<&mut DeliveryInvoice> {
        self.invoices
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("invoice {id}")))
    }

    pub(crate) fn delivery_line(&self, id: DeliveryLineId) -> DomainResult<&DeliveryLine> {
        self.delivery_lines
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("delivery line {id}")))
    }

    /// Lines of one invoice, in line-id order.
    pub(crate) fn lines_of_invoice(&self, id: InvoiceId) -> Vec<&DeliveryLine> {
        self.delivery_lines
            .values()
            .filter(|line| line.invoice_id == id)
            .collect()
    }

    pub(crate) fn return_note(&self, id: ReturnNoteId) -> DomainResult<&ReturnNote> {
        self.return_notes
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("return note {id}")))
    }

    pub(crate) fn return_note_mut(&mut self, id: ReturnNoteId) -> DomainResult<&mut ReturnNote> {
        self.return_notes
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("return note {id}")))
    }

    pub(crate) fn return_line(&self, id: ReturnLineId) -> DomainResult<&ReturnLine> {
        self.return_lines
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("return line {id}")))
    }

    pub(crate) fn lines_of_return(&self, id: ReturnNoteId) -> Vec<&ReturnLine> {
        self.return_lines
            .values()
            .filter(|line| line.return_id == id)
            .collect()
    }

    pub(crate) fn return_notes_of_invoice(&self, id: InvoiceId) -> Vec<&ReturnNote> {
        self.return_notes
            .values()
            .filter(|note| note.invoice_id == id)
            .collect()
    }

    pub(crate) fn credit_note(&self, id: CreditNoteId) -> DomainResult<&CreditNote> {
        self.credit_notes
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("credit note {id}")))
    }

    pub(crate) fn credit_note_mut(&mut self, id: CreditNoteId) -> DomainResult<&mut CreditNote> {
        self.credit_notes
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("credit note {id}")))
    }

    /// A return note carries at most one credit note.
    pub(crate) fn credit_for_return(&self, id: ReturnNoteId) -> Option<&CreditNote> {
        self.credit_notes.values().find(|note| note.return_id == id)
    }

    pub(crate) fn payment(&self, id: PaymentId) -> DomainResult<&Payment> {
        self.payments
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("payment {id}")))
    }

    /// Payments of one invoice, in recording order.
    pub(crate) fn payments_of_invoice(&self, id: InvoiceId) -> Vec<&Payment> {
        self.payments
            .values()
            .filter(|payment| payment.invoice_id == id)
            .collect()
    }

    /// Total quantity of an article delivered on one invoice, across lines.
    pub(crate) fn delivered_qty(&self, invoice_id: InvoiceId, article_id: ArticleId) -> i64 {
        self.delivery_lines
            .values()
            .filter(|line| line.invoice_id == invoice_id && line.article_id == article_id)
            .map(|line| line.qty)
            .sum()
    }

    /// Quantity of an article already claimed by the invoice's return notes.
    pub(crate) fn returned_qty(&self, invoice_id: InvoiceId, article_id: ArticleId) -> i64 {
        let note_ids: Vec<ReturnNoteId> = self
            .return_notes
            .values()
            .filter(|note| note.invoice_id == invoice_id)
            .map(|note| note.id)
            .collect();
        self.return_lines
            .values()
            .filter(|line| note_ids.contains(&line.return_id) && line.article_id == article_id)
            .map(|line| line.qty)
            .sum()
    }

    /// First delivery line of the invoice carrying the article, in line-id
    /// order. Return lines copy their unit cost from it.
    pub(crate) fn first_delivery_line(
        &self,
        invoice_id: InvoiceId,
        article_id: ArticleId,
    ) -> Option<&DeliveryLine> {
        self.delivery_lines
            .values()
            .find(|line| line.invoice_id == invoice_id && line.article_id == article_id)
    }
}

/// The supplier accounts façade: one value owning the whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierAccounts {
    state: AccountsState,
}

impl SupplierAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> &AccountsState {
        &self.state
    }

    /// Run an all-or-nothing mutation.
    ///
    /// The closure works on a snapshot; it replaces the live state only when
    /// the closure returns `Ok`. Sequences live inside the state, so failed
    /// mutations do not burn ids.
    pub(crate) fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut AccountsState) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let mut draft = self.state.clone();
        let value = f(&mut draft)?;
        self.state = draft;
        Ok(value)
    }

    // Registry surface. Articles, suppliers and stock are reference data the
    // documents point at; the engine needs them registered up front.

    /// Register a supplier.
    pub fn register_supplier(&mut self, name: impl Into<String>) -> DomainResult<SupplierId> {
        let name = name.into();
        self.transaction(|state| state.suppliers.insert(name))
    }

    /// Register an article and start tracking its stock at `on_hand`.
    pub fn register_article(
        &mut self,
        designation: impl Into<String>,
        purchase_cost: i64,
        sale_price: i64,
        on_hand: i64,
    ) -> DomainResult<ArticleId> {
        let designation = designation.into();
        self.transaction(|state| {
            let id = state.articles.insert(designation, purchase_cost, sale_price)?;
            state.stock.track(id, on_hand)?;
            Ok(id)
        })
    }

    pub fn supplier(&self, id: SupplierId) -> DomainResult<&Supplier> {
        self.state.suppliers.supplier(id)
    }

    pub fn article(&self, id: ArticleId) -> DomainResult<&Article> {
        self.state.articles.article(id)
    }

    /// On-hand quantity for one article.
    pub fn stock_on_hand(&self, id: ArticleId) -> DomainResult<i64> {
        self.state.stock.quantity(id)
    }

    /// Out-of-band stock correction (sale, breakage, inventory count).
    /// Document mutations adjust stock themselves; this is for everything
    /// that happens to the shelf outside this ledger.
    pub fn adjust_stock(&mut self, id: ArticleId, delta: i64) -> DomainResult<StockLevel> {
        self.transaction(|state| state.stock.adjust(id, delta))
    }
}
