//! Supplier accounts-payable ledger.
//!
//! Delivery invoices, return notes, credit notes, and payments for a
//! pharmacy back office, held in one in-process store with all-or-nothing
//! mutations. Balances and settlement statuses are never stored; the view
//! recomputes them from the records on every read.

pub mod credit;
pub mod delivery;
pub mod payment;
pub mod printable;
pub mod returns;
pub mod store;
pub mod view;

pub use credit::{CreditLine, CreditNote, CreditStatus, MovementKind, Resolution, StockMovement};
pub use delivery::{
    ArchivedLine, DeletedInvoice, DeliveryInvoice, DeliveryLine, DeliveryLineEdit, NewDeliveryLine,
};
pub use payment::{Payment, PaymentInput, PaymentMode};
pub use printable::{
    DeductionRow, PaymentRow, PrintableCreditLine, PrintableCreditNote, PrintableInvoice,
    PrintableInvoiceLine, PrintableInvoiceTotals, PrintableReceipt, PrintableReturnLine,
    PrintableReturnNote, PrintableSettlement, PrintableSituation, PrintableStatement,
};
pub use returns::{
    LocatedDelivery, ReturnLine, ReturnLineInput, ReturnNote, ReturnReason, ReturnableLine,
};
pub use store::SupplierAccounts;
pub use view::{
    AccountsAggregate, InvoiceLedger, LedgerFilter, LedgerTotals, PaymentRecord, SettlementStatus,
    StatusBreakdown, SupplierBalance, settlement_status,
};
