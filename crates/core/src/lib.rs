//! `officine-core` — foundation types for the supplier accounts workspace.
//!
//! Pure domain primitives (errors, record ids, money arithmetic); no
//! infrastructure concerns.

pub mod error;
pub mod id;
pub mod money;

pub use error::{DomainError, DomainResult};
pub use id::{
    ArchiveId, ArticleId, CreditNoteId, DeliveryLineId, InvoiceId, MovementId, PaymentId,
    ReturnLineId, ReturnNoteId, SupplierId,
};
