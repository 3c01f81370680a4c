//! Strongly-typed record identifiers.
//!
//! Every record collection is keyed by a surrogate integer id. The wrapping
//! newtypes keep an `ArticleId` from ever standing in for an `InvoiceId`;
//! allocation is owned by the store's per-collection sequences, so `new` is
//! mostly a test and deserialization concern.

use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $t:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $t(u32);

        impl $t {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u32 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u32> for $t {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$t> for u32 {
            fn from(value: $t) -> Self {
                value.0
            }
        }
    };
}

record_id! {
    /// Identifier of an article in the registry.
    ArticleId
}

record_id! {
    /// Identifier of a supplier.
    SupplierId
}

record_id! {
    /// Identifier of a delivery invoice.
    InvoiceId
}

record_id! {
    /// Identifier of one line of a delivery invoice.
    DeliveryLineId
}

record_id! {
    /// Identifier of a return note.
    ReturnNoteId
}

record_id! {
    /// Identifier of one line of a return note.
    ReturnLineId
}

record_id! {
    /// Identifier of a supplier credit note.
    CreditNoteId
}

record_id! {
    /// Identifier of a payment row.
    PaymentId
}

record_id! {
    /// Identifier of a stock-movement audit row.
    MovementId
}

record_id! {
    /// Identifier of an archived (deleted) invoice snapshot.
    ArchiveId
}
