//! `officine-registry` — reference registries the ledger collaborates with.
//!
//! Articles, suppliers and on-hand stock live here as plain in-process
//! components. The ledger composes them into its store so that document
//! mutations and their stock effects share one transaction.

pub mod article;
pub mod stock;
pub mod supplier;

pub use article::{Article, ArticleRegistry};
pub use stock::{StockLevel, StockRegister};
pub use supplier::{Supplier, SupplierRegistry};
