//! Stock register: on-hand quantity per article.
//!
//! The register only tracks quantities; which documents moved them is the
//! ledger's business. Adjustments return the before/after pair so audit
//! rows can be written from the same call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use officine_core::{ArticleId, DomainError, DomainResult};

/// On-hand quantity around one adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub before: i64,
    pub after: i64,
}

/// In-process stock register keyed by article id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRegister {
    quantities: BTreeMap<ArticleId, i64>,
}

impl StockRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an article at the given on-hand quantity.
    pub fn track(&mut self, id: ArticleId, quantity: i64) -> DomainResult<()> {
        if quantity < 0 {
            return Err(DomainError::validation("stock quantity cannot be negative"));
        }
        if self.quantities.contains_key(&id) {
            return Err(DomainError::conflict(format!("article {id} already tracked")));
        }
        self.quantities.insert(id, quantity);
        Ok(())
    }

    pub fn quantity(&self, id: ArticleId) -> DomainResult<i64> {
        self.quantities
            .get(&id)
            .copied()
            .ok_or_else(|| DomainError::not_found(format!("stock for article {id}")))
    }

    /// Apply a signed delta. Nothing is written when the adjustment fails.
    pub fn adjust(&mut self, id: ArticleId, delta: i64) -> DomainResult<StockLevel> {
        let before = self.quantity(id)?;
        let after = before.checked_add(delta).ok_or_else(|| {
            DomainError::integrity(format!("stock adjustment overflows for article {id}"))
        })?;
        if after < 0 {
            return Err(DomainError::conflict(format!(
                "stock would go negative for article {id} ({before} on hand, delta {delta})"
            )));
        }
        self.quantities.insert(id, after);
        Ok(StockLevel { before, after })
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArticleId, i64)> + '_ {
        self.quantities.iter().map(|(id, qty)| (*id, *qty))
    }
}
