//! Article registry: the reference data delivery lines point at.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use officine_core::{ArticleId, DomainError, DomainResult};

/// A pharmacy article as the ledger sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub designation: String,
    /// Reference purchase cost in minor currency units.
    pub purchase_cost: i64,
    /// Shelf sale price in minor currency units. Rewritten by every delivery
    /// line that records a sale price for the article.
    pub sale_price: i64,
}

/// In-process article registry keyed by surrogate id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRegistry {
    articles: BTreeMap<ArticleId, Article>,
    next_id: u32,
}

impl ArticleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        designation: impl Into<String>,
        purchase_cost: i64,
        sale_price: i64,
    ) -> DomainResult<ArticleId> {
        let designation = designation.into();
        if designation.trim().is_empty() {
            return Err(DomainError::validation("designation cannot be empty"));
        }
        if purchase_cost < 0 || sale_price < 0 {
            return Err(DomainError::validation("article prices cannot be negative"));
        }
        self.next_id += 1;
        let id = ArticleId::new(self.next_id);
        self.articles.insert(
            id,
            Article {
                id,
                designation,
                purchase_cost,
                sale_price,
            },
        );
        Ok(id)
    }

    pub fn article(&self, id: ArticleId) -> DomainResult<&Article> {
        self.articles
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("article {id}")))
    }

    /// Delivery-line write-back: the last recorded sale price wins.
    pub fn set_sale_price(&mut self, id: ArticleId, sale_price: i64) -> DomainResult<()> {
        if sale_price < 0 {
            return Err(DomainError::validation("article prices cannot be negative"));
        }
        let article = self
            .articles
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("article {id}")))?;
        article.sale_price = sale_price;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Article> {
        self.articles.values()
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}
