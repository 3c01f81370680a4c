//! Supplier registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use officine_core::{DomainError, DomainResult, SupplierId};

/// A supplier the pharmacy buys from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
}

/// In-process supplier registry keyed by surrogate id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRegistry {
    suppliers: BTreeMap<SupplierId, Supplier>,
    next_id: u32,
}

impl SupplierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) -> DomainResult<SupplierId> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("supplier name cannot be empty"));
        }
        self.next_id += 1;
        let id = SupplierId::new(self.next_id);
        self.suppliers.insert(id, Supplier { id, name });
        Ok(id)
    }

    pub fn supplier(&self, id: SupplierId) -> DomainResult<&Supplier> {
        self.suppliers
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("supplier {id}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Supplier> {
        self.suppliers.values()
    }

    pub fn len(&self) -> usize {
        self.suppliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suppliers.is_empty()
    }
}
