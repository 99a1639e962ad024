use crate::error::Result;
use crate::types::CatalogEntry;
use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Read-only lookup into the rewards catalog
#[async_trait]
pub trait RewardCatalog: Send + Sync + std::fmt::Debug {
    /// `Ok(None)` when the id is unknown; an unreachable catalog returns
    /// `ClaimError::CatalogUnavailable`
    async fn lookup(&self, reward_id: &str) -> Result<Option<CatalogEntry>>;
}

/// Catalog held in memory, for tests and single-node deployments
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    // Map: reward_id -> CatalogEntry
    entries: Arc<DashMap<String, CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<CatalogEntry>) -> Self {
        let catalog = Self::new();
        for entry in entries {
            catalog.upsert(entry);
        }
        catalog
    }

    /// Insert or replace an entry
    pub fn upsert(&self, entry: CatalogEntry) {
        info!(reward_id = %entry.reward_id, cost = %entry.cost, active = entry.active, "Catalog entry updated");
        self.entries.insert(entry.reward_id.clone(), entry);
    }

    /// Toggle the active flag; returns false for unknown ids
    pub fn set_active(&self, reward_id: &str, active: bool) -> bool {
        match self.entries.get_mut(reward_id) {
            Some(mut entry) => {
                entry.active = active;
                true
            }
            None => false,
        }
    }

    /// Set remaining stock; returns false for unknown ids
    pub fn set_remaining(&self, reward_id: &str, remaining: Option<u32>) -> bool {
        match self.entries.get_mut(reward_id) {
            Some(mut entry) => {
                entry.remaining = remaining;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Small demo catalog used by the node binary
    pub fn sample() -> Self {
        Self::with_entries(vec![
            CatalogEntry {
                reward_id: "coffee-voucher".to_string(),
                name: "Coffee voucher".to_string(),
                cost: Decimal::from(25),
                active: true,
                remaining: None,
            },
            CatalogEntry {
                reward_id: "transit-day-pass".to_string(),
                name: "Transit day pass".to_string(),
                cost: Decimal::from(50),
                active: true,
                remaining: Some(100),
            },
            CatalogEntry {
                reward_id: "tree-planting".to_string(),
                name: "Plant a tree".to_string(),
                cost: Decimal::from(80),
                active: true,
                remaining: None,
            },
        ])
    }
}

#[async_trait]
impl RewardCatalog for InMemoryCatalog {
    async fn lookup(&self, reward_id: &str) -> Result<Option<CatalogEntry>> {
        Ok(self.entries.get(reward_id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_and_toggle() {
        let catalog = InMemoryCatalog::sample();
        assert_eq!(catalog.len(), 3);

        let entry = catalog.lookup("coffee-voucher").await.unwrap().unwrap();
        assert!(entry.is_available());

        assert!(catalog.set_active("coffee-voucher", false));
        let entry = catalog.lookup("coffee-voucher").await.unwrap().unwrap();
        assert!(!entry.is_available());

        assert!(catalog.lookup("unknown").await.unwrap().is_none());
        assert!(!catalog.set_active("unknown", true));
    }

    #[tokio::test]
    async fn test_exhausted_entry_unavailable() {
        let catalog = InMemoryCatalog::sample();
        catalog.set_remaining("transit-day-pass", Some(0));
        let entry = catalog.lookup("transit-day-pass").await.unwrap().unwrap();
        assert!(entry.active);
        assert!(!entry.is_available());
    }
}
