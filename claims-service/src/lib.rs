//! Rewards catalog redemption for Green Miles
//!
//! A claim debits the catalog cost from the holder's balance and records a
//! PENDING claim. Delivery or expiry is reported later by the external
//! fulfillment collaborator.

pub mod catalog;
pub mod error;
pub mod processor;
pub mod types;

pub use catalog::{InMemoryCatalog, RewardCatalog};
pub use error::{ClaimError, Result};
pub use processor::ClaimProcessor;
pub use types::{CatalogEntry, ClaimRecord, ClaimStatus, Fulfillment, CLAIMS};
