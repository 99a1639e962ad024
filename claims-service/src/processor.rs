use crate::catalog::RewardCatalog;
use crate::error::{ClaimError, Result};
use crate::types::{ClaimRecord, ClaimStatus, Fulfillment, CLAIMS};
use chrono::Utc;
use ledger_core::{account_index_key, account_index_prefix, AccountId, EntryKind, Ledger};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const ACCOUNT_CLAIMS_INDEX: &[u8] = b"account-claims/";

/// ClaimProcessor redeems catalog rewards against ledger balances
#[derive(Debug)]
pub struct ClaimProcessor {
    ledger: Arc<Ledger>,
    catalog: Arc<dyn RewardCatalog>,
}

impl ClaimProcessor {
    pub fn new(ledger: Arc<Ledger>, catalog: Arc<dyn RewardCatalog>) -> Self {
        Self { ledger, catalog }
    }

    /// Redeem a reward under a fresh claim id
    pub async fn claim(&self, account_id: &AccountId, reward_id: &str) -> Result<ClaimRecord> {
        self.claim_with_id(account_id, reward_id, Uuid::now_v7()).await
    }

    /// Redeem a reward under a caller-supplied claim id
    ///
    /// Retrying with the same id returns the original record and never
    /// debits twice.
    pub async fn claim_with_id(
        &self,
        account_id: &AccountId,
        reward_id: &str,
        claim_id: Uuid,
    ) -> Result<ClaimRecord> {
        if let Some(existing) = self.find(claim_id)? {
            return Self::replayed(existing, account_id, reward_id);
        }

        // 1. Catalog lookup, outside the writer right
        let entry = self
            .catalog
            .lookup(reward_id)
            .await?
            .ok_or_else(|| ClaimError::RewardNotFound(reward_id.to_string()))?;
        if !entry.is_available() {
            return Err(ClaimError::RewardUnavailable(reward_id.to_string()));
        }

        // 2. Debit and record together
        let mut txn = self.ledger.begin(account_id).await?;

        if let Some(existing) = txn.storage().get_record::<ClaimRecord>(CLAIMS, &claim_id)? {
            return Self::replayed(existing, account_id, reward_id);
        }

        if let Err(e) = txn.debit(EntryKind::Claim, entry.cost, claim_id) {
            warn!(
                account_id = %account_id,
                reward_id = %reward_id,
                cost = %entry.cost,
                error = %e,
                "Claim refused"
            );
            return Err(e.into());
        }

        let record = ClaimRecord {
            id: claim_id,
            account_id: account_id.clone(),
            reward_id: entry.reward_id.clone(),
            cost: entry.cost,
            claimed_at: Utc::now(),
            status: ClaimStatus::Pending,
            fulfillment_code: None,
            resolved_at: None,
        };
        txn.put_record(CLAIMS, &record.id, &record)?;
        txn.put_index(
            account_index_key(ACCOUNT_CLAIMS_INDEX, account_id, &record.id),
            record.id.as_bytes().to_vec(),
        );
        txn.commit()?;

        info!(
            claim_id = %record.id,
            account_id = %account_id,
            reward_id = %record.reward_id,
            cost = %record.cost,
            "Reward claimed"
        );
        Ok(record)
    }

    fn replayed(existing: ClaimRecord, account_id: &AccountId, reward_id: &str) -> Result<ClaimRecord> {
        if existing.account_id != *account_id || existing.reward_id != reward_id {
            return Err(ClaimError::InvalidInput(format!(
                "claim id {} already used for {} by {}",
                existing.id, existing.reward_id, existing.account_id
            )));
        }
        Ok(existing)
    }

    /// Record the fulfillment collaborator's verdict; balances are untouched
    pub async fn apply_fulfillment(&self, claim_id: Uuid, outcome: Fulfillment) -> Result<ClaimRecord> {
        let account_id = self.get(claim_id)?.account_id;

        let mut txn = self.ledger.begin(&account_id).await?;
        let mut record: ClaimRecord = txn
            .storage()
            .get_record(CLAIMS, &claim_id)?
            .ok_or(ClaimError::ClaimNotFound(claim_id))?;

        match (&record.status, &outcome) {
            (ClaimStatus::Pending, _) => {}
            // Repeated identical verdicts are accepted as no-ops
            (ClaimStatus::Delivered, Fulfillment::Delivered { code })
                if record.fulfillment_code.as_deref() == Some(code.as_str()) =>
            {
                return Ok(record)
            }
            (ClaimStatus::Expired, Fulfillment::Expired) => return Ok(record),
            (status, _) => {
                return Err(ClaimError::InvalidState(format!(
                    "claim {} is {:?}, fulfillment only applies to PENDING claims",
                    claim_id, status
                )))
            }
        }

        match outcome {
            Fulfillment::Delivered { code } => {
                record.status = ClaimStatus::Delivered;
                record.fulfillment_code = Some(code);
            }
            Fulfillment::Expired => record.status = ClaimStatus::Expired,
        }
        record.resolved_at = Some(Utc::now());

        txn.put_record(CLAIMS, &record.id, &record)?;
        txn.commit()?;

        info!(claim_id = %claim_id, account_id = %account_id, status = ?record.status, "Claim resolved");
        Ok(record)
    }

    fn find(&self, claim_id: Uuid) -> Result<Option<ClaimRecord>> {
        Ok(self.ledger.storage().get_record(CLAIMS, &claim_id)?)
    }

    pub fn get(&self, claim_id: Uuid) -> Result<ClaimRecord> {
        self.find(claim_id)?.ok_or(ClaimError::ClaimNotFound(claim_id))
    }

    /// Claims made by an account, oldest first
    pub fn list_for_account(&self, account_id: &AccountId) -> Result<Vec<ClaimRecord>> {
        self.ledger
            .storage()
            .scan_index_ids(&account_index_prefix(ACCOUNT_CLAIMS_INDEX, account_id))?
            .into_iter()
            .map(|claim_id| self.get(claim_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::types::CatalogEntry;
    use ledger_core::{Config, ErrorKind};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    async fn setup(funds: Decimal) -> (ClaimProcessor, Arc<Ledger>, InMemoryCatalog, AccountId, TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(
            Ledger::open(Config {
                data_dir: temp_dir.path().to_path_buf(),
                ..Config::default()
            })
            .unwrap(),
        );
        let alice = AccountId::new("alice");
        if funds > Decimal::ZERO {
            ledger.credit(&alice, EntryKind::Earn, funds, Uuid::now_v7()).await.unwrap();
        }

        let catalog = InMemoryCatalog::with_entries(vec![CatalogEntry {
            reward_id: "voucher-50".to_string(),
            name: "Voucher".to_string(),
            cost: dec!(50),
            active: true,
            remaining: None,
        }]);
        let processor = ClaimProcessor::new(ledger.clone(), Arc::new(catalog.clone()));
        (processor, ledger, catalog, alice, temp_dir)
    }

    #[tokio::test]
    async fn test_claim_debits_and_records_pending() {
        let (processor, ledger, _catalog, alice, _temp) = setup(dec!(80)).await;

        let record = processor.claim(&alice, "voucher-50").await.unwrap();
        assert_eq!(record.status, ClaimStatus::Pending);
        assert_eq!(record.cost, dec!(50));
        assert_eq!(ledger.snapshot(&alice).await.unwrap().balance, dec!(30));
        assert_eq!(processor.list_for_account(&alice).unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_claim_over_balance_changes_nothing() {
        let (processor, ledger, _catalog, alice, _temp) = setup(dec!(40)).await;

        let err = processor.claim(&alice, "voucher-50").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert_eq!(ledger.snapshot(&alice).await.unwrap().balance, dec!(40));
        assert!(processor.list_for_account(&alice).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_and_unavailable_rewards() {
        let (processor, _ledger, catalog, alice, _temp) = setup(dec!(100)).await;

        let err = processor.claim(&alice, "nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        catalog.set_active("voucher-50", false);
        let err = processor.claim(&alice, "voucher-50").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_retried_claim_id_debits_once() {
        let (processor, ledger, catalog, alice, _temp) = setup(dec!(100)).await;
        let claim_id = Uuid::now_v7();

        let first = processor.claim_with_id(&alice, "voucher-50", claim_id).await.unwrap();
        // Even if the reward is withdrawn meanwhile, the retry sees the original record
        catalog.set_active("voucher-50", false);
        let second = processor.claim_with_id(&alice, "voucher-50", claim_id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.snapshot(&alice).await.unwrap().balance, dec!(50));

        let bob = AccountId::new("bob");
        let err = processor.claim_with_id(&bob, "voucher-50", claim_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_fulfillment_transitions() {
        let (processor, ledger, _catalog, alice, _temp) = setup(dec!(100)).await;

        let delivered = processor.claim(&alice, "voucher-50").await.unwrap();
        let delivered = processor
            .apply_fulfillment(delivered.id, Fulfillment::Delivered { code: "ABC-123".to_string() })
            .await
            .unwrap();
        assert_eq!(delivered.status, ClaimStatus::Delivered);
        assert_eq!(delivered.fulfillment_code.as_deref(), Some("ABC-123"));

        // Same verdict again is a no-op, a different one is refused
        let again = processor
            .apply_fulfillment(delivered.id, Fulfillment::Delivered { code: "ABC-123".to_string() })
            .await
            .unwrap();
        assert_eq!(again, delivered);
        let err = processor.apply_fulfillment(delivered.id, Fulfillment::Expired).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        // Expiry does not refund
        let expired = processor.claim(&alice, "voucher-50").await.unwrap();
        let expired = processor.apply_fulfillment(expired.id, Fulfillment::Expired).await.unwrap();
        assert_eq!(expired.status, ClaimStatus::Expired);
        assert_eq!(ledger.snapshot(&alice).await.unwrap().balance, Decimal::ZERO);
    }

    #[derive(Debug)]
    struct OfflineCatalog;

    #[async_trait::async_trait]
    impl RewardCatalog for OfflineCatalog {
        async fn lookup(&self, _reward_id: &str) -> Result<Option<CatalogEntry>> {
            Err(ClaimError::CatalogUnavailable("catalog timed out".to_string()))
        }
    }

    #[tokio::test]
    async fn test_catalog_outage_leaves_balance() {
        let (_processor, ledger, _catalog, alice, _temp) = setup(dec!(100)).await;
        let processor = ClaimProcessor::new(ledger.clone(), Arc::new(OfflineCatalog));

        let err = processor.claim(&alice, "voucher-50").await.unwrap_err();
        assert!(matches!(err, ClaimError::CatalogUnavailable(_)));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(ledger.snapshot(&alice).await.unwrap().balance, dec!(100));
        assert!(processor.list_for_account(&alice).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_claim() {
        let (processor, _ledger, _catalog, _alice, _temp) = setup(Decimal::ZERO).await;
        let err = processor.apply_fulfillment(Uuid::now_v7(), Fulfillment::Expired).await.unwrap_err();
        assert!(matches!(err, ClaimError::ClaimNotFound(_)));
    }
}
