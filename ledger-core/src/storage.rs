//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `entries` - Append-only entry log (key: account || sequence)
//! - `refs` - Idempotency index (key: account || kind || reference -> sequence)
//! - `records` - Domain records such as trips, stakes and claims (key: collection || id)
//! - `indices` - Secondary indices owned by the domain crates
//!
//! Account ids are length-prefixed in keys and sequences are big-endian, so a
//! prefix scan over one account returns its log in order.

use crate::{
    error::{Error, Result},
    types::{AccountId, EntryKind, LedgerEntry},
    Config,
};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode,
    Options, WriteBatch, WriteOptions, DB,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ENTRIES: &str = "entries";
const CF_REFS: &str = "refs";
const CF_RECORDS: &str = "records";
const CF_INDICES: &str = "indices";

/// Named group of domain records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection(&'static str);

impl Collection {
    /// Declare a collection
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Collection name
    pub fn name(&self) -> &'static str {
        self.0
    }

    fn prefix(&self) -> Vec<u8> {
        let mut key = self.0.as_bytes().to_vec();
        key.push(b'/');
        key
    }

    fn key(&self, id: &Uuid) -> Vec<u8> {
        let mut key = self.prefix();
        key.extend_from_slice(id.as_bytes());
        key
    }
}

#[derive(Clone, Copy)]
enum Family {
    Entries,
    Refs,
    Records,
    Indices,
}

impl Family {
    fn name(self) -> &'static str {
        match self {
            Family::Entries => CF_ENTRIES,
            Family::Refs => CF_REFS,
            Family::Records => CF_RECORDS,
            Family::Indices => CF_INDICES,
        }
    }
}

/// Index key prefix scoping `namespace` to one account
///
/// The account id is length-prefixed so one account's keys never share a
/// prefix with another's.
pub fn account_index_prefix(namespace: &[u8], account: &AccountId) -> Vec<u8> {
    let bytes = account.as_str().as_bytes();
    let mut key = Vec::with_capacity(namespace.len() + 4 + bytes.len() + 16);
    key.extend_from_slice(namespace);
    key.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    key.extend_from_slice(bytes);
    key
}

/// Index key for one record owned by an account
pub fn account_index_key(namespace: &[u8], account: &AccountId, id: &Uuid) -> Vec<u8> {
    let mut key = account_index_prefix(namespace, account);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Writes that must land together
#[derive(Default)]
pub struct WriteSet {
    ops: Vec<(Family, Vec<u8>, Vec<u8>)>,
}

impl fmt::Debug for WriteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSet").field("ops", &self.ops.len()).finish()
    }
}

impl WriteSet {
    /// Empty write set
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a ledger entry and its idempotency ref
    pub(crate) fn put_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        let value = bincode::serialize(entry)?;
        self.ops.push((
            Family::Entries,
            Storage::entry_key(&entry.account_id, entry.sequence),
            value,
        ));
        self.ops.push((
            Family::Refs,
            Storage::ref_key(&entry.account_id, entry.kind, &entry.reference),
            entry.sequence.to_be_bytes().to_vec(),
        ));
        Ok(())
    }

    /// Stage a domain record
    pub fn put_record<T: Serialize>(&mut self, collection: Collection, id: &Uuid, record: &T) -> Result<()> {
        let value = bincode::serialize(record)?;
        self.ops.push((Family::Records, collection.key(id), value));
        Ok(())
    }

    /// Stage a secondary index entry
    pub fn put_index(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push((Family::Indices, key.into(), value.into()));
    }

    /// Nothing staged
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of staged writes
    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    sync_writes: bool,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for write-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_REFS, Self::cf_options_lookup()),
            ColumnFamilyDescriptor::new(CF_RECORDS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_lookup()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB ledger store");

        Ok(Self {
            db: Arc::new(db),
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    // Column family options

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_lookup() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Point lookups benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf(&self, family: Family) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(family.name())
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", family.name())))
    }

    // Key helpers

    fn account_prefix(account: &AccountId) -> Vec<u8> {
        account_index_prefix(&[], account)
    }

    fn entry_key(account: &AccountId, sequence: u64) -> Vec<u8> {
        let mut key = Self::account_prefix(account);
        key.extend_from_slice(&sequence.to_be_bytes());
        key
    }

    fn ref_key(account: &AccountId, kind: EntryKind, reference: &Uuid) -> Vec<u8> {
        let mut key = Self::account_prefix(account);
        key.push(kind.code());
        key.extend_from_slice(reference.as_bytes());
        key
    }

    fn scan_prefix(&self, family: Family, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf(family)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut items = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            items.push((key, value));
        }
        Ok(items)
    }

    // Entry operations

    /// Full entry log for one account, in sequence order
    pub fn get_entries(&self, account: &AccountId) -> Result<Vec<LedgerEntry>> {
        let prefix = Self::account_prefix(account);
        self.scan_prefix(Family::Entries, &prefix)?
            .iter()
            .map(|(_, value)| bincode::deserialize(value).map_err(Error::from))
            .collect()
    }

    /// Entry at a given sequence
    pub fn get_entry(&self, account: &AccountId, sequence: u64) -> Result<LedgerEntry> {
        let cf = self.cf(Family::Entries)?;
        let value = self
            .db
            .get_cf(&cf, Self::entry_key(account, sequence))?
            .ok_or_else(|| Error::NotFound(format!("entry {}#{}", account, sequence)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Every entry in the store, grouped by account and ordered by sequence
    pub fn scan_all_entries(&self) -> Result<Vec<LedgerEntry>> {
        self.scan_prefix(Family::Entries, &[])?
            .iter()
            .map(|(_, value)| bincode::deserialize(value).map_err(Error::from))
            .collect()
    }

    /// Entry already posted for (account, kind, reference)
    pub fn find_posting(
        &self,
        account: &AccountId,
        kind: EntryKind,
        reference: &Uuid,
    ) -> Result<Option<LedgerEntry>> {
        let cf = self.cf(Family::Refs)?;
        let Some(value) = self.db.get_cf(&cf, Self::ref_key(account, kind, reference))? else {
            return Ok(None);
        };
        let bytes: [u8; 8] = value
            .as_slice()
            .try_into()
            .map_err(|_| Error::Storage(format!("corrupt ref for {} {}", account, reference)))?;
        self.get_entry(account, u64::from_be_bytes(bytes)).map(Some)
    }

    // Record operations

    /// Fetch a domain record
    pub fn get_record<T: DeserializeOwned>(&self, collection: Collection, id: &Uuid) -> Result<Option<T>> {
        let cf = self.cf(Family::Records)?;
        match self.db.get_cf(&cf, collection.key(id))? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All records of a collection
    pub fn scan_records<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        self.scan_prefix(Family::Records, &collection.prefix())?
            .iter()
            .map(|(_, value)| bincode::deserialize(value).map_err(Error::from))
            .collect()
    }

    // Index operations

    /// Point lookup in the secondary index
    pub fn get_index(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(Family::Indices)?;
        Ok(self.db.get_cf(&cf, key)?)
    }

    /// Values of every index key starting with `prefix`
    pub fn scan_index(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .scan_prefix(Family::Indices, prefix)?
            .into_iter()
            .map(|(_, value)| value.into_vec())
            .collect())
    }

    /// Record ids stored as values under an index prefix
    pub fn scan_index_ids(&self, prefix: &[u8]) -> Result<Vec<Uuid>> {
        self.scan_index(prefix)?
            .iter()
            .map(|value| {
                Uuid::from_slice(value).map_err(|e| Error::Storage(format!("corrupt index value: {}", e)))
            })
            .collect()
    }

    // Batch operations (atomic)

    /// Commit a write set atomically
    pub fn commit(&self, writes: WriteSet) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut batch = WriteBatch::default();
        for (family, key, value) in &writes.ops {
            let cf = self.cf(*family)?;
            batch.put_cf(&cf, key, value);
        }

        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &opts)?;

        tracing::trace!(writes = writes.len(), "Write set committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    const WIDGETS: Collection = Collection::new("widgets");

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn test_entry(account: &str, sequence: u64) -> LedgerEntry {
        LedgerEntry {
            entry_id: Uuid::now_v7(),
            account_id: AccountId::new(account),
            sequence,
            kind: EntryKind::Earn,
            amount: Decimal::new(640, 2),
            balance_after: Decimal::new(640, 2) * Decimal::from(sequence + 1),
            reference: Uuid::now_v7(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_commit_and_read_entries_in_order() {
        let (storage, _temp) = test_storage();

        let mut writes = WriteSet::new();
        for seq in 0..3 {
            writes.put_entry(&test_entry("alice", seq)).unwrap();
        }
        writes.put_entry(&test_entry("alicia", 0)).unwrap();
        storage.commit(writes).unwrap();

        let entries = storage.get_entries(&AccountId::new("alice")).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().enumerate().all(|(i, e)| e.sequence == i as u64));

        // Length prefix keeps "alice" from swallowing "alicia"
        assert_eq!(storage.get_entries(&AccountId::new("alicia")).unwrap().len(), 1);
        assert_eq!(storage.scan_all_entries().unwrap().len(), 4);
    }

    #[test]
    fn test_find_posting_by_reference() {
        let (storage, _temp) = test_storage();
        let entry = test_entry("bob", 0);

        let mut writes = WriteSet::new();
        writes.put_entry(&entry).unwrap();
        storage.commit(writes).unwrap();

        let found = storage
            .find_posting(&entry.account_id, EntryKind::Earn, &entry.reference)
            .unwrap();
        assert_eq!(found, Some(entry.clone()));

        let other_kind = storage
            .find_posting(&entry.account_id, EntryKind::Claim, &entry.reference)
            .unwrap();
        assert!(other_kind.is_none());
    }

    #[test]
    fn test_records_and_indices() {
        let (storage, _temp) = test_storage();
        let id = Uuid::now_v7();

        let mut writes = WriteSet::new();
        writes.put_record(WIDGETS, &id, &"blue".to_string()).unwrap();
        writes.put_index(b"widget/blue".to_vec(), id.as_bytes().to_vec());
        storage.commit(writes).unwrap();

        let record: Option<String> = storage.get_record(WIDGETS, &id).unwrap();
        assert_eq!(record.as_deref(), Some("blue"));

        let all: Vec<String> = storage.scan_records(WIDGETS).unwrap();
        assert_eq!(all.len(), 1);

        assert_eq!(storage.get_index(b"widget/blue").unwrap(), Some(id.as_bytes().to_vec()));
        assert_eq!(storage.scan_index(b"widget/").unwrap().len(), 1);
        assert_eq!(storage.scan_index_ids(b"widget/").unwrap(), vec![id]);
    }

    #[test]
    fn test_account_index_keys_do_not_overlap() {
        let id = Uuid::now_v7();
        let alice = account_index_key(b"owned/", &AccountId::new("alice"), &id);
        let alicia_prefix = account_index_prefix(b"owned/", &AccountId::new("alicia"));
        assert!(!alice.starts_with(&alicia_prefix));
        assert!(alice.starts_with(&account_index_prefix(b"owned/", &AccountId::new("alice"))));
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };

        {
            let storage = Storage::open(&config).unwrap();
            let mut writes = WriteSet::new();
            writes.put_entry(&test_entry("carol", 0)).unwrap();
            storage.commit(writes).unwrap();
        }

        let storage = Storage::open(&config).unwrap();
        assert_eq!(storage.get_entries(&AccountId::new("carol")).unwrap().len(), 1);
    }
}
