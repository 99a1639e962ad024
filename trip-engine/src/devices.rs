//! Device registry
//!
//! Devices are stored as ledger records and mutated under their owner's
//! writer right. A global identifier index keeps hardware identifiers unique.

use crate::{Device, Error, NewDevice, Result, DEVICES};
use chrono::Utc;
use ledger_core::{account_index_key, account_index_prefix, AccountId, Ledger};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const IDENTIFIER_INDEX: &[u8] = b"device-identifier/";
const ACCOUNT_INDEX: &[u8] = b"account-devices/";

fn identifier_key(identifier: &str) -> Vec<u8> {
    let mut key = IDENTIFIER_INDEX.to_vec();
    key.extend_from_slice(identifier.as_bytes());
    key
}

/// Device registry
#[derive(Debug)]
pub struct DeviceRegistry {
    ledger: Arc<Ledger>,
    // Serializes identifier check-and-insert across owners
    registration: Mutex<()>,
}

impl DeviceRegistry {
    /// Create registry over the shared ledger store
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            registration: Mutex::new(()),
        }
    }

    /// Register a device for its owner
    pub async fn register(&self, request: NewDevice) -> Result<Device> {
        let identifier = request.identifier.trim();
        if identifier.is_empty() {
            return Err(Error::Validation("device identifier must not be empty".to_string()));
        }
        if request.owner.as_str().is_empty() {
            return Err(Error::Validation("device owner must not be empty".to_string()));
        }

        let _registration = self.registration.lock().await;

        if self.ledger.storage().get_index(&identifier_key(identifier))?.is_some() {
            return Err(Error::IdentifierTaken(identifier.to_string()));
        }

        let now = Utc::now();
        let device = Device {
            id: Uuid::now_v7(),
            owner: request.owner,
            device_type: request.device_type,
            identifier: identifier.to_string(),
            name: request.name,
            registered_at: now,
            last_active_at: now,
            active: true,
        };

        let mut txn = self.ledger.begin(&device.owner).await?;
        txn.put_record(DEVICES, &device.id, &device)?;
        txn.put_index(identifier_key(identifier), device.id.as_bytes().to_vec());
        txn.put_index(
            account_index_key(ACCOUNT_INDEX, &device.owner, &device.id),
            device.id.as_bytes().to_vec(),
        );
        txn.commit()?;

        tracing::info!(
            device_id = %device.id,
            account_id = %device.owner,
            device_type = ?device.device_type,
            "Device registered"
        );
        Ok(device)
    }

    /// Look up a device
    pub fn get(&self, device_id: Uuid) -> Result<Device> {
        self.ledger
            .storage()
            .get_record(DEVICES, &device_id)?
            .ok_or(Error::DeviceNotFound(device_id))
    }

    /// Look up a device that may submit trips
    pub fn authenticate(&self, device_id: Uuid) -> Result<Device> {
        let device = self.get(device_id)?;
        if !device.active {
            return Err(Error::DeviceInactive(device_id));
        }
        Ok(device)
    }

    /// Find a device by hardware identifier
    pub fn find_by_identifier(&self, identifier: &str) -> Result<Option<Device>> {
        match self.ledger.storage().get_index(&identifier_key(identifier))? {
            Some(bytes) => {
                let device_id = Uuid::from_slice(&bytes)
                    .map_err(|e| ledger_core::Error::Storage(format!("corrupt device index: {}", e)))?;
                self.get(device_id).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Devices owned by an account
    pub fn list_for_account(&self, account_id: &AccountId) -> Result<Vec<Device>> {
        self.ledger
            .storage()
            .scan_index_ids(&account_index_prefix(ACCOUNT_INDEX, account_id))?
            .into_iter()
            .map(|device_id| self.get(device_id))
            .collect()
    }

    /// Stop accepting submissions from a device
    pub async fn deactivate(&self, device_id: Uuid) -> Result<Device> {
        let owner = self.get(device_id)?.owner;

        let mut txn = self.ledger.begin(&owner).await?;
        let mut device: Device = txn
            .storage()
            .get_record(DEVICES, &device_id)?
            .ok_or(Error::DeviceNotFound(device_id))?;

        if device.active {
            device.active = false;
            txn.put_record(DEVICES, &device.id, &device)?;
            txn.commit()?;
            tracing::info!(device_id = %device_id, account_id = %owner, "Device deactivated");
        }
        Ok(device)
    }
}
