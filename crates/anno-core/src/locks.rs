//! Page lock table
//!
//! Maps page ids to the client holding them. Existence of an entry is
//! the lock; removing it is the only way to unlock. The table carries
//! its own reader-writer lock, separate from the store's data lock, so
//! lock bookkeeping and data reads never wait on each other.
//!
//! When both are needed, the data lock is always taken first.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;
use tracing::info;

use crate::models::ClientId;
use crate::storage::{StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct LockTable {
    entries: RwLock<HashMap<String, ClientId>>,
}

fn require_connection_id(client: &ClientId) -> StoreResult<()> {
    if client.id.trim().is_empty() {
        return Err(StoreError::EmptyClientId(client.clone()));
    }
    Ok(())
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a page for a client
    ///
    /// Fails with `AlreadyLocked` if anyone, including the caller, holds it.
    pub fn lock(&self, page_id: &str, client: &ClientId) -> StoreResult<()> {
        require_connection_id(client)?;
        let mut entries = self.entries.write();
        if let Some(holder) = entries.get(page_id) {
            return Err(StoreError::AlreadyLocked {
                page_id: page_id.to_string(),
                holder: holder.clone(),
            });
        }
        entries.insert(page_id.to_string(), client.clone());
        info!("Lock {} {}", page_id, client);
        Ok(())
    }

    /// Release a page lock held by a user
    ///
    /// Ownership is checked by user name only, so a reconnected client
    /// can release locks taken under its previous connection.
    pub fn unlock(&self, page_id: &str, client: &ClientId) -> StoreResult<()> {
        require_connection_id(client)?;
        let mut entries = self.entries.write();
        match entries.get(page_id) {
            None => Err(StoreError::NotLocked {
                page_id: page_id.to_string(),
            }),
            Some(holder) if holder.user_name != client.user_name => Err(StoreError::WrongOwner {
                page_id: page_id.to_string(),
                client: client.clone(),
            }),
            Some(_) => {
                entries.remove(page_id);
                info!("Unlock {} {}", page_id, client);
                Ok(())
            }
        }
    }

    /// Release every lock held by exactly this client (connection and user)
    ///
    /// Returns the number of locks released.
    pub fn unlock_all(&self, client: &ClientId) -> StoreResult<usize> {
        require_connection_id(client)?;
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, holder| holder != client);
        let released = before - entries.len();
        if released > 0 {
            info!("Unlocked {} page(s) held by {}", released, client);
        }
        Ok(released)
    }

    pub fn is_locked(&self, page_id: &str) -> bool {
        self.entries.read().contains_key(page_id)
    }

    /// Client holding a page, if any
    pub fn holder(&self, page_id: &str) -> Option<ClientId> {
        self.entries.read().get(page_id).cloned()
    }

    /// Distinct clients holding at least one lock, sorted
    pub fn holders(&self) -> Vec<ClientId> {
        let entries = self.entries.read();
        let unique: BTreeSet<&ClientId> = entries.values().collect();
        unique.into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Consistent copy of the table, ordered by page id
    pub fn snapshot(&self) -> BTreeMap<String, ClientId> {
        self.entries
            .read()
            .iter()
            .map(|(page, client)| (page.clone(), client.clone()))
            .collect()
    }
}
