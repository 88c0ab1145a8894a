//! Account records in the configuration store.
//!
//! Every account lives under its access token in `accounts-by-token`, with
//! `account-id-index` mapping its id back to the token. Both entries are
//! written or removed in the same write transaction.

use std::sync::Arc;

use gifstash_store::primitives::{delete_record, load_json, load_raw, save_json};
use gifstash_store::tables::{read_table, write_table, ACCOUNTS_BY_TOKEN, ACCOUNT_ID_INDEX};
use gifstash_store::{Database, StoreError};
use gifstash_types::{AccountRecord, ADMIN_SCOPE};
use redb::{ReadableTable, WriteTransaction};
use tracing::{debug, info};

use crate::error::{GateError, GateResult};

/// How an update names the account it applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountKey<'a> {
    Id(&'a str),
    Token(&'a str),
}

impl AccountKey<'_> {
    fn as_str(&self) -> &str {
        match self {
            Self::Id(value) | Self::Token(value) => value,
        }
    }
}

/// Account management over the shared configuration database.
#[derive(Clone)]
pub struct AccountStore {
    db: Arc<Database>,
}

impl AccountStore {
    /// Wrap `db`, creating the account tables if they do not exist yet.
    pub fn open(db: Arc<Database>) -> GateResult<Self> {
        let txn = db.begin_write()?;
        write_table(&txn, ACCOUNTS_BY_TOKEN)?;
        write_table(&txn, ACCOUNT_ID_INDEX)?;
        txn.commit()?;
        Ok(Self { db })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Create and persist a fresh account holding `permissions`.
    pub fn create_account<I, S>(&self, permissions: I) -> GateResult<AccountRecord>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut account = AccountRecord::generate();
        account.permissions.grant(permissions);
        let txn = self.db.begin_write()?;
        persist(&txn, &account)?;
        txn.commit()?;
        info!(id = %account.id, "created account");
        Ok(account)
    }

    /// The account owning `token`, if any.
    pub fn find_by_token(&self, token: &str) -> GateResult<Option<AccountRecord>> {
        let txn = self.db.begin_read()?;
        let accounts = read_table(&txn, ACCOUNTS_BY_TOKEN)?;
        match load_json(&accounts, token) {
            Ok(account) => Ok(Some(account)),
            Err(StoreError::RecordNotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// The account with id `id`.
    pub fn find_by_id(&self, id: &str) -> GateResult<AccountRecord> {
        let raw = self.find_raw_by_id(id)?;
        Ok(AccountRecord::from_json(&raw).map_err(StoreError::from)?)
    }

    /// The stored JSON of the account with id `id`, byte for byte.
    pub fn find_raw_by_id(&self, id: &str) -> GateResult<Vec<u8>> {
        let txn = self.db.begin_read()?;
        let index = read_table(&txn, ACCOUNT_ID_INDEX)?;
        let token = match index.get(id)? {
            Some(guard) => guard.value().to_string(),
            None => return Err(GateError::AccountNotFound(id.to_string())),
        };
        let accounts = read_table(&txn, ACCOUNTS_BY_TOKEN)?;
        match load_raw(&accounts, &token) {
            Ok(raw) => Ok(raw),
            Err(StoreError::RecordNotFound(_)) => Err(GateError::AccountNotFound(id.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    /// Every account id in key order.
    pub fn list_ids(&self) -> GateResult<Vec<String>> {
        let txn = self.db.begin_read()?;
        let index = read_table(&txn, ACCOUNT_ID_INDEX)?;
        let mut ids = Vec::new();
        for entry in index.iter()? {
            let (id, _) = entry?;
            ids.push(id.value().to_string());
        }
        Ok(ids)
    }

    /// Add `scopes` to the account named by `key`.
    pub fn grant_permissions(&self, key: AccountKey<'_>, scopes: &[String]) -> GateResult<AccountRecord> {
        self.update(key, |account| account.permissions.grant(scopes.iter().cloned()))
    }

    /// Remove `scopes` from the account named by `key`.
    pub fn revoke_permissions(&self, key: AccountKey<'_>, scopes: &[String]) -> GateResult<AccountRecord> {
        self.update(key, |account| account.permissions.revoke(scopes))
    }

    /// Point the account named by `key` at `datastore`. Empty names are ignored.
    pub fn set_datastore(&self, key: AccountKey<'_>, datastore: &str) -> GateResult<AccountRecord> {
        self.update(key, |account| account.set_datastore(datastore))
    }

    /// Delete the account with id `id` and its index entry.
    pub fn revoke_account(&self, id: &str) -> GateResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut index = write_table(&txn, ACCOUNT_ID_INDEX)?;
            let token = match index.remove(id)? {
                Some(guard) => guard.value().to_string(),
                None => return Err(GateError::AccountNotFound(id.to_string())),
            };
            let mut accounts = write_table(&txn, ACCOUNTS_BY_TOKEN)?;
            delete_record(&mut accounts, &token)?;
        }
        txn.commit()?;
        info!(id, "revoked account");
        Ok(())
    }

    /// Number of accounts holding exactly `scope`.
    pub fn count_with_permission(&self, scope: &str) -> GateResult<usize> {
        let txn = self.db.begin_read()?;
        let accounts = read_table(&txn, ACCOUNTS_BY_TOKEN)?;
        let mut count = 0;
        for entry in accounts.iter()? {
            let (_, raw) = entry?;
            let account = AccountRecord::from_json(raw.value()).map_err(StoreError::from)?;
            if account.has_permission(scope) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Create an administrator unless one already exists.
    ///
    /// The scan and the insert share one write transaction, so concurrent
    /// callers cannot both create an administrator. `announce` runs before
    /// the commit; if it fails the new account is never persisted.
    pub fn ensure_administrator<F>(&self, announce: F) -> GateResult<Option<AccountRecord>>
    where
        F: FnOnce(&AccountRecord) -> GateResult<()>,
    {
        let txn = self.db.begin_write()?;
        let exists = {
            let accounts = write_table(&txn, ACCOUNTS_BY_TOKEN)?;
            let mut found = false;
            for entry in accounts.iter()? {
                let (_, raw) = entry?;
                let account = AccountRecord::from_json(raw.value()).map_err(StoreError::from)?;
                if account.has_permission(ADMIN_SCOPE) {
                    found = true;
                    break;
                }
            }
            found
        };
        if exists {
            debug!("administrator already provisioned");
            return Ok(None);
        }

        let mut admin = AccountRecord::generate();
        admin.permissions.grant([ADMIN_SCOPE]);
        persist(&txn, &admin)?;
        announce(&admin)?;
        txn.commit()?;
        info!(id = %admin.id, "created administrator account");
        Ok(Some(admin))
    }

    fn update<F>(&self, key: AccountKey<'_>, apply: F) -> GateResult<AccountRecord>
    where
        F: FnOnce(&mut AccountRecord),
    {
        let not_found = || GateError::AccountNotFound(key.as_str().to_string());
        let txn = self.db.begin_write()?;
        let mut account: AccountRecord = {
            let token = match key {
                AccountKey::Token(token) => token.to_string(),
                AccountKey::Id(id) => {
                    let index = write_table(&txn, ACCOUNT_ID_INDEX)?;
                    let found = index.get(id)?.map(|guard| guard.value().to_string());
                    found.ok_or_else(not_found)?
                }
            };
            let accounts = write_table(&txn, ACCOUNTS_BY_TOKEN)?;
            match load_json(&accounts, &token) {
                Ok(account) => account,
                Err(StoreError::RecordNotFound(_)) => return Err(not_found()),
                Err(err) => return Err(err.into()),
            }
        };
        apply(&mut account);
        persist(&txn, &account)?;
        txn.commit()?;
        debug!(id = %account.id, "updated account");
        Ok(account)
    }
}

impl std::fmt::Debug for AccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountStore").finish_non_exhaustive()
    }
}

/// Write the record and its id index entry inside `txn`.
fn persist(txn: &WriteTransaction, account: &AccountRecord) -> GateResult<()> {
    let mut accounts = write_table(txn, ACCOUNTS_BY_TOKEN)?;
    save_json(&mut accounts, &account.token, account)?;
    let mut index = write_table(txn, ACCOUNT_ID_INDEX)?;
    index.insert(account.id.as_str(), account.token.as_str())?;
    Ok(())
}
