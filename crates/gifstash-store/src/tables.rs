//! Table names and schema-aware table access.
//!
//! Names are part of the on-disk format and must stay stable across
//! restarts. Write transactions create tables on first use; read
//! transactions report a missing table as [`StoreError::TableMissing`].

use redb::{
    Key, ReadOnlyTable, ReadTransaction, Table, TableDefinition, TableError, Value,
    WriteTransaction,
};

use crate::error::{StoreError, StoreResult};

/// Account records keyed by access token.
pub const ACCOUNTS_BY_TOKEN: TableDefinition<&str, &[u8]> =
    TableDefinition::new("accounts-by-token");

/// Secondary index: account id -> access token.
pub const ACCOUNT_ID_INDEX: TableDefinition<&str, &str> = TableDefinition::new("account-id-index");

/// Path pattern -> comma-separated required scopes.
pub const PERMISSION_RULES: TableDefinition<&str, &str> = TableDefinition::new("permission-rules");

/// Object id -> image bytes, shared by every namespace.
pub const OBJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("objects");

/// Namespace name -> unit.
pub const NAMESPACE_REGISTRY: TableDefinition<&str, ()> =
    TableDefinition::new("namespace-registry");

const NAMESPACE_MEMBERS_PREFIX: &str = "namespace-members:";

/// Name of the membership table for `namespace`.
pub fn namespace_members_name(namespace: &str) -> String {
    format!("{NAMESPACE_MEMBERS_PREFIX}{namespace}")
}

/// Open `definition` inside a write transaction, creating it if absent.
pub fn write_table<'txn, K: Key + 'static, V: Value + 'static>(
    txn: &'txn WriteTransaction,
    definition: TableDefinition<K, V>,
) -> StoreResult<Table<'txn, K, V>> {
    Ok(txn.open_table(definition)?)
}

/// Open `definition` inside a read transaction.
pub fn read_table<K: Key + 'static, V: Value + 'static>(
    txn: &ReadTransaction,
    definition: TableDefinition<K, V>,
) -> StoreResult<ReadOnlyTable<K, V>> {
    match txn.open_table(definition) {
        Ok(table) => Ok(table),
        Err(TableError::TableDoesNotExist(name)) => Err(StoreError::TableMissing(name)),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redb::{Database, ReadableTable};

    fn temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::create(dir.path().join("tables.redb")).unwrap();
        (dir, db)
    }

    #[test]
    fn read_of_missing_table_is_reported() {
        let (_dir, db) = temp_db();
        let txn = db.begin_read().unwrap();
        let err = read_table(&txn, PERMISSION_RULES).unwrap_err();
        match err {
            StoreError::TableMissing(name) => assert_eq!(name, "permission-rules"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn write_creates_table_for_later_reads() {
        let (_dir, db) = temp_db();
        let txn = db.begin_write().unwrap();
        {
            let mut rules = write_table(&txn, PERMISSION_RULES).unwrap();
            rules.insert("/gifs.*", "gifs-api").unwrap();
        }
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let rules = read_table(&txn, PERMISSION_RULES).unwrap();
        assert_eq!(rules.get("/gifs.*").unwrap().unwrap().value(), "gifs-api");
    }

    #[test]
    fn members_table_name_is_prefixed() {
        assert_eq!(namespace_members_name("cats"), "namespace-members:cats");
    }
}
