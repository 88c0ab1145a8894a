//! Typed record access over `&str`-keyed byte tables.

use redb::{ReadableTable, Table};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// Serialize `record` as JSON and store it under `key`.
pub fn save_json<T: Serialize>(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    key: &str,
    record: &T,
) -> StoreResult<()> {
    let data = serde_json::to_vec(record)?;
    table.insert(key, data.as_slice())?;
    Ok(())
}

/// Load and deserialize the JSON record stored under `key`.
pub fn load_json<T, R>(table: &R, key: &str) -> StoreResult<T>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let data = load_raw(table, key)?;
    Ok(serde_json::from_slice(&data)?)
}

/// Load the bytes stored under `key`.
pub fn load_raw<R>(table: &R, key: &str) -> StoreResult<Vec<u8>>
where
    R: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key)? {
        Some(guard) => Ok(guard.value().to_vec()),
        None => Err(StoreError::RecordNotFound(key.to_string())),
    }
}

/// Remove the record under `key`. Returns `true` if it existed.
pub fn delete_record<V: redb::Value + 'static>(
    table: &mut Table<'_, &'static str, V>,
    key: &str,
) -> StoreResult<bool> {
    Ok(table.remove(key)?.is_some())
}
