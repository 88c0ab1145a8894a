use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identifier::{generate_datastore_name, generate_token, ObjectId};

/// Datastore used by accounts that were never given one of their own.
pub const DEFAULT_DATASTORE: &str = "default.redb";

/// Scope that admits a caller to every path.
pub const ADMIN_SCOPE: &str = "admin";

/// Scope marking a rule as open to unauthenticated callers.
pub const PUBLIC_SCOPE: &str = "public";

// ---------------------------------------------------------------------------
// PermissionSet
// ---------------------------------------------------------------------------

/// Deduplicated set of scope strings held by an account.
///
/// Persisted as a JSON list; duplicates collapse on load. Iteration order is
/// lexicographic, which also fixes the order of [`PermissionSet::raw`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set-union with `perms`.
    pub fn grant<I, S>(&mut self, perms: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.extend(perms.into_iter().map(Into::into));
    }

    /// Set-difference with `perms`.
    pub fn revoke<I, S>(&mut self, perms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for perm in perms {
            self.0.remove(perm.as_ref());
        }
    }

    pub fn contains(&self, perm: &str) -> bool {
        self.0.contains(perm)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The comma-joined string form the policy engine matches against.
    pub fn raw(&self) -> String {
        self.iter().collect::<Vec<_>>().join(",")
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.grant(iter);
        set
    }
}

// ---------------------------------------------------------------------------
// AccountRecord
// ---------------------------------------------------------------------------

/// An identity that owns a tenant store.
///
/// The token doubles as the primary storage key and never changes after
/// creation. `datastore` may be empty, in which case the shared
/// [`DEFAULT_DATASTORE`] is used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    #[serde(rename = "access-token")]
    pub token: String,
    #[serde(default)]
    pub datastore: String,
    #[serde(default)]
    pub permissions: PermissionSet,
}

impl AccountRecord {
    /// Provision a new account with fresh id, token and datastore name.
    pub fn generate() -> Self {
        Self {
            id: ObjectId::generate().to_string(),
            token: generate_token(),
            datastore: generate_datastore_name(),
            permissions: PermissionSet::new(),
        }
    }

    /// The datastore this account's requests are served from.
    pub fn datastore_name(&self) -> &str {
        if self.datastore.is_empty() {
            DEFAULT_DATASTORE
        } else {
            &self.datastore
        }
    }

    /// Point the account at another datastore. Empty names are ignored.
    pub fn set_datastore(&mut self, datastore: impl Into<String>) {
        let datastore = datastore.into();
        if !datastore.is_empty() {
            self.datastore = datastore;
        }
    }

    pub fn has_permission(&self, perm: &str) -> bool {
        self.permissions.contains(perm)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn from_json(data: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
