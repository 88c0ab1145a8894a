use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// Number of random bytes behind an access token or datastore name.
const SECRET_BYTES: usize = 32;

/// File suffix given to generated tenant datastore names.
pub const DATASTORE_SUFFIX: &str = ".redb";

/// Random 128-bit identifier for stored objects and accounts.
///
/// Rendered as 36 lowercase characters in 8-4-4-4-12 groups. All 128 bits
/// come from the OS random source; no version or variant bits are forced,
/// so the value is a UUID in shape only.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Draw a fresh identifier from the OS random source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse the canonical 36-character grouped-hex form.
    ///
    /// Uppercase, braced and unhyphenated spellings are rejected so that
    /// every accepted string is byte-identical to its stored key.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let uuid = Uuid::try_parse(s).map_err(|_| TypeError::InvalidObjectId(s.to_string()))?;
        let canonical = Self(uuid);
        if canonical.to_string() != s {
            return Err(TypeError::InvalidObjectId(s.to_string()));
        }
        Ok(canonical)
    }

    /// The raw 16 bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_string()
    }
}

/// Generate a hex-encoded access token (64 characters).
pub fn generate_token() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a fresh tenant datastore file name.
pub fn generate_datastore_name() -> String {
    format!("{}{DATASTORE_SUFFIX}", generate_token())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn generated_id_is_canonical() {
        let id = ObjectId::generate();
        let s = id.to_string();
        assert_eq!(s.len(), 36);
        let groups: Vec<usize> = s.split('-').map(str::len).collect();
        assert_eq!(groups, vec![8, 4, 4, 4, 12]);
        assert!(s.chars().all(|c| c == '-' || c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(ObjectId::generate(), ObjectId::generate());
    }

    #[test]
    fn parse_rejects_non_canonical_forms() {
        let id = ObjectId::generate();
        let s = id.to_string();
        assert_eq!(ObjectId::parse(&s).unwrap(), id);
        assert!(ObjectId::parse("0A1B2C3D-4E5F-6071-8293-A4B5C6D7E8F9").is_err());
        assert!(ObjectId::parse(&s.replace('-', "")).is_err());
        assert!(ObjectId::parse(&format!("{{{s}}}")).is_err());
        assert!(ObjectId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn serde_uses_string_form() {
        let id = ObjectId::parse("0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9\"");
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn token_and_datastore_shapes() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(hex::decode(&token).is_ok());

        let name = generate_datastore_name();
        assert!(name.ends_with(DATASTORE_SUFFIX));
        assert_eq!(name.len(), 64 + DATASTORE_SUFFIX.len());
    }

    proptest! {
        #[test]
        fn any_bytes_render_and_parse(bytes in any::<[u8; 16]>()) {
            let id = ObjectId(Uuid::from_bytes(bytes));
            let parsed = ObjectId::parse(&id.to_string()).unwrap();
            prop_assert_eq!(parsed.as_bytes(), &bytes);
        }
    }
}
