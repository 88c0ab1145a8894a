//! Namespaced object store.
//!
//! Objects live once in the `objects` table. Each namespace owns a
//! membership table of object ids and is listed in `namespace-registry`.

use std::collections::HashSet;

use gifstash_types::ObjectId;
use rand::Rng;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::debug;

use crate::codec::ImagePayload;
use crate::error::{StoreError, StoreResult};
use crate::tables::{
    namespace_members_name, read_table, write_table, NAMESPACE_REGISTRY, OBJECTS,
};

/// Consecutive duplicate draws tolerated before sampling gives up.
pub const MAX_SAMPLE_COLLISIONS: usize = 100;

/// Choose up to `min(n, size)` distinct ordinals in `[0, size)`, ascending.
///
/// Rejection sampling: draws that hit an already chosen ordinal are retried,
/// and the loop is abandoned after [`MAX_SAMPLE_COLLISIONS`] consecutive
/// misses. In that degenerate case fewer ordinals than requested come back.
pub fn sample_ordinals<R: Rng + ?Sized>(size: usize, n: usize, rng: &mut R) -> Vec<usize> {
    let wanted = n.min(size);
    let mut chosen = HashSet::with_capacity(wanted);
    let mut ordinals = Vec::with_capacity(wanted);
    let mut collisions = 0;
    while ordinals.len() < wanted && collisions <= MAX_SAMPLE_COLLISIONS {
        let candidate = rng.gen_range(0..size);
        if chosen.insert(candidate) {
            ordinals.push(candidate);
            collisions = 0;
        } else {
            collisions += 1;
        }
    }
    ordinals.sort_unstable();
    ordinals
}

/// Object operations over one tenant database.
pub struct NamespaceStore<'db> {
    db: &'db Database,
}

impl<'db> NamespaceStore<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Create the shared tables so read transactions can rely on them.
    pub fn initialize(&self) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        write_table(&txn, OBJECTS)?;
        write_table(&txn, NAMESPACE_REGISTRY)?;
        txn.commit()?;
        Ok(())
    }

    /// Store a validated payload under a fresh id in `namespace`.
    ///
    /// Object bytes, membership and registry entry are written in that order
    /// inside a single write transaction.
    pub fn store_object(&self, namespace: &str, payload: &ImagePayload) -> StoreResult<ObjectId> {
        let id = ObjectId::generate();
        let key = id.to_string();
        let members_name = namespace_members_name(namespace);
        let members_def: TableDefinition<&str, ()> = TableDefinition::new(&members_name);

        let txn = self.db.begin_write()?;
        {
            let mut objects = write_table(&txn, OBJECTS)?;
            objects.insert(key.as_str(), payload.as_bytes())?;
        }
        {
            let mut members = write_table(&txn, members_def)?;
            members.insert(key.as_str(), ())?;
        }
        {
            let mut registry = write_table(&txn, NAMESPACE_REGISTRY)?;
            registry.insert(namespace, ())?;
        }
        txn.commit()?;

        debug!(namespace, id = %id, bytes = payload.len(), "stored object");
        Ok(id)
    }

    /// Bytes of the object stored under `id`.
    pub fn retrieve_object(&self, id: &str) -> StoreResult<Vec<u8>> {
        let txn = self.db.begin_read()?;
        let objects = read_table(&txn, OBJECTS)?;
        let found = objects.get(id)?.map(|guard| guard.value().to_vec());
        found.ok_or_else(|| StoreError::ObjectNotFound(id.to_string()))
    }

    /// Namespace names in key order.
    pub fn list_namespaces(&self) -> StoreResult<Vec<String>> {
        let txn = self.db.begin_read()?;
        let registry = read_table(&txn, NAMESPACE_REGISTRY)?;
        let mut names = Vec::with_capacity(registry.len()? as usize);
        for entry in registry.iter()? {
            let (name, _) = entry?;
            names.push(name.value().to_string());
        }
        Ok(names)
    }

    /// Number of members in `namespace`.
    pub fn namespace_size(&self, namespace: &str) -> StoreResult<usize> {
        let members_name = namespace_members_name(namespace);
        let members_def: TableDefinition<&str, ()> = TableDefinition::new(&members_name);
        let txn = self.db.begin_read()?;
        let members = Self::open_members(&txn, members_def, namespace)?;
        Ok(members.len()? as usize)
    }

    /// Up to `n` distinct members of `namespace`, ordered by ordinal position.
    ///
    /// Selection is uniform over lexicographic position among member ids,
    /// not over insertion time. Count and scan share one read snapshot.
    pub fn sample_namespace(&self, namespace: &str, n: usize) -> StoreResult<Vec<ObjectId>> {
        let members_name = namespace_members_name(namespace);
        let members_def: TableDefinition<&str, ()> = TableDefinition::new(&members_name);
        let txn = self.db.begin_read()?;
        let members = Self::open_members(&txn, members_def, namespace)?;

        let size = members.len()? as usize;
        let ordinals = sample_ordinals(size, n, &mut rand::thread_rng());

        let mut picked = Vec::with_capacity(ordinals.len());
        let mut wanted = ordinals.iter().copied().peekable();
        for (position, entry) in members.iter()?.enumerate() {
            let Some(&next) = wanted.peek() else { break };
            let (key, _) = entry?;
            if position == next {
                picked.push(ObjectId::parse(key.value())?);
                wanted.next();
            }
        }
        Ok(picked)
    }

    fn open_members(
        txn: &redb::ReadTransaction,
        definition: TableDefinition<&'static str, ()>,
        namespace: &str,
    ) -> StoreResult<redb::ReadOnlyTable<&'static str, ()>> {
        match read_table(txn, definition) {
            Err(StoreError::TableMissing(_)) => {
                Err(StoreError::NamespaceNotFound(namespace.to_string()))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::tiny_gif;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn open_store() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::create(dir.path().join("objects.redb")).unwrap();
        NamespaceStore::new(&db).initialize().unwrap();
        (dir, db)
    }

    fn payload(seed: u8) -> ImagePayload {
        ImagePayload::decode(tiny_gif(seed)).unwrap()
    }

    // -----------------------------------------------------------------------
    // Ordinal sampling
    // -----------------------------------------------------------------------

    #[test]
    fn ordinals_are_distinct_sorted_and_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 0..12 {
            let picked = sample_ordinals(8, n, &mut rng);
            assert_eq!(picked.len(), n.min(8));
            assert!(picked.windows(2).all(|w| w[0] < w[1]));
            assert!(picked.iter().all(|&p| p < 8));
        }
    }

    #[test]
    fn ordinals_of_empty_range_are_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_ordinals(0, 5, &mut rng).is_empty());
    }

    /// Always yields zero, so every draw after the first collides.
    struct StuckRng;

    impl rand::RngCore for StuckRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            dest.fill(0);
            Ok(())
        }
    }

    #[test]
    fn repeated_collisions_end_the_draw_early() {
        let picked = sample_ordinals(10, 5, &mut StuckRng);
        assert_eq!(picked, vec![0]);
    }

    #[test]
    fn ordinals_are_roughly_uniform() {
        let mut rng = StdRng::seed_from_u64(42);
        let size = 10;
        let trials = 20_000;
        let mut hits = vec![0usize; size];
        for _ in 0..trials {
            for p in sample_ordinals(size, 3, &mut rng) {
                hits[p] += 1;
            }
        }
        let expected = trials * 3 / size;
        for count in hits {
            let deviation = (count as f64 - expected as f64).abs() / expected as f64;
            assert!(deviation < 0.1, "count {count} too far from {expected}");
        }
    }

    // -----------------------------------------------------------------------
    // Store / retrieve
    // -----------------------------------------------------------------------

    #[test]
    fn stored_object_round_trips() {
        let (_dir, db) = open_store();
        let store = NamespaceStore::new(&db);
        let p = payload(9);
        let id = store.store_object("cats", &p).unwrap();
        assert_eq!(store.retrieve_object(&id.to_string()).unwrap(), p.as_bytes());
    }

    #[test]
    fn retrieving_unknown_id_is_not_found() {
        let (_dir, db) = open_store();
        let store = NamespaceStore::new(&db);
        let err = store.retrieve_object("00000000-0000-0000-0000-000000000000").unwrap_err();
        assert!(matches!(err, StoreError::ObjectNotFound(_)));
    }

    #[test]
    fn listing_follows_key_order() {
        let (_dir, db) = open_store();
        let store = NamespaceStore::new(&db);
        assert!(store.list_namespaces().unwrap().is_empty());

        store.store_object("cats", &payload(1)).unwrap();
        assert_eq!(store.list_namespaces().unwrap(), vec!["cats"]);

        store.store_object("dogs", &payload(2)).unwrap();
        store.store_object("birds", &payload(3)).unwrap();
        store.store_object("cats", &payload(4)).unwrap();
        assert_eq!(store.list_namespaces().unwrap(), vec!["birds", "cats", "dogs"]);
    }

    #[test]
    fn namespaces_share_object_table_but_not_membership() {
        let (_dir, db) = open_store();
        let store = NamespaceStore::new(&db);
        let cat = store.store_object("cats", &payload(1)).unwrap();
        let dog = store.store_object("dogs", &payload(2)).unwrap();

        assert_eq!(store.namespace_size("cats").unwrap(), 1);
        assert_eq!(store.sample_namespace("cats", 10).unwrap(), vec![cat]);
        assert_eq!(store.sample_namespace("dogs", 10).unwrap(), vec![dog]);
        assert!(store.retrieve_object(&dog.to_string()).is_ok());
    }

    // -----------------------------------------------------------------------
    // Sampling
    // -----------------------------------------------------------------------

    #[test]
    fn sampling_caps_at_namespace_size() {
        let (_dir, db) = open_store();
        let store = NamespaceStore::new(&db);
        let a = store.store_object("cats", &payload(1)).unwrap();
        let b = store.store_object("cats", &payload(2)).unwrap();

        let mut picked = store.sample_namespace("cats", 5).unwrap();
        assert_eq!(picked.len(), 2);
        picked.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(picked, expected);
    }

    #[test]
    fn sampling_returns_members_in_key_order() {
        let (_dir, db) = open_store();
        let store = NamespaceStore::new(&db);
        for seed in 0..12 {
            store.store_object("cats", &payload(seed)).unwrap();
        }
        for n in 0..=6 {
            let picked = store.sample_namespace("cats", n).unwrap();
            assert_eq!(picked.len(), n);
            let keys: Vec<String> = picked.iter().map(ToString::to_string).collect();
            assert!(keys.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn sampling_zero_is_empty() {
        let (_dir, db) = open_store();
        let store = NamespaceStore::new(&db);
        store.store_object("cats", &payload(1)).unwrap();
        assert!(store.sample_namespace("cats", 0).unwrap().is_empty());
    }

    #[test]
    fn sampling_unknown_namespace_is_not_found() {
        let (_dir, db) = open_store();
        let store = NamespaceStore::new(&db);
        let err = store.sample_namespace("ghosts", 1).unwrap_err();
        assert!(matches!(err, StoreError::NamespaceNotFound(ref ns) if ns == "ghosts"));
    }

    #[test]
    fn reads_before_initialize_report_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::create(dir.path().join("bare.redb")).unwrap();
        let err = NamespaceStore::new(&db).list_namespaces().unwrap_err();
        assert!(matches!(err, StoreError::TableMissing(_)));
    }
}
