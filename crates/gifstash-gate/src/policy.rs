//! Path permission rules.
//!
//! A rule pairs a regular expression with a required scope string. A
//! request is admitted when any rule's pattern occurs somewhere in the path
//! and the caller's raw permission string satisfies the rule's scope.

use std::collections::HashMap;
use std::sync::Arc;

use gifstash_store::tables::{read_table, write_table, PERMISSION_RULES};
use gifstash_store::Database;
use gifstash_types::{ADMIN_SCOPE, PUBLIC_SCOPE};
use parking_lot::Mutex;
use redb::ReadableTable;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GateError, GateResult};

/// One stored rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub pattern: String,
    pub scope: String,
}

impl PermissionRule {
    pub fn new(pattern: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            scope: scope.into(),
        }
    }
}

/// Rules seeded into a fresh configuration store.
pub fn default_rules() -> Vec<PermissionRule> {
    vec![
        PermissionRule::new("/gifs/[a-z]+/random", PUBLIC_SCOPE),
        PermissionRule::new(
            "/gifs/[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
            PUBLIC_SCOPE,
        ),
        PermissionRule::new("/gifs.*", "gifs-api"),
        PermissionRule::new("/admin.*", "admin-api"),
    ]
}

/// Whether `actual` (a raw permission string) satisfies `required`.
///
/// A required string containing `public` is satisfied by anyone. Otherwise
/// it is split on commas and any piece occurring inside `actual` suffices.
/// Matching is by substring on both sides, so an empty piece matches too.
pub fn has_sufficient_permissions(required: &str, actual: &str) -> bool {
    if required.contains(PUBLIC_SCOPE) {
        return true;
    }
    required.split(',').any(|piece| actual.contains(piece))
}

/// Evaluates requests against the rules in the configuration store.
pub struct PolicyEngine {
    db: Arc<Database>,
    compiled: Mutex<HashMap<String, Regex>>,
}

impl PolicyEngine {
    /// Wrap `db`, creating the rules table if it does not exist yet.
    pub fn open(db: Arc<Database>) -> GateResult<Self> {
        let txn = db.begin_write()?;
        write_table(&txn, PERMISSION_RULES)?;
        txn.commit()?;
        Ok(Self {
            db,
            compiled: Mutex::new(HashMap::new()),
        })
    }

    /// Insert or replace the rule for `pattern`.
    pub fn set_rule(&self, pattern: &str, scope: &str) -> GateResult<()> {
        let regex = Regex::new(pattern).map_err(|e| GateError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let txn = self.db.begin_write()?;
        {
            let mut rules = write_table(&txn, PERMISSION_RULES)?;
            rules.insert(pattern, scope)?;
        }
        txn.commit()?;
        self.compiled.lock().insert(pattern.to_string(), regex);
        debug!(pattern, scope, "stored permission rule");
        Ok(())
    }

    /// Store every rule in `rules`, replacing existing entries.
    pub fn seed(&self, rules: &[PermissionRule]) -> GateResult<()> {
        for rule in rules {
            self.set_rule(&rule.pattern, &rule.scope)?;
        }
        Ok(())
    }

    /// All rules in pattern key order.
    pub fn rules(&self) -> GateResult<Vec<PermissionRule>> {
        let txn = self.db.begin_read()?;
        let table = read_table(&txn, PERMISSION_RULES)?;
        let mut rules = Vec::new();
        for entry in table.iter()? {
            let (pattern, scope) = entry?;
            rules.push(PermissionRule::new(pattern.value(), scope.value()));
        }
        Ok(rules)
    }

    /// Whether a caller holding `permissions` may access `path`.
    ///
    /// Callers whose raw permission string contains `admin` are admitted
    /// without consulting the rules.
    pub fn is_authorized(&self, path: &str, permissions: &str) -> GateResult<bool> {
        if permissions.contains(ADMIN_SCOPE) {
            return Ok(true);
        }
        for rule in self.rules()? {
            let Some(regex) = self.compiled(&rule.pattern) else {
                continue;
            };
            if regex.is_match(path) && has_sufficient_permissions(&rule.scope, permissions) {
                debug!(path, pattern = %rule.pattern, "request matched rule");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn compiled(&self, pattern: &str) -> Option<Regex> {
        let mut cache = self.compiled.lock();
        if let Some(regex) = cache.get(pattern) {
            return Some(regex.clone());
        }
        match Regex::new(pattern) {
            Ok(regex) => {
                cache.insert(pattern.to_string(), regex.clone());
                Some(regex)
            }
            Err(err) => {
                warn!(pattern, error = %err, "skipping rule with invalid pattern");
                None
            }
        }
    }
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("compiled", &self.compiled.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_engine() -> (tempfile::TempDir, PolicyEngine) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::create(dir.path().join("config.redb")).unwrap();
        let engine = PolicyEngine::open(Arc::new(db)).unwrap();
        (dir, engine)
    }

    #[test]
    fn public_requirement_admits_everyone() {
        assert!(has_sufficient_permissions("public", ""));
        assert!(has_sufficient_permissions("x,public", "nothing"));
    }

    #[test]
    fn any_required_piece_suffices() {
        assert!(has_sufficient_permissions("a,b", "b"));
        assert!(has_sufficient_permissions("gifs-api", "admin-api,gifs-api"));
        assert!(!has_sufficient_permissions("gifs-api", "admin-api"));
    }

    #[test]
    fn pieces_match_by_substring() {
        assert!(has_sufficient_permissions("gifs", "gifs-api"));
        assert!(has_sufficient_permissions("a,", "zzz"));
    }

    #[test]
    fn admin_substring_bypasses_rules() {
        let (_dir, engine) = open_engine();
        assert!(engine.is_authorized("/anything", "admin").unwrap());
        assert!(engine.is_authorized("/anything", "super-admin-ish").unwrap());
    }

    #[test]
    fn empty_rule_set_denies_non_admin() {
        let (_dir, engine) = open_engine();
        assert!(!engine.is_authorized("/gifs", "gifs-api").unwrap());
        assert!(!engine.is_authorized("/gifs", "").unwrap());
    }

    #[test]
    fn default_rules_cover_public_and_api_paths() {
        let (_dir, engine) = open_engine();
        engine.seed(&default_rules()).unwrap();

        assert!(engine.is_authorized("/gifs/cats/random", "").unwrap());
        assert!(engine
            .is_authorized("/gifs/0f8fad5b-d9cb-469f-a165-70867728950e", "")
            .unwrap());
        assert!(!engine.is_authorized("/gifs", "").unwrap());
        assert!(engine.is_authorized("/gifs", "gifs-api").unwrap());
        assert!(!engine.is_authorized("/admin/accounts", "gifs-api").unwrap());
        assert!(engine.is_authorized("/admin/accounts", "admin-api").unwrap());
    }

    #[test]
    fn pattern_matches_anywhere_in_path() {
        let (_dir, engine) = open_engine();
        engine.set_rule("/gifs/[a-z]+/random", "public").unwrap();
        assert!(engine.is_authorized("/t/acct/gifs/cats/random/3", "").unwrap());
    }

    #[test]
    fn set_rule_replaces_existing_scope() {
        let (_dir, engine) = open_engine();
        engine.set_rule("/gifs.*", "gifs-api").unwrap();
        engine.set_rule("/gifs.*", "other").unwrap();
        assert_eq!(engine.rules().unwrap(), vec![PermissionRule::new("/gifs.*", "other")]);
    }

    #[test]
    fn invalid_pattern_is_rejected_without_storing() {
        let (_dir, engine) = open_engine();
        let err = engine.set_rule("/gifs/(", "x").unwrap_err();
        assert!(matches!(err, GateError::InvalidPattern { .. }));
        assert!(engine.rules().unwrap().is_empty());
    }

    #[test]
    fn rules_list_in_key_order() {
        let (_dir, engine) = open_engine();
        engine.seed(&default_rules()).unwrap();
        let patterns: Vec<String> = engine.rules().unwrap().into_iter().map(|r| r.pattern).collect();
        let mut sorted = patterns.clone();
        sorted.sort();
        assert_eq!(patterns, sorted);
        assert_eq!(patterns.len(), 4);
    }

    #[test]
    fn stored_invalid_pattern_is_skipped() {
        let (_dir, engine) = open_engine();
        let txn = engine.db.begin_write().unwrap();
        {
            let mut rules = write_table(&txn, PERMISSION_RULES).unwrap();
            rules.insert("[", "public").unwrap();
            rules.insert("/ok", "public").unwrap();
        }
        txn.commit().unwrap();

        assert!(engine.is_authorized("/ok", "").unwrap());
        assert!(!engine.is_authorized("/other", "").unwrap());
    }
}
