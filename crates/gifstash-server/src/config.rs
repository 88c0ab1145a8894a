use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use gifstash_gate::{default_rules, PermissionRule};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Service configuration, loaded from a TOML file.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    /// Directory holding the configuration store and every tenant store.
    pub data_dir: PathBuf,
    /// File name of the shared configuration store inside `data_dir`.
    pub config_store: String,
    /// How long an unreferenced tenant store stays open.
    pub eviction_grace_ms: u64,
    /// Upper bound on `count` in random sampling requests.
    pub max_random_count: usize,
    /// Where a newly created administrator token is written; relative
    /// paths are resolved against `data_dir`.
    pub admin_token_file: PathBuf,
    /// Admit every request without consulting the permission rules.
    pub skip_auth: bool,
    pub fetch_timeout_secs: u64,
    /// Rules seeded into an empty rule table.
    pub rules: Vec<PermissionRule>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8000)),
            data_dir: PathBuf::from("/var/lib/gifstash"),
            config_store: "gifstash-config.redb".into(),
            eviction_grace_ms: 0,
            max_random_count: 10,
            admin_token_file: PathBuf::from("admin.token"),
            skip_auth: false,
            fetch_timeout_secs: 10,
            rules: default_rules(),
        }
    }
}

impl ServiceConfig {
    /// Read a configuration file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn config_store_path(&self) -> PathBuf {
        self.data_dir.join(&self.config_store)
    }

    pub fn admin_token_path(&self) -> PathBuf {
        if self.admin_token_file.is_absolute() {
            self.admin_token_file.clone()
        } else {
            self.data_dir.join(&self.admin_token_file)
        }
    }

    pub fn eviction_grace(&self) -> Duration {
        Duration::from_millis(self.eviction_grace_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServiceConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.max_random_count, 10);
        assert_eq!(c.eviction_grace(), Duration::ZERO);
        assert!(!c.skip_auth);
        assert_eq!(c.rules.len(), 4);
        assert_eq!(c.config_store_path(), PathBuf::from("/var/lib/gifstash/gifstash-config.redb"));
    }

    #[test]
    fn empty_file_is_default() {
        let c = ServiceConfig::from_toml("").unwrap();
        assert_eq!(c.admin_token_path(), PathBuf::from("/var/lib/gifstash/admin.token"));
    }

    #[test]
    fn partial_file_overrides_fields() {
        let c = ServiceConfig::from_toml(
            r#"
            data_dir = "/srv/gifs"
            eviction_grace_ms = 250
            admin_token_file = "/etc/gifstash/admin.token"

            [[rules]]
            pattern = "/gifs.*"
            scope = "public"
            "#,
        )
        .unwrap();
        assert_eq!(c.data_dir, PathBuf::from("/srv/gifs"));
        assert_eq!(c.eviction_grace(), Duration::from_millis(250));
        assert_eq!(c.admin_token_path(), PathBuf::from("/etc/gifstash/admin.token"));
        assert_eq!(c.rules, vec![PermissionRule::new("/gifs.*", "public")]);
    }

    #[test]
    fn invalid_file_is_config_error() {
        let err = ServiceConfig::from_toml("bind_addr = 5").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
