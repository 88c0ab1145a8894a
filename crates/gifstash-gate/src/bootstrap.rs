//! First-start provisioning of the configuration store.

use std::fs::{self, OpenOptions};
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use tracing::info;

use crate::accounts::AccountStore;
use crate::error::{GateError, GateResult};
use crate::policy::{PermissionRule, PolicyEngine};

/// Where a newly created administrator token is announced.
pub trait AdminTokenSink {
    fn emit(&self, id: &str, token: &str) -> GateResult<()>;
}

/// Writes the administrator token to a file readable by the operator.
///
/// On unix the file is created with mode `0600`.
#[derive(Clone, Debug)]
pub struct FileTokenSink {
    path: PathBuf,
}

impl FileTokenSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AdminTokenSink for FileTokenSink {
    fn emit(&self, id: &str, token: &str) -> GateResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| GateError::Bootstrap(e.to_string()))?;
        }
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options
            .open(&self.path)
            .map_err(|e| GateError::Bootstrap(e.to_string()))?;
        writeln!(file, "{token}").map_err(|e| GateError::Bootstrap(e.to_string()))?;
        info!(id, path = %self.path.display(), "administrator token written");
        Ok(())
    }
}

/// What a bootstrap run changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Id of the administrator created by this run.
    pub created_admin: Option<String>,
    /// Number of rules seeded into an empty rule table.
    pub seeded_rules: usize,
}

/// Seed `rules` if none exist and ensure an administrator account exists.
///
/// The administrator token goes to `sink` only when the account is created
/// by this call; it is never announced again. If `sink` fails, the account
/// is not created and a later run tries again.
pub fn bootstrap(
    accounts: &AccountStore,
    policy: &PolicyEngine,
    rules: &[PermissionRule],
    sink: &dyn AdminTokenSink,
) -> GateResult<BootstrapReport> {
    let mut report = BootstrapReport::default();
    if policy.rules()?.is_empty() {
        policy.seed(rules)?;
        report.seeded_rules = rules.len();
    }
    let created = accounts.ensure_administrator(|admin| sink.emit(&admin.id, &admin.token))?;
    report.created_admin = created.map(|admin| admin.id);
    Ok(report)
}
