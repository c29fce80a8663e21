//! # pwm-adapter-json-store
//!
//! JSON file adapter for the topology and settings registries.
//!
//! ## Responsibilities
//! - Implement [`TopologySource`] and [`SettingsSource`] from `pwm-app::ports`
//! - Read the settings document leniently, entry by entry, so one broken
//!   record does not take the whole farm down
//! - Write documents back atomically (temp file + rename), including the
//!   one-shot migration of legacy settings into the current layout
//!
//! ## Dependency rule
//! Depends on `pwm-app` (for port traits) and `pwm-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;

use std::future::Future;
use std::path::{Path, PathBuf};

use pwm_app::ports::{SettingsSource, TopologySource};
use pwm_domain::error::PwmError;
use pwm_domain::settings::SettingsStore;
use pwm_domain::topology::Topology;

pub use error::JsonStoreError;

/// Topology registry stored as `{"farms": [...], "paddocks": [...], "bays": [...]}`.
#[derive(Debug, Clone)]
pub struct JsonTopologyStore {
    path: PathBuf,
}

impl JsonTopologyStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `topology` to the file, replacing it atomically.
    ///
    /// # Errors
    ///
    /// Returns [`JsonStoreError`] if the document cannot be written.
    pub async fn save(&self, topology: &Topology) -> Result<(), JsonStoreError> {
        let bytes = serde_json::to_vec_pretty(topology).map_err(JsonStoreError::Serialize)?;
        write_atomic(&self.path, &bytes).await
    }
}

impl TopologySource for JsonTopologyStore {
    fn load_topology(&self) -> impl Future<Output = Result<Topology, PwmError>> + Send {
        let path = self.path.clone();
        async move {
            let bytes = read(&path).await?;
            let topology: Topology =
                serde_json::from_slice(&bytes).map_err(|source| JsonStoreError::Parse {
                    path: path.clone(),
                    source,
                })?;
            tracing::debug!(
                path = %path.display(),
                farms = topology.farms.len(),
                paddocks = topology.paddocks.len(),
                bays = topology.bays.len(),
                "topology loaded"
            );
            Ok(topology)
        }
    }
}

/// Settings registry with `paddock_settings`, `bay_settings` and the legacy
/// `paddocks` / `bays` sections.
///
/// A missing file is an empty store: every unit then runs on defaults and
/// the resolver reports it.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<SettingsStore, JsonStoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no settings file, using defaults");
                return Ok(SettingsStore::default());
            }
            Err(source) => {
                return Err(JsonStoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let document: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|source| JsonStoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        let store = SettingsStore::from_value(&document);
        for entry in &store.rejected {
            tracing::warn!(
                section = entry.section,
                key = %entry.key,
                reason = %entry.reason,
                "settings entry ignored"
            );
        }
        Ok(store)
    }

    /// Write `settings` to the file, replacing it atomically.
    ///
    /// # Errors
    ///
    /// Returns [`JsonStoreError`] if the document cannot be written.
    pub async fn save(&self, settings: &SettingsStore) -> Result<(), JsonStoreError> {
        let bytes = serde_json::to_vec_pretty(settings).map_err(JsonStoreError::Serialize)?;
        write_atomic(&self.path, &bytes).await
    }

    /// Rewrite the file with every legacy entry folded into the current layout.
    ///
    /// Returns the number of legacy entries that were migrated. Entries that
    /// could not be parsed are dropped from the rewritten file.
    ///
    /// # Errors
    ///
    /// Returns [`JsonStoreError`] if the file cannot be read or written.
    pub async fn migrate(&self) -> Result<usize, JsonStoreError> {
        let mut settings = self.load().await?;
        let migrated = settings.paddocks.len() + settings.bays.len();
        if migrated == 0 {
            return Ok(0);
        }
        settings.migrate_legacy();
        self.save(&settings).await?;
        tracing::info!(path = %self.path.display(), migrated, "legacy settings migrated");
        Ok(migrated)
    }
}

impl SettingsSource for JsonSettingsStore {
    fn load_settings(&self) -> impl Future<Output = Result<SettingsStore, PwmError>> + Send {
        async move { Ok(self.load().await?) }
    }
}

async fn read(path: &Path) -> Result<Vec<u8>, JsonStoreError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| JsonStoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), JsonStoreError> {
    let io_err = |source: std::io::Error| JsonStoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)
}
