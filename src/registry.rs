// MIT License - Copyright (c) 2026 Peter Wright
// Registry of configuration entries and their live coordinators

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, Weak};

use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::{ClientFactory, ProtocolClient};
use crate::config::{ConfigEntries, ConfigEntry, EntryData, EntryOptions};
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::coordinator::DeviceCoordinator;
use crate::error::{ConfigError, Result, UniiError};
use crate::event::{CoordinatorState, LifecycleKind, LifecycleRequest, RegistryEvent};
use crate::identity::{
    is_mac_shaped, reconcile_unique_id, resolve_identity, ConnectionSource, IdentitySignals,
};
use crate::shared_key::SharedKey;
use crate::supervisor::ConnectionSupervisor;

/// Coordinator type of a factory's clients.
pub type Coordinator<F> = DeviceCoordinator<<F as ClientFactory>::Client>;

/// Maps configuration entries to their supervisor and coordinator.
///
/// Owned by the application; there is no process wide state. Lifecycle
/// requests from coordinators (reload, reauthenticate) are handled by a
/// worker task spawned in [`Registry::new`].
pub struct Registry<F: ClientFactory> {
    factory: Arc<F>,
    store_path: Option<PathBuf>,
    entries: RwLock<ConfigEntries>,
    supervisors: Mutex<HashMap<String, Arc<ConnectionSupervisor<F>>>>,
    loaded: Mutex<HashMap<String, Arc<Coordinator<F>>>>,
    connecting: Mutex<HashSet<String>>,
    pending_reloads: Mutex<HashSet<String>>,
    lifecycle_tx: mpsc::UnboundedSender<LifecycleRequest>,
    event_tx: broadcast::Sender<RegistryEvent>,
    worker: OnceLock<JoinHandle<()>>,
}

impl<F: ClientFactory> Registry<F> {
    /// Create a registry over in-memory entries. Must be called within a
    /// tokio runtime.
    pub fn new(factory: Arc<F>, entries: ConfigEntries) -> Arc<Self> {
        Self::build(factory, entries, None)
    }

    /// Create a registry persisting its entries to `path`.
    pub fn with_store(factory: Arc<F>, path: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let path = path.into();
        let entries = ConfigEntries::load(&path)?;
        Ok(Self::build(factory, entries, Some(path)))
    }

    fn build(factory: Arc<F>, entries: ConfigEntries, store_path: Option<PathBuf>) -> Arc<Self> {
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let registry = Arc::new(Self {
            factory,
            store_path,
            entries: RwLock::new(entries),
            supervisors: Mutex::new(HashMap::new()),
            loaded: Mutex::new(HashMap::new()),
            connecting: Mutex::new(HashSet::new()),
            pending_reloads: Mutex::new(HashSet::new()),
            lifecycle_tx,
            event_tx,
            worker: OnceLock::new(),
        });

        let handle = tokio::spawn(run_lifecycle_worker(Arc::downgrade(&registry), lifecycle_rx));
        let _ = registry.worker.set(handle);
        registry
    }

    pub fn factory(&self) -> &Arc<F> {
        &self.factory
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: RegistryEvent) {
        let _ = self.event_tx.send(event);
    }

    // --- Entries ---

    pub async fn entries(&self) -> Vec<ConfigEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn entry(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.read().await.get(entry_id).cloned()
    }

    pub async fn find_by_unique_id(&self, unique_id: &str) -> Option<ConfigEntry> {
        self.entries.read().await.find_by_unique_id(unique_id).cloned()
    }

    /// Entry for the panel at `host` still keyed by a host based identifier.
    pub async fn find_host_keyed(&self, host: &str) -> Option<ConfigEntry> {
        self.entries.read().await.find_host_keyed(host).cloned()
    }

    async fn update_entries<T>(
        &self,
        update: impl FnOnce(&mut ConfigEntries) -> std::result::Result<T, ConfigError>,
    ) -> Result<T> {
        let mut entries = self.entries.write().await;
        let mut updated = entries.clone();
        let value = update(&mut updated)?;
        if let Some(path) = &self.store_path {
            updated.save(path)?;
        }
        *entries = updated;
        Ok(value)
    }

    pub async fn create_entry(
        &self,
        unique_id: &str,
        title: &str,
        source: ConnectionSource,
        data: EntryData,
    ) -> Result<String> {
        let entry_id = self
            .update_entries(|entries| Ok(entries.add(unique_id, title, source, data)))
            .await?;
        info!("Created entry {} ({}) for {}", entry_id, title, unique_id);
        Ok(entry_id)
    }

    pub async fn update_unique_id(&self, entry_id: &str, unique_id: &str) -> Result<()> {
        self.update_entries(|entries| entries.update_unique_id(entry_id, unique_id))
            .await?;
        info!("Entry {} now identified by {}", entry_id, unique_id);
        Ok(())
    }

    pub async fn update_data(&self, entry_id: &str, data: EntryData) -> Result<()> {
        self.update_entries(|entries| entries.update_data(entry_id, data))
            .await
    }

    pub async fn update_host(&self, entry_id: &str, host: &str) -> Result<()> {
        self.update_entries(|entries| entries.update_host(entry_id, host))
            .await?;
        info!("Entry {} moved to {}", entry_id, host);
        Ok(())
    }

    /// Replace only the shared key of an entry.
    pub async fn update_shared_key(&self, entry_id: &str, shared_key: &SharedKey) -> Result<()> {
        let encoded = shared_key.to_hex();
        self.update_entries(|entries| {
            let mut data = entries
                .get(entry_id)
                .map(|entry| entry.data.clone())
                .ok_or_else(|| ConfigError::UnknownEntry {
                    entry_id: entry_id.to_string(),
                })?;
            data.shared_key = encoded;
            entries.update_data(entry_id, data)
        })
        .await
    }

    /// Validate and store the user code option, then update the write gate of
    /// a loaded coordinator. Returns whether write capability flipped.
    pub async fn update_options(&self, entry_id: &str, user_code: &str) -> Result<bool> {
        let options = EntryOptions::with_user_code(user_code)?;
        let user_code = options.user_code.clone();
        self.update_entries(|entries| entries.update_options(entry_id, options))
            .await?;

        let coordinator = self.coordinator(entry_id).await;
        Ok(coordinator.is_some_and(|coordinator| coordinator.set_user_code(user_code)))
    }

    /// Unload and forget an entry.
    pub async fn remove_entry(&self, entry_id: &str) -> Result<ConfigEntry> {
        let _ = self.unload_entry(entry_id).await;
        self.supervisors.lock().await.remove(entry_id);
        let removed = self
            .update_entries(|entries| {
                entries.remove(entry_id).ok_or_else(|| ConfigError::UnknownEntry {
                    entry_id: entry_id.to_string(),
                })
            })
            .await?;
        info!("Removed entry {}", entry_id);
        Ok(removed)
    }

    // --- Runtime ---

    pub async fn coordinator(&self, entry_id: &str) -> Option<Arc<Coordinator<F>>> {
        self.loaded.lock().await.get(entry_id).cloned()
    }

    pub async fn is_loaded(&self, entry_id: &str) -> bool {
        self.loaded.lock().await.contains_key(entry_id)
    }

    /// Lifecycle state of an entry.
    pub async fn entry_state(&self, entry_id: &str) -> CoordinatorState {
        if self.connecting.lock().await.contains(entry_id) {
            return CoordinatorState::Connecting;
        }
        match self.coordinator(entry_id).await {
            Some(coordinator) => coordinator.state(),
            None => CoordinatorState::Disconnected,
        }
    }

    /// The supervisor of an entry, kept across reloads so the grace period
    /// between disconnect and reconnect holds.
    async fn supervisor(&self, entry_id: &str) -> Arc<ConnectionSupervisor<F>> {
        self.supervisors
            .lock()
            .await
            .entry(entry_id.to_string())
            .or_insert_with(|| Arc::new(ConnectionSupervisor::new(self.factory.clone())))
            .clone()
    }

    /// Connect an entry and start its coordinator.
    ///
    /// Connection failures are reported, not retried. A rejected shared key
    /// additionally raises [`RegistryEvent::ReauthRequired`].
    pub async fn setup_entry(&self, entry_id: &str) -> Result<Arc<Coordinator<F>>> {
        if self.is_loaded(entry_id).await {
            return Err(UniiError::AlreadyLoaded {
                entry_id: entry_id.to_string(),
            });
        }
        let entry = self.entry(entry_id).await.ok_or_else(|| ConfigError::UnknownEntry {
            entry_id: entry_id.to_string(),
        })?;

        if !self.connecting.lock().await.insert(entry_id.to_string()) {
            debug!("Setup of entry {} already in progress", entry_id);
            return Err(UniiError::SetupInProgress {
                entry_id: entry_id.to_string(),
            });
        }
        let result = self.connect_and_coordinate(&entry).await;
        self.connecting.lock().await.remove(entry_id);

        match result {
            Ok(coordinator) => {
                info!("Entry {} loaded", entry_id);
                self.emit(RegistryEvent::EntryLoaded {
                    entry_id: entry_id.to_string(),
                });
                Ok(coordinator)
            }
            Err(e) => {
                if e.needs_reauth() {
                    warn!("Shared key of entry {} rejected", entry_id);
                    self.emit(RegistryEvent::ReauthRequired {
                        entry_id: entry_id.to_string(),
                    });
                } else {
                    error!("Setup of entry {} failed: {}", entry_id, e);
                }
                self.emit(RegistryEvent::SetupFailed {
                    entry_id: entry_id.to_string(),
                    reason: e.to_string(),
                    retryable: e.is_retryable(),
                });
                Err(e)
            }
        }
    }

    async fn connect_and_coordinate(&self, entry: &ConfigEntry) -> Result<Arc<Coordinator<F>>> {
        let supervisor = self.supervisor(&entry.entry_id).await;
        let client = supervisor.connect_entry(&entry.data).await?;

        let unique_id = match self.reconcile_identity(entry, client.as_ref()).await {
            Ok(unique_id) => unique_id,
            Err(e) => {
                supervisor.disconnect().await;
                return Err(e);
            }
        };

        let coordinator = match DeviceCoordinator::new(
            entry.entry_id.clone(),
            &unique_id,
            client,
            entry.options.user_code.clone(),
            self.lifecycle_tx.clone(),
        ) {
            Ok(coordinator) => coordinator,
            Err(e) => {
                supervisor.disconnect().await;
                return Err(e);
            }
        };

        let mut loaded = self.loaded.lock().await;
        if loaded.contains_key(&entry.entry_id) {
            drop(loaded);
            coordinator.disconnect();
            return Err(UniiError::AlreadyLoaded {
                entry_id: entry.entry_id.clone(),
            });
        }
        loaded.insert(entry.entry_id.clone(), coordinator.clone());
        Ok(coordinator)
    }

    /// Newer firmware reports a mac address; move an entry still keyed by a
    /// host based identifier to it. Returns the identifier in effect.
    async fn reconcile_identity(
        &self,
        entry: &ConfigEntry,
        client: &F::Client,
    ) -> Result<String> {
        let connection = client.connection_unique_id();
        let reported_mac = client
            .equipment_information()
            .and_then(|equipment| equipment.mac_address);
        let resolved = resolve_identity(
            IdentitySignals::new(entry.source, &connection)
                .reported_mac(reported_mac)
                .prior_unique_id(Some(&entry.unique_id)),
        );

        let Some(replacement) = reconcile_unique_id(&entry.unique_id, &resolved)
            .filter(|replacement| is_mac_shaped(replacement))
        else {
            return Ok(entry.unique_id.clone());
        };

        if let Some(other) = self.find_by_unique_id(&replacement).await
            && other.entry_id != entry.entry_id
        {
            warn!(
                "Entry {} reports {} which already identifies entry {}",
                entry.entry_id, replacement, other.entry_id
            );
            return Ok(entry.unique_id.clone());
        }

        debug!(
            "Updating unique id of entry {} from {} to {}",
            entry.entry_id, entry.unique_id, replacement
        );
        self.update_unique_id(&entry.entry_id, &replacement).await?;
        Ok(replacement)
    }

    /// Stop the coordinator and close the session of an entry.
    ///
    /// Always attempts the disconnect, even when the entry is not loaded.
    pub async fn unload_entry(&self, entry_id: &str) -> Result<()> {
        let coordinator = self.loaded.lock().await.remove(entry_id);
        if let Some(coordinator) = &coordinator {
            coordinator.disconnect();
        }

        let supervisor = self.supervisors.lock().await.get(entry_id).cloned();
        if let Some(supervisor) = supervisor {
            supervisor.disconnect().await;
        }

        match coordinator {
            Some(_) => {
                info!("Entry {} unloaded", entry_id);
                self.emit(RegistryEvent::EntryUnloaded {
                    entry_id: entry_id.to_string(),
                });
                Ok(())
            }
            None => Err(UniiError::NotLoaded {
                entry_id: entry_id.to_string(),
            }),
        }
    }

    /// Unload and set up an entry again. Returns `Ok(false)` when a reload of
    /// the same entry is already running.
    pub async fn reload_entry(&self, entry_id: &str) -> Result<bool> {
        if !self.pending_reloads.lock().await.insert(entry_id.to_string()) {
            debug!("Reload of entry {} already in progress", entry_id);
            return Ok(false);
        }

        info!("Reloading entry {}", entry_id);
        let _ = self.unload_entry(entry_id).await;
        let result = self.setup_entry(entry_id).await;
        self.pending_reloads.lock().await.remove(entry_id);
        result.map(|_| true)
    }

    /// Ask the lifecycle worker to reload an entry without waiting for it.
    pub fn request_reload(&self, entry_id: &str) {
        let _ = self.lifecycle_tx.send(LifecycleRequest {
            entry_id: entry_id.to_string(),
            kind: LifecycleKind::Reload,
        });
    }

    /// Unload an entry whose shared key the panel rejects and ask for the
    /// reauthentication flow.
    pub async fn start_reauth(&self, entry_id: &str) {
        warn!("Reauthentication required for entry {}", entry_id);
        let _ = self.unload_entry(entry_id).await;
        self.emit(RegistryEvent::ReauthRequired {
            entry_id: entry_id.to_string(),
        });
    }

    /// Set up every configured entry, returning the ids that failed.
    pub async fn setup_all(&self) -> Vec<(String, UniiError)> {
        let ids: Vec<String> = self
            .entries
            .read()
            .await
            .iter()
            .map(|entry| entry.entry_id.clone())
            .collect();

        let mut failed = Vec::new();
        for entry_id in ids {
            if let Err(e) = self.setup_entry(&entry_id).await {
                failed.push((entry_id, e));
            }
        }
        failed
    }

    /// Unload every loaded entry.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.loaded.lock().await.keys().cloned().collect();
        for entry_id in ids {
            let _ = self.unload_entry(&entry_id).await;
        }
    }

    async fn handle_lifecycle(&self, request: LifecycleRequest) {
        debug!("Handling {:?} for entry {}", request.kind, request.entry_id);
        match request.kind {
            LifecycleKind::Reload => {
                if let Err(e) = self.reload_entry(&request.entry_id).await {
                    warn!("Reload of entry {} failed: {}", request.entry_id, e);
                }
            }
            LifecycleKind::Reauthenticate => self.start_reauth(&request.entry_id).await,
        }
    }
}

impl<F: ClientFactory> Drop for Registry<F> {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.get() {
            handle.abort();
        }
    }
}

async fn run_lifecycle_worker<F: ClientFactory>(
    registry: Weak<Registry<F>>,
    mut requests: mpsc::UnboundedReceiver<LifecycleRequest>,
) {
    while let Some(request) = requests.recv().await {
        let Some(registry) = registry.upgrade() else {
            break;
        };
        registry.handle_lifecycle(request).await;
    }
}
