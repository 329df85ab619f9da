// MIT License - Copyright (c) 2026 Peter Wright
// Connection lifecycle of one configured panel

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::client::{ClientFactory, ProtocolClient};
use crate::config::EntryData;
use crate::constants::{CONF_TYPE_LOCAL, DEFAULT_PORT, DISCOVERY_BOOT_WAIT, UNLOAD_GRACE_PERIOD};
use crate::devices::EquipmentInfo;
use crate::error::ConnectError;
use crate::shared_key::SharedKey;

/// What a successful test connection learned about the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestedDevice {
    pub equipment: EquipmentInfo,
    /// Host based identifier of the connection.
    pub connection_unique_id: String,
}

/// Owns the protocol client of one panel.
///
/// The panel refuses connections for a short while after a session closes,
/// so every dial first waits out the remainder of [`UNLOAD_GRACE_PERIOD`]
/// since the last disconnect done through this supervisor.
pub struct ConnectionSupervisor<F: ClientFactory> {
    factory: Arc<F>,
    client: Mutex<Option<Arc<F::Client>>>,
    last_disconnect: Mutex<Option<Instant>>,
}

impl<F: ClientFactory> ConnectionSupervisor<F> {
    pub fn new(factory: Arc<F>) -> Self {
        Self {
            factory,
            client: Mutex::new(None),
            last_disconnect: Mutex::new(None),
        }
    }

    pub fn factory(&self) -> &Arc<F> {
        &self.factory
    }

    /// The currently open client, if any.
    pub async fn client(&self) -> Option<Arc<F::Client>> {
        self.client.lock().await.clone()
    }

    async fn wait_grace_period(&self) {
        let last = *self.last_disconnect.lock().await;
        if let Some(last) = last {
            let ready_at = last + UNLOAD_GRACE_PERIOD;
            if ready_at > Instant::now() {
                debug!("Waiting for grace period before reconnecting");
                sleep_until(ready_at).await;
            }
        }
    }

    async fn mark_disconnected(&self) {
        *self.last_disconnect.lock().await = Some(Instant::now());
    }

    /// Open a session with the panel at `host:port`.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        shared_key: &SharedKey,
    ) -> Result<Arc<F::Client>, ConnectError> {
        self.wait_grace_period().await;

        info!("Connecting to UNii at {}:{}", host, port);
        let client = self.factory.create(host, port, shared_key);
        match client.connect().await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Unable to connect to UNii on {}", client.connection_unique_id());
                return Err(ConnectError::not_ready(format!(
                    "Unable to connect to UNii on {}",
                    client.connection_unique_id()
                )));
            }
            Err(e) => {
                warn!("Connection to UNii at {}:{} failed: {}", host, port, e);
                return Err(e.into());
            }
        }

        let client = Arc::new(client);
        let previous = self.client.lock().await.replace(client.clone());
        if let Some(previous) = previous {
            debug!("Replacing previous client of {}", previous.connection_unique_id());
            let _ = previous.disconnect().await;
        }
        info!("Connected to UNii on {}", client.connection_unique_id());
        Ok(client)
    }

    /// Open a session for a stored configuration entry.
    pub async fn connect_entry(&self, data: &EntryData) -> Result<Arc<F::Client>, ConnectError> {
        if data.conf_type != CONF_TYPE_LOCAL {
            return Err(ConnectError::Unsupported {
                conf_type: data.conf_type.clone(),
            });
        }
        let shared_key = data
            .decode_shared_key()
            .map_err(|e| ConnectError::not_ready(format!("Stored shared key unusable: {}", e)))?;
        self.connect(&data.host, data.port, &shared_key).await
    }

    /// Open, probe and close a throw-away session.
    pub async fn test_connection(
        &self,
        host: &str,
        port: u16,
        shared_key: &SharedKey,
    ) -> Result<TestedDevice, ConnectError> {
        self.wait_grace_period().await;

        debug!("Testing connection to UNii at {}:{}", host, port);
        let client = self.factory.create(host, port, shared_key);
        let result = client.test_connection().await;
        let connection_unique_id = client.connection_unique_id();
        let tested = match result {
            Ok(true) => client
                .equipment_information()
                .map(|equipment| TestedDevice {
                    equipment,
                    connection_unique_id: connection_unique_id.clone(),
                })
                .ok_or_else(|| {
                    ConnectError::not_ready(format!(
                        "No equipment information from UNii on {}",
                        connection_unique_id
                    ))
                }),
            Ok(false) => Err(ConnectError::not_ready(format!(
                "Unable to connect to UNii on {}",
                connection_unique_id
            ))),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = client.disconnect().await {
            debug!("Closing test connection to {} failed: {}", connection_unique_id, e);
        }
        self.mark_disconnected().await;
        tested
    }

    /// Close the current session. Safe to call repeatedly and from any task.
    pub async fn disconnect(&self) {
        let client = self.client.lock().await.take();
        if let Some(client) = client {
            if let Err(e) = client.disconnect().await {
                warn!("Disconnect from {} failed: {}", client.connection_unique_id(), e);
            }
            self.mark_disconnected().await;
            info!("Disconnected from UNii on {}", client.connection_unique_id());
        }
    }

    /// After DHCP reports a (re)booted panel: wait for it to start, then check
    /// the control port is open.
    pub async fn wait_for_boot_and_probe(&self, ip: &str) -> bool {
        debug!("Waiting {:?} for UNii on {} to boot", DISCOVERY_BOOT_WAIT, ip);
        sleep(DISCOVERY_BOOT_WAIT).await;
        let open = self.factory.probe_port(ip, DEFAULT_PORT).await;
        if open {
            debug!("UNii default port on {} is open", ip);
        } else {
            debug!("UNii default port on {} is not open", ip);
        }
        open
    }
}
