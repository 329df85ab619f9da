// MIT License - Copyright (c) 2026 Peter Wright
// Pairing, discovery, reauthentication and options flows

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::client::ClientFactory;
use crate::config::{ConfigEntry, EntryData, EntryOptions};
use crate::constants::{DEFAULT_PORT, MANUFACTURER, UNLOAD_GRACE_PERIOD};
use crate::error::{ConnectError, PairingError, UniiError};
use crate::identity::{resolve_identity, ConnectionSource, IdentitySignals, MacAddress};
use crate::registry::Registry;
use crate::shared_key::SharedKey;
use crate::supervisor::{ConnectionSupervisor, TestedDevice};

/// A panel announced by DHCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpDiscovery {
    pub ip: String,
    /// As reported by the DHCP server, any common mac notation.
    pub mac_address: String,
}

/// Which form the flow wants shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    /// Host, port and shared key.
    Local,
    /// Shared key only; host and port are known (discovery, reauth).
    SharedKey,
    /// Informs the user that reauthentication is required.
    ReauthConfirm,
    /// User code option.
    Options,
}

/// Form field an error is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    /// Not tied to a single field.
    Base,
    Host,
    SharedKey,
    UserCode,
}

pub type FieldErrors = BTreeMap<Field, PairingError>;

/// Values entered in a pairing or options form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInput {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub shared_key: String,
    pub user_code: Option<String>,
}

impl FormInput {
    pub fn local(host: impl Into<String>, port: u16, shared_key: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            shared_key: shared_key.into(),
            user_code: None,
        }
    }

    pub fn shared_key(shared_key: impl Into<String>) -> Self {
        Self {
            shared_key: shared_key.into(),
            ..Self::default()
        }
    }
}

/// Result of one step of a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStep {
    /// Show a form, with errors from the previous submission and the values
    /// entered then as suggestions.
    ShowForm {
        form: FormKind,
        errors: FieldErrors,
        suggested: Option<FormInput>,
    },
    /// A new configuration entry was created.
    CreateEntry {
        entry_id: String,
        title: String,
        unique_id: String,
    },
    /// Reauthentication stored the new key and requested a reload.
    ReauthSuccessful { entry_id: String },
    /// Options were stored.
    OptionsSaved { write_capability_changed: bool },
    Abort(PairingError),
}

impl FlowStep {
    fn form(form: FormKind) -> Self {
        Self::ShowForm {
            form,
            errors: FieldErrors::new(),
            suggested: None,
        }
    }
}

/// Drives first-time setup and reauthentication of a panel.
///
/// Start with [`dhcp`](Self::dhcp), [`user`](Self::user) or
/// [`reauth`](Self::reauth), then feed form submissions to
/// [`submit`](Self::submit).
pub struct PairingFlow<F: ClientFactory> {
    registry: Arc<Registry<F>>,
    supervisor: ConnectionSupervisor<F>,
    discovered: Option<(String, MacAddress)>,
    reauth_entry: Option<ConfigEntry>,
}

impl<F: ClientFactory> PairingFlow<F> {
    pub fn new(registry: Arc<Registry<F>>) -> Self {
        let supervisor = ConnectionSupervisor::new(registry.factory().clone());
        Self {
            registry,
            supervisor,
            discovered: None,
            reauth_entry: None,
        }
    }

    fn current_form(&self) -> FormKind {
        if self.discovered.is_some() || self.reauth_entry.is_some() {
            FormKind::SharedKey
        } else {
            FormKind::Local
        }
    }

    /// Handle a DHCP announcement.
    pub async fn dhcp(&mut self, discovery: DhcpDiscovery) -> Result<FlowStep, UniiError> {
        let Ok(mac) = discovery.mac_address.parse::<MacAddress>() else {
            warn!("Ignoring DHCP discovery with invalid mac {:?}", discovery.mac_address);
            return Ok(FlowStep::Abort(PairingError::CannotConnect));
        };
        let ip = discovery.ip;
        debug!("DHCP discovery detected UNii on {} ({})", ip, mac);

        // Entries created before the firmware reported a mac are keyed by
        // their endpoint.
        if self.registry.find_by_unique_id(&mac.to_string()).await.is_none()
            && let Some(entry) = self.registry.find_host_keyed(&ip).await
        {
            self.registry
                .update_unique_id(&entry.entry_id, &mac.to_string())
                .await?;
        }

        if let Some(entry) = self.registry.find_by_unique_id(&mac.to_string()).await {
            if entry.data.host != ip {
                self.registry.update_host(&entry.entry_id, &ip).await?;
                if self.registry.is_loaded(&entry.entry_id).await {
                    self.registry.request_reload(&entry.entry_id);
                }
            }
            debug!("UNii {} is already configured", mac);
            return Ok(FlowStep::Abort(PairingError::AlreadyConfigured));
        }

        debug!("UNii on {} is not yet configured", ip);
        if !self.supervisor.wait_for_boot_and_probe(&ip).await {
            return Ok(FlowStep::Abort(PairingError::CannotConnect));
        }

        self.discovered = Some((ip, mac));
        Ok(FlowStep::form(FormKind::SharedKey))
    }

    /// Manual setup.
    pub fn user(&mut self) -> FlowStep {
        FlowStep::form(self.current_form())
    }

    /// Start reauthentication of an existing entry.
    pub async fn reauth(&mut self, entry_id: &str) -> FlowStep {
        match self.registry.entry(entry_id).await {
            Some(entry) => {
                debug!("Reauthentication needed for entry {} ({})", entry_id, entry.title);
                self.reauth_entry = Some(entry);
                FlowStep::form(FormKind::ReauthConfirm)
            }
            None => {
                error!("Cannot reauthenticate unknown entry {}", entry_id);
                FlowStep::Abort(PairingError::CannotConnect)
            }
        }
    }

    /// The user acknowledged the reauthentication notice.
    pub fn confirm_reauth(&mut self) -> FlowStep {
        self.user()
    }

    /// Validate a submitted form.
    pub async fn submit(&mut self, input: FormInput) -> Result<FlowStep, UniiError> {
        let (host, port) = if let Some((ip, _)) = &self.discovered {
            (ip.clone(), DEFAULT_PORT)
        } else if let Some(entry) = &self.reauth_entry {
            (entry.data.host.clone(), entry.data.port)
        } else {
            (
                input.host.clone().unwrap_or_default().trim().to_string(),
                input.port.unwrap_or(DEFAULT_PORT),
            )
        };

        let mut errors = FieldErrors::new();
        if host.is_empty() {
            errors.insert(Field::Host, PairingError::CannotConnect);
        }
        if input.shared_key.is_empty() {
            errors.insert(Field::SharedKey, PairingError::InvalidSharedKey);
        }

        if errors.is_empty() {
            let shared_key = SharedKey::normalize(&input.shared_key);
            match self.supervisor.test_connection(&host, port, &shared_key).await {
                Ok(tested) => {
                    // The panel needs a moment before it accepts the real session.
                    sleep(UNLOAD_GRACE_PERIOD).await;
                    return self.finish(host, port, shared_key, tested).await;
                }
                Err(ConnectError::AuthFailed) => {
                    errors.insert(Field::SharedKey, PairingError::InvalidSharedKey);
                }
                Err(e) => {
                    error!("Unable to connect to UNii on {}:{}: {}", host, port, e);
                    errors.insert(Field::Base, PairingError::CannotConnect);
                }
            }
        }

        Ok(FlowStep::ShowForm {
            form: self.current_form(),
            errors,
            suggested: Some(input),
        })
    }

    async fn finish(
        &mut self,
        host: String,
        port: u16,
        shared_key: SharedKey,
        tested: TestedDevice,
    ) -> Result<FlowStep, UniiError> {
        if let Some(entry) = self.reauth_entry.take() {
            self.registry
                .update_shared_key(&entry.entry_id, &shared_key)
                .await?;
            self.registry.request_reload(&entry.entry_id);
            info!("Shared key of entry {} updated", entry.entry_id);
            return Ok(FlowStep::ReauthSuccessful {
                entry_id: entry.entry_id,
            });
        }

        let source = if self.discovered.is_some() {
            ConnectionSource::DhcpDiscovered
        } else {
            ConnectionSource::UserEntered
        };
        let unique_id = resolve_identity(
            IdentitySignals::new(source, &tested.connection_unique_id)
                .reported_mac(tested.equipment.mac_address)
                .discovered_mac(self.discovered.as_ref().map(|(_, mac)| *mac)),
        );

        let data = EntryData::builder()
            .host(host)
            .port(port)
            .shared_key(shared_key)
            .build();

        if let Some(existing) = self.registry.find_by_unique_id(&unique_id).await {
            self.registry.update_data(&existing.entry_id, data).await?;
            if self.registry.is_loaded(&existing.entry_id).await {
                self.registry.request_reload(&existing.entry_id);
            }
            debug!("UNii {} is already configured as {}", unique_id, existing.entry_id);
            return Ok(FlowStep::Abort(PairingError::AlreadyConfigured));
        }

        let title = format!("{} {}", MANUFACTURER, tested.equipment.device_name);
        let entry_id = self
            .registry
            .create_entry(&unique_id, &title, source, data)
            .await?;
        Ok(FlowStep::CreateEntry {
            entry_id,
            title,
            unique_id,
        })
    }
}

/// Edits the options (user code) of a configured entry.
pub struct OptionsFlow<F: ClientFactory> {
    registry: Arc<Registry<F>>,
    entry_id: String,
}

impl<F: ClientFactory> OptionsFlow<F> {
    pub fn new(registry: Arc<Registry<F>>, entry_id: impl Into<String>) -> Self {
        Self {
            registry,
            entry_id: entry_id.into(),
        }
    }

    /// The options form, prefilled with the current user code.
    pub async fn init(&self) -> FlowStep {
        let current = self
            .registry
            .entry(&self.entry_id)
            .await
            .and_then(|entry| entry.options.user_code);
        FlowStep::ShowForm {
            form: FormKind::Options,
            errors: FieldErrors::new(),
            suggested: Some(FormInput {
                user_code: current,
                ..FormInput::default()
            }),
        }
    }

    /// Store a new user code. An empty code disables writes.
    pub async fn submit(&self, user_code: &str) -> Result<FlowStep, UniiError> {
        if let Err(e) = EntryOptions::with_user_code(user_code) {
            return Ok(FlowStep::ShowForm {
                form: FormKind::Options,
                errors: FieldErrors::from([(Field::UserCode, e)]),
                suggested: Some(FormInput {
                    user_code: Some(user_code.to_string()),
                    ..FormInput::default()
                }),
            });
        }
        let changed = self.registry.update_options(&self.entry_id, user_code).await?;
        Ok(FlowStep::OptionsSaved {
            write_capability_changed: changed,
        })
    }
}
