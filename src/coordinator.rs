// MIT License - Copyright (c) 2026 Peter Wright
// Device coordinator: event projection, availability and gated writes

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::client::{ClientEventReceiver, ProtocolClient};
use crate::constants::{EVENT_CHANNEL_CAPACITY, WRITE_TIMEOUT};
use crate::devices::{DeviceInfo, EquipmentInfo};
use crate::entities::{entity_state, EntityPlan, EntityState, PlanInputs, SessionView};
use crate::error::{ClientError, ConnectError, Result, UniiError, WriteError};
use crate::event::{
    event_channel, Availability, ClientEvent, Command, CoordinatorEvent, CoordinatorState,
    EventReceiver, EventSender, LifecycleKind, LifecycleRequest, Snapshot,
};
use crate::identity::{is_mac_shaped, MacAddress};

/// How the coordinator handles a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Lifecycle(LifecycleKind),
    Publish,
}

/// Command routing. Commands not listed are ignored.
const ROUTES: [(Command, Route); 10] = [
    (Command::Reauthenticate, Route::Lifecycle(LifecycleKind::Reauthenticate)),
    (Command::ReloadConfiguration, Route::Lifecycle(LifecycleKind::Reload)),
    (Command::ConnectionRequestResponse, Route::Publish),
    (Command::PollAliveResponse, Route::Publish),
    (Command::NormalDisconnect, Route::Publish),
    (Command::EventOccurred, Route::Publish),
    (Command::InputStatusChanged, Route::Publish),
    (Command::InputStatusUpdate, Route::Publish),
    (Command::ResponseRequestSectionStatus, Route::Publish),
    (Command::ResponseRequestInputArrangement, Route::Publish),
];

/// Commands that decide availability on their own.
const AVAILABILITY: [(Command, Availability); 3] = [
    (Command::NormalDisconnect, Availability::Unavailable),
    (Command::ConnectionRequestResponse, Availability::Available),
    (Command::PollAliveResponse, Availability::Available),
];

/// Outcome of [`DeviceCoordinator::on_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A new snapshot was published.
    Published,
    /// A lifecycle request was sent to the registry.
    Requested(LifecycleKind),
    /// A lifecycle request was already outstanding; this one was dropped.
    Coalesced(LifecycleKind),
    Ignored,
}

#[derive(Debug, Clone, Copy)]
enum WriteAction {
    ArmSection(u8),
    DisarmSection(u8),
    BypassInput(u16),
    UnbypassInput(u16),
}

impl WriteAction {
    fn name(&self) -> &'static str {
        match self {
            Self::ArmSection(_) => "arm section",
            Self::DisarmSection(_) => "disarm section",
            Self::BypassInput(_) => "bypass input",
            Self::UnbypassInput(_) => "unbypass input",
        }
    }

    fn target(&self) -> u16 {
        match *self {
            Self::ArmSection(n) | Self::DisarmSection(n) => u16::from(n),
            Self::BypassInput(n) | Self::UnbypassInput(n) => n,
        }
    }
}

/// Projects the event stream of one connected panel onto observable state.
///
/// Created from a connected client; takes the client's event stream and
/// drains it on a spawned task. Readers observe state through watch channels
/// and [`subscribe`](Self::subscribe).
pub struct DeviceCoordinator<C: ProtocolClient> {
    entry_id: String,
    client: Arc<C>,
    device_info: DeviceInfo,
    state_tx: watch::Sender<CoordinatorState>,
    snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
    availability_tx: watch::Sender<Availability>,
    user_code: watch::Sender<Option<String>>,
    plan_tx: watch::Sender<Arc<EntityPlan>>,
    generation: AtomicU64,
    event_tx: EventSender,
    lifecycle_tx: mpsc::UnboundedSender<LifecycleRequest>,
    lifecycle_pending: AtomicBool,
    write_lock: Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
    disconnected: AtomicBool,
    event_task: OnceLock<JoinHandle<()>>,
}

impl<C: ProtocolClient> DeviceCoordinator<C> {
    /// Start coordinating a connected client.
    ///
    /// `unique_id` is the stored identifier of the entry; a mac shaped id
    /// identifies the device when the firmware does not report its mac.
    /// Must be called within a tokio runtime.
    pub fn new(
        entry_id: impl Into<String>,
        unique_id: &str,
        client: Arc<C>,
        user_code: Option<String>,
        lifecycle_tx: mpsc::UnboundedSender<LifecycleRequest>,
    ) -> Result<Arc<Self>> {
        let entry_id = entry_id.into();
        let connection = client.connection_unique_id();
        if !client.connected() {
            return Err(
                ConnectError::not_ready(format!("UNii on {} is not connected", connection)).into(),
            );
        }
        let events = client
            .take_event_receiver()
            .ok_or_else(|| UniiError::EventStreamTaken {
                connection: connection.clone(),
            })?;

        let equipment = client
            .equipment_information()
            .unwrap_or_else(|| EquipmentInfo::new("UNii"));
        let mac = equipment.mac_address.or_else(|| {
            is_mac_shaped(unique_id)
                .then(|| unique_id.parse::<MacAddress>().ok())
                .flatten()
        });
        let device_info = DeviceInfo::new(&equipment, mac, &connection);

        let user_code = user_code.filter(|code| !code.is_empty());
        let plan = EntityPlan::build(
            &entry_id,
            1,
            PlanInputs {
                features: client.features(),
                write_capable: user_code.is_some(),
                sections: &client.sections(),
                inputs: &client.inputs(),
                outputs: &client.outputs(),
            },
        );

        let (event_tx, _) = event_channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let coordinator = Arc::new(Self {
            entry_id,
            client,
            device_info,
            state_tx: watch::Sender::new(CoordinatorState::Connected),
            snapshot_tx: watch::Sender::new(None),
            availability_tx: watch::Sender::new(Availability::Available),
            user_code: watch::Sender::new(user_code),
            plan_tx: watch::Sender::new(Arc::new(plan)),
            generation: AtomicU64::new(1),
            event_tx,
            lifecycle_tx,
            lifecycle_pending: AtomicBool::new(false),
            write_lock: Mutex::new(()),
            shutdown_tx,
            disconnected: AtomicBool::new(false),
            event_task: OnceLock::new(),
        });

        let handle = tokio::spawn(run_event_loop(
            Arc::downgrade(&coordinator),
            events,
            shutdown_rx,
        ));
        let _ = coordinator.event_task.set(handle);

        info!(
            "Coordinating UNii {} on {} (entry {})",
            coordinator.device_info.name, connection, coordinator.entry_id
        );
        Ok(coordinator)
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// Subscribe to coordinator events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<CoordinatorState> {
        self.state_tx.subscribe()
    }

    /// Latest published snapshot, `None` before the first operational event.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.snapshot_tx.subscribe()
    }

    pub fn availability(&self) -> Availability {
        *self.availability_tx.borrow()
    }

    pub fn watch_availability(&self) -> watch::Receiver<Availability> {
        self.availability_tx.subscribe()
    }

    pub fn entity_plan(&self) -> Arc<EntityPlan> {
        self.plan_tx.borrow().clone()
    }

    pub fn watch_entity_plan(&self) -> watch::Receiver<Arc<EntityPlan>> {
        self.plan_tx.subscribe()
    }

    /// State of an entity of the current plan.
    pub fn entity_state(&self, key: &str) -> Option<EntityState> {
        let kind = self.entity_plan().get(key)?.kind;
        let sections = self.client.sections();
        let inputs = self.client.inputs();
        let outputs = self.client.outputs();
        Some(entity_state(
            kind,
            SessionView {
                availability: self.availability(),
                connected: self.client.connected(),
                sections: &sections,
                inputs: &inputs,
                outputs: &outputs,
            },
        ))
    }

    /// True iff a user code is configured.
    pub fn write_capable(&self) -> bool {
        self.user_code.borrow().is_some()
    }

    /// Configure (or clear) the user code. Returns whether write capability
    /// flipped, in which case the entity plan was rebuilt.
    pub fn set_user_code(&self, code: Option<String>) -> bool {
        let was_capable = self.write_capable();
        self.user_code.send_replace(code.filter(|code| !code.is_empty()));
        let capable = self.write_capable();
        if was_capable == capable {
            return false;
        }
        info!(
            "Write capability of entry {} changed to {}",
            self.entry_id, capable
        );
        self.refresh_entities();
        true
    }

    /// Rebuild the entity plan from the client's current records.
    pub fn refresh_entities(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let write_capable = self.write_capable();
        let plan = EntityPlan::build(
            &self.entry_id,
            generation,
            PlanInputs {
                features: self.client.features(),
                write_capable,
                sections: &self.client.sections(),
                inputs: &self.client.inputs(),
                outputs: &self.client.outputs(),
            },
        );
        debug!(
            "Entity plan generation {} for entry {}: {} entities",
            generation,
            self.entry_id,
            plan.len()
        );
        self.plan_tx.send_replace(Arc::new(plan));
        let _ = self.event_tx.send(CoordinatorEvent::EntitiesInvalidated {
            generation,
            write_capable,
        });
        generation
    }

    /// Route one event from the client's stream.
    pub fn on_event(&self, event: ClientEvent) -> Dispatch {
        let route = ROUTES
            .iter()
            .find(|(command, _)| *command == event.command)
            .map(|(_, route)| *route);

        match route {
            Some(Route::Lifecycle(kind)) => self.request_lifecycle(kind),
            Some(Route::Publish) => {
                self.publish(event);
                Dispatch::Published
            }
            None => {
                debug!("Ignoring command {}", event.command);
                Dispatch::Ignored
            }
        }
    }

    fn publish(&self, event: ClientEvent) {
        let command = event.command;
        if let Some((_, availability)) = AVAILABILITY.iter().find(|(c, _)| *c == command) {
            self.set_availability(*availability);
        }
        self.snapshot_tx.send_replace(Some(Arc::new(event)));
        let _ = self.event_tx.send(CoordinatorEvent::SnapshotUpdated { command });
    }

    fn request_lifecycle(&self, kind: LifecycleKind) -> Dispatch {
        if self.lifecycle_pending.swap(true, Ordering::AcqRel) {
            debug!("{:?} for entry {} already requested", kind, self.entry_id);
            return Dispatch::Coalesced(kind);
        }

        self.set_state(match kind {
            LifecycleKind::Reload => CoordinatorState::Reloading,
            LifecycleKind::Reauthenticate => CoordinatorState::Reauthenticating,
        });

        info!("Requesting {:?} of entry {}", kind, self.entry_id);
        let request = LifecycleRequest {
            entry_id: self.entry_id.clone(),
            kind,
        };
        if self.lifecycle_tx.send(request).is_err() {
            warn!("Nobody handles lifecycle requests for entry {}", self.entry_id);
            self.lifecycle_pending.store(false, Ordering::Release);
        }
        Dispatch::Requested(kind)
    }

    /// Accept lifecycle requests again after the owner handled the last one.
    pub fn lifecycle_completed(&self) {
        self.lifecycle_pending.store(false, Ordering::Release);
        if matches!(
            self.state(),
            CoordinatorState::Reloading | CoordinatorState::Reauthenticating
        ) {
            self.set_state(if self.availability().is_available() {
                CoordinatorState::Connected
            } else {
                CoordinatorState::Disconnected
            });
        }
    }

    fn set_state(&self, state: CoordinatorState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            debug!("Entry {} is now {:?}", self.entry_id, state);
            let _ = self.event_tx.send(CoordinatorEvent::StateChanged { state });
        }
    }

    fn set_availability(&self, availability: Availability) {
        let changed = self.availability_tx.send_if_modified(|current| {
            if *current == availability {
                return false;
            }
            *current = availability;
            true
        });
        if !changed {
            return;
        }

        info!("UNii of entry {} is {:?}", self.entry_id, availability);
        let _ = self
            .event_tx
            .send(CoordinatorEvent::AvailabilityChanged { availability });

        // Lifecycle states are left by the registry, not by availability.
        match (self.state(), availability) {
            (CoordinatorState::Connected, Availability::Unavailable) => {
                self.set_state(CoordinatorState::Disconnected)
            }
            (CoordinatorState::Disconnected, Availability::Available) => {
                self.set_state(CoordinatorState::Connected)
            }
            _ => {}
        }
    }

    fn on_stream_closed(&self) {
        warn!("Event stream of entry {} ended", self.entry_id);
        self.set_availability(Availability::Unavailable);
    }

    pub async fn arm_section(
        &self,
        number: u8,
        code: Option<&str>,
    ) -> std::result::Result<(), WriteError> {
        self.write(WriteAction::ArmSection(number), code).await
    }

    pub async fn disarm_section(
        &self,
        number: u8,
        code: Option<&str>,
    ) -> std::result::Result<(), WriteError> {
        self.write(WriteAction::DisarmSection(number), code).await
    }

    pub async fn bypass_input(
        &self,
        number: u16,
        code: Option<&str>,
    ) -> std::result::Result<(), WriteError> {
        self.write(WriteAction::BypassInput(number), code).await
    }

    pub async fn unbypass_input(
        &self,
        number: u16,
        code: Option<&str>,
    ) -> std::result::Result<(), WriteError> {
        self.write(WriteAction::UnbypassInput(number), code).await
    }

    /// Run one write. Without a configured user code nothing is sent. An
    /// explicit `code` overrides the configured one.
    async fn write(
        &self,
        action: WriteAction,
        code: Option<&str>,
    ) -> std::result::Result<(), WriteError> {
        let name = action.name();
        let target = action.target();

        let configured = self.user_code.borrow().clone();
        let Some(configured) = configured else {
            warn!("Refusing to {} {}: no user code configured", name, target);
            return Err(WriteError::NotAuthorized);
        };
        let code = code.map(str::to_string).unwrap_or(configured);

        let _guard = self.write_lock.lock().await;
        if !self.client.connected() {
            return Err(WriteError::Disconnected { action: name });
        }

        debug!("Sending {} {}", name, target);
        let request = async {
            match action {
                WriteAction::ArmSection(n) => self.client.arm_section(n, &code).await,
                WriteAction::DisarmSection(n) => self.client.disarm_section(n, &code).await,
                WriteAction::BypassInput(n) => self.client.bypass_input(n, &code).await,
                WriteAction::UnbypassInput(n) => self.client.unbypass_input(n, &code).await,
            }
        };

        match timeout(WRITE_TIMEOUT, request).await {
            Ok(Ok(true)) => {
                info!("{} {} accepted", name, target);
                Ok(())
            }
            Ok(Ok(false)) => {
                warn!("Panel rejected {} {}", name, target);
                Err(WriteError::PanelRejected { action: name, target })
            }
            Ok(Err(ClientError::Timeout)) | Err(_) => {
                warn!("Timeout during {} {}", name, target);
                Err(WriteError::Timeout { action: name })
            }
            Ok(Err(ClientError::Disconnected)) => Err(WriteError::Disconnected { action: name }),
            Ok(Err(e)) => Err(WriteError::Failed {
                action: name,
                reason: e.to_string(),
            }),
        }
    }

    /// Stop consuming the event stream and mark the panel unavailable.
    ///
    /// Idempotent and callable from any task. The session itself is closed
    /// by the connection supervisor that owns it.
    pub fn disconnect(&self) {
        if self.disconnected.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.event_task.get() {
            handle.abort();
        }
        self.set_availability(Availability::Unavailable);
        self.set_state(CoordinatorState::Disconnected);
        debug!("Coordinator of entry {} stopped", self.entry_id);
    }
}

impl<C: ProtocolClient> Drop for DeviceCoordinator<C> {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.event_task.get() {
            handle.abort();
        }
    }
}

async fn run_event_loop<C: ProtocolClient>(
    coordinator: Weak<DeviceCoordinator<C>>,
    mut events: ClientEventReceiver,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            event = events.recv() => {
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                match event {
                    Some(event) => {
                        coordinator.on_event(event);
                    }
                    None => {
                        coordinator.on_stream_closed();
                        break;
                    }
                }
            }
        }
    }
}
