// MIT License - Copyright (c) 2026 Peter Wright
// Protocol commands, snapshots and coordinator events

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::devices::{Input, Section};

/// Commands delivered by the protocol client's event stream.
///
/// Only the commands the bridge reacts to are named; everything else is
/// carried as [`Command::Other`] with its raw code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    ConnectionRequestResponse,
    PollAliveResponse,
    NormalDisconnect,
    EventOccurred,
    InputStatusChanged,
    InputStatusUpdate,
    ResponseRequestSectionStatus,
    ResponseRequestInputArrangement,
    ReloadConfiguration,
    Reauthenticate,
    Other(u16),
}

impl Command {
    pub const NAMED: [Command; 10] = [
        Self::ConnectionRequestResponse,
        Self::PollAliveResponse,
        Self::NormalDisconnect,
        Self::EventOccurred,
        Self::InputStatusChanged,
        Self::InputStatusUpdate,
        Self::ResponseRequestSectionStatus,
        Self::ResponseRequestInputArrangement,
        Self::ReloadConfiguration,
        Self::Reauthenticate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionRequestResponse => "ConnectionRequestResponse",
            Self::PollAliveResponse => "PollAliveResponse",
            Self::NormalDisconnect => "NormalDisconnect",
            Self::EventOccurred => "EventOccurred",
            Self::InputStatusChanged => "InputStatusChanged",
            Self::InputStatusUpdate => "InputStatusUpdate",
            Self::ResponseRequestSectionStatus => "ResponseRequestSectionStatus",
            Self::ResponseRequestInputArrangement => "ResponseRequestInputArrangement",
            Self::ReloadConfiguration => "ReloadConfiguration",
            Self::Reauthenticate => "Reauthenticate",
            Self::Other(_) => "Other",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED.into_iter().find(|command| command.name() == name)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "Other(0x{code:04x})"),
            named => f.write_str(named.name()),
        }
    }
}

/// A logged panel event (alarm, arm, disarm, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub event_number: u16,
    pub description: String,
    pub user_number: Option<u16>,
    pub input_number: Option<u16>,
    pub sections: BTreeSet<u8>,
}

/// Payload accompanying a command, one case per command family.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventPayload {
    #[default]
    Empty,
    Sections(BTreeMap<u8, Section>),
    Inputs(BTreeMap<u16, Input>),
    Input(Input),
    Event(EventRecord),
}

/// One `(command, payload)` pair as delivered by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEvent {
    pub command: Command,
    pub payload: EventPayload,
}

impl ClientEvent {
    pub fn new(command: Command, payload: EventPayload) -> Self {
        Self { command, payload }
    }

    /// A command without payload.
    pub fn bare(command: Command) -> Self {
        Self::new(command, EventPayload::Empty)
    }
}

/// The latest operational event, published as a unit so readers never see a
/// command paired with another command's payload.
pub type Snapshot = ClientEvent;

/// Whether the panel session is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    Available,
    Unavailable,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        *self == Self::Available
    }
}

/// Coordinator connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorState {
    Disconnected,
    Connecting,
    Connected,
    Reauthenticating,
    Reloading,
}

/// Events published by a coordinator to its subscribers.
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// A new snapshot was published.
    SnapshotUpdated { command: Command },
    AvailabilityChanged { availability: Availability },
    StateChanged { state: CoordinatorState },
    /// The entity plan was rebuilt; consumers must drop every entity of older
    /// generations and create the current plan.
    EntitiesInvalidated { generation: u64, write_capable: bool },
}

/// What a lifecycle request asks the owner of an entry to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleKind {
    Reload,
    Reauthenticate,
}

/// A request from a coordinator to the registry, never awaited inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleRequest {
    pub entry_id: String,
    pub kind: LifecycleKind,
}

/// Events published by the registry about configuration entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    EntryLoaded { entry_id: String },
    EntryUnloaded { entry_id: String },
    /// The panel rejected the stored shared key; run the reauthentication flow.
    ReauthRequired { entry_id: String },
    SetupFailed {
        entry_id: String,
        reason: String,
        retryable: bool,
    },
}

/// Type alias for the coordinator broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<CoordinatorEvent>;

/// Type alias for the coordinator broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<CoordinatorEvent>;

/// Create a new coordinator event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
