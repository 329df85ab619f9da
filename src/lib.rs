// MIT License - Copyright (c) 2026 Peter Wright
// Connectivity and state layer for Alphatronics UNii panels
//
//! # unii-lan-bridge
//!
//! Keeps one session per configured Alphatronics UNii security panel, resolves
//! a stable device identity across firmware versions, projects the panel's
//! event stream onto a queryable snapshot of its sections, inputs and outputs,
//! and gates arm/disarm/bypass behind a configured user code.
//!
//! The wire protocol is not part of this crate: applications plug in a
//! [`ProtocolClient`] through a [`ClientFactory`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use unii_lan_bridge::{ConfigEntries, FormInput, PairingFlow, Registry};
//!
//! #[tokio::main]
//! async fn main() -> unii_lan_bridge::Result<()> {
//!     unii_lan_bridge::logging::init_logging();
//!
//!     let registry = Registry::with_store(Arc::new(MyFactory), "unii.toml")?;
//!
//!     let mut flow = PairingFlow::new(registry.clone());
//!     flow.user();
//!     flow.submit(FormInput::local("192.168.0.50", 6502, "my shared key")).await?;
//!
//!     for (entry_id, err) in registry.setup_all().await {
//!         eprintln!("{entry_id}: {err}");
//!     }
//!
//!     let mut events = registry.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod devices;
pub mod entities;
pub mod error;
pub mod event;
pub mod identity;
pub mod logging;
pub mod pairing;
pub mod projection;
pub mod registry;
pub mod shared_key;
pub mod supervisor;
pub mod transport;

// Re-exports for convenience
pub use client::{ClientEventReceiver, ClientFactory, ProtocolClient};
pub use config::{ConfigEntries, ConfigEntry, EntryData, EntryDataBuilder, EntryOptions};
pub use coordinator::{DeviceCoordinator, Dispatch};
pub use devices::{
    DeviceInfo, EquipmentInfo, Features, Input, InputState, InputType, Output, OutputStatus,
    Section, SectionArmedState, SensorType,
};
pub use entities::{EntityKind, EntityPlan, EntitySpec, EntityState, EntityValue};
pub use error::{
    ClientError, ConfigError, ConnectError, PairingError, Result, UniiError, WriteError,
};
pub use event::{
    Availability, ClientEvent, Command, CoordinatorEvent, CoordinatorState, EventPayload,
    EventRecord, LifecycleKind, LifecycleRequest, RegistryEvent, Snapshot,
};
pub use identity::{
    reconcile_unique_id, resolve_identity, ConnectionSource, DeviceIdentity, IdentitySignals,
    MacAddress,
};
pub use pairing::{DhcpDiscovery, Field, FlowStep, FormInput, FormKind, OptionsFlow, PairingFlow};
pub use projection::{InputDisplay, SectionDisplay};
pub use registry::Registry;
pub use shared_key::SharedKey;
pub use supervisor::{ConnectionSupervisor, TestedDevice};
