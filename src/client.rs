// MIT License - Copyright (c) 2026 Peter Wright
// Protocol client abstraction

use std::collections::BTreeMap;
use std::future::Future;

use tokio::sync::mpsc;

use crate::constants::PORT_PROBE_TIMEOUT;
use crate::devices::{EquipmentInfo, Features, Input, Output, Section};
use crate::error::ClientError;
use crate::event::ClientEvent;
use crate::shared_key::SharedKey;
use crate::transport::probe;

/// Receiving half of a client's event stream.
pub type ClientEventReceiver = mpsc::UnboundedReceiver<ClientEvent>;

/// A session with one UNii panel.
///
/// Implementations own the wire protocol and its encryption. The bridge only
/// drives the session and consumes its event stream. All methods take `&self`
/// so the client can be shared between the coordinator task and writers.
pub trait ProtocolClient: Send + Sync + 'static {
    /// Open the session. `Ok(false)` means the panel did not answer;
    /// [`ClientError::Encryption`] means the shared key was rejected.
    fn connect(&self) -> impl Future<Output = Result<bool, ClientError>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Open, probe and close a throw-away session.
    fn test_connection(&self) -> impl Future<Output = Result<bool, ClientError>> + Send;

    fn connected(&self) -> bool;

    /// Read once per connection; `None` before the session is open.
    fn equipment_information(&self) -> Option<EquipmentInfo>;

    /// Host based identifier of the connection, e.g. `10.0.0.5:6502`.
    fn connection_unique_id(&self) -> String;

    fn sections(&self) -> BTreeMap<u8, Section>;
    fn inputs(&self) -> BTreeMap<u16, Input>;
    fn outputs(&self) -> BTreeMap<u16, Output>;
    fn features(&self) -> Features;

    /// Hand out the event stream. Only the first call returns a receiver.
    fn take_event_receiver(&self) -> Option<ClientEventReceiver>;

    /// Write commands answer `Ok(false)` when the panel refuses them.
    fn arm_section(
        &self,
        number: u8,
        code: &str,
    ) -> impl Future<Output = Result<bool, ClientError>> + Send;
    fn disarm_section(
        &self,
        number: u8,
        code: &str,
    ) -> impl Future<Output = Result<bool, ClientError>> + Send;
    fn bypass_input(
        &self,
        number: u16,
        code: &str,
    ) -> impl Future<Output = Result<bool, ClientError>> + Send;
    fn unbypass_input(
        &self,
        number: u16,
        code: &str,
    ) -> impl Future<Output = Result<bool, ClientError>> + Send;
}

/// Creates protocol clients for a panel endpoint.
pub trait ClientFactory: Send + Sync + 'static {
    type Client: ProtocolClient;

    fn create(&self, host: &str, port: u16, shared_key: &SharedKey) -> Self::Client;

    /// Whether the panel's control port accepts TCP connections.
    fn probe_port(&self, host: &str, port: u16) -> impl Future<Output = bool> + Send {
        probe::tcp_probe(host.to_string(), port, PORT_PROBE_TIMEOUT)
    }
}
