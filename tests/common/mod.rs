// MIT License - Copyright (c) 2026 Peter Wright
// In-memory protocol client for integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};

use unii_lan_bridge::{
    ClientError, ClientEvent, ClientEventReceiver, ClientFactory, ConfigEntries, EntryData,
    EquipmentInfo, Features, Input, InputState, MacAddress, Output, OutputStatus, ProtocolClient,
    Section, SectionArmedState, SharedKey,
};

pub const HOST: &str = "10.0.0.5";
pub const PORT: u16 = 6502;
pub const KEY: &str = "mykey1234567890x";
pub const MAC: &str = "aa:bb:cc:dd:ee:ff";

/// What the simulated panel looks like and how it behaves.
#[derive(Debug, Clone)]
pub struct PanelState {
    pub shared_key: SharedKey,
    pub reachable: bool,
    pub port_open: bool,
    pub equipment: EquipmentInfo,
    pub features: Features,
    pub sections: BTreeMap<u8, Section>,
    pub inputs: BTreeMap<u16, Input>,
    pub outputs: BTreeMap<u16, Output>,
    pub write_accept: bool,
    pub write_delay: Option<Duration>,
    pub connect_delay: Option<Duration>,
}

impl Default for PanelState {
    fn default() -> Self {
        let sections = [
            Section::new(1).with_state(SectionArmedState::Disarmed).with_name("House"),
            Section::new(2),
        ]
        .into_iter()
        .map(|s| (s.number, s))
        .collect();
        let inputs = [
            Input::new(1).with_status(InputState::InputOk).with_name("Front door"),
            Input::new(2).with_status(InputState::Disabled),
        ]
        .into_iter()
        .map(|i| (i.number, i))
        .collect();
        let outputs = [Output::new(1).with_status(OutputStatus::Off)]
            .into_iter()
            .map(|o| (o.number, o))
            .collect();

        let mut equipment = EquipmentInfo::new("UNii");
        equipment.serial_number = "123456".to_string();
        equipment.software_version = "2.17.0".to_string();

        Self {
            shared_key: SharedKey::normalize(KEY),
            reachable: true,
            port_open: true,
            equipment,
            features: Features::all(),
            sections,
            inputs,
            outputs,
            write_accept: true,
            write_delay: None,
            connect_delay: None,
        }
    }
}

impl PanelState {
    /// Firmware that reports its mac address.
    pub fn with_mac(mut self) -> Self {
        self.equipment.mac_address = Some(mac());
        self
    }
}

pub fn mac() -> MacAddress {
    MAC.parse().unwrap()
}

/// Observations shared between the factory and its clients.
#[derive(Default)]
pub struct Recorder {
    pub connects: Mutex<Vec<Instant>>,
    pub disconnects: AtomicUsize,
    pub writes: Mutex<Vec<(String, u16, String)>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub event_tx: Mutex<Option<mpsc::UnboundedSender<ClientEvent>>>,
}

pub struct MockClient {
    host: String,
    port: u16,
    shared_key: SharedKey,
    panel: Arc<Mutex<PanelState>>,
    recorder: Arc<Recorder>,
    connected: AtomicBool,
    opened: AtomicBool,
    event_rx: Mutex<Option<ClientEventReceiver>>,
}

impl MockClient {
    fn open(&self) -> Result<bool, ClientError> {
        let panel = self.panel.lock().unwrap();
        if !panel.reachable {
            return Ok(false);
        }
        if panel.shared_key != self.shared_key {
            return Err(ClientError::Encryption);
        }
        self.opened.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn write(&self, action: &str, number: u16, code: &str) -> Result<bool, ClientError> {
        let (delay, accept) = {
            let panel = self.panel.lock().unwrap();
            (panel.write_delay, panel.write_accept)
        };
        self.recorder
            .writes
            .lock()
            .unwrap()
            .push((action.to_string(), number, code.to_string()));

        let now = self.recorder.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        self.recorder.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(accept)
    }
}

impl ProtocolClient for MockClient {
    async fn connect(&self) -> Result<bool, ClientError> {
        self.recorder.connects.lock().unwrap().push(Instant::now());
        let delay = self.panel.lock().unwrap().connect_delay;
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        let opened = self.open()?;
        self.connected.store(opened, Ordering::SeqCst);
        Ok(opened)
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);
        self.recorder.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn test_connection(&self) -> Result<bool, ClientError> {
        self.open()
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn equipment_information(&self) -> Option<EquipmentInfo> {
        self.opened
            .load(Ordering::SeqCst)
            .then(|| self.panel.lock().unwrap().equipment.clone())
    }

    fn connection_unique_id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn sections(&self) -> BTreeMap<u8, Section> {
        self.panel.lock().unwrap().sections.clone()
    }

    fn inputs(&self) -> BTreeMap<u16, Input> {
        self.panel.lock().unwrap().inputs.clone()
    }

    fn outputs(&self) -> BTreeMap<u16, Output> {
        self.panel.lock().unwrap().outputs.clone()
    }

    fn features(&self) -> Features {
        self.panel.lock().unwrap().features
    }

    fn take_event_receiver(&self) -> Option<ClientEventReceiver> {
        self.event_rx.lock().unwrap().take()
    }

    async fn arm_section(&self, number: u8, code: &str) -> Result<bool, ClientError> {
        self.write("arm", u16::from(number), code).await
    }

    async fn disarm_section(&self, number: u8, code: &str) -> Result<bool, ClientError> {
        self.write("disarm", u16::from(number), code).await
    }

    async fn bypass_input(&self, number: u16, code: &str) -> Result<bool, ClientError> {
        self.write("bypass", number, code).await
    }

    async fn unbypass_input(&self, number: u16, code: &str) -> Result<bool, ClientError> {
        self.write("unbypass", number, code).await
    }
}

#[derive(Default)]
pub struct MockFactory {
    pub panel: Arc<Mutex<PanelState>>,
    pub recorder: Arc<Recorder>,
}

impl MockFactory {
    pub fn new(panel: PanelState) -> Arc<Self> {
        Arc::new(Self {
            panel: Arc::new(Mutex::new(panel)),
            recorder: Arc::new(Recorder::default()),
        })
    }

    pub fn update(&self, f: impl FnOnce(&mut PanelState)) {
        f(&mut self.panel.lock().unwrap());
    }

    /// Push an event into the stream of the most recently created client.
    pub fn send_event(&self, event: ClientEvent) {
        let tx = self.recorder.event_tx.lock().unwrap();
        tx.as_ref().unwrap().send(event).unwrap();
    }

    /// End the event stream of the most recently created client.
    pub fn close_events(&self) {
        self.recorder.event_tx.lock().unwrap().take();
    }

    pub fn connect_count(&self) -> usize {
        self.recorder.connects.lock().unwrap().len()
    }

    pub fn connect_times(&self) -> Vec<Instant> {
        self.recorder.connects.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(String, u16, String)> {
        self.recorder.writes.lock().unwrap().clone()
    }

    pub fn disconnect_count(&self) -> usize {
        self.recorder.disconnects.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.recorder.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ClientFactory for MockFactory {
    type Client = MockClient;

    fn create(&self, host: &str, port: u16, shared_key: &SharedKey) -> MockClient {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.recorder.event_tx.lock().unwrap() = Some(tx);
        MockClient {
            host: host.to_string(),
            port,
            shared_key: *shared_key,
            panel: self.panel.clone(),
            recorder: self.recorder.clone(),
            connected: AtomicBool::new(false),
            opened: AtomicBool::new(false),
            event_rx: Mutex::new(Some(rx)),
        }
    }

    async fn probe_port(&self, _host: &str, _port: u16) -> bool {
        self.panel.lock().unwrap().port_open
    }
}

/// Connected client straight from the factory.
pub async fn connected_client(factory: &MockFactory) -> Arc<MockClient> {
    let client = factory.create(HOST, PORT, &SharedKey::normalize(KEY));
    assert!(client.connect().await.unwrap());
    Arc::new(client)
}

pub fn entry_data() -> EntryData {
    EntryData::builder()
        .host(HOST)
        .port(PORT)
        .shared_key(SharedKey::normalize(KEY))
        .build()
}

/// Store with one user entered entry keyed by `unique_id`.
pub fn entries_with(unique_id: &str) -> (ConfigEntries, String) {
    let mut entries = ConfigEntries::new();
    let entry_id = entries.add(
        unique_id,
        "Alphatronics UNii",
        unii_lan_bridge::ConnectionSource::UserEntered,
        entry_data(),
    );
    (entries, entry_id)
}
