// MIT License - Copyright (c) 2026 Peter Wright
// UNii inputs (detectors, contacts, keyswitches)

use std::collections::BTreeSet;

/// Input status as reported by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InputState {
    InputOk = 0,
    Alarm = 1,
    Tamper = 2,
    Masking = 3,
    Disabled = 4,
}

impl InputState {
    pub const ALL: [InputState; 5] = [
        Self::InputOk,
        Self::Alarm,
        Self::Tamper,
        Self::Masking,
        Self::Disabled,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.get(usize::from(v)).copied()
    }
}

/// What kind of detector is wired to an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SensorType {
    NotActive = 0,
    Burglary = 1,
    Fire = 2,
    Tamper = 3,
    Holdup = 4,
    Medical = 5,
    Gas = 6,
    Water = 7,
    Technical = 8,
    DirectDialerInput = 9,
    Keyswitch = 10,
    NoAlarm = 11,
    En54Fire = 12,
    En54FireMcp = 13,
    En54Fault = 14,
    Glassbreak = 15,
}

impl SensorType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::NotActive,
            1 => Self::Burglary,
            2 => Self::Fire,
            3 => Self::Tamper,
            4 => Self::Holdup,
            5 => Self::Medical,
            6 => Self::Gas,
            7 => Self::Water,
            8 => Self::Technical,
            9 => Self::DirectDialerInput,
            10 => Self::Keyswitch,
            11 => Self::NoAlarm,
            12 => Self::En54Fire,
            13 => Self::En54FireMcp,
            14 => Self::En54Fault,
            15 => Self::Glassbreak,
            _ => return None,
        })
    }

    /// Icon hint for presentation layers; `None` keeps the default.
    pub fn icon(&self) -> Option<&'static str> {
        match self {
            Self::Fire | Self::En54Fire => Some("mdi:fire"),
            Self::Medical => Some("mdi:hospital-box"),
            Self::Water => Some("mdi:water-outline"),
            Self::DirectDialerInput => Some("mdi:phone"),
            Self::Keyswitch => Some("mdi:key"),
            _ => None,
        }
    }
}

/// How an input is connected to the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputType {
    Wired,
    Bus,
    Wireless,
    Other(u8),
}

impl InputType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Wired,
            1 => Self::Bus,
            2 => Self::Wireless,
            other => Self::Other(other),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Wired => "Wired Input",
            Self::Bus => "Bus Input",
            Self::Wireless => "Wireless Input",
            Self::Other(_) => "Other",
        }
    }
}

/// A single input of the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub number: u16,
    pub name: Option<String>,
    /// `None` until the panel has reported a status for this input.
    pub status: Option<InputState>,
    pub bypassed: bool,
    pub supervision: bool,
    pub sensor_type: SensorType,
    pub input_type: InputType,
    pub sections: BTreeSet<u8>,
}

impl Input {
    pub fn new(number: u16) -> Self {
        Self {
            number,
            name: None,
            status: None,
            bypassed: false,
            supervision: false,
            sensor_type: SensorType::NotActive,
            input_type: InputType::Wired,
            sections: BTreeSet::new(),
        }
    }

    pub fn with_status(mut self, status: InputState) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_sensor_type(mut self, sensor_type: SensorType) -> Self {
        self.sensor_type = sensor_type;
        self
    }

    pub fn bypassed(mut self, bypassed: bool) -> Self {
        self.bypassed = bypassed;
        self
    }

    /// Whether the panel reported a usable status for this input.
    pub fn is_in_use(&self) -> bool {
        matches!(self.status, Some(status) if status != InputState::Disabled)
    }

    pub fn is_alarm(&self) -> bool {
        self.status == Some(InputState::Alarm)
    }

    pub fn is_tamper(&self) -> bool {
        self.status == Some(InputState::Tamper)
    }

    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Input {}", self.number))
    }
}
