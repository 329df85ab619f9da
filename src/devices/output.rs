// MIT License - Copyright (c) 2026 Peter Wright
// UNii outputs

/// Output status as reported by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OutputStatus {
    /// Output is not programmed on the panel.
    NotActive = 0,
    Off = 1,
    On = 2,
}

impl OutputStatus {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::NotActive),
            1 => Some(Self::Off),
            2 => Some(Self::On),
            _ => None,
        }
    }
}

/// A single output of the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub number: u16,
    pub name: Option<String>,
    /// `None` until the panel has reported a status for this output.
    pub status: Option<OutputStatus>,
}

impl Output {
    pub fn new(number: u16) -> Self {
        Self {
            number,
            name: None,
            status: None,
        }
    }

    pub fn with_status(mut self, status: OutputStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Programmed outputs are the only ones worth exposing.
    pub fn is_programmed(&self) -> bool {
        matches!(self.status, Some(status) if status != OutputStatus::NotActive)
    }

    pub fn is_on(&self) -> bool {
        self.status == Some(OutputStatus::On)
    }
}
