// MIT License - Copyright (c) 2026 Peter Wright
// UNii sections (the panel's arming areas)

/// Armed state of a section as reported by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SectionArmedState {
    NotProgrammed = 0,
    Armed = 1,
    Disarmed = 2,
    Alarm = 3,
    /// Exit delay running; the section becomes armed when it expires.
    ExitTimer = 4,
    /// Entry delay running; the section is still armed until disarmed.
    EntryTimer = 5,
}

impl SectionArmedState {
    /// Every variant, in wire order.
    pub const ALL: [SectionArmedState; 6] = [
        Self::NotProgrammed,
        Self::Armed,
        Self::Disarmed,
        Self::Alarm,
        Self::ExitTimer,
        Self::EntryTimer,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.get(usize::from(v)).copied()
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::NotProgrammed => "Not programmed",
            Self::Armed => "Armed",
            Self::Disarmed => "Disarmed",
            Self::Alarm => "Alarm",
            Self::ExitTimer => "Exit timer",
            Self::EntryTimer => "Entry timer",
        }
    }
}

/// A single section of the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub number: u8,
    pub name: Option<String>,
    pub active: bool,
    pub armed_state: SectionArmedState,
}

impl Section {
    pub fn new(number: u8) -> Self {
        Self {
            number,
            name: None,
            active: false,
            armed_state: SectionArmedState::NotProgrammed,
        }
    }

    pub fn with_state(mut self, armed_state: SectionArmedState) -> Self {
        self.active = armed_state != SectionArmedState::NotProgrammed;
        self.armed_state = armed_state;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_armed(&self) -> bool {
        matches!(
            self.armed_state,
            SectionArmedState::Armed | SectionArmedState::EntryTimer
        )
    }

    pub fn is_alarm(&self) -> bool {
        self.armed_state == SectionArmedState::Alarm
    }

    /// Name for display, falling back to the section number.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Section {}", self.number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_armed_state_from_u8() {
        assert_eq!(SectionArmedState::from_u8(0), Some(SectionArmedState::NotProgrammed));
        assert_eq!(SectionArmedState::from_u8(4), Some(SectionArmedState::ExitTimer));
        assert_eq!(SectionArmedState::from_u8(5), Some(SectionArmedState::EntryTimer));
        assert_eq!(SectionArmedState::from_u8(6), None);
    }

    #[test]
    fn test_entry_timer_counts_as_armed() {
        let section = Section::new(1).with_state(SectionArmedState::EntryTimer);
        assert!(section.is_armed());
        assert!(section.active);
        let section = Section::new(1).with_state(SectionArmedState::ExitTimer);
        assert!(!section.is_armed());
    }

    #[test]
    fn test_label_fallback() {
        assert_eq!(Section::new(3).label(), "Section 3");
        assert_eq!(Section::new(3).with_name("Garage").label(), "Garage");
    }
}
