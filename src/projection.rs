// MIT License - Copyright (c) 2026 Peter Wright
// Projection of panel records onto displayed entity state
//
// Both projections are ordered data tables. The first row whose predicate
// matches decides the outcome, so every record maps to exactly one state.

use crate::devices::{Input, InputState, Section, SectionArmedState};

/// Displayed state of an input sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputDisplay {
    Unavailable,
    Bypassed,
    Alarm,
    Tamper,
    Masking,
    Clear,
}

impl InputDisplay {
    /// Enum option as shown by an `enum` sensor; `None` when unavailable.
    pub fn as_option(&self) -> Option<&'static str> {
        match self {
            Self::Unavailable => None,
            Self::Bypassed => Some("bypassed"),
            Self::Alarm => Some("alarm"),
            Self::Tamper => Some("tamper"),
            Self::Masking => Some("masking"),
            Self::Clear => Some("clear"),
        }
    }
}

/// Options of the input `enum` sensor.
pub const INPUT_OPTIONS: [&str; 5] = ["clear", "alarm", "tamper", "masking", "bypassed"];

type InputRule = (fn(&Input) -> bool, InputDisplay);

fn input_unavailable(input: &Input) -> bool {
    input.supervision || !matches!(input.status, Some(status) if status != InputState::Disabled)
}

fn input_bypassed(input: &Input) -> bool {
    input.bypassed
}

fn input_alarm(input: &Input) -> bool {
    input.status == Some(InputState::Alarm)
}

fn input_tamper(input: &Input) -> bool {
    input.status == Some(InputState::Tamper)
}

fn input_masking(input: &Input) -> bool {
    input.status == Some(InputState::Masking)
}

fn input_ok(input: &Input) -> bool {
    input.status == Some(InputState::InputOk)
}

/// Input precedence, highest first.
pub const INPUT_PRECEDENCE: [InputRule; 6] = [
    (input_unavailable, InputDisplay::Unavailable),
    (input_bypassed, InputDisplay::Bypassed),
    (input_alarm, InputDisplay::Alarm),
    (input_tamper, InputDisplay::Tamper),
    (input_masking, InputDisplay::Masking),
    (input_ok, InputDisplay::Clear),
];

pub fn project_input(input: &Input) -> InputDisplay {
    INPUT_PRECEDENCE
        .iter()
        .find(|(applies, _)| applies(input))
        .map(|(_, display)| *display)
        .unwrap_or(InputDisplay::Unavailable)
}

/// Displayed state of a section (alarm panel or section sensor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionDisplay {
    Unavailable,
    Armed,
    Disarmed,
    Triggered,
    Arming,
}

impl SectionDisplay {
    /// State of an alarm control panel; `None` when unavailable.
    pub fn as_panel_state(&self) -> Option<&'static str> {
        match self {
            Self::Unavailable => None,
            Self::Armed => Some("armed_away"),
            Self::Disarmed => Some("disarmed"),
            Self::Triggered => Some("triggered"),
            Self::Arming => Some("arming"),
        }
    }

    /// Option of the read-only section `enum` sensor.
    pub fn as_option(&self) -> Option<&'static str> {
        match self {
            Self::Unavailable => None,
            Self::Armed => Some("armed"),
            Self::Disarmed => Some("disarmed"),
            Self::Triggered => Some("alarm"),
            Self::Arming => Some("arming"),
        }
    }
}

/// Section armed state projection, in wire order.
pub const SECTION_STATES: [(SectionArmedState, SectionDisplay); 6] = [
    (SectionArmedState::NotProgrammed, SectionDisplay::Unavailable),
    (SectionArmedState::Armed, SectionDisplay::Armed),
    (SectionArmedState::Disarmed, SectionDisplay::Disarmed),
    (SectionArmedState::Alarm, SectionDisplay::Triggered),
    (SectionArmedState::ExitTimer, SectionDisplay::Arming),
    (SectionArmedState::EntryTimer, SectionDisplay::Armed),
];

pub fn project_section(section: &Section) -> SectionDisplay {
    if !section.active {
        return SectionDisplay::Unavailable;
    }
    SECTION_STATES
        .iter()
        .find(|(state, _)| *state == section.armed_state)
        .map(|(_, display)| *display)
        .unwrap_or(SectionDisplay::Unavailable)
}
