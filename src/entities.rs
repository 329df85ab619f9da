// MIT License - Copyright (c) 2026 Peter Wright
// Entity plan: which entities a panel exposes, and what each displays

use std::collections::BTreeMap;

use crate::devices::{Features, Input, Output, Section};
use crate::event::Availability;
use crate::projection::{project_input, project_section, InputDisplay, SectionDisplay};

/// Kind of an exposed entity and the panel record it follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Connectivity sensor for the panel session.
    Online,
    /// Enum sensor showing an input's projected state.
    InputSensor { number: u16 },
    /// Alarm control panel that can arm and disarm a section.
    SectionAlarmPanel { number: u8 },
    /// Read-only enum sensor for a section.
    SectionSensor { number: u8 },
    OutputSwitch { number: u16 },
}

impl EntityKind {
    /// Entity key, unique within one panel.
    pub fn key(&self) -> String {
        match self {
            Self::Online => "online".to_string(),
            Self::InputSensor { number } => format!("input{}-enum", number),
            Self::SectionAlarmPanel { number } => format!("section{}-arm", number),
            Self::SectionSensor { number } => format!("section{}-enum", number),
            Self::OutputSwitch { number } => format!("output{}-switch", number),
        }
    }
}

/// One entity of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpec {
    pub kind: EntityKind,
    pub key: String,
    /// `<entry_id>-<key>`
    pub unique_id: String,
    pub name: Option<String>,
    pub icon: Option<&'static str>,
}

impl EntitySpec {
    fn new(entry_id: &str, kind: EntityKind, name: Option<String>) -> Self {
        let key = kind.key();
        Self {
            unique_id: format!("{}-{}", entry_id, key),
            kind,
            key,
            name,
            icon: None,
        }
    }
}

/// Everything needed to decide which entities exist.
#[derive(Debug, Clone, Copy)]
pub struct PlanInputs<'a> {
    pub features: Features,
    pub write_capable: bool,
    pub sections: &'a BTreeMap<u8, Section>,
    pub inputs: &'a BTreeMap<u16, Input>,
    pub outputs: &'a BTreeMap<u16, Output>,
}

/// The set of entities a panel exposes.
///
/// Every rebuild gets a new generation; consumers drop entities of older
/// generations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityPlan {
    pub generation: u64,
    pub write_capable: bool,
    pub entities: Vec<EntitySpec>,
}

impl EntityPlan {
    pub fn build(entry_id: &str, generation: u64, inputs: PlanInputs<'_>) -> Self {
        let mut entities = vec![EntitySpec::new(entry_id, EntityKind::Online, None)];

        let can_arm = inputs.features.contains(Features::ARM_SECTION);
        for section in inputs.sections.values().filter(|s| s.active) {
            let kind = if can_arm {
                if !inputs.write_capable {
                    continue;
                }
                EntityKind::SectionAlarmPanel {
                    number: section.number,
                }
            } else {
                EntityKind::SectionSensor {
                    number: section.number,
                }
            };
            entities.push(EntitySpec::new(entry_id, kind, section.name.clone()));
        }

        for input in inputs.inputs.values().filter(|i| i.is_in_use()) {
            let mut spec = EntitySpec::new(
                entry_id,
                EntityKind::InputSensor {
                    number: input.number,
                },
                input.name.clone(),
            );
            spec.icon = input.sensor_type.icon();
            entities.push(spec);
        }

        if inputs.features.contains(Features::SET_OUTPUT) {
            for output in inputs.outputs.values().filter(|o| o.is_programmed()) {
                entities.push(EntitySpec::new(
                    entry_id,
                    EntityKind::OutputSwitch {
                        number: output.number,
                    },
                    output.name.clone(),
                ));
            }
        }

        Self {
            generation,
            write_capable: inputs.write_capable,
            entities,
        }
    }

    pub fn get(&self, key: &str) -> Option<&EntitySpec> {
        self.entities.iter().find(|entity| entity.key == key)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Value displayed by an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityValue {
    Online(bool),
    Input(InputDisplay),
    Section(SectionDisplay),
    /// `None` while the output status is unknown.
    Output(Option<bool>),
}

/// Displayed state of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityState {
    pub available: bool,
    pub value: EntityValue,
}

/// Session facts the entity state depends on besides the panel records.
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub availability: Availability,
    pub connected: bool,
    pub sections: &'a BTreeMap<u8, Section>,
    pub inputs: &'a BTreeMap<u16, Input>,
    pub outputs: &'a BTreeMap<u16, Output>,
}

/// Compute the state of an entity. The online sensor is always available;
/// every other entity needs a live session and a usable record.
pub fn entity_state(kind: EntityKind, view: SessionView<'_>) -> EntityState {
    let live = view.connected && view.availability.is_available();
    match kind {
        EntityKind::Online => EntityState {
            available: true,
            value: EntityValue::Online(live),
        },
        EntityKind::InputSensor { number } => {
            let display = view
                .inputs
                .get(&number)
                .map(project_input)
                .unwrap_or(InputDisplay::Unavailable);
            EntityState {
                available: live && display != InputDisplay::Unavailable,
                value: EntityValue::Input(display),
            }
        }
        EntityKind::SectionAlarmPanel { number } | EntityKind::SectionSensor { number } => {
            let display = view
                .sections
                .get(&number)
                .map(project_section)
                .unwrap_or(SectionDisplay::Unavailable);
            EntityState {
                available: live && display != SectionDisplay::Unavailable,
                value: EntityValue::Section(display),
            }
        }
        EntityKind::OutputSwitch { number } => {
            let output = view.outputs.get(&number);
            EntityState {
                available: live && output.is_some_and(Output::is_programmed),
                value: EntityValue::Output(
                    output.filter(|o| o.status.is_some()).map(Output::is_on),
                ),
            }
        }
    }
}
