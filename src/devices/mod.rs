// MIT License - Copyright (c) 2026 Peter Wright

pub mod equipment;
pub mod input;
pub mod output;
pub mod section;

pub use equipment::{DeviceInfo, EquipmentInfo, Features};
pub use input::{Input, InputState, InputType, SensorType};
pub use output::{Output, OutputStatus};
pub use section::{Section, SectionArmedState};
