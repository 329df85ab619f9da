// MIT License - Copyright (c) 2026 Peter Wright
// Panel equipment information and capabilities

use std::collections::BTreeSet;

use bitflags::bitflags;

use crate::constants::{CONFIGURATION_URL, DOMAIN, MANUFACTURER, MODEL};
use crate::identity::MacAddress;

bitflags! {
    /// Optional capabilities a panel firmware advertises.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Features: u8 {
        /// Sections can be armed and disarmed remotely.
        const ARM_SECTION  = 0b0000_0001;
        /// Inputs can be bypassed remotely.
        const BYPASS_INPUT = 0b0000_0010;
        /// Outputs can be switched remotely.
        const SET_OUTPUT   = 0b0000_0100;
    }
}

/// Equipment information read from the panel once per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentInfo {
    pub device_name: String,
    pub serial_number: String,
    pub software_version: String,
    /// Only reported by newer firmware.
    pub mac_address: Option<MacAddress>,
    pub device_id: Option<String>,
}

impl EquipmentInfo {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            serial_number: String::new(),
            software_version: String::new(),
            mac_address: None,
            device_id: None,
        }
    }
}

/// Description of the physical device for a device registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// `(domain, id)` pairs identifying the device.
    pub identifiers: BTreeSet<(String, String)>,
    /// Network connections (only the mac address, when known).
    pub connections: BTreeSet<MacAddress>,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub configuration_url: &'static str,
    pub name: String,
    pub serial_number: String,
    pub sw_version: String,
}

impl DeviceInfo {
    /// Build the device info for a connected panel.
    ///
    /// A known mac address identifies the device; otherwise the connection
    /// id (host based) is used.
    pub fn new(equipment: &EquipmentInfo, mac: Option<MacAddress>, connection_id: &str) -> Self {
        let mut identifiers = BTreeSet::new();
        let mut connections = BTreeSet::new();
        match mac {
            Some(mac) => {
                identifiers.insert((DOMAIN.to_string(), mac.to_string()));
                connections.insert(mac);
            }
            None => {
                identifiers.insert((DOMAIN.to_string(), connection_id.to_string()));
            }
        }

        Self {
            identifiers,
            connections,
            manufacturer: MANUFACTURER,
            model: MODEL,
            configuration_url: CONFIGURATION_URL,
            name: equipment.device_name.clone(),
            serial_number: equipment.serial_number.clone(),
            sw_version: equipment.software_version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_prefers_mac() {
        let mac: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let info = DeviceInfo::new(&EquipmentInfo::new("UNii"), Some(mac), "10.0.0.5:6502");
        assert!(info.identifiers.contains(&("unii".to_string(), "aa:bb:cc:dd:ee:ff".to_string())));
        assert!(info.connections.contains(&mac));
        assert_eq!(info.manufacturer, "Alphatronics");
    }

    #[test]
    fn test_device_info_falls_back_to_connection() {
        let info = DeviceInfo::new(&EquipmentInfo::new("UNii"), None, "10.0.0.5:6502");
        assert!(info.identifiers.contains(&("unii".to_string(), "10.0.0.5:6502".to_string())));
        assert!(info.connections.is_empty());
    }

    #[test]
    fn test_features() {
        let features = Features::ARM_SECTION | Features::SET_OUTPUT;
        assert!(features.contains(Features::ARM_SECTION));
        assert!(!features.contains(Features::BYPASS_INPUT));
    }
}
