// MIT License - Copyright (c) 2026 Peter Wright
// UNii integration constants

use std::time::Duration;

/// Integration domain, used as the namespace of device identifiers.
pub const DOMAIN: &str = "unii";

/// Manufacturer reported in the device info.
pub const MANUFACTURER: &str = "Alphatronics";

/// Model reported in the device info.
pub const MODEL: &str = "UNii";

/// Configuration URL reported in the device info.
pub const CONFIGURATION_URL: &str = "https://unii-security.com/";

/// Default TCP control port of a UNii panel.
pub const DEFAULT_PORT: u16 = 6502;

/// Only locally connected panels are supported.
pub const CONF_TYPE_LOCAL: &str = "local";

/// The transport takes a fixed-width shared key.
pub const SHARED_KEY_LEN: usize = 16;

/// Padding byte used to fill short shared keys (ASCII space).
pub const SHARED_KEY_PAD: u8 = 0x20;

/// The panel refuses a new connection right after a disconnect.
pub const UNLOAD_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// After DHCP announces a rebooted panel its control port is not open yet.
pub const DISCOVERY_BOOT_WAIT: Duration = Duration::from_secs(10);

/// Timeout for the plain TCP probe of the control port.
pub const PORT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on an arm/disarm/bypass round trip.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the coordinator and registry broadcast channels.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
