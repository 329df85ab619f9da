// MIT License - Copyright (c) 2026 Peter Wright
// Stable device identity across firmware versions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A 48-bit hardware address.
///
/// Parsed case-insensitively from `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff`
/// or `aabbccddeeff`; always formatted lowercase with colons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid mac address: {0:?}")]
pub struct InvalidMacAddress(String);

impl FromStr for MacAddress {
    type Err = InvalidMacAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidMacAddress(s.to_string());
        let trimmed = s.trim();

        let digits: String = if trimmed.len() == 17 {
            let sep = trimmed.as_bytes()[2];
            if sep != b':' && sep != b'-' {
                return Err(invalid());
            }
            let groups: Vec<&str> = trimmed.split(char::from(sep)).collect();
            if groups.len() != 6 || groups.iter().any(|g| g.len() != 2) {
                return Err(invalid());
            }
            groups.concat()
        } else if trimmed.len() == 12 {
            trimmed.to_string()
        } else {
            return Err(invalid());
        };

        let mut octets = [0u8; 6];
        hex::decode_to_slice(&digits, &mut octets).map_err(|_| invalid())?;
        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = InvalidMacAddress;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Whether a stored identifier has the shape of a mac address
/// (six colon-separated hex octets).
pub fn is_mac_shaped(id: &str) -> bool {
    id.len() == 17
        && id.split(':').count() == 6
        && id
            .split(':')
            .all(|octet| octet.len() == 2 && octet.chars().all(|c| c.is_ascii_hexdigit()))
}

/// How a configuration entry came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionSource {
    UserEntered,
    DhcpDiscovered,
}

/// All identity signals known about a panel at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Mac address reported by the panel's equipment information.
    pub mac_address: Option<MacAddress>,
    /// Host (or endpoint) the panel is reached at.
    pub host: String,
    /// Identifier stored by an earlier setup, if any.
    pub legacy_unique_id: Option<String>,
    pub device_id: Option<String>,
}

/// Inputs of [`resolve_identity`].
#[derive(Debug, Clone, Copy)]
pub struct IdentitySignals<'a> {
    pub reported_mac: Option<MacAddress>,
    pub source: ConnectionSource,
    pub discovered_mac: Option<MacAddress>,
    pub prior_unique_id: Option<&'a str>,
    pub host: &'a str,
}

impl<'a> IdentitySignals<'a> {
    pub fn new(source: ConnectionSource, host: &'a str) -> Self {
        Self {
            reported_mac: None,
            source,
            discovered_mac: None,
            prior_unique_id: None,
            host,
        }
    }

    pub fn reported_mac(mut self, mac: Option<MacAddress>) -> Self {
        self.reported_mac = mac;
        self
    }

    pub fn discovered_mac(mut self, mac: Option<MacAddress>) -> Self {
        self.discovered_mac = mac;
        self
    }

    pub fn prior_unique_id(mut self, id: Option<&'a str>) -> Self {
        self.prior_unique_id = id;
        self
    }
}

impl DeviceIdentity {
    /// Canonical identifier for this identity, see [`resolve_identity`].
    pub fn unique_id(&self, source: ConnectionSource) -> String {
        resolve_identity(
            IdentitySignals::new(source, &self.host)
                .reported_mac(self.mac_address)
                .prior_unique_id(self.legacy_unique_id.as_deref()),
        )
    }
}

/// Resolve the canonical identifier of a panel. First match wins:
///
/// 1. a mac address reported by the panel itself;
/// 2. the mac address supplied by DHCP discovery;
/// 3. a previously stored identifier that already is a mac address;
/// 4. the host the panel is reached at (older firmware reports nothing).
///
/// Rule 3 makes resolution monotonic: once an entry is keyed by a mac it
/// never falls back to a host based identifier.
pub fn resolve_identity(signals: IdentitySignals<'_>) -> String {
    if let Some(mac) = signals.reported_mac {
        return mac.to_string();
    }
    if signals.source == ConnectionSource::DhcpDiscovered
        && let Some(mac) = signals.discovered_mac
    {
        return mac.to_string();
    }
    if let Some(prior) = signals.prior_unique_id
        && is_mac_shaped(prior)
        && let Ok(mac) = prior.parse::<MacAddress>()
    {
        return mac.to_string();
    }
    signals.host.to_string()
}

/// Decide whether a stored identifier must be replaced by a resolved one.
///
/// Returns the new identifier, or `None` when the stored one stays. A mac
/// based identifier is never replaced by a non-mac one.
pub fn reconcile_unique_id(current: &str, resolved: &str) -> Option<String> {
    if current == resolved {
        return None;
    }
    if is_mac_shaped(current) && !is_mac_shaped(resolved) {
        return None;
    }
    Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: MacAddress = MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    #[test]
    fn test_mac_parse_formats() {
        assert_eq!("AA:BB:CC:DD:EE:FF".parse::<MacAddress>().unwrap(), MAC);
        assert_eq!("aa-bb-cc-dd-ee-ff".parse::<MacAddress>().unwrap(), MAC);
        assert_eq!("aabbccddeeff".parse::<MacAddress>().unwrap(), MAC);
        assert!("aa:bb:cc:dd:ee".parse::<MacAddress>().is_err());
        assert!("aa:bb:cc:dd:ee:gg".parse::<MacAddress>().is_err());
        assert!("aa:bb-cc:dd:ee:ff".parse::<MacAddress>().is_err());
        assert_eq!(MAC.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_mac_shape() {
        assert!(is_mac_shaped("aa:bb:cc:dd:ee:ff"));
        assert!(is_mac_shaped("AA:BB:CC:DD:EE:FF"));
        assert!(!is_mac_shaped("10.0.0.5"));
        assert!(!is_mac_shaped("aa-bb-cc-dd-ee-ff"));
        assert!(!is_mac_shaped("unii.local:6502"));
    }

    #[test]
    fn test_reported_mac_wins() {
        let id = resolve_identity(
            IdentitySignals::new(ConnectionSource::UserEntered, "10.0.0.5")
                .reported_mac(Some(MAC))
                .prior_unique_id(Some("10.0.0.5")),
        );
        assert_eq!(id, "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_discovered_mac_used_for_dhcp_entries() {
        let signals = IdentitySignals::new(ConnectionSource::DhcpDiscovered, "10.0.0.5")
            .discovered_mac(Some(MAC));
        assert_eq!(resolve_identity(signals), "aa:bb:cc:dd:ee:ff");

        // A user entered entry does not pick up a discovery mac.
        let signals = IdentitySignals::new(ConnectionSource::UserEntered, "10.0.0.5")
            .discovered_mac(Some(MAC));
        assert_eq!(resolve_identity(signals), "10.0.0.5");
    }

    #[test]
    fn test_prior_mac_is_kept() {
        let id = resolve_identity(
            IdentitySignals::new(ConnectionSource::UserEntered, "10.0.0.5")
                .prior_unique_id(Some("AA:BB:CC:DD:EE:FF")),
        );
        assert_eq!(id, "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_host_fallback() {
        let id = resolve_identity(
            IdentitySignals::new(ConnectionSource::UserEntered, "10.0.0.5")
                .prior_unique_id(Some("10.0.0.4")),
        );
        assert_eq!(id, "10.0.0.5");
    }

    #[test]
    fn test_resolution_is_idempotent_and_monotonic() {
        let first = resolve_identity(
            IdentitySignals::new(ConnectionSource::UserEntered, "10.0.0.5").reported_mac(Some(MAC)),
        );
        let again = resolve_identity(
            IdentitySignals::new(ConnectionSource::UserEntered, "10.0.0.5").reported_mac(Some(MAC)),
        );
        assert_eq!(first, again);

        // Same device, mac no longer reported: the stored mac survives.
        for source in [ConnectionSource::UserEntered, ConnectionSource::DhcpDiscovered] {
            let later = resolve_identity(
                IdentitySignals::new(source, "10.0.0.5").prior_unique_id(Some(&first)),
            );
            assert_eq!(later, first);
        }
    }

    #[test]
    fn test_reconcile_unique_id() {
        assert_eq!(
            reconcile_unique_id("10.0.0.5", "aa:bb:cc:dd:ee:ff"),
            Some("aa:bb:cc:dd:ee:ff".to_string())
        );
        assert_eq!(reconcile_unique_id("aa:bb:cc:dd:ee:ff", "aa:bb:cc:dd:ee:ff"), None);
        assert_eq!(reconcile_unique_id("aa:bb:cc:dd:ee:ff", "10.0.0.5"), None);
    }

    #[test]
    fn test_device_identity_unique_id() {
        let identity = DeviceIdentity {
            mac_address: None,
            host: "10.0.0.5".to_string(),
            legacy_unique_id: Some("aa:bb:cc:dd:ee:ff".to_string()),
            device_id: None,
        };
        assert_eq!(identity.unique_id(ConnectionSource::UserEntered), "aa:bb:cc:dd:ee:ff");
    }
}
