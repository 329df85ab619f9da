// MIT License - Copyright (c) 2026 Peter Wright
// Persisted configuration entries

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{CONF_TYPE_LOCAL, DEFAULT_PORT};
use crate::error::{ConfigError, PairingError};
use crate::identity::{is_mac_shaped, ConnectionSource};
use crate::shared_key::SharedKey;

fn default_conf_type() -> String {
    CONF_TYPE_LOCAL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Connection data of a configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    /// Only `local` is supported.
    #[serde(rename = "type", default = "default_conf_type")]
    pub conf_type: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Hex encoding of the normalized 16-byte shared key.
    pub shared_key: String,
}

impl EntryData {
    /// Create a new builder starting from defaults.
    pub fn builder() -> EntryDataBuilder {
        EntryDataBuilder::default()
    }

    pub fn decode_shared_key(&self) -> Result<SharedKey, ConfigError> {
        Ok(SharedKey::from_hex(&self.shared_key)?)
    }
}

/// Builder for [`EntryData`].
#[derive(Debug, Clone)]
pub struct EntryDataBuilder {
    conf_type: String,
    host: String,
    port: u16,
    shared_key: SharedKey,
}

impl Default for EntryDataBuilder {
    fn default() -> Self {
        Self {
            conf_type: default_conf_type(),
            host: String::new(),
            port: DEFAULT_PORT,
            shared_key: SharedKey::normalize(""),
        }
    }
}

impl EntryDataBuilder {
    pub fn conf_type(mut self, conf_type: impl Into<String>) -> Self {
        self.conf_type = conf_type.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn shared_key(mut self, shared_key: SharedKey) -> Self {
        self.shared_key = shared_key;
        self
    }

    pub fn build(self) -> EntryData {
        EntryData {
            conf_type: self.conf_type,
            host: self.host,
            port: self.port,
            shared_key: self.shared_key.to_hex(),
        }
    }
}

/// User adjustable options of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOptions {
    /// Code used for arm, disarm and bypass. Writes are disabled without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_code: Option<String>,
}

impl EntryOptions {
    /// Validate a user code as entered in the options form.
    ///
    /// An empty (or blank) code clears the option; anything else must be
    /// ASCII digits only.
    pub fn with_user_code(user_code: &str) -> Result<Self, PairingError> {
        let user_code = user_code.trim();
        if user_code.is_empty() {
            return Ok(Self { user_code: None });
        }
        if !user_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(PairingError::InvalidUserCode);
        }
        Ok(Self {
            user_code: Some(user_code.to_string()),
        })
    }
}

/// A configured panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub unique_id: String,
    pub title: String,
    pub source: ConnectionSource,
    pub data: EntryData,
    #[serde(default)]
    pub options: EntryOptions,
}

/// Store of all configuration entries, persisted as TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntries {
    #[serde(default)]
    next_id: u64,
    #[serde(default, rename = "entry")]
    entries: Vec<ConfigEntry>,
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load entries from a TOML file. A missing file is an empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let entries: Self = toml::from_str(&contents)?;
                debug!("Loaded {} config entries from {}", entries.len(), path.display());
                Ok(entries)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        debug!("Saved {} config entries to {}", self.len(), path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.entries.iter()
    }

    pub fn get(&self, entry_id: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|entry| entry.entry_id == entry_id)
    }

    pub fn find_by_unique_id(&self, unique_id: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|entry| entry.unique_id == unique_id)
    }

    /// Entry for the panel at `host` that is still keyed by a host based
    /// identifier (bare host or `host:port`) instead of a mac.
    pub fn find_host_keyed(&self, host: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|entry| {
            !is_mac_shaped(&entry.unique_id)
                && (entry.unique_id == host || entry.data.host == host)
        })
    }

    fn get_mut(&mut self, entry_id: &str) -> Result<&mut ConfigEntry, ConfigError> {
        self.entries
            .iter_mut()
            .find(|entry| entry.entry_id == entry_id)
            .ok_or_else(|| ConfigError::UnknownEntry {
                entry_id: entry_id.to_string(),
            })
    }

    /// Add a new entry and return its generated id.
    pub fn add(
        &mut self,
        unique_id: impl Into<String>,
        title: impl Into<String>,
        source: ConnectionSource,
        data: EntryData,
    ) -> String {
        self.next_id += 1;
        let entry_id = format!("{:08x}", self.next_id);
        self.entries.push(ConfigEntry {
            entry_id: entry_id.clone(),
            unique_id: unique_id.into(),
            title: title.into(),
            source,
            data,
            options: EntryOptions::default(),
        });
        entry_id
    }

    pub fn remove(&mut self, entry_id: &str) -> Option<ConfigEntry> {
        let index = self.entries.iter().position(|entry| entry.entry_id == entry_id)?;
        Some(self.entries.remove(index))
    }

    pub fn update_unique_id(&mut self, entry_id: &str, unique_id: &str) -> Result<(), ConfigError> {
        self.get_mut(entry_id)?.unique_id = unique_id.to_string();
        Ok(())
    }

    pub fn update_data(&mut self, entry_id: &str, data: EntryData) -> Result<(), ConfigError> {
        self.get_mut(entry_id)?.data = data;
        Ok(())
    }

    /// Move an entry to a new host, keeping port and key.
    pub fn update_host(&mut self, entry_id: &str, host: &str) -> Result<(), ConfigError> {
        self.get_mut(entry_id)?.data.host = host.to_string();
        Ok(())
    }

    pub fn update_options(
        &mut self,
        entry_id: &str,
        options: EntryOptions,
    ) -> Result<(), ConfigError> {
        self.get_mut(entry_id)?.options = options;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> EntryData {
        EntryData::builder()
            .host("10.0.0.5")
            .shared_key(SharedKey::normalize("abc"))
            .build()
    }

    #[test]
    fn test_builder_defaults() {
        let data = sample_data();
        assert_eq!(data.conf_type, "local");
        assert_eq!(data.port, 6502);
        assert_eq!(data.shared_key.len(), 32);
        assert_eq!(data.decode_shared_key().unwrap(), SharedKey::normalize("abc"));
    }

    #[test]
    fn test_user_code_validation() {
        assert_eq!(
            EntryOptions::with_user_code("1234").unwrap().user_code.as_deref(),
            Some("1234")
        );
        assert_eq!(EntryOptions::with_user_code("").unwrap().user_code, None);
        assert_eq!(EntryOptions::with_user_code("  ").unwrap().user_code, None);
        assert_eq!(
            EntryOptions::with_user_code("12a4"),
            Err(PairingError::InvalidUserCode)
        );
    }

    #[test]
    fn test_entry_ids_are_unique() {
        let mut entries = ConfigEntries::new();
        let a = entries.add("10.0.0.5", "A", ConnectionSource::UserEntered, sample_data());
        entries.remove(&a);
        let b = entries.add("10.0.0.6", "B", ConnectionSource::UserEntered, sample_data());
        assert_ne!(a, b);
    }

    #[test]
    fn test_updates() {
        let mut entries = ConfigEntries::new();
        let id = entries.add("10.0.0.5", "UNii", ConnectionSource::UserEntered, sample_data());
        entries.update_unique_id(&id, "aa:bb:cc:dd:ee:ff").unwrap();
        entries.update_host(&id, "10.0.0.9").unwrap();
        let entry = entries.find_by_unique_id("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(entry.data.host, "10.0.0.9");
        assert!(matches!(
            entries.update_host("missing", "x"),
            Err(ConfigError::UnknownEntry { .. })
        ));
    }

    #[test]
    fn test_find_host_keyed() {
        let mut entries = ConfigEntries::new();
        let by_endpoint =
            entries.add("10.0.0.5:6502", "A", ConnectionSource::UserEntered, sample_data());
        let mut data = sample_data();
        data.host = "10.0.0.7".to_string();
        let by_ip = entries.add("10.0.0.7", "B", ConnectionSource::UserEntered, data);
        let mut data = sample_data();
        data.host = "10.0.0.8".to_string();
        entries.add("aa:bb:cc:dd:ee:ff", "C", ConnectionSource::UserEntered, data);

        assert_eq!(entries.find_host_keyed("10.0.0.5").unwrap().entry_id, by_endpoint);
        assert_eq!(entries.find_host_keyed("10.0.0.7").unwrap().entry_id, by_ip);
        // Already keyed by its mac.
        assert!(entries.find_host_keyed("10.0.0.8").is_none());
        assert!(entries.find_host_keyed("10.0.0.9").is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.toml");

        let mut entries = ConfigEntries::new();
        let id = entries.add(
            "aa:bb:cc:dd:ee:ff",
            "Alphatronics UNii",
            ConnectionSource::DhcpDiscovered,
            sample_data(),
        );
        entries
            .update_options(&id, EntryOptions::with_user_code("1234").unwrap())
            .unwrap();
        entries.save(&path).unwrap();

        let loaded = ConfigEntries::load(&path).unwrap();
        assert_eq!(loaded, entries);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let entries = ConfigEntries::load(dir.path().join("missing.toml")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_minimal_entry() {
        let toml = r#"
            [[entry]]
            entry_id = "01"
            unique_id = "10.0.0.5"
            title = "Alphatronics UNii"
            source = "user_entered"

            [entry.data]
            host = "10.0.0.5"
            shared_key = "61626320202020202020202020202020"
        "#;
        let entries: ConfigEntries = toml::from_str(toml).unwrap();
        let entry = entries.get("01").unwrap();
        assert_eq!(entry.data.port, 6502);
        assert_eq!(entry.data.conf_type, "local");
        assert_eq!(entry.options.user_code, None);
    }
}
