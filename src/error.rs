// MIT License - Copyright (c) 2026 Peter Wright
// Error taxonomy for the UNii bridge

use std::fmt;

/// Errors raised by a [`ProtocolClient`](crate::client::ProtocolClient).
///
/// The client owns the wire protocol; the bridge only needs to tell an
/// encryption (shared key) mismatch apart from everything else.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encryption error: shared key rejected by panel")]
    Encryption,

    #[error("Request timeout")]
    Timeout,

    #[error("Not connected")]
    Disconnected,

    #[error("Protocol error: {details}")]
    Protocol { details: String },
}

/// Errors opening a connection to a panel.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Socket or handshake could not be established; retry later.
    #[error("Panel not ready: {reason}")]
    NotReady { reason: String },

    /// The handshake reported a shared-key mismatch.
    #[error("Authentication failed: shared key mismatch")]
    AuthFailed,

    /// The configuration type is not one this bridge can handle.
    #[error("Configuration type {conf_type:?} not supported")]
    Unsupported { conf_type: String },
}

impl ConnectError {
    pub(crate) fn not_ready(reason: impl fmt::Display) -> Self {
        Self::NotReady {
            reason: reason.to_string(),
        }
    }
}

impl From<ClientError> for ConnectError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Encryption => ConnectError::AuthFailed,
            other => ConnectError::not_ready(other),
        }
    }
}

/// Validation errors surfaced by the pairing and options flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum PairingError {
    #[error("cannot_connect")]
    CannotConnect,

    #[error("invalid_shared_key")]
    InvalidSharedKey,

    #[error("invalid_user_code")]
    InvalidUserCode,

    #[error("already_configured")]
    AlreadyConfigured,
}

impl PairingError {
    /// Translation key of the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CannotConnect => "cannot_connect",
            Self::InvalidSharedKey => "invalid_shared_key",
            Self::InvalidUserCode => "invalid_user_code",
            Self::AlreadyConfigured => "already_configured",
        }
    }
}

/// Errors from arm/disarm/bypass requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// No user code configured; nothing was sent.
    #[error("Write not supported: no user code configured")]
    NotAuthorized,

    #[error("Panel rejected {action} for {target}")]
    PanelRejected { action: &'static str, target: u16 },

    #[error("Panel did not answer {action} in time")]
    Timeout { action: &'static str },

    #[error("Connection lost during {action}")]
    Disconnected { action: &'static str },

    #[error("{action} failed: {reason}")]
    Failed { action: &'static str, reason: String },
}

/// Errors reading or writing the persisted configuration entries.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot parse entries: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize entries: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid shared key encoding: {0}")]
    SharedKey(#[from] hex::FromHexError),

    #[error("Unknown config entry: {entry_id}")]
    UnknownEntry { entry_id: String },
}

/// All errors that can occur in the UNii bridge.
#[derive(Debug, thiserror::Error)]
pub enum UniiError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Pairing failed: {0}")]
    Pairing(#[from] PairingError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Event stream already taken from client {connection}")]
    EventStreamTaken { connection: String },

    #[error("Entry {entry_id} is already loaded")]
    AlreadyLoaded { entry_id: String },

    #[error("Entry {entry_id} is not loaded")]
    NotLoaded { entry_id: String },

    #[error("Setup of entry {entry_id} is already in progress")]
    SetupInProgress { entry_id: String },
}

impl UniiError {
    /// Whether the operation may succeed when retried later.
    ///
    /// Authentication failures need a new shared key and unsupported
    /// configurations never recover, so neither is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UniiError::Client(ClientError::Io(_))
                | UniiError::Client(ClientError::Timeout)
                | UniiError::Client(ClientError::Disconnected)
                | UniiError::Connect(ConnectError::NotReady { .. })
                | UniiError::Write(WriteError::Timeout { .. })
                | UniiError::Write(WriteError::Disconnected { .. })
        )
    }

    /// Whether the error calls for the reauthentication flow.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            UniiError::Connect(ConnectError::AuthFailed)
                | UniiError::Client(ClientError::Encryption)
        )
    }
}

pub type Result<T> = std::result::Result<T, UniiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_maps_to_connect_error() {
        assert!(matches!(
            ConnectError::from(ClientError::Encryption),
            ConnectError::AuthFailed
        ));
        assert!(matches!(
            ConnectError::from(ClientError::Timeout),
            ConnectError::NotReady { .. }
        ));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(UniiError::from(ConnectError::not_ready("refused")).is_retryable());
        assert!(!UniiError::from(ConnectError::AuthFailed).is_retryable());
        assert!(
            !UniiError::from(ConnectError::Unsupported {
                conf_type: "online".to_string()
            })
            .is_retryable()
        );
        assert!(!UniiError::from(WriteError::NotAuthorized).is_retryable());
    }

    #[test]
    fn test_needs_reauth() {
        assert!(UniiError::from(ConnectError::AuthFailed).needs_reauth());
        assert!(UniiError::from(ClientError::Encryption).needs_reauth());
        assert!(!UniiError::from(ClientError::Timeout).needs_reauth());
    }

    #[test]
    fn test_pairing_error_keys() {
        assert_eq!(PairingError::InvalidSharedKey.as_str(), "invalid_shared_key");
        assert_eq!(PairingError::CannotConnect.to_string(), "cannot_connect");
    }
}
