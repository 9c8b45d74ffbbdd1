use serde::Serialize;

/// Phase of the most recent synchronization attempt. Process-local; every
/// session starts at `Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    DeviceOffline,
    NetworkError { message: String },
}

impl SyncStatus {
    pub fn is_syncing(&self) -> bool {
        matches!(self, SyncStatus::Syncing)
    }

    /// Whether the last attempt ended without reaching the remote catalog.
    pub fn is_failure(&self) -> bool {
        matches!(self, SyncStatus::DeviceOffline | SyncStatus::NetworkError { .. })
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Syncing => write!(f, "Syncing"),
            Self::Success => write!(f, "Success"),
            Self::DeviceOffline => write!(f, "DeviceOffline"),
            Self::NetworkError { message } => write!(f, "NetworkError({})", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(SyncStatus::NetworkError {
            message: "Network error".to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "network_error");
        assert_eq!(json["message"], "Network error");

        let json = serde_json::to_value(SyncStatus::DeviceOffline).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "device_offline" }));
    }

    #[test]
    fn failure_states() {
        assert!(SyncStatus::DeviceOffline.is_failure());
        assert!(SyncStatus::NetworkError { message: String::new() }.is_failure());
        assert!(!SyncStatus::Success.is_failure());
        assert!(!SyncStatus::Idle.is_failure());
        assert!(SyncStatus::Syncing.is_syncing());
    }
}
