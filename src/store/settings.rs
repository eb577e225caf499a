// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::ikvstore::IKeyValueStore;
use serde::{Deserialize, Serialize};

/// Key of the settings record in the backing store
pub const SETTINGS_KEY: &str = "settings";

/// User preferences consulted by every check.  Fields missing from the
/// stored record take their default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Notify on verdict changes
    pub alerts_enabled: bool,
    /// Also notify when a check fails
    pub failure_alerts_enabled: bool,
    /// Run the periodic background check
    pub widget_refresh_enabled: bool,
    /// Period of the background check
    pub check_interval_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alerts_enabled: true,
            failure_alerts_enabled: false,
            widget_refresh_enabled: true,
            check_interval_minutes: 60,
        }
    }
}

impl Settings {
    /// Load the settings from `kv`, or the defaults if none were saved
    pub async fn load(kv: &dyn IKeyValueStore) -> Result<Settings, Error> {
        match kv.get(SETTINGS_KEY).await? {
            Some(buf) => serde_json::from_slice(&buf).map_err(|e| Error::Syntax(e.to_string())),
            None => Ok(Settings::default()),
        }
    }

    pub async fn save(&self, kv: &dyn IKeyValueStore) -> Result<(), Error> {
        let buf = serde_json::to_vec(self).map_err(|e| Error::Syntax(e.to_string()))?;
        kv.set(SETTINGS_KEY, buf).await
    }

    /// Whether a failed check should be reported through the notifier
    pub fn notify_failures(&self) -> bool {
        self.alerts_enabled && self.failure_alerts_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoKeyValueStore;

    #[tokio::test]
    async fn defaults_when_absent() {
        let kv = MemoKeyValueStore::new();

        let s = Settings::load(&kv).await.unwrap();
        assert_eq!(s, Settings::default());
        assert!(s.alerts_enabled);
        assert!(s.widget_refresh_enabled);
        assert!(!s.failure_alerts_enabled);
        assert_eq!(s.check_interval_minutes, 60);
    }

    #[tokio::test]
    async fn save_and_load() {
        let kv = MemoKeyValueStore::new();

        let s = Settings {
            alerts_enabled: false,
            check_interval_minutes: 15,
            ..Default::default()
        };
        s.save(&kv).await.unwrap();

        assert_eq!(Settings::load(&kv).await.unwrap(), s);
    }

    #[tokio::test]
    async fn partial_record_takes_defaults() {
        let kv = MemoKeyValueStore::new();
        kv.set(SETTINGS_KEY, br#"{"failure_alerts_enabled":true}"#.to_vec())
            .await
            .unwrap();

        let s = Settings::load(&kv).await.unwrap();
        assert!(s.failure_alerts_enabled);
        assert!(s.notify_failures());
        assert_eq!(s.check_interval_minutes, 60);

        kv.set(SETTINGS_KEY, b"42".to_vec()).await.unwrap();
        assert!(matches!(
            Settings::load(&kv).await,
            Err(Error::Syntax(_))
        ));
    }

    #[test]
    fn failure_alerts_need_alerts() {
        let s = Settings {
            alerts_enabled: false,
            failure_alerts_enabled: true,
            ..Default::default()
        };

        assert!(!s.notify_failures());
    }
}
