/// Configuration for the graph session and its sync engine
use crate::models::{Setting, SettingLabel};
use crate::services::SyncError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Id of the graph mirroring the local note store
pub const LOCAL_GRAPH_ID: &str = "local";

/// When tag reconciliation runs relative to a sync cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSyncMode {
    /// Tag changes are part of the cycle's partial update
    #[default]
    Inline,
    /// Tag changes follow in their own partial update, off the cycle
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Graph id stamped on every node and update
    pub graph_id: String,

    /// Delay between change feed polls
    pub poll_interval_ms: u64,

    /// Mirror tags as tag nodes
    pub track_tags: bool,

    pub tag_sync: TagSyncMode,

    /// Node cutoff for full loads; unbounded when absent
    pub max_notes: Option<usize>,

    /// Concurrent note fetches per batch
    pub max_concurrent_requests: usize,

    /// Notes per listing page
    pub page_size: usize,

    /// Reload the whole graph whenever the selected note changes
    ///
    /// The change feed can miss deletions; a reload on selection is what
    /// eventually drops those notes.
    pub refresh_on_selection: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            graph_id: LOCAL_GRAPH_ID.to_string(),
            poll_interval_ms: 1000,
            track_tags: true,
            tag_sync: TagSyncMode::Inline,
            max_notes: None,
            max_concurrent_requests: 10,
            page_size: 100,
            refresh_on_selection: true,
        }
    }
}

impl SyncConfig {
    /// Load from a JSON file; a missing file yields the defaults
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await? {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SyncError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.graph_id.is_empty() {
            return Err(SyncError::invalid_config("graph_id must not be empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(SyncError::invalid_config(
                "poll_interval_ms must be greater than 0",
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(SyncError::invalid_config(
                "max_concurrent_requests must be greater than 0",
            ));
        }
        if self.page_size == 0 {
            return Err(SyncError::invalid_config("page_size must be greater than 0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Fold consumer settings into the config
    ///
    /// Returns true if the poll interval changed. Non-positive intervals are
    /// ignored.
    pub fn apply_settings(&mut self, settings: &[Setting]) -> bool {
        let mut interval_changed = false;
        for setting in settings {
            if setting.key != SettingLabel::UpdateInterval {
                continue;
            }
            match setting.value.as_int() {
                Some(ms) if ms > 0 && ms as u64 != self.poll_interval_ms => {
                    self.poll_interval_ms = ms as u64;
                    interval_changed = true;
                }
                Some(_) => {}
                None => debug!("Ignoring non-integer UPDATE_INTERVAL {:?}", setting.value),
            }
        }
        interval_changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SettingValue;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            SyncConfig::from_json_str(r#"{"tag_sync": "deferred", "max_notes": 50}"#).unwrap();
        assert_eq!(config.tag_sync, TagSyncMode::Deferred);
        assert_eq!(config.max_notes, Some(50));
        assert_eq!(config.graph_id, LOCAL_GRAPH_ID);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let err = SyncConfig::from_json_str(r#"{"poll_interval_ms": 0}"#).unwrap_err();
        assert!(matches!(err, SyncError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = SyncConfig::load(dir.path().join("absent.json")).await.unwrap();
        assert_eq!(missing, SyncConfig::default());

        let path = dir.path().join("notegraph.json");
        tokio::fs::write(&path, r#"{"poll_interval_ms": 250, "track_tags": false}"#)
            .await
            .unwrap();
        let loaded = SyncConfig::load(&path).await.unwrap();
        assert_eq!(loaded.poll_interval_ms, 250);
        assert!(!loaded.track_tags);

        tokio::fs::write(&path, "not json").await.unwrap();
        assert!(matches!(
            SyncConfig::load(&path).await,
            Err(SyncError::Serialization(_))
        ));
    }

    #[test]
    fn test_apply_settings_maps_update_interval() {
        let mut config = SyncConfig::default();
        let changed = config.apply_settings(&[
            Setting::new(SettingLabel::FontSize, SettingValue::Int(9)),
            Setting::new(SettingLabel::UpdateInterval, SettingValue::Int(500)),
        ]);
        assert!(changed);
        assert_eq!(config.poll_interval_ms, 500);

        assert!(!config.apply_settings(&[Setting::new(
            SettingLabel::UpdateInterval,
            SettingValue::Int(500)
        )]));
        assert!(!config.apply_settings(&[Setting::new(
            SettingLabel::UpdateInterval,
            SettingValue::Int(-1)
        )]));
    }
}
