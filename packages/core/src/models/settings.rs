//! Graph view settings
//!
//! Settings are owned by the host application; this crate only keeps the current
//! values so it can hand key/value snapshots to the consumer and pick up the
//! ones that affect syncing (`UPDATE_INTERVAL`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettingLabel {
    CooldownTicks,
    CooldownTime,
    WarmupTicks,
    FontSize,
    RelativeFontSize,
    ShowOnStart,
    ShowMenuOnStart,
    MenuPanelSize,
    UpdateInterval,
    PaintPhotonsOnClick,
    PaintPhotonsOnHover,
}

impl SettingLabel {
    pub const ALL: [SettingLabel; 11] = [
        SettingLabel::CooldownTicks,
        SettingLabel::CooldownTime,
        SettingLabel::WarmupTicks,
        SettingLabel::FontSize,
        SettingLabel::RelativeFontSize,
        SettingLabel::ShowOnStart,
        SettingLabel::ShowMenuOnStart,
        SettingLabel::MenuPanelSize,
        SettingLabel::UpdateInterval,
        SettingLabel::PaintPhotonsOnClick,
        SettingLabel::PaintPhotonsOnHover,
    ];

    pub fn default_value(self) -> SettingValue {
        match self {
            SettingLabel::CooldownTicks => SettingValue::Int(200),
            SettingLabel::CooldownTime => SettingValue::Int(4000),
            SettingLabel::WarmupTicks => SettingValue::Int(0),
            SettingLabel::FontSize => SettingValue::Int(4),
            SettingLabel::RelativeFontSize => SettingValue::Bool(true),
            SettingLabel::ShowOnStart => SettingValue::Bool(true),
            SettingLabel::ShowMenuOnStart => SettingValue::Bool(true),
            SettingLabel::MenuPanelSize => SettingValue::Int(15),
            // milliseconds between two polls of the change feed
            SettingLabel::UpdateInterval => SettingValue::Int(1000),
            SettingLabel::PaintPhotonsOnClick => SettingValue::Bool(true),
            SettingLabel::PaintPhotonsOnHover => SettingValue::Bool(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl SettingValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: SettingLabel,
    pub value: SettingValue,
}

impl Setting {
    pub fn new(key: SettingLabel, value: SettingValue) -> Self {
        Self { key, value }
    }
}

/// Current value of every setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<SettingLabel, SettingValue>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            values: SettingLabel::ALL
                .iter()
                .map(|label| (*label, label.default_value()))
                .collect(),
        }
    }
}

impl Settings {
    pub fn get(&self, key: SettingLabel) -> &SettingValue {
        // every label is populated at construction and never removed
        &self.values[&key]
    }

    /// Snapshot of all settings in label order
    pub fn snapshot(&self) -> Vec<Setting> {
        self.values
            .iter()
            .map(|(key, value)| Setting::new(*key, value.clone()))
            .collect()
    }

    /// Apply a change set, returning only the settings whose value changed
    pub fn apply(&mut self, changes: Vec<Setting>) -> Vec<Setting> {
        changes
            .into_iter()
            .filter(|change| {
                let changed = self.values.get(&change.key) != Some(&change.value);
                if changed {
                    self.values.insert(change.key, change.value.clone());
                }
                changed
            })
            .collect()
    }
}
