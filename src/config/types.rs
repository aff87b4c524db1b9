use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;

use crate::audio::Role;
use crate::priority::PriorityList;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub logging: LogSettings,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub preferences: Preferences,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
    /// How often the daemon looks at the config file for edits
    pub check_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub file_output: bool,
    pub json_format: bool,
    pub keep_days: u64,
    /// Where log files go; `~/.local/share/airpods-sanity/logs` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub show_switching_actions: bool, // Device switching notifications
    pub show_failures: bool,          // Failed switch notifications
}

/// What the user asked for: the enable flag and one priority list per role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub enabled: bool,
    pub priority_outputs: PriorityList,
    pub priority_inputs: PriorityList,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            check_interval_ms: 1000,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            file_output: true,
            json_format: false,
            keep_days: 7,
            directory: None,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            show_switching_actions: true,
            show_failures: true,
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            enabled: true,
            priority_outputs: PriorityList::new(),
            priority_inputs: PriorityList::new(),
        }
    }
}

impl Preferences {
    pub fn priority_list(&self, role: Role) -> &PriorityList {
        match role {
            Role::Input => &self.priority_inputs,
            Role::Output => &self.priority_outputs,
        }
    }

    pub fn priority_list_mut(&mut self, role: Role) -> &mut PriorityList {
        match role {
            Role::Input => &mut self.priority_inputs,
            Role::Output => &mut self.priority_outputs,
        }
    }
}

impl GeneralConfig {
    pub fn parsed_log_level(&self) -> Option<Level> {
        self.log_level.parse().ok()
    }
}

impl Config {
    /// Problems worth telling the user about. None of them stop the daemon.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.general.parsed_log_level().is_none() {
            warnings.push(format!(
                "Unknown log level '{}', falling back to info",
                self.general.log_level
            ));
        }

        if self.general.check_interval_ms < 100 {
            warnings.push(format!(
                "check_interval_ms = {} is below the 100ms floor and will be raised",
                self.general.check_interval_ms
            ));
        }

        // A name in both lists is both preferred as input and avoided as input
        for name in self.preferences.priority_inputs.iter() {
            if self.preferences.priority_outputs.contains(name) {
                warnings.push(format!(
                    "'{}' is listed as a priority input and a priority output; \
                     while a priority output is active its microphone counts as undesired",
                    name
                ));
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config, Config::default());
        assert!(config.preferences.enabled);
        assert!(config.preferences.priority_outputs.is_empty());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: Config = toml::from_str(
            r#"
[general]
log_level = "debug"

[preferences]
priority_outputs = ["AirPods Pro"]
"#,
        )
        .unwrap();

        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.check_interval_ms, 1000);
        assert!(config.preferences.enabled);
        assert_eq!(config.preferences.priority_outputs.names(), ["AirPods Pro"]);
        assert!(config.notifications.show_switching_actions);
    }

    #[test]
    fn warnings_flag_names_in_both_lists() {
        let mut config = Config::default();
        config.preferences.priority_outputs = ["AirPods Pro"].into_iter().collect();
        config.preferences.priority_inputs = ["AirPods Pro", "MacBook Pro Microphone"]
            .into_iter()
            .collect();

        let warnings = config.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("AirPods Pro"));
    }

    #[test]
    fn warnings_flag_bad_log_level() {
        let mut config = Config::default();
        config.general.log_level = "loud".to_string();

        assert!(config.warnings()[0].contains("loud"));
    }
}
