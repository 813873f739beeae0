use bitflags::bitflags;
use mh_core::MapHackError;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Which sections of a document a load pass processes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LoadFlags: u32 {
        /// Merge into the current script instead of replacing it.
        const INCLUDE = 1 << 0;
        const RUN_ENTITIES = 1 << 1;
        const REGISTER_EVENTS = 1 << 2;
        const REGISTER_VARS = 1 << 3;
        const LOAD_INCLUDES = 1 << 4;
        const PRECACHE = 1 << 5;
        /// Report a failed load as a diagnostic.
        const COMPLAIN = 1 << 6;

        const PRE_ENTITY = Self::REGISTER_VARS.bits()
            | Self::LOAD_INCLUDES.bits()
            | Self::PRECACHE.bits()
            | Self::COMPLAIN.bits();
        const POST_ENTITY = Self::PRE_ENTITY.bits()
            | Self::RUN_ENTITIES.bits()
            | Self::REGISTER_EVENTS.bits();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapHackConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Explicit script path; when absent the per-map path is used.
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default = "default_directory")]
    pub directory: String,
    /// Allows `$console` to forward `cmd` strings to the command executor.
    #[serde(default)]
    pub allow_server_command: bool,
    #[serde(default)]
    pub debug: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_directory() -> String {
    "maps/maphacks".to_string()
}

impl Default for MapHackConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            filename: None,
            directory: default_directory(),
            allow_server_command: false,
            debug: false,
        }
    }
}

impl MapHackConfig {
    pub fn from_json_str(source: &str) -> Result<Self, MapHackError> {
        serde_json::from_str(source)
            .map_err(|error| MapHackError::new("MH_CONFIG_INVALID", error.to_string()))
    }

    pub fn script_path(&self, map_name: &str) -> String {
        match self.filename.as_deref() {
            Some(filename) if !filename.is_empty() => filename.to_string(),
            _ => format!("{}/{}.txt", self.directory.trim_end_matches('/'), map_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = MapHackConfig::from_json_str("{}").expect("empty config should parse");
        assert_eq!(config, MapHackConfig::default());
        assert!(config.enabled);
        assert_eq!(config.directory, "maps/maphacks");
    }

    #[test]
    fn script_path_prefers_explicit_filename() {
        let mut config = MapHackConfig::default();
        assert_eq!(config.script_path("dm_lockdown"), "maps/maphacks/dm_lockdown.txt");
        config.filename = Some("custom/hack.txt".to_string());
        assert_eq!(config.script_path("dm_lockdown"), "custom/hack.txt");
        config.filename = Some(String::new());
        assert_eq!(config.script_path("x"), "maps/maphacks/x.txt");
    }

    #[test]
    fn invalid_json_maps_to_config_error() {
        let error = MapHackConfig::from_json_str("{").expect_err("invalid json");
        assert_eq!(error.code, "MH_CONFIG_INVALID");
    }

    #[test]
    fn post_entity_flags_extend_pre_entity_flags() {
        assert!(LoadFlags::POST_ENTITY.contains(LoadFlags::PRE_ENTITY));
        assert!(LoadFlags::POST_ENTITY.contains(LoadFlags::RUN_ENTITIES));
        assert!(!LoadFlags::PRE_ENTITY.contains(LoadFlags::REGISTER_EVENTS));
        assert!(!LoadFlags::POST_ENTITY.contains(LoadFlags::INCLUDE));
    }
}
