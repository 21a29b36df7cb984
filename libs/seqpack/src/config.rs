use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, detection::UnsupportedDetectionPolicy, value::ContextValue};

/// Side inputs of a build.
///
/// ```toml
/// streams = ["IMAGE", "BBOX_PREDICTED", "FLOAT_FEATURE_AUDIO"]
/// require_all_configured_streams = true
///
/// [context]
/// "clip/media_id" = "clip_0001"
/// "image/width" = 640
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    pub streams: Vec<String>,
    pub context: BTreeMap<String, ConfigValue>,
    pub require_all_configured_streams: bool,
    pub replace_instead_of_append: bool,
    pub reconcile_annotations: bool,
    pub on_unsupported_detection: UnsupportedDetectionPolicy,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            streams: vec![],
            context: BTreeMap::new(),
            require_all_configured_streams: false,
            replace_instead_of_append: true,
            reconcile_annotations: true,
            on_unsupported_detection: UnsupportedDetectionPolicy::Skip,
        }
    }
}

impl PackConfig {
    pub fn from_toml(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml(&s)
    }

    pub fn with_stream(mut self, tag: impl Into<String>) -> Self {
        self.streams.push(tag.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn require_all(mut self, require_all: bool) -> Self {
        self.require_all_configured_streams = require_all;
        self
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace_instead_of_append = replace;
        self
    }
}

/// Context value as written in a config file. Strings are stored as bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<ConfigValue> for ContextValue {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Int(v) => ContextValue::Int(v),
            ConfigValue::Float(v) => ContextValue::Float(v),
            ConfigValue::Text(v) => ContextValue::Bytes(v.into_bytes()),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PackConfig::from_toml("").unwrap();
        assert!(config.streams.is_empty());
        assert!(!config.require_all_configured_streams);
        assert!(config.replace_instead_of_append);
        assert!(config.reconcile_annotations);
        assert_eq!(
            config.on_unsupported_detection,
            UnsupportedDetectionPolicy::Skip
        );
    }

    #[test]
    fn test_parse_full_config() {
        let config = PackConfig::from_toml(
            r#"
            streams = ["IMAGE", "BBOX_PREDICTED"]
            require_all_configured_streams = true
            replace_instead_of_append = false
            on_unsupported_detection = "reject"

            [context]
            "clip/media_id" = "clip_0001"
            "image/width" = 640
            "clip/fps" = 29.97
            "#,
        )
        .unwrap();
        assert_eq!(config.streams, vec!["IMAGE", "BBOX_PREDICTED"]);
        assert!(config.require_all_configured_streams);
        assert!(!config.replace_instead_of_append);
        assert_eq!(
            config.on_unsupported_detection,
            UnsupportedDetectionPolicy::Reject
        );
        assert_eq!(
            ContextValue::from(config.context["clip/media_id"].clone()),
            ContextValue::Bytes(b"clip_0001".to_vec())
        );
        assert_eq!(config.context["image/width"], ConfigValue::Int(640));
        assert_eq!(config.context["clip/fps"], ConfigValue::Float(29.97));
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(matches!(
            PackConfig::from_toml("streams = 3"),
            Err(Error::Toml(_))
        ));
    }
}
