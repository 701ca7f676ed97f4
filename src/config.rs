//! Host configuration
//!
//! The whole configuration surface of the host: where the artifact lives,
//! what the guest's import and exports are called, and where colors go on
//! the page. Every field has a default matching the stock demo page, so an
//! empty JSON object is a valid configuration.

use crate::color::LabelFormat;
use crate::driver::TickFailurePolicy;
use crate::guest::abi;
use serde::Deserialize;
use std::fmt;

/// Errors from parsing or validating a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Input is not valid JSON for this structure
    Parse(String),
    /// A field has an unusable value
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "config parse error: {}", msg),
            Self::Invalid { field, reason } => write!(f, "config field '{}': {}", field, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct HostConfig {
    /// Relative URL of the guest binary
    pub artifact_path: String,
    /// Import namespace the guest links the callback from
    pub import_namespace: String,
    /// Name of the color callback import
    pub callback_name: String,
    /// Name of the per-frame export
    pub frame_export: String,
    /// Name of the memory export
    pub memory_export: String,
    /// Constant step count passed as the frame export's second argument.
    /// `None` means the export takes the frame index only.
    pub total_steps: Option<u32>,
    /// Selector of the element whose background shows the color
    pub background_selector: String,
    /// Selector of the element whose text shows the color
    pub label_selector: String,
    pub label_format: LabelFormat,
    pub tick_failure: TickFailurePolicy,
    /// Upper bound on fetch + instantiate. `None` waits forever.
    pub load_timeout_ms: Option<u32>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            artifact_path: "color-me-rusty.gc.wasm".to_string(),
            import_namespace: abi::IMPORT_NAMESPACE.to_string(),
            callback_name: abi::imports::SET_BACKGROUND_COLOR.to_string(),
            frame_export: abi::exports::SET_BACKGROUND_COLOR.to_string(),
            memory_export: abi::exports::MEMORY.to_string(),
            total_steps: Some(abi::DEFAULT_TOTAL_STEPS),
            background_selector: "body".to_string(),
            label_selector: "#color".to_string(),
            label_format: LabelFormat::Padded,
            tick_failure: TickFailurePolicy::Halt,
            load_timeout_ms: Some(10_000),
        }
    }
}

impl HostConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the loader or DOM layer could never work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("artifactPath", &self.artifact_path),
            ("importNamespace", &self.import_namespace),
            ("callbackName", &self.callback_name),
            ("frameExport", &self.frame_export),
            ("memoryExport", &self.memory_export),
            ("backgroundSelector", &self.background_selector),
            ("labelSelector", &self.label_selector),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must not be empty".to_string(),
                });
            }
        }

        if self.frame_export == self.memory_export {
            return Err(ConfigError::Invalid {
                field: "frameExport",
                reason: format!("clashes with memory export '{}'", self.memory_export),
            });
        }

        if self.load_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "loadTimeoutMs",
                reason: "must be positive (use null to disable)".to_string(),
            });
        }

        Ok(())
    }

    /// Number of i32 parameters the frame export must take
    pub fn frame_arity(&self) -> usize {
        if self.total_steps.is_some() { 2 } else { 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.artifact_path, "color-me-rusty.gc.wasm");
        assert_eq!(config.import_namespace, "env");
        assert_eq!(config.callback_name, "jsSetBackgroundColor");
        assert_eq!(config.frame_export, "set_background_color");
        assert_eq!(config.total_steps, Some(200));
        assert_eq!(config.frame_arity(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(HostConfig::from_json("{}").unwrap(), HostConfig::default());
    }

    #[test]
    fn test_camel_case_fields() {
        let config = HostConfig::from_json(
            r#"{
                "frameExport": "draw_frame",
                "totalSteps": null,
                "labelFormat": "css",
                "tickFailure": "skip",
                "loadTimeoutMs": null
            }"#,
        )
        .unwrap();
        assert_eq!(config.frame_export, "draw_frame");
        assert_eq!(config.total_steps, None);
        assert_eq!(config.frame_arity(), 1);
        assert_eq!(config.label_format, LabelFormat::Css);
        assert_eq!(config.tick_failure, TickFailurePolicy::Skip);
        assert_eq!(config.load_timeout_ms, None);
        // Untouched fields keep their defaults
        assert_eq!(config.callback_name, "jsSetBackgroundColor");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = HostConfig::from_json(r#"{ "frame_export": "x" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation() {
        let err = HostConfig::from_json(r#"{ "callbackName": "  " }"#).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                field: "callbackName",
                reason: "must not be empty".to_string()
            }
        );

        let err = HostConfig::from_json(r#"{ "loadTimeoutMs": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "loadTimeoutMs", .. }));

        let err = HostConfig::from_json(r#"{ "frameExport": "memory" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "frameExport", .. }));
    }
}
