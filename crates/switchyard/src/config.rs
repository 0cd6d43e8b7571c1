//! Router configuration.

use serde::{Deserialize, Serialize};

use crate::method::Method;

/// Settings that shape controller expansion and argument binding.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use switchyard::{Method, RouterConfig};
///
/// let config = RouterConfig::from_json(r#"{ "default_method": "post" }"#).unwrap();
/// assert_eq!(config.default_method, Method::Post);
/// assert_eq!(config.default_member, "index");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Member mapped to the entry pattern itself.
    pub default_member: String,
    /// Second member mapped to the entry pattern, for single-action controllers.
    pub invoke_member: String,
    /// Method assumed when a dispatch does not name one.
    pub default_method: Method,
    /// `chrono` formats tried in order for date/time parameters.
    pub datetime_formats: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_member: "index".to_string(),
            invoke_member: "invoke".to_string(),
            default_method: Method::Get,
            datetime_formats: vec![
                "%Y-%m-%d".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%S%:z".to_string(),
            ],
        }
    }
}

impl RouterConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed input or unknown methods.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Returns `true` if `member` maps to the entry pattern.
    pub fn is_entry_member(&self, member: &str) -> bool {
        member == self.default_member || member == self.invoke_member
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert!(config.is_entry_member("index"));
        assert!(config.is_entry_member("invoke"));
        assert!(!config.is_entry_member("show"));
        assert_eq!(config.datetime_formats.len(), 4);
    }

    #[test]
    fn test_from_json() {
        let config = RouterConfig::from_json(
            r#"{ "default_member": "home", "datetime_formats": ["%d.%m.%Y"] }"#,
        )
        .unwrap();
        assert!(config.is_entry_member("home"));
        assert_eq!(config.default_method, Method::Get);
        assert_eq!(config.datetime_formats, vec!["%d.%m.%Y".to_string()]);

        assert!(RouterConfig::from_json(r#"{ "default_method": "BREW" }"#).is_err());
    }

    #[test]
    fn test_round_trip_json() {
        let config = RouterConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(RouterConfig::from_json(&json).unwrap(), config);
    }
}
