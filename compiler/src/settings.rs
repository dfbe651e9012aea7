use std::{fs, path::Path};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{error::GramError, utils::quote};

lazy_static! {
    static ref HEX_TAG: Regex = Regex::new(r"^(?:0[xX])?[0-9A-Fa-f]{1,8}$").unwrap();
}

pub const DEFAULT_VECTOR_FRAMING_TAG: &str = "1cb5c415";

/// Per-unit generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub output_namespace:   String,
    pub symbol_prefix:      String,
    pub vector_framing_tag: String,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            output_namespace:   String::new(),
            symbol_prefix:      String::new(),
            vector_framing_tag: DEFAULT_VECTOR_FRAMING_TAG.to_string(),
        }
    }
}

impl Settings {
    pub fn new(output_namespace: &str, symbol_prefix: &str) -> Settings {
        Settings {
            output_namespace: output_namespace.to_string(),
            symbol_prefix: symbol_prefix.to_string(),
            ..Settings::default()
        }
    }

    pub fn with_vector_framing_tag(mut self, tag: &str) -> Settings {
        self.vector_framing_tag = tag.to_string();
        self
    }

    pub fn from_json(text: &str) -> Result<Settings, GramError> {
        let settings: Settings = serde_json::from_str(text)?;
        settings.vector_tag()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Settings, GramError> {
        Settings::from_json(&fs::read_to_string(path)?)
    }

    /// The vector framing tag as a number. Accepts up to eight hex digits
    /// with an optional `0x` prefix.
    pub fn vector_tag(&self) -> Result<u32, GramError> {
        let text = self.vector_framing_tag.trim();
        if !HEX_TAG.is_match(text) {
            return Err(GramError::Settings(format!(
                "vectorFramingTag {} is not a 32-bit hex number",
                quote(&self.vector_framing_tag)
            )));
        }
        let digits = text.trim_start_matches("0x").trim_start_matches("0X");
        u32::from_str_radix(digits, 16).map_err(|e| GramError::Settings(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.output_namespace, "");
        assert_eq!(settings.symbol_prefix, "");
        assert_eq!(settings.vector_tag().unwrap(), 0x1cb5c415);
    }

    #[test]
    fn test_settings_from_json() {
        let settings = Settings::from_json(r#"{"outputNamespace": "api", "symbolPrefix": "TL_"}"#).unwrap();
        assert_eq!(settings, Settings::new("api", "TL_"));

        let settings = Settings::from_json(r#"{"vectorFramingTag": "0xDEADBEEF"}"#).unwrap();
        assert_eq!(settings.vector_tag().unwrap(), 0xdeadbeef);
    }

    #[test]
    fn test_settings_reject_bad_tag() {
        let settings = Settings::default().with_vector_framing_tag("vector");
        assert!(matches!(settings.vector_tag(), Err(GramError::Settings(_))));
        assert!(Settings::from_json(r#"{"vectorFramingTag": "123456789"}"#).is_err());
        assert!(matches!(Settings::from_json("{"), Err(GramError::Json(_))));
    }
}
