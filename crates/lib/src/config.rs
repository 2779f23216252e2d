//! Engine configuration.
//!
//! [`EngineConfig`] carries the knobs shared by the drawer stack and the field
//! registry. It deserializes from JSON with every key optional.

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    constants::{
        DEFAULT_LOCALE, DEFAULT_MAX_DRAWER_DEPTH, DEFAULT_ROW_LABEL_DIGITS,
        MISSING_TRANSLATION_TEMPLATE,
    },
};

/// Configuration for an editing session.
///
/// # Examples
///
/// ```
/// use formstack::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "maxDrawerDepth": 3 }"#).unwrap();
/// assert_eq!(config.max_drawer_depth, 3);
/// assert_eq!(config.default_locale, "en");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Maximum number of drawers above the root form
    pub max_drawer_depth: usize,
    /// Locale used when callers do not pass one
    pub default_locale: String,
    /// Template for labels whose locale map lacks the requested locale
    pub missing_translation: String,
    /// Zero padding applied to row numbers in default row labels
    pub row_label_digits: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_drawer_depth: DEFAULT_MAX_DRAWER_DEPTH,
            default_locale: DEFAULT_LOCALE.to_string(),
            missing_translation: MISSING_TRANSLATION_TEMPLATE.to_string(),
            row_label_digits: DEFAULT_ROW_LABEL_DIGITS,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON; missing keys take their defaults.
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Sets the maximum drawer depth.
    pub fn with_max_drawer_depth(mut self, depth: usize) -> Self {
        self.max_drawer_depth = depth;
        self
    }

    /// Sets the default locale.
    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    /// Renders the missing-translation template for a field.
    pub fn missing_translation(&self, name: &str, locale: &str) -> String {
        self.missing_translation
            .replace("{name}", name)
            .replace("{locale}", locale)
    }

    /// Formats a 1-based row number with the configured padding.
    pub fn row_number(&self, index: usize) -> String {
        format!("{:0width$}", index + 1, width = self.row_label_digits)
    }
}
