//! Immutable engine configuration.
//!
//! A [`ValidatorConfig`] is built once, wrapped in an `Arc`, and handed to
//! every field at construction time. There is no process-wide mutable state.
//!
//! # Example
//!
//! ```rust
//! use formcheck::config::{PatternPreset, ValidatorConfig};
//! use regex::Regex;
//!
//! let config = ValidatorConfig::default()
//!     .with_preset(
//!         "postcode",
//!         PatternPreset::new(
//!             Regex::new(r"^[A-Z]{1,2}\d[A-Z\d]? ?\d[A-Z]{2}$").unwrap(),
//!             "postcode",
//!         ),
//!     )
//!     .with_fallback_display_name("This field");
//!
//! assert!(config.preset("email").is_some());
//! assert!(config.preset("postcode").is_some());
//! assert_eq!(config.fallback_display_name(), "This field");
//! ```

use std::collections::BTreeMap;

use regex::Regex;

/// Name of the built-in email preset.
pub const EMAIL_PRESET: &str = "email";
/// Name of the built-in phone number preset.
pub const PHONE_NUMBER_PRESET: &str = "phone-number";

const EMAIL_PATTERN: &str = r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$";
const PHONE_NUMBER_PATTERN: &str = r"^[\s+()\d]*$";

/// A named regular expression plus the noun used in its error message.
#[derive(Debug, Clone)]
pub struct PatternPreset {
    pattern: Regex,
    description: String,
}

impl PatternPreset {
    /// Create a preset. Failures read "`<name>` is not a valid `<description>`".
    pub fn new(pattern: Regex, description: impl Into<String>) -> Self {
        Self {
            pattern,
            description: description.into(),
        }
    }

    /// The compiled expression.
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// The noun used in error messages.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether `value` is accepted.
    pub fn is_match(&self, value: &str) -> bool {
        self.pattern.is_match(value)
    }
}

/// Shared configuration for every field of a form.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    presets: BTreeMap<String, PatternPreset>,
    fallback_display_name: String,
}

impl ValidatorConfig {
    /// Configuration with no presets at all.
    pub fn empty() -> Self {
        Self {
            presets: BTreeMap::new(),
            fallback_display_name: "This".to_string(),
        }
    }

    /// Add or replace a pattern preset.
    pub fn with_preset(mut self, name: impl Into<String>, preset: PatternPreset) -> Self {
        self.presets.insert(name.into(), preset);
        self
    }

    /// Term used in error messages for fields without a display name.
    pub fn with_fallback_display_name(mut self, name: impl Into<String>) -> Self {
        self.fallback_display_name = name.into();
        self
    }

    /// Look up a preset by name.
    pub fn preset(&self, name: &str) -> Option<&PatternPreset> {
        self.presets.get(name)
    }

    /// Names of every configured preset.
    pub fn preset_names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    /// Term used for fields without a display name.
    pub fn fallback_display_name(&self) -> &str {
        &self.fallback_display_name
    }
}

impl Default for ValidatorConfig {
    /// The built-in `email` and `phone-number` presets, and `"This"` as fallback name.
    fn default() -> Self {
        let builtins = [
            (EMAIL_PRESET, EMAIL_PATTERN, "email address"),
            (PHONE_NUMBER_PRESET, PHONE_NUMBER_PATTERN, "phone number"),
        ];

        let mut config = Self::empty();
        for (name, pattern, description) in builtins {
            match Regex::new(pattern) {
                Ok(regex) => {
                    config = config.with_preset(name, PatternPreset::new(regex, description));
                }
                Err(error) => {
                    tracing::error!(
                        preset = name,
                        %error,
                        "built-in pattern preset does not compile"
                    );
                }
            }
        }
        config
    }
}
