//! Field kinds.
//!
//! A control's type tag selects exactly one [`FieldKind`]. The set is closed:
//! an unrecognised tag is a [`FieldError::UnknownKind`], never a silently
//! skipped control.

use std::cmp::Ordering;
use std::fmt;

use crate::error::FieldError;

/// Free-text inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextInput {
    /// `text`
    Text,
    /// `tel`
    Tel,
    /// `email`
    Email,
    /// `url`
    Url,
    /// `password`
    Password,
    /// `search`
    Search,
    /// `textarea`
    TextArea,
}

/// Inputs holding a number or an ISO-8601 date/time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericInput {
    /// `number`
    Number,
    /// `range`
    Range,
    /// `date`
    Date,
    /// `month`
    Month,
    /// `week`
    Week,
    /// `time`
    Time,
    /// `datetime-local`
    DateTimeLocal,
}

impl NumericInput {
    /// Whether values are compared as numbers rather than ISO-8601 strings.
    pub fn is_number(self) -> bool {
        matches!(self, NumericInput::Number | NumericInput::Range)
    }

    /// Parse a value or bound. `None` if it is not acceptable for this input.
    pub fn parse(self, raw: &str) -> Option<NumericValue> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if self.is_number() {
            raw.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(NumericValue::Number)
        } else {
            Some(NumericValue::Temporal(raw.to_string()))
        }
    }
}

/// A parsed numeric-field value.
///
/// ISO-8601 dates and times of one format order lexicographically, so
/// temporal values compare as strings.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericValue {
    /// A finite number.
    Number(f64),
    /// An ISO-8601 date, month, week, time or local date-time.
    Temporal(String),
}

impl PartialOrd for NumericValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (NumericValue::Number(a), NumericValue::Number(b)) => a.partial_cmp(b),
            (NumericValue::Temporal(a), NumericValue::Temporal(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericValue::Number(n) => write!(f, "{n}"),
            NumericValue::Temporal(s) => f.write_str(s),
        }
    }
}

/// Grouped inputs that share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupInput {
    /// `radio`
    Radio,
    /// `checkbox`
    Checkbox,
}

/// The specialisation of a field, chosen from its control's type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Free-text entry: required, length bounds, pattern.
    FreeText(TextInput),
    /// Numeric or temporal entry: required, min/max.
    Numeric(NumericInput),
    /// A select box: required.
    Choice {
        /// `select-multiple` rather than `select-one`.
        multiple: bool,
    },
    /// Radio buttons or checkboxes sharing a name: at least one checked when required.
    Grouped(GroupInput),
}

impl FieldKind {
    /// Map a control type tag to a kind.
    ///
    /// # Example
    ///
    /// ```rust
    /// use formcheck::kind::{FieldKind, GroupInput, TextInput};
    ///
    /// assert_eq!(
    ///     FieldKind::from_type_tag("plan", "radio").unwrap(),
    ///     FieldKind::Grouped(GroupInput::Radio)
    /// );
    /// assert_eq!(
    ///     FieldKind::from_type_tag("bio", "textarea").unwrap(),
    ///     FieldKind::FreeText(TextInput::TextArea)
    /// );
    /// assert!(FieldKind::from_type_tag("colour", "color").is_err());
    /// ```
    pub fn from_type_tag(name: &str, type_tag: &str) -> Result<Self, FieldError> {
        let kind = match type_tag {
            "text" => FieldKind::FreeText(TextInput::Text),
            "tel" => FieldKind::FreeText(TextInput::Tel),
            "email" => FieldKind::FreeText(TextInput::Email),
            "url" => FieldKind::FreeText(TextInput::Url),
            "password" => FieldKind::FreeText(TextInput::Password),
            "search" => FieldKind::FreeText(TextInput::Search),
            "textarea" => FieldKind::FreeText(TextInput::TextArea),

            "number" => FieldKind::Numeric(NumericInput::Number),
            "range" => FieldKind::Numeric(NumericInput::Range),
            "date" => FieldKind::Numeric(NumericInput::Date),
            "month" => FieldKind::Numeric(NumericInput::Month),
            "week" => FieldKind::Numeric(NumericInput::Week),
            "time" => FieldKind::Numeric(NumericInput::Time),
            "datetime-local" => FieldKind::Numeric(NumericInput::DateTimeLocal),

            "select-one" => FieldKind::Choice { multiple: false },
            "select-multiple" => FieldKind::Choice { multiple: true },

            "radio" => FieldKind::Grouped(GroupInput::Radio),
            "checkbox" => FieldKind::Grouped(GroupInput::Checkbox),

            other => {
                return Err(FieldError::UnknownKind {
                    name: name.to_string(),
                    type_tag: other.to_string(),
                })
            }
        };
        Ok(kind)
    }

    /// Whether the field can be empty and so takes the plain `required` check.
    pub fn is_standard(&self) -> bool {
        !matches!(self, FieldKind::Grouped(_))
    }
}
