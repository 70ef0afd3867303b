//! Built-in invalidators.
//!
//! Every field gets the match check. Standard fields (everything but grouped
//! radio/checkbox fields) get `required`; grouped fields get a group-aware
//! `required`. Free-text fields add length and pattern checks, numeric fields
//! add bound checks.
//!
//! All built-ins read their configuration from the control's attributes at
//! check time, so a field can be reconfigured without being recreated. A
//! malformed attribute is reported through the field's diagnostics and the
//! affected check is skipped for that run.

use futures::future::{ready, Ready};
use regex::Regex;

use crate::control::attr;
use crate::error::ConfigError;
use crate::invalidator::{Invalidate, InvalidatorOptions, Phase};
use crate::kind::{FieldKind, NumericInput};

use super::{Field, WeakField};

/// Attach the built-in invalidators appropriate for the field's kind.
pub(crate) fn install(field: &Field) {
    add(field, "match", Phase::AfterInitial, check_match);

    match field.kind() {
        FieldKind::Grouped(_) => add(field, "required", Phase::WithInitial, check_group_required),
        _ => add(field, "required", Phase::WithInitial, check_required),
    }

    match field.kind() {
        FieldKind::FreeText(_) => {
            add(field, "min-length", Phase::WithOthers, check_min_length);
            add(field, "max-length", Phase::WithOthers, check_max_length);
            add(field, "pattern", Phase::WithOthers, check_pattern);
        }
        FieldKind::Numeric(input) => {
            add(field, "bounds", Phase::WithOthers, move |f: &Field, v: &str, i: &Invalidate| {
                check_bounds(f, input, v, i)
            });
        }
        FieldKind::Choice { .. } | FieldKind::Grouped(_) => {}
    }
}

fn add<C>(field: &Field, name: &str, phase: Phase, check: C)
where
    C: Fn(&Field, &str, &Invalidate) + Send + Sync + 'static,
{
    let weak: WeakField = field.downgrade();
    field.add_invalidator(
        move |value: String, invalidate: Invalidate| -> Ready<()> {
            if let Some(field) = weak.upgrade() {
                check(&field, &value, &invalidate);
            }
            ready(())
        },
        InvalidatorOptions::new().with_name(name).with_phase(phase),
    );
}

fn check_required(field: &Field, value: &str, invalidate: &Invalidate) {
    if field.control().attribute_is_truthy(attr::REQUIRED) && value.is_empty() {
        invalidate.invalidate(format!("{} is required", field.display_name()));
    }
}

fn check_group_required(field: &Field, _value: &str, invalidate: &Invalidate) {
    if !field.control().attribute_is_truthy(attr::REQUIRED) {
        return;
    }
    if !field.controls().iter().any(|c| c.is_checked()) {
        invalidate.invalidate(format!("{} is required", field.display_name()));
    }
}

fn check_match(field: &Field, value: &str, invalidate: &Invalidate) {
    let Some(target) = field.match_to() else {
        return;
    };

    let target_required = target.control().attribute_is_truthy(attr::REQUIRED);
    if value == target.value() && !(value.is_empty() && target_required) {
        return;
    }

    let reason = match target.control().attribute(attr::DISPLAY_NAME) {
        Some(target_name) => format!("{} does not match {}", field.display_name(), target_name),
        None => format!("{} does not match", field.display_name()),
    };
    invalidate.invalidate(reason);
}

fn length_bound(field: &Field, attribute: &'static str) -> Option<usize> {
    let raw = field.control().attribute(attribute)?;
    match raw.trim().parse::<usize>() {
        Ok(bound) => Some(bound),
        Err(_) => {
            field.diagnostics().report(ConfigError::InvalidBound {
                field: field.name(),
                attribute,
                value: raw,
            });
            None
        }
    }
}

fn check_min_length(field: &Field, value: &str, invalidate: &Invalidate) {
    if value.is_empty() {
        return;
    }
    let Some(min) = length_bound(field, attr::MIN_LENGTH) else {
        return;
    };
    if value.chars().count() < min {
        invalidate.invalidate(format!(
            "{} must have at least {} characters",
            field.display_name(),
            min
        ));
    }
}

fn check_max_length(field: &Field, value: &str, invalidate: &Invalidate) {
    let Some(max) = length_bound(field, attr::MAX_LENGTH) else {
        return;
    };
    if value.chars().count() > max {
        invalidate.invalidate(format!(
            "{} must have at most {} characters",
            field.display_name(),
            max
        ));
    }
}

fn check_pattern(field: &Field, value: &str, invalidate: &Invalidate) {
    let control = field.control();
    let pattern = control.attribute(attr::PATTERN);
    let preset = control.attribute(attr::PATTERN_PRESET);
    let label = control.attribute(attr::PATTERN_LABEL);

    if pattern.is_some() && preset.is_some() {
        field.diagnostics().report(ConfigError::ConflictingPatterns { field: field.name() });
    }
    if label.is_some() && pattern.is_none() && preset.is_none() {
        field.diagnostics().report(ConfigError::UnusedPatternLabel { field: field.name() });
    }

    if value.is_empty() {
        return;
    }

    if let Some(preset_name) = preset {
        match field.config().preset(&preset_name) {
            Some(preset) if !preset.is_match(value) => {
                invalidate.invalidate(format!(
                    "{} is not a valid {}",
                    field.display_name(),
                    preset.description()
                ));
            }
            Some(_) => {}
            None => field.diagnostics().report(ConfigError::UnknownPreset {
                field: field.name(),
                preset: preset_name,
            }),
        }
        return;
    }

    let Some(pattern) = pattern else {
        return;
    };
    match Regex::new(&pattern) {
        Ok(re) if !re.is_match(value) => {
            invalidate.invalidate(format!(
                "{} is not a valid {}",
                field.display_name(),
                label.as_deref().unwrap_or("value")
            ));
        }
        Ok(_) => {}
        Err(err) => field.diagnostics().report(ConfigError::InvalidPattern {
            field: field.name(),
            pattern,
            reason: err.to_string(),
        }),
    }
}

fn check_bounds(field: &Field, input: NumericInput, value: &str, invalidate: &Invalidate) {
    if value.trim().is_empty() {
        return;
    }
    let Some(parsed) = input.parse(value) else {
        invalidate.invalidate(format!("{} must be a number", field.display_name()));
        return;
    };

    let bound = |attribute: &'static str| {
        let raw = field.control().attribute(attribute)?;
        let parsed = input.parse(&raw);
        if parsed.is_none() {
            field.diagnostics().report(ConfigError::InvalidBound {
                field: field.name(),
                attribute,
                value: raw,
            });
        }
        parsed
    };

    if let Some(min) = bound(attr::MIN) {
        if parsed < min {
            invalidate.invalidate(format!(
                "{} must be greater than or equal to {}",
                field.display_name(),
                min
            ));
        }
    }
    if let Some(max) = bound(attr::MAX) {
        if parsed > max {
            invalidate.invalidate(format!(
                "{} must be less than or equal to {}",
                field.display_name(),
                max
            ));
        }
    }
}
