//! Error types and developer-facing diagnostics.
//!
//! End users only ever see a field's `errors` list and its validity. The types
//! here are for the people wiring the form up:
//!
//! - [`TaskError`]: outcome of a rejected [`CancellableTask`](crate::task::CancellableTask)
//! - [`FieldError`]: a field could not be constructed at all
//! - [`ConfigError`]: a field is misconfigured; the affected check is skipped
//!
//! Configuration problems are logged through `tracing` and recorded in a
//! [`Diagnostics`] collector so they can be inspected programmatically.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

/// Why a cancellable task did not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task was cancelled before it settled.
    #[error("task was cancelled")]
    Cancelled,
    /// The task's own work failed.
    #[error("task failed: {0}")]
    Failed(String),
}

/// A field could not be created from its control.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The control's type tag does not map to any field kind.
    #[error("failed to create field '{name}' from a control of unknown type '{type_tag}'")]
    UnknownKind {
        /// Control name.
        name: String,
        /// The unrecognised type tag.
        type_tag: String,
    },
    /// An explicit numeric bound could not be parsed.
    #[error("field '{name}' has an invalid '{attribute}' value '{value}'")]
    InvalidBound {
        /// Control name.
        name: String,
        /// Attribute holding the bound.
        attribute: &'static str,
        /// Raw attribute value.
        value: String,
    },
}

/// How loudly a configuration problem is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    /// Something is probably unintended but the field still works.
    Warning,
    /// A check could not run or a relation could not be established.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// A misconfigured field or relation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A bound attribute stopped parsing after the field was created.
    #[error("field '{field}' has an invalid '{attribute}' value '{value}'")]
    InvalidBound {
        /// Field name.
        field: String,
        /// Attribute holding the bound.
        attribute: &'static str,
        /// Raw attribute value.
        value: String,
    },
    /// The custom pattern is not a valid regular expression.
    #[error("field '{field}' has an invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Field name.
        field: String,
        /// Raw pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },
    /// The named pattern preset does not exist.
    #[error("field '{field}' uses unknown pattern preset '{preset}'")]
    UnknownPreset {
        /// Field name.
        field: String,
        /// Requested preset.
        preset: String,
    },
    /// Both a custom pattern and a preset are set; the custom pattern is ignored.
    #[error("field '{field}' has both a custom pattern and a pattern preset set, the custom pattern is ignored")]
    ConflictingPatterns {
        /// Field name.
        field: String,
    },
    /// A pattern label is set but there is no pattern to describe.
    #[error("field '{field}' has a pattern label but no pattern")]
    UnusedPatternLabel {
        /// Field name.
        field: String,
    },
    /// The declared match target does not name any field.
    #[error("failed to find field '{target}' to match with '{field}'")]
    DanglingMatch {
        /// Dependent field.
        field: String,
        /// Declared target name.
        target: String,
    },
    /// Matching the declared target would close a cycle.
    #[error("refusing to match '{field}' with '{target}': the match relation would form a cycle")]
    MatchCycle {
        /// Dependent field.
        field: String,
        /// Declared target name.
        target: String,
    },
    /// A control was eligible but its field could not be created.
    #[error(transparent)]
    Construction(#[from] FieldError),
}

impl ConfigError {
    /// Name of the field the problem belongs to.
    pub fn field(&self) -> &str {
        match self {
            ConfigError::InvalidBound { field, .. }
            | ConfigError::InvalidPattern { field, .. }
            | ConfigError::UnknownPreset { field, .. }
            | ConfigError::ConflictingPatterns { field }
            | ConfigError::UnusedPatternLabel { field }
            | ConfigError::DanglingMatch { field, .. }
            | ConfigError::MatchCycle { field, .. } => field,
            ConfigError::Construction(FieldError::UnknownKind { name, .. })
            | ConfigError::Construction(FieldError::InvalidBound { name, .. }) => name,
        }
    }

    /// Whether this is a problem with a field's `match` declaration.
    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            ConfigError::DanglingMatch { .. } | ConfigError::MatchCycle { .. }
        )
    }

    /// How loudly this problem should be reported.
    pub fn severity(&self) -> Severity {
        match self {
            ConfigError::ConflictingPatterns { .. }
            | ConfigError::UnusedPatternLabel { .. }
            | ConfigError::DanglingMatch { .. } => Severity::Warning,
            ConfigError::InvalidBound { .. }
            | ConfigError::InvalidPattern { .. }
            | ConfigError::UnknownPreset { .. }
            | ConfigError::MatchCycle { .. }
            | ConfigError::Construction(_) => Severity::Error,
        }
    }
}

/// A reported configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// How loudly it was reported.
    pub severity: Severity,
    /// What went wrong.
    pub error: ConfigError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.error)
    }
}

/// Shared collector of configuration diagnostics.
///
/// Each distinct problem is recorded once and emitted once as a `tracing`
/// event at the matching level; repeated reports of it are ignored until it
/// is forgotten. Clones share the same underlying list.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Arc<Mutex<Vec<Diagnostic>>>,
}

impl Diagnostics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and record a configuration problem, unless it is already recorded.
    pub fn report(&self, error: ConfigError) {
        let severity = error.severity();
        {
            let mut entries = self.lock();
            if entries.iter().any(|d| d.error == error) {
                return;
            }
            entries.push(Diagnostic {
                severity,
                error: error.clone(),
            });
        }
        match severity {
            Severity::Warning => tracing::warn!(%error, "form configuration warning"),
            Severity::Error => tracing::error!(%error, "form configuration error"),
        }
    }

    /// Drop every recorded problem matching `predicate`.
    pub fn forget(&self, predicate: impl Fn(&ConfigError) -> bool) {
        self.lock().retain(|d| !predicate(&d.error));
    }

    /// Drop every recorded problem of the field called `field`.
    pub fn forget_field(&self, field: &str) {
        self.forget(|error| error.field() == field);
    }

    /// Snapshot of everything reported so far.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Remove and return everything reported so far.
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    /// Whether any diagnostic matches `predicate`.
    pub fn any(&self, predicate: impl Fn(&ConfigError) -> bool) -> bool {
        self.lock().iter().any(|d| predicate(&d.error))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_of_soft_issues_is_warning() {
        let err = ConfigError::DanglingMatch {
            field: "confirm".into(),
            target: "password".into(),
        };
        assert_eq!(err.severity(), Severity::Warning);

        let err = ConfigError::UnusedPatternLabel {
            field: "postcode".into(),
        };
        assert_eq!(err.severity(), Severity::Warning);
    }

    #[test]
    fn construction_errors_are_errors() {
        let err: ConfigError = FieldError::UnknownKind {
            name: "colour".into(),
            type_tag: "color".into(),
        }
        .into();
        assert_eq!(err.severity(), Severity::Error);
        assert_eq!(
            err.to_string(),
            "failed to create field 'colour' from a control of unknown type 'color'"
        );
    }

    #[test]
    fn diagnostics_are_shared_between_clones() {
        let diagnostics = Diagnostics::new();
        let other = diagnostics.clone();

        other.report(ConfigError::ConflictingPatterns {
            field: "phone".into(),
        });

        assert_eq!(diagnostics.snapshot().len(), 1);
        assert!(diagnostics.any(|e| matches!(e, ConfigError::ConflictingPatterns { .. })));
        assert_eq!(diagnostics.drain().len(), 1);
        assert!(other.snapshot().is_empty());
    }

    #[test]
    #[tracing_test::traced_test]
    fn repeated_reports_are_recorded_and_logged_once() {
        let diagnostics = Diagnostics::new();
        for _ in 0..3 {
            diagnostics.report(ConfigError::UnknownPreset {
                field: "postcode".into(),
                preset: "uk-postcode".into(),
            });
        }

        assert_eq!(diagnostics.snapshot().len(), 1);
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("uk-postcode")).count() {
                1 => Ok(()),
                n => Err(format!("expected one log line, got {n}")),
            }
        });
    }

    #[test]
    fn forget_field_drops_only_that_field() {
        let diagnostics = Diagnostics::new();
        diagnostics.report(ConfigError::ConflictingPatterns {
            field: "phone".into(),
        });
        diagnostics.report(
            FieldError::UnknownKind {
                name: "phone".into(),
                type_tag: "file".into(),
            }
            .into(),
        );
        diagnostics.report(ConfigError::DanglingMatch {
            field: "confirm".into(),
            target: "password".into(),
        });

        diagnostics.forget_field("phone");

        let left: Vec<_> = diagnostics.drain().into_iter().map(|d| d.error).collect();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].field(), "confirm");
        assert!(left[0].is_relation());
    }

    #[test]
    fn diagnostic_display_includes_severity() {
        let diagnostic = Diagnostic {
            severity: Severity::Warning,
            error: ConfigError::DanglingMatch {
                field: "confirm".into(),
                target: "password".into(),
            },
        };
        assert_eq!(
            diagnostic.to_string(),
            "warning: failed to find field 'password' to match with 'confirm'"
        );
    }
}
