//! # formcheck
//!
//! Phased, cancellable, asynchronous validation of interrelated form fields.
//!
//! Each [`Field`] runs its [`Invalidator`]s in four ordered phases. Checks in
//! one phase run concurrently, and a phase that leaves the field invalid stops
//! the pipeline. Every invalidator run is a [`CancellableTask`]: starting a
//! new check cancels the previous one, and a debounced invalidator that is
//! superseded during its wait never runs at all.
//!
//! A [`FormValidator`] keeps the fields in sync with a [`Form`] and maintains
//! the match graph between fields that must hold equal values ("confirm
//! password"), re-checking dependents whenever their target is checked.
//!
//! ## Quick Example
//!
//! ```rust
//! use formcheck::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let form = Form::new();
//! form.add(
//!     Control::new("password", "password")
//!         .with_attribute(attr::VALIDATE, "")
//!         .with_attribute(attr::REQUIRED, "")
//!         .with_attribute(attr::DISPLAY_NAME, "Password")
//!         .with_attribute(attr::MIN_LENGTH, "8")
//!         .with_value("hunter22"),
//! );
//! form.add(
//!     Control::new("password", "confirm")
//!         .with_attribute(attr::VALIDATE, "")
//!         .with_attribute(attr::DISPLAY_NAME, "Confirmation")
//!         .with_attribute(attr::MATCH, "password")
//!         .with_value("hunter2"),
//! );
//!
//! let validator = FormValidator::new(form);
//! assert!(!validator.check_validity().await);
//!
//! let confirm = validator.field("confirm").unwrap();
//! assert_eq!(confirm.errors(), vec!["Confirmation does not match Password".to_string()]);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use std::sync::{Mutex, MutexGuard};

pub mod config;
pub mod control;
pub mod error;
pub mod field;
pub mod invalidator;
pub mod kind;
pub mod observe;
pub mod registry;
pub mod task;
pub mod testing;

// Re-exports
pub use config::{PatternPreset, ValidatorConfig};
pub use control::{Change, Control, ControlId, Form, FormEvent};
pub use error::{ConfigError, Diagnostic, Diagnostics, FieldError, Severity, TaskError};
pub use field::{ErrorSink, Field, FieldContext, FieldId, WeakField};
pub use invalidator::{CheckOutcome, Invalidate, Invalidator, InvalidatorOptions, Phase};
pub use kind::{FieldKind, GroupInput, NumericInput, NumericValue, TextInput};
pub use observe::{Observers, Subscription};
pub use registry::FormValidator;
pub use task::{CancelSignal, CancellableTask, TaskHandle};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ValidatorConfig;
    pub use crate::control::{attr, Control, Form};
    pub use crate::error::{ConfigError, Diagnostics, FieldError, Severity};
    pub use crate::field::{ErrorSink, Field, FieldContext};
    pub use crate::invalidator::{Invalidate, InvalidatorOptions, Phase};
    pub use crate::registry::FormValidator;
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
