//! Fields and the phased validation pipeline.
//!
//! A [`Field`] is the engine's model of one control, or of one group of
//! radio buttons / checkboxes sharing a name. It owns:
//!
//! - the outcome of the most recent check (`valid`, `errors`)
//! - an ordered list of [`Invalidator`]s, each tagged with a [`Phase`]
//! - its position in the match graph: at most one `match_to`, any number of
//!   `match_of` dependents
//!
//! # The pipeline
//!
//! [`Field::check_validity`] resets the outcome, cancels every run still in
//! flight from an earlier call, then runs the phases in order. Invalidators in
//! one phase run concurrently; the next phase only starts when the field is
//! still valid. Once the field's own checks are done, every `match_of`
//! dependent is re-checked in the background.
//!
//! ```rust
//! use formcheck::control::{attr, Control};
//! use formcheck::field::Field;
//!
//! # tokio_test::block_on(async {
//! let control = Control::new("text", "username")
//!     .with_attribute(attr::VALIDATE, "")
//!     .with_attribute(attr::REQUIRED, "")
//!     .with_attribute(attr::DISPLAY_NAME, "Username");
//! let field = Field::from_control(control.clone()).unwrap();
//!
//! assert!(!field.check_validity().await);
//! assert_eq!(field.errors(), vec!["Username is required".to_string()]);
//!
//! control.set_value("ada");
//! assert!(field.check_validity().await);
//! assert!(field.errors().is_empty());
//! # });
//! ```

mod checks;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use crate::config::ValidatorConfig;
use crate::control::{attr, Change, Control, Form};
use crate::error::{Diagnostics, FieldError};
use crate::invalidator::{
    CheckOutcome, Invalidate, Invalidator, InvalidatorOptions, Phase, ReasonSink,
};
use crate::kind::FieldKind;
use crate::lock;
use crate::observe::Subscription;
use crate::task::CancellableTask;

/// Receives a field's error list whenever it changes.
///
/// Called with an empty list when a check starts and with the accumulated
/// list after every invalidation.
pub trait ErrorSink: Send + Sync {
    /// Display `errors` for the field called `field`.
    fn render(&self, field: &str, errors: &[String]);
}

impl<F> ErrorSink for F
where
    F: Fn(&str, &[String]) + Send + Sync,
{
    fn render(&self, field: &str, errors: &[String]) {
        self(field, errors)
    }
}

/// Stable identity of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(u64);

static NEXT_FIELD_ID: AtomicU64 = AtomicU64::new(1);

/// Everything a field needs from its surroundings at construction time.
#[derive(Debug, Clone, Default)]
pub struct FieldContext {
    form: Option<Form>,
    config: Arc<ValidatorConfig>,
    diagnostics: Diagnostics,
}

impl FieldContext {
    /// Default configuration, no form, fresh diagnostics.
    pub fn new() -> Self {
        Self::default()
    }

    /// The form holding the control; grouped fields find their siblings here.
    pub fn with_form(mut self, form: Form) -> Self {
        self.form = Some(form);
        self
    }

    /// Shared configuration.
    pub fn with_config(mut self, config: Arc<ValidatorConfig>) -> Self {
        self.config = config;
        self
    }

    /// Where configuration problems are reported.
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Configured diagnostics collector.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Configured engine configuration.
    pub fn config(&self) -> &Arc<ValidatorConfig> {
        &self.config
    }
}

#[derive(Debug)]
struct FieldState {
    valid: bool,
    errors: Vec<String>,
    generation: u64,
    checking: bool,
}

#[derive(Debug, Default)]
struct Relations {
    match_to: Option<WeakField>,
    match_of: Vec<WeakField>,
}

struct FieldShared {
    id: FieldId,
    control: Control,
    kind: FieldKind,
    form: Option<Form>,
    config: Arc<ValidatorConfig>,
    diagnostics: Diagnostics,
    state: Mutex<FieldState>,
    invalidators: Mutex<Vec<Invalidator>>,
    relations: Mutex<Relations>,
    watch: Mutex<Option<Vec<Subscription>>>,
    sink: Mutex<Option<Arc<dyn ErrorSink>>>,
}

/// A validated form field. Cloning yields another handle to the same field.
#[derive(Clone)]
pub struct Field {
    shared: Arc<FieldShared>,
}

/// Non-owning reference to a [`Field`].
#[derive(Clone, Default)]
pub struct WeakField {
    shared: Weak<FieldShared>,
}

impl WeakField {
    /// The field, if it is still alive.
    pub fn upgrade(&self) -> Option<Field> {
        self.shared.upgrade().map(|shared| Field { shared })
    }
}

impl fmt::Debug for WeakField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(field) => write!(f, "WeakField({})", field.name()),
            None => f.write_str("WeakField(<dropped>)"),
        }
    }
}

impl Field {
    /// Create a field for `control` with the default configuration.
    pub fn from_control(control: Control) -> Result<Self, FieldError> {
        Self::new(control, &FieldContext::default())
    }

    /// Create a field for `control`.
    ///
    /// Fails if the control's type tag is unknown, or if a numeric field
    /// carries a `min`/`max` that does not parse.
    pub fn new(control: Control, context: &FieldContext) -> Result<Self, FieldError> {
        let name = control.name();
        let kind = FieldKind::from_type_tag(&name, &control.type_tag())?;

        if let FieldKind::Numeric(input) = kind {
            for attribute in [attr::MIN, attr::MAX] {
                if let Some(raw) = control.attribute(attribute) {
                    if input.parse(&raw).is_none() {
                        return Err(FieldError::InvalidBound {
                            name,
                            attribute,
                            value: raw,
                        });
                    }
                }
            }
        }

        let field = Self {
            shared: Arc::new(FieldShared {
                id: FieldId(NEXT_FIELD_ID.fetch_add(1, Ordering::Relaxed)),
                control,
                kind,
                form: context.form.clone(),
                config: context.config.clone(),
                diagnostics: context.diagnostics.clone(),
                state: Mutex::new(FieldState {
                    valid: false,
                    errors: Vec::new(),
                    generation: 0,
                    checking: false,
                }),
                invalidators: Mutex::new(Vec::new()),
                relations: Mutex::new(Relations::default()),
                watch: Mutex::new(None),
                sink: Mutex::new(None),
            }),
        };

        checks::install(&field);
        tracing::debug!(field = %name, ?kind, "created field");
        Ok(field)
    }

    /// Stable identity.
    pub fn id(&self) -> FieldId {
        self.shared.id
    }

    /// Current name of the backing control.
    pub fn name(&self) -> String {
        self.shared.control.name()
    }

    /// The backing control. For grouped fields, the first control of the group.
    pub fn control(&self) -> &Control {
        &self.shared.control
    }

    /// Every control this field validates.
    pub fn controls(&self) -> Vec<Control> {
        let control = &self.shared.control;
        match (&self.shared.kind, &self.shared.form) {
            (FieldKind::Grouped(_), Some(form)) => {
                let group = form.group(&control.name(), &control.type_tag());
                if group.is_empty() {
                    vec![control.clone()]
                } else {
                    group
                }
            }
            _ => vec![control.clone()],
        }
    }

    /// The field's specialisation.
    pub fn kind(&self) -> FieldKind {
        self.shared.kind
    }

    /// Shared configuration.
    pub fn config(&self) -> &ValidatorConfig {
        &self.shared.config
    }

    /// Where this field reports configuration problems.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.shared.diagnostics
    }

    /// Current value.
    ///
    /// Grouped fields yield the values of their checked controls joined by `,`.
    pub fn value(&self) -> String {
        match self.shared.kind {
            FieldKind::Grouped(_) => self
                .controls()
                .iter()
                .filter(|c| c.is_checked())
                .map(Control::value)
                .collect::<Vec<_>>()
                .join(","),
            _ => self.shared.control.value(),
        }
    }

    /// Display name used in error messages.
    pub fn display_name(&self) -> String {
        self.shared
            .control
            .attribute(attr::DISPLAY_NAME)
            .unwrap_or_else(|| self.shared.config.fallback_display_name().to_string())
    }

    /// Whether the field takes part in validation right now.
    pub fn participates(&self) -> bool {
        let control = &self.shared.control;
        !control.is_disabled() && control.attribute_is_truthy(attr::VALIDATE)
    }

    /// Validity produced by the most recent check. `false` before the first one.
    pub fn last_validity(&self) -> bool {
        lock(&self.shared.state).valid
    }

    /// Errors produced by the most recent check.
    pub fn errors(&self) -> Vec<String> {
        lock(&self.shared.state).errors.clone()
    }

    /// Whether a check is running.
    pub fn is_checking(&self) -> bool {
        lock(&self.shared.state).checking
    }

    /// Number of attached invalidators, built-ins included.
    pub fn invalidator_count(&self) -> usize {
        lock(&self.shared.invalidators).len()
    }

    /// Route this field's errors to `sink`.
    pub fn set_error_sink(&self, sink: Arc<dyn ErrorSink>) {
        *lock(&self.shared.sink) = Some(sink);
    }

    /// Stop rendering errors.
    pub fn clear_error_sink(&self) {
        *lock(&self.shared.sink) = None;
    }

    /// The field this one must equal.
    pub fn match_to(&self) -> Option<Field> {
        lock(&self.shared.relations)
            .match_to
            .as_ref()
            .and_then(WeakField::upgrade)
    }

    /// Fields that must equal this one.
    pub fn match_of(&self) -> Vec<Field> {
        let mut relations = lock(&self.shared.relations);
        relations.match_of.retain(|w| w.shared.strong_count() > 0);
        relations
            .match_of
            .iter()
            .filter_map(WeakField::upgrade)
            .collect()
    }

    /// Non-owning handle.
    pub fn downgrade(&self) -> WeakField {
        WeakField {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Whether two handles refer to the same field.
    pub fn ptr_eq(&self, other: &Field) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Append an invalidator.
    ///
    /// `check` receives the field's value and an [`Invalidate`] callback; call
    /// it with a reason to mark the field invalid. Returning `Err` from the
    /// check makes the field invalid for that run without adding a reason.
    ///
    /// ```rust
    /// use formcheck::control::{attr, Control};
    /// use formcheck::field::Field;
    /// use formcheck::invalidator::{Invalidate, InvalidatorOptions, Phase};
    ///
    /// # tokio_test::block_on(async {
    /// let control = Control::new("text", "username")
    ///     .with_attribute(attr::VALIDATE, "")
    ///     .with_value("admin");
    /// let field = Field::from_control(control).unwrap();
    ///
    /// field.add_invalidator(
    ///     |value: String, invalidate: Invalidate| async move {
    ///         if value == "admin" {
    ///             invalidate.invalidate("This username is in use");
    ///         }
    ///     },
    ///     InvalidatorOptions::new().with_phase(Phase::AfterOthers),
    /// );
    ///
    /// assert!(!field.check_validity().await);
    /// assert_eq!(field.errors(), vec!["This username is in use".to_string()]);
    /// # });
    /// ```
    pub fn add_invalidator<F, Fut>(&self, check: F, options: InvalidatorOptions)
    where
        F: Fn(String, Invalidate) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: CheckOutcome,
    {
        let invalidator = Invalidator::new(check, options);
        tracing::trace!(
            field = %self.name(),
            invalidator = invalidator.name(),
            phase = %invalidator.phase(),
            "added invalidator"
        );
        lock(&self.shared.invalidators).push(invalidator);
    }

    /// Check the field's validity.
    ///
    /// The returned future is `'static` so it can be spawned. Dependent
    /// `match_of` fields are re-checked in the background afterwards; the
    /// returned future does not wait for them.
    pub fn check_validity(&self) -> BoxFuture<'static, bool> {
        let field = self.clone();
        async move { field.run_checks().await }.boxed()
    }

    /// Re-check whenever the value, the disabled state, or a configuration
    /// attribute changes. Calling it again while already watching is a no-op.
    pub fn validate_on_change(&self) {
        let mut watch = lock(&self.shared.watch);
        if watch.is_some() {
            return;
        }

        let subscriptions = self
            .controls()
            .into_iter()
            .map(|control| {
                let weak = self.downgrade();
                control.subscribe(move |change| {
                    if !triggers_recheck(change) {
                        return;
                    }
                    if let Some(field) = weak.upgrade() {
                        field.spawn_check();
                    }
                })
            })
            .collect();

        *watch = Some(subscriptions);
        tracing::debug!(field = %self.name(), "watching field for changes");
    }

    /// Stop re-checking on change.
    pub fn stop_validating_on_change(&self) {
        if lock(&self.shared.watch).take().is_some() {
            tracing::debug!(field = %self.name(), "stopped watching field");
        }
    }

    /// Whether [`validate_on_change`](Self::validate_on_change) is active.
    pub fn is_watching(&self) -> bool {
        lock(&self.shared.watch).is_some()
    }

    /// Cancel every in-flight invalidator run.
    pub fn cancel_running(&self) {
        for invalidator in lock(&self.shared.invalidators).iter_mut() {
            invalidator.cancel();
        }
    }

    pub(crate) fn set_match_to(&self, target: Option<&Field>) {
        lock(&self.shared.relations).match_to = target.map(Field::downgrade);
    }

    pub(crate) fn add_match_of(&self, dependent: &Field) {
        let mut relations = lock(&self.shared.relations);
        let present = relations
            .match_of
            .iter()
            .any(|w| w.shared.ptr_eq(&Arc::downgrade(&dependent.shared)));
        if !present {
            relations.match_of.push(dependent.downgrade());
        }
    }

    pub(crate) fn remove_match_of(&self, dependent: &Field) {
        let target = Arc::downgrade(&dependent.shared);
        lock(&self.shared.relations)
            .match_of
            .retain(|w| !w.shared.ptr_eq(&target) && w.shared.strong_count() > 0);
    }

    async fn run_checks(&self) -> bool {
        let name = self.name();
        let generation = self.begin_run();

        if !self.participates() {
            self.cancel_running();
            self.end_run(generation);
            tracing::trace!(field = %name, "field opted out of validation");
            return true;
        }

        self.cancel_running();
        let value = self.value();
        let sink = self.reason_sink(generation);

        for phase in Phase::ALL {
            if !self.is_current(generation) {
                return false;
            }

            let tasks = self.start_phase(phase, &value, &sink);
            if tasks.is_empty() {
                continue;
            }

            let rejected = join_all(tasks).await.into_iter().find_map(Result::err);

            if !self.is_current(generation) {
                tracing::trace!(field = %name, %phase, "run superseded by a newer check");
                return false;
            }

            if let Some(error) = rejected {
                tracing::debug!(
                    field = %name,
                    %phase,
                    %error,
                    "invalidator rejected, aborting run"
                );
                self.mark_invalid(generation);
                break;
            }

            if !self.last_validity() {
                tracing::trace!(
                    field = %name,
                    %phase,
                    "phase invalidated field, skipping later phases"
                );
                break;
            }
        }

        let valid = self.end_run(generation);
        tracing::debug!(field = %name, valid, "checked field");
        self.cascade();
        valid
    }

    fn begin_run(&self) -> u64 {
        let generation = {
            let mut state = lock(&self.shared.state);
            state.generation += 1;
            state.errors.clear();
            state.valid = true;
            state.checking = true;
            state.generation
        };
        self.render(&[]);
        generation
    }

    fn end_run(&self, generation: u64) -> bool {
        let mut state = lock(&self.shared.state);
        if state.generation != generation {
            return false;
        }
        state.checking = false;
        state.valid
    }

    fn is_current(&self, generation: u64) -> bool {
        lock(&self.shared.state).generation == generation
    }

    fn mark_invalid(&self, generation: u64) {
        let mut state = lock(&self.shared.state);
        if state.generation == generation {
            state.valid = false;
        }
    }

    fn start_phase(
        &self,
        phase: Phase,
        value: &str,
        sink: &ReasonSink,
    ) -> Vec<CancellableTask<()>> {
        lock(&self.shared.invalidators)
            .iter_mut()
            .filter(|inv| inv.phase() == phase)
            .map(|inv| inv.start(value.to_string(), sink.clone()))
            .collect()
    }

    fn reason_sink(&self, generation: u64) -> ReasonSink {
        let weak = self.downgrade();
        Arc::new(move |reason: String| {
            if let Some(field) = weak.upgrade() {
                field.record_invalidation(generation, reason);
            }
        })
    }

    fn record_invalidation(&self, generation: u64, reason: String) {
        let errors = {
            let mut state = lock(&self.shared.state);
            if state.generation != generation {
                return;
            }
            state.valid = false;
            state.errors.push(reason);
            state.errors.clone()
        };
        self.render(&errors);
    }

    fn render(&self, errors: &[String]) {
        let sink = lock(&self.shared.sink).clone();
        if let Some(sink) = sink {
            sink.render(&self.name(), errors);
        }
    }

    fn cascade(&self) {
        let dependents = self.match_of();
        if dependents.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                for dependent in dependents {
                    tracing::trace!(
                        field = %self.name(),
                        dependent = %dependent.name(),
                        "cascading check"
                    );
                    runtime.spawn(dependent.check_validity());
                }
            }
            Err(_) => {
                tracing::warn!(
                    field = %self.name(),
                    "no async runtime available, dependent fields were not re-checked"
                );
            }
        }
    }

    fn spawn_check(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(self.check_validity());
            }
            Err(_) => {
                tracing::warn!(
                    field = %self.name(),
                    "no async runtime available, change was not validated"
                );
            }
        }
    }
}

fn triggers_recheck(change: &Change) -> bool {
    match change {
        Change::Value | Change::Checked | Change::Disabled => true,
        Change::Attribute(name) => {
            name == attr::VALIDATE || attr::CONFIGURATION.contains(&name.as_str())
        }
        Change::Name | Change::TypeTag => false,
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Field {}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.shared.state);
        f.debug_struct("Field")
            .field("id", &self.shared.id)
            .field("name", &self.shared.control.name())
            .field("kind", &self.shared.kind)
            .field("valid", &state.valid)
            .field("errors", &state.errors)
            .finish_non_exhaustive()
    }
}
