//! The field registry.
//!
//! A [`FormValidator`] keeps one [`Field`] per eligible control of a
//! [`Form`] (controls carrying the `validate` attribute; radio buttons and
//! checkboxes sharing a name count as one), and maintains the match graph
//! between them.
//!
//! # Reconciliation
//!
//! On construction, on every structural change of the form, and whenever a
//! control's type tag or `validate` attribute changes, the registry:
//!
//! 1. drops fields whose control has left the form or stopped being
//!    eligible, detaching their edges; a field whose kind no longer fits its
//!    control's type tag is dropped too
//! 2. creates fields for newly eligible controls; a control that cannot be
//!    turned into a field is reported and skipped, the rest carry on
//! 3. re-resolves every field's `match` declaration
//!
//! Fields registered with [`FormValidator::add_field`] stay until they are
//! removed with [`FormValidator::remove_field`] or their kind goes stale.
//!
//! # Match edges
//!
//! Each resolved edge owns a subscription to its target's name, so renaming
//! the target rewrites the dependent's `match` attribute to follow it. Each
//! field also owns exactly one subscription to its own `match` attribute;
//! changing it to anything but the current target's name re-resolves the
//! edge. Re-creating an edge always drops the previous subscription first.
//!
//! Declarations that cannot be resolved, or that would close a cycle, leave
//! the field without a target and are reported through [`Diagnostics`]. The
//! report is withdrawn once the declaration resolves or goes away.
//!
//! # Example
//!
//! ```rust
//! use formcheck::control::{attr, Control, Form};
//! use formcheck::registry::FormValidator;
//!
//! # tokio_test::block_on(async {
//! let form = Form::new();
//! let password = Control::new("password", "password")
//!     .with_attribute(attr::VALIDATE, "")
//!     .with_value("secret12");
//! let confirm = Control::new("password", "confirm")
//!     .with_attribute(attr::VALIDATE, "")
//!     .with_attribute(attr::MATCH, "password")
//!     .with_value("secret13");
//! form.add(password);
//! form.add(confirm.clone());
//!
//! let validator = FormValidator::new(form);
//! assert!(!validator.check_validity().await);
//!
//! confirm.set_value("secret12");
//! assert!(validator.check_validity().await);
//! # });
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;

use crate::config::ValidatorConfig;
use crate::control::{attr, Change, Control, ControlId, Form};
use crate::error::{ConfigError, Diagnostic, Diagnostics, FieldError};
use crate::field::{Field, FieldContext, FieldId, WeakField};
use crate::kind::FieldKind;
use crate::lock;
use crate::observe::Subscription;

struct Edge {
    target: WeakField,
    _rename: Subscription,
}

struct RegistryShared {
    form: Form,
    context: FieldContext,
    fields: Mutex<Vec<Field>>,
    manual: Mutex<HashSet<FieldId>>,
    edges: Mutex<HashMap<FieldId, Edge>>,
    declarations: Mutex<HashMap<FieldId, Subscription>>,
    structure: Mutex<Option<Subscription>>,
    controls: Mutex<HashMap<ControlId, Subscription>>,
    watching: AtomicBool,
}

/// Owns the fields of one form and the match graph between them.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct FormValidator {
    shared: Arc<RegistryShared>,
}

impl FormValidator {
    /// Create a registry for `form` with the default configuration.
    pub fn new(form: Form) -> Self {
        Self::with_config(form, ValidatorConfig::default())
    }

    /// Create a registry for `form`.
    pub fn with_config(form: Form, config: ValidatorConfig) -> Self {
        let context = FieldContext::new()
            .with_form(form.clone())
            .with_config(Arc::new(config));

        let validator = Self {
            shared: Arc::new(RegistryShared {
                form: form.clone(),
                context,
                fields: Mutex::new(Vec::new()),
                manual: Mutex::new(HashSet::new()),
                edges: Mutex::new(HashMap::new()),
                declarations: Mutex::new(HashMap::new()),
                structure: Mutex::new(None),
                controls: Mutex::new(HashMap::new()),
                watching: AtomicBool::new(false),
            }),
        };

        validator.reconcile();

        let registry = Arc::downgrade(&validator.shared);
        let structure = form.subscribe(move |event| {
            if let Some(shared) = registry.upgrade() {
                tracing::debug!(?event, "form structure changed");
                FormValidator { shared }.reconcile();
            }
        });
        *lock(&validator.shared.structure) = Some(structure);

        validator
    }

    /// The form being validated.
    pub fn form(&self) -> &Form {
        &self.shared.form
    }

    /// Snapshot of every field, in registration order.
    pub fn fields(&self) -> Vec<Field> {
        lock(&self.shared.fields).clone()
    }

    /// Look a field up by its current name.
    pub fn field(&self, name: &str) -> Option<Field> {
        lock(&self.shared.fields)
            .iter()
            .find(|f| f.name() == name)
            .cloned()
    }

    /// Everything reported so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.shared.context.diagnostics().snapshot()
    }

    /// The shared diagnostics collector.
    pub fn diagnostics_handle(&self) -> &Diagnostics {
        self.shared.context.diagnostics()
    }

    /// Whether every field was valid at its most recent check.
    pub fn valid(&self) -> bool {
        lock(&self.shared.fields).iter().all(Field::last_validity)
    }

    /// Check every field concurrently. `true` if all of them are valid.
    pub async fn check_validity(&self) -> bool {
        let checks: Vec<_> = self.fields().iter().map(Field::check_validity).collect();
        join_all(checks).await.into_iter().all(|valid| valid)
    }

    /// Re-check every field, present and future, whenever it changes.
    pub fn watch_all_fields(&self) {
        self.shared.watching.store(true, Ordering::SeqCst);
        for field in self.fields() {
            field.validate_on_change();
        }
    }

    /// Stop re-checking fields on change.
    pub fn ignore_all_fields(&self) {
        self.shared.watching.store(false, Ordering::SeqCst);
        for field in self.fields() {
            field.stop_validating_on_change();
        }
    }

    /// Build a field for `control` using this registry's configuration.
    pub fn create_field(&self, control: Control) -> Result<Field, FieldError> {
        Field::new(control, &self.shared.context)
    }

    /// Register a field and refresh the match graph.
    ///
    /// The field is kept across reconciliations even when its control is not
    /// an eligible control of the form.
    pub fn add_field(&self, field: Field) {
        lock(&self.shared.manual).insert(field.id());
        self.insert_field(field);
        self.set_fields_relations();
    }

    /// Unregister a field, detaching it from the match graph.
    ///
    /// Fields that matched it are re-resolved, which reports them as dangling
    /// unless another field now carries the declared name.
    pub fn remove_field(&self, field: &Field) {
        let dependents = field.match_of();
        if self.detach_field(field) {
            for dependent in dependents {
                self.set_field_relations(&dependent);
            }
        }
    }

    /// Synchronise the fields with the form's current controls.
    pub fn reconcile(&self) {
        let controls = self.shared.form.controls();
        self.watch_controls(&controls);
        let eligible: Vec<Control> = controls
            .into_iter()
            .filter(|c| c.has_attribute(attr::VALIDATE))
            .collect();

        let manual = lock(&self.shared.manual).clone();
        let stale: Vec<Field> = lock(&self.shared.fields)
            .iter()
            .filter(|f| {
                let listed = manual.contains(&f.id())
                    || eligible.iter().any(|c| c.ptr_eq(f.control()));
                !listed || !kind_fits(f)
            })
            .cloned()
            .collect();
        for field in &stale {
            self.detach_field(field);
        }

        let diagnostics = self.shared.context.diagnostics();
        let mut created = 0usize;
        let mut failed = Vec::new();
        for control in eligible {
            if self.is_backed(&control) {
                continue;
            }
            match self.create_field(control) {
                Ok(field) => {
                    self.insert_field(field);
                    created += 1;
                }
                Err(err) => {
                    failed.push(err.clone());
                    diagnostics.report(err.into());
                }
            }
        }
        diagnostics.forget(|e| match e {
            ConfigError::Construction(err) => !failed.contains(err),
            _ => false,
        });

        self.set_fields_relations();
        tracing::debug!(
            created,
            removed = stale.len(),
            total = lock(&self.shared.fields).len(),
            "reconciled form fields"
        );
    }

    /// Number of live subscriptions held for match edges and declarations.
    pub fn subscription_count(&self) -> usize {
        lock(&self.shared.edges).len() + lock(&self.shared.declarations).len()
    }

    fn is_backed(&self, control: &Control) -> bool {
        let name = control.name();
        lock(&self.shared.fields).iter().any(|f| {
            f.control().ptr_eq(control) || (!name.is_empty() && f.name() == name)
        })
    }

    fn watch_controls(&self, controls: &[Control]) {
        let mut watches = lock(&self.shared.controls);
        let gone: Vec<ControlId> = watches
            .keys()
            .filter(|id| !controls.iter().any(|c| c.id() == **id))
            .copied()
            .collect();
        let released: Vec<Subscription> =
            gone.iter().filter_map(|id| watches.remove(id)).collect();

        for control in controls {
            if watches.contains_key(&control.id()) {
                continue;
            }
            let registry = Arc::downgrade(&self.shared);
            let subscription = control.subscribe(move |change| {
                let reshaped = match change {
                    Change::TypeTag => true,
                    Change::Attribute(name) => name == attr::VALIDATE,
                    _ => false,
                };
                if !reshaped {
                    return;
                }
                if let Some(shared) = registry.upgrade() {
                    tracing::debug!(?change, "control eligibility changed");
                    FormValidator { shared }.reconcile();
                }
            });
            watches.insert(control.id(), subscription);
        }
        drop(watches);
        drop(released);
    }

    fn insert_field(&self, field: Field) {
        {
            let mut fields = lock(&self.shared.fields);
            if fields.iter().any(|f| f.ptr_eq(&field)) {
                return;
            }
            fields.push(field.clone());
        }
        if self.shared.watching.load(Ordering::SeqCst) {
            field.validate_on_change();
        }
    }

    fn detach_field(&self, field: &Field) -> bool {
        let removed = {
            let mut fields = lock(&self.shared.fields);
            let before = fields.len();
            fields.retain(|f| !f.ptr_eq(field));
            fields.len() != before
        };
        if !removed {
            return false;
        }

        lock(&self.shared.manual).remove(&field.id());
        field.stop_validating_on_change();
        field.cancel_running();
        self.tear_down_edge(field);
        let declaration = lock(&self.shared.declarations).remove(&field.id());
        drop(declaration);
        self.shared
            .context
            .diagnostics()
            .forget_field(&field.name());

        for dependent in field.match_of() {
            self.tear_down_edge(&dependent);
        }

        tracing::debug!(field = %field.name(), "removed field");
        true
    }

    fn set_fields_relations(&self) {
        for field in self.fields() {
            self.set_field_relations(&field);
        }
    }

    fn set_field_relations(&self, field: &Field) {
        self.tear_down_edge(field);
        self.watch_declaration(field);

        let problem = self.link_declared_target(field);
        let diagnostics = self.shared.context.diagnostics();
        let name = field.name();
        diagnostics.forget(|e| {
            e.is_relation() && e.field() == name && Some(e) != problem.as_ref()
        });
        if let Some(problem) = problem {
            diagnostics.report(problem);
        }
    }

    fn link_declared_target(&self, field: &Field) -> Option<ConfigError> {
        let declared = field.control().attribute(attr::MATCH)?;

        let Some(target) = self.field(&declared) else {
            return Some(ConfigError::DanglingMatch {
                field: field.name(),
                target: declared,
            });
        };

        if self.would_cycle(field, &target) {
            return Some(ConfigError::MatchCycle {
                field: field.name(),
                target: declared,
            });
        }

        field.set_match_to(Some(&target));
        target.add_match_of(field);

        let dependent = field.control().clone();
        let followed = target.downgrade();
        let rename = target.control().watch_name(move || {
            if let Some(target) = followed.upgrade() {
                dependent.set_attribute(attr::MATCH, target.name());
            }
        });

        lock(&self.shared.edges).insert(
            field.id(),
            Edge {
                target: target.downgrade(),
                _rename: rename,
            },
        );
        tracing::trace!(field = %field.name(), target = %declared, "linked match relation");
        None
    }

    fn tear_down_edge(&self, dependent: &Field) {
        let edge = lock(&self.shared.edges).remove(&dependent.id());
        if let Some(target) = edge.as_ref().and_then(|e| e.target.upgrade()) {
            target.remove_match_of(dependent);
        }
        if let Some(target) = dependent.match_to() {
            target.remove_match_of(dependent);
        }
        dependent.set_match_to(None);
        drop(edge);
    }

    fn watch_declaration(&self, field: &Field) {
        let mut declarations = lock(&self.shared.declarations);
        if declarations.contains_key(&field.id()) {
            return;
        }

        let registry = Arc::downgrade(&self.shared);
        let watched = field.downgrade();
        let subscription = field.control().watch_attribute(attr::MATCH, move || {
            let (Some(shared), Some(field)) = (registry.upgrade(), watched.upgrade()) else {
                return;
            };
            FormValidator { shared }.on_declaration_changed(&field);
        });
        declarations.insert(field.id(), subscription);
    }

    fn on_declaration_changed(&self, field: &Field) {
        if !lock(&self.shared.fields).iter().any(|f| f.ptr_eq(field)) {
            return;
        }
        let declared = field.control().attribute(attr::MATCH);
        let current = field.match_to().map(|target| target.name());
        if declared.is_some() && declared == current {
            return;
        }
        tracing::debug!(field = %field.name(), ?declared, "match declaration changed");
        self.set_field_relations(field);
    }

    fn would_cycle(&self, field: &Field, target: &Field) -> bool {
        let limit = lock(&self.shared.fields).len() + 1;
        let mut cursor = Some(target.clone());
        for _ in 0..limit {
            match cursor {
                Some(node) if node.ptr_eq(field) => return true,
                Some(node) => cursor = node.match_to(),
                None => return false,
            }
        }
        true
    }
}

fn kind_fits(field: &Field) -> bool {
    let control = field.control();
    FieldKind::from_type_tag(&control.name(), &control.type_tag())
        .is_ok_and(|kind| kind == field.kind())
}

impl fmt::Debug for FormValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormValidator")
            .field("fields", &*lock(&self.shared.fields))
            .field("watching", &self.shared.watching.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
