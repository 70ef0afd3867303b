//! In-memory model of form controls and the form that holds them.
//!
//! The validation engine never owns user input. It reads a control's value,
//! name, type tag and attributes, and it subscribes to change notifications.
//! [`Control`] and [`Form`] provide exactly that surface; an embedding
//! application mirrors its real widgets into them.
//!
//! Attribute names understood by the engine live in [`attr`].
//!
//! # Example
//!
//! ```rust
//! use formcheck::control::{attr, Control, Form};
//!
//! let form = Form::new();
//! let email = Control::new("email", "email")
//!     .with_attribute(attr::VALIDATE, "")
//!     .with_attribute(attr::REQUIRED, "");
//! form.add(email.clone());
//!
//! email.set_value("someone@example.com");
//! assert_eq!(form.control_named("email").unwrap().value(), "someone@example.com");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::observe::{Observers, Subscription};

/// Attribute names read by the engine.
pub mod attr {
    /// Marks a control as taking part in validation. Truthy values: `""`, `"true"`, `"1"`.
    pub const VALIDATE: &str = "validate";
    /// The value may not be empty.
    pub const REQUIRED: &str = "required";
    /// Human-readable name used in error messages.
    pub const DISPLAY_NAME: &str = "display-name";
    /// Name of the field whose value this one must equal.
    pub const MATCH: &str = "match";
    /// Minimum number of characters.
    pub const MIN_LENGTH: &str = "min-length";
    /// Maximum number of characters.
    pub const MAX_LENGTH: &str = "max-length";
    /// Minimum numeric or temporal value.
    pub const MIN: &str = "min";
    /// Maximum numeric or temporal value.
    pub const MAX: &str = "max";
    /// Regular expression the value must match.
    pub const PATTERN: &str = "pattern";
    /// Name of a configured pattern preset. Takes priority over [`PATTERN`].
    pub const PATTERN_PRESET: &str = "pattern-preset";
    /// What the pattern describes, e.g. "postcode".
    pub const PATTERN_LABEL: &str = "pattern-label";

    /// Attributes whose change should trigger a re-check of a watched field.
    pub const CONFIGURATION: [&str; 9] = [
        REQUIRED,
        MIN_LENGTH,
        MAX_LENGTH,
        MIN,
        MAX,
        PATTERN,
        PATTERN_PRESET,
        PATTERN_LABEL,
        MATCH,
    ];
}

/// Whether an attribute value counts as "on".
pub fn is_truthy(value: Option<&str>) -> bool {
    matches!(value, Some("" | "true" | "1"))
}

/// A change to a single control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// The value was edited.
    Value,
    /// The checked state was toggled.
    Checked,
    /// The control was enabled or disabled.
    Disabled,
    /// The control was renamed.
    Name,
    /// The control's type tag changed.
    TypeTag,
    /// An attribute was set or removed.
    Attribute(String),
}

/// Stable identity of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ControlId(u64);

static NEXT_CONTROL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct ControlState {
    type_tag: String,
    name: String,
    value: String,
    checked: bool,
    disabled: bool,
    attributes: BTreeMap<String, String>,
}

struct ControlShared {
    id: ControlId,
    state: RwLock<ControlState>,
    observers: Observers<Change>,
}

/// A single form control. Cloning yields another handle to the same control.
#[derive(Clone)]
pub struct Control {
    shared: Arc<ControlShared>,
}

impl Control {
    /// Create a control with a type tag (`"text"`, `"number"`, `"radio"`, ...) and a name.
    pub fn new(type_tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(ControlShared {
                id: ControlId(NEXT_CONTROL_ID.fetch_add(1, Ordering::Relaxed)),
                state: RwLock::new(ControlState {
                    type_tag: type_tag.into(),
                    name: name.into(),
                    value: String::new(),
                    checked: false,
                    disabled: false,
                    attributes: BTreeMap::new(),
                }),
                observers: Observers::new(),
            }),
        }
    }

    /// Builder: initial value.
    pub fn with_value(self, value: impl Into<String>) -> Self {
        self.write().value = value.into();
        self
    }

    /// Builder: initial attribute.
    pub fn with_attribute(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.write().attributes.insert(name.into(), value.into());
        self
    }

    /// Builder: initially checked.
    pub fn with_checked(self, checked: bool) -> Self {
        self.write().checked = checked;
        self
    }

    /// Stable identity.
    pub fn id(&self) -> ControlId {
        self.shared.id
    }

    /// The declared type tag.
    pub fn type_tag(&self) -> String {
        self.read().type_tag.clone()
    }

    /// Current name.
    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    /// Current value.
    pub fn value(&self) -> String {
        self.read().value.clone()
    }

    /// Whether the control is checked (radio buttons and checkboxes).
    pub fn is_checked(&self) -> bool {
        self.read().checked
    }

    /// Whether the control is disabled.
    pub fn is_disabled(&self) -> bool {
        self.read().disabled
    }

    /// Current value of an attribute.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.read().attributes.get(name).cloned()
    }

    /// Whether an attribute is present at all.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.read().attributes.contains_key(name)
    }

    /// Whether an attribute is present and truthy.
    pub fn attribute_is_truthy(&self, name: &str) -> bool {
        is_truthy(self.read().attributes.get(name).map(String::as_str))
    }

    /// Replace the value and notify [`Change::Value`] if it changed.
    pub fn set_value(&self, value: impl Into<String>) {
        let value = value.into();
        let changed = {
            let mut state = self.write();
            std::mem::replace(&mut state.value, value.clone()) != value
        };
        if changed {
            self.shared.observers.notify(&Change::Value);
        }
    }

    /// Rename the control and notify [`Change::Name`] if it changed.
    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        let changed = {
            let mut state = self.write();
            std::mem::replace(&mut state.name, name.clone()) != name
        };
        if changed {
            self.shared.observers.notify(&Change::Name);
        }
    }

    /// Change the type tag and notify [`Change::TypeTag`] if it changed.
    pub fn set_type_tag(&self, type_tag: impl Into<String>) {
        let type_tag = type_tag.into();
        let changed = {
            let mut state = self.write();
            std::mem::replace(&mut state.type_tag, type_tag.clone()) != type_tag
        };
        if changed {
            self.shared.observers.notify(&Change::TypeTag);
        }
    }

    /// Set the checked state and notify [`Change::Checked`] if it changed.
    pub fn set_checked(&self, checked: bool) {
        let changed = std::mem::replace(&mut self.write().checked, checked) != checked;
        if changed {
            self.shared.observers.notify(&Change::Checked);
        }
    }

    /// Enable or disable the control and notify [`Change::Disabled`] if it changed.
    pub fn set_disabled(&self, disabled: bool) {
        let changed = std::mem::replace(&mut self.write().disabled, disabled) != disabled;
        if changed {
            self.shared.observers.notify(&Change::Disabled);
        }
    }

    /// Set an attribute and notify [`Change::Attribute`] if it changed.
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let changed = {
            let mut state = self.write();
            state.attributes.insert(name.clone(), value.clone()).as_ref() != Some(&value)
        };
        if changed {
            self.shared.observers.notify(&Change::Attribute(name));
        }
    }

    /// Remove an attribute and notify [`Change::Attribute`] if it was present.
    pub fn remove_attribute(&self, name: &str) {
        let removed = self.write().attributes.remove(name).is_some();
        if removed {
            self.shared
                .observers
                .notify(&Change::Attribute(name.to_string()));
        }
    }

    /// Subscribe to every change of this control.
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.shared.observers.subscribe(callback)
    }

    /// Subscribe to changes of a single attribute.
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn watch_attribute<F>(&self, name: &str, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let name = name.to_string();
        self.subscribe(move |change| {
            if matches!(change, Change::Attribute(changed) if *changed == name) {
                callback();
            }
        })
    }

    /// Subscribe to renames.
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn watch_name<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(move |change| {
            if *change == Change::Name {
                callback();
            }
        })
    }

    /// Number of live subscriptions on this control.
    pub fn subscriber_count(&self) -> usize {
        self.shared.observers.len()
    }

    /// Whether two handles refer to the same control.
    pub fn ptr_eq(&self, other: &Control) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn read(&self) -> RwLockReadGuard<'_, ControlState> {
        self.shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ControlState> {
        self.shared
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Control")
            .field("id", &self.shared.id)
            .field("type_tag", &state.type_tag)
            .field("name", &state.name)
            .field("value", &state.value)
            .finish_non_exhaustive()
    }
}

/// A structural change to a [`Form`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    /// A control was added.
    Added(ControlId),
    /// A control was removed.
    Removed(ControlId),
}

struct FormShared {
    controls: RwLock<Vec<Control>>,
    observers: Observers<FormEvent>,
}

/// An ordered collection of controls. Cloning yields another handle to the same form.
#[derive(Clone)]
pub struct Form {
    shared: Arc<FormShared>,
}

impl Form {
    /// Create an empty form.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(FormShared {
                controls: RwLock::new(Vec::new()),
                observers: Observers::new(),
            }),
        }
    }

    /// Append a control and notify [`FormEvent::Added`].
    pub fn add(&self, control: Control) {
        let id = control.id();
        {
            let mut controls = self.write();
            if controls.iter().any(|c| c.id() == id) {
                return;
            }
            controls.push(control);
        }
        self.shared.observers.notify(&FormEvent::Added(id));
    }

    /// Remove a control and notify [`FormEvent::Removed`] if it was present.
    pub fn remove(&self, control: &Control) {
        let id = control.id();
        let removed = {
            let mut controls = self.write();
            let before = controls.len();
            controls.retain(|c| c.id() != id);
            controls.len() != before
        };
        if removed {
            self.shared.observers.notify(&FormEvent::Removed(id));
        }
    }

    /// Snapshot of all controls, in insertion order.
    pub fn controls(&self) -> Vec<Control> {
        self.read().clone()
    }

    /// First control carrying `name`.
    pub fn control_named(&self, name: &str) -> Option<Control> {
        self.read().iter().find(|c| c.name() == name).cloned()
    }

    /// Every control carrying `name` and `type_tag`.
    pub fn group(&self, name: &str, type_tag: &str) -> Vec<Control> {
        self.read()
            .iter()
            .filter(|c| c.type_tag() == type_tag && c.name() == name)
            .cloned()
            .collect()
    }

    /// Whether the form currently holds `control`.
    pub fn contains(&self, control: &Control) -> bool {
        self.read().iter().any(|c| c.ptr_eq(control))
    }

    /// Subscribe to structural changes.
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&FormEvent) + Send + Sync + 'static,
    {
        self.shared.observers.subscribe(callback)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Control>> {
        self.shared
            .controls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Control>> {
        self.shared
            .controls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("controls", &*self.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(control: &Control) -> (Arc<Mutex<Vec<Change>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = control.subscribe(move |c| sink.lock().unwrap().push(c.clone()));
        (seen, sub)
    }

    #[test]
    fn truthy_attribute_values() {
        assert!(is_truthy(Some("")));
        assert!(is_truthy(Some("true")));
        assert!(is_truthy(Some("1")));
        assert!(!is_truthy(Some("false")));
        assert!(!is_truthy(None));
    }

    #[test]
    fn setters_only_notify_on_change() {
        let control = Control::new("text", "username").with_value("ada");
        let (seen, _sub) = recorder(&control);

        control.set_value("ada");
        control.set_value("grace");
        control.set_attribute(attr::REQUIRED, "");
        control.set_attribute(attr::REQUIRED, "");
        control.remove_attribute(attr::PATTERN);
        control.set_name("login");
        control.set_type_tag("text");
        control.set_type_tag("email");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Change::Value,
                Change::Attribute(attr::REQUIRED.to_string()),
                Change::Name,
                Change::TypeTag,
            ]
        );
    }

    #[test]
    fn watch_attribute_filters_by_name() {
        let control = Control::new("text", "confirm");
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        let _sub = control.watch_attribute(attr::MATCH, move || *counter.lock().unwrap() += 1);

        control.set_attribute(attr::REQUIRED, "");
        control.set_attribute(attr::MATCH, "password");

        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn form_reports_structure_changes() {
        let form = Form::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = form.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        let a = Control::new("radio", "plan").with_value("basic");
        let b = Control::new("radio", "plan").with_value("pro");
        form.add(a.clone());
        form.add(b.clone());
        form.add(a.clone());
        form.remove(&a);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                FormEvent::Added(a.id()),
                FormEvent::Added(b.id()),
                FormEvent::Removed(a.id()),
            ]
        );
        assert_eq!(form.group("plan", "radio").len(), 1);
        assert!(!form.contains(&a));
    }
}
