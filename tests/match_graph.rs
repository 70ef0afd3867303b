//! Maintenance of the match graph as the form changes underneath the registry.

use formcheck::prelude::*;
use formcheck::Diagnostic;
use tracing_test::traced_test;

fn validated(type_tag: &str, name: &str) -> Control {
    Control::new(type_tag, name).with_attribute(attr::VALIDATE, "")
}

fn pair() -> (Form, Control, Control) {
    let form = Form::new();
    let password = validated("password", "password").with_value("secret12");
    let confirm = validated("password", "confirm")
        .with_attribute(attr::MATCH, "password")
        .with_value("secret12");
    form.add(password.clone());
    form.add(confirm.clone());
    (form, password, confirm)
}

fn dangling(diagnostics: &[Diagnostic]) -> Vec<(String, String)> {
    diagnostics
        .iter()
        .filter_map(|d| match &d.error {
            ConfigError::DanglingMatch { field, target } => Some((field.clone(), target.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn invariant_holds_after_construction() {
    let (form, _, _) = pair();
    let validator = FormValidator::new(form);

    for field in validator.fields() {
        if let Some(target) = field.match_to() {
            assert!(target.match_of().contains(&field));
        }
        for dependent in field.match_of() {
            assert_eq!(dependent.match_to(), Some(field.clone()));
        }
    }
}

#[tokio::test]
async fn renaming_the_target_rewrites_the_declaration() {
    let (form, password, confirm) = pair();
    let validator = FormValidator::new(form);
    let target = validator.field("password").unwrap();
    let dependent = validator.field("confirm").unwrap();

    password.set_name("new-password");

    assert_eq!(confirm.attribute(attr::MATCH).as_deref(), Some("new-password"));
    assert_eq!(dependent.match_to(), Some(target.clone()));
    assert_eq!(validator.field("new-password"), Some(target));
    assert!(validator.check_validity().await);
    assert!(dangling(&validator.diagnostics()).is_empty());
}

#[test]
#[traced_test]
fn removing_the_target_leaves_a_dangling_declaration() {
    let (form, password, _confirm) = pair();
    let validator = FormValidator::new(form.clone());
    let dependent = validator.field("confirm").unwrap();

    form.remove(&password);

    assert!(validator.field("password").is_none());
    assert!(dependent.match_to().is_none());
    assert_eq!(
        dangling(&validator.diagnostics()),
        vec![("confirm".to_string(), "password".to_string())]
    );
    assert!(logs_contain("failed to find field 'password' to match with 'confirm'"));
}

#[test]
fn re_adding_the_target_restores_the_edge() {
    let (form, password, _confirm) = pair();
    let validator = FormValidator::new(form.clone());

    form.remove(&password);
    form.add(password.clone());

    let target = validator.field("password").unwrap();
    let dependent = validator.field("confirm").unwrap();
    assert_eq!(dependent.match_to(), Some(target.clone()));
    assert_eq!(target.match_of(), vec![dependent]);
}

#[test]
fn removing_the_dependent_clears_the_inverse_edge() {
    let (form, _password, confirm) = pair();
    let validator = FormValidator::new(form.clone());
    let target = validator.field("password").unwrap();

    form.remove(&confirm);

    assert!(target.match_of().is_empty());
    assert_eq!(validator.fields().len(), 1);
}

#[test]
fn declaration_pointing_at_a_later_control_resolves() {
    let form = Form::new();
    form.add(validated("email", "confirm-email").with_attribute(attr::MATCH, "email"));
    let validator = FormValidator::new(form.clone());
    assert_eq!(dangling(&validator.diagnostics()).len(), 1);

    form.add(validated("email", "email"));
    let dependent = validator.field("confirm-email").unwrap();
    assert_eq!(dependent.match_to().map(|t| t.name()), Some("email".to_string()));
}

#[test]
fn subscriptions_stay_at_one_per_endpoint() {
    let (form, password, confirm) = pair();
    let validator = FormValidator::new(form.clone());
    let target_subscriptions = password.subscriber_count();
    let dependent_subscriptions = confirm.subscriber_count();

    for round in 0..10 {
        password.set_name(format!("password-{round}"));
        form.add(validated("text", &format!("extra-{round}")));
    }
    password.set_name("password");

    assert_eq!(password.subscriber_count(), target_subscriptions);
    assert_eq!(confirm.subscriber_count(), dependent_subscriptions);
    assert_eq!(confirm.attribute(attr::MATCH).as_deref(), Some("password"));
    assert_eq!(validator.fields().len(), 12);
}

#[test]
fn cycles_are_reported_as_errors() {
    let form = Form::new();
    form.add(validated("text", "a").with_attribute(attr::MATCH, "b"));
    form.add(validated("text", "b").with_attribute(attr::MATCH, "a"));

    let validator = FormValidator::new(form);
    let cycles: Vec<_> = validator
        .diagnostics()
        .into_iter()
        .filter(|d| matches!(d.error, ConfigError::MatchCycle { .. }))
        .collect();

    assert!(!cycles.is_empty());
    assert!(cycles.iter().all(|d| d.severity == Severity::Error));
}

#[test]
fn unknown_kind_does_not_stop_the_rest() {
    let form = Form::new();
    form.add(validated("file", "avatar"));
    form.add(validated("text", "name"));

    let validator = FormValidator::new(form);
    assert!(validator.field("name").is_some());
    assert!(validator.field("avatar").is_none());
    assert!(validator
        .diagnostics_handle()
        .any(|e| matches!(e, ConfigError::Construction(FieldError::UnknownKind { .. }))));
}
