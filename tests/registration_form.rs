//! End-to-end scenarios on a registration form.

use std::time::Duration;

use formcheck::prelude::*;
use formcheck::{assert_field_errors, assert_valid};

fn registration_form() -> (Form, Control, Control) {
    let form = Form::new();
    let password = Control::new("password", "password")
        .with_attribute(attr::VALIDATE, "")
        .with_attribute(attr::REQUIRED, "")
        .with_attribute(attr::DISPLAY_NAME, "Password")
        .with_attribute(attr::MIN_LENGTH, "8");
    let confirm = Control::new("password", "confirm")
        .with_attribute(attr::VALIDATE, "")
        .with_attribute(attr::DISPLAY_NAME, "Confirmation")
        .with_attribute(attr::MATCH, "password");
    form.add(
        Control::new("email", "email")
            .with_attribute(attr::VALIDATE, "")
            .with_attribute(attr::REQUIRED, "")
            .with_attribute(attr::DISPLAY_NAME, "Email")
            .with_attribute(attr::PATTERN_PRESET, "email")
            .with_value("ada@example.com"),
    );
    form.add(password.clone());
    form.add(confirm.clone());
    (form, password, confirm)
}

#[tokio::test]
async fn password_and_confirmation() {
    let (form, password, confirm) = registration_form();
    let validator = FormValidator::new(form);

    password.set_value("correct horse");
    confirm.set_value("correct horse");
    assert!(validator.check_validity().await);
    assert!(validator.valid());

    confirm.set_value("correct hose");
    assert!(!validator.check_validity().await);
    let confirm_field = validator.field("confirm").unwrap();
    assert_eq!(
        confirm_field.errors(),
        vec!["Confirmation does not match Password".to_string()]
    );
}

#[tokio::test]
async fn empty_confirmation() {
    let (form, password, confirm) = registration_form();
    let validator = FormValidator::new(form);
    let confirm_field = validator.field("confirm").unwrap();
    password.set_value("secret12");

    assert_field_errors!(confirm_field, ["Confirmation does not match Password"]);

    // Required runs first and stops the run before the match check.
    confirm.set_attribute(attr::REQUIRED, "");
    assert_field_errors!(confirm_field, ["Confirmation is required"]);

    confirm.set_value("secret12");
    assert_valid!(confirm_field);
}

#[tokio::test]
async fn short_password_stops_before_later_checks() {
    let (form, password, _confirm) = registration_form();
    let validator = FormValidator::new(form);
    let field = validator.field("password").unwrap();

    password.set_value("short");
    assert_field_errors!(field, ["Password must have at least 8 characters"]);

    password.set_value("");
    assert_field_errors!(field, ["Password is required"]);
}

#[tokio::test(start_paused = true)]
async fn watched_form_tracks_edits() {
    let (form, password, confirm) = registration_form();
    let validator = FormValidator::new(form);
    validator.watch_all_fields();

    password.set_value("correct horse");
    confirm.set_value("correct horse");
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(validator.valid());

    // Editing only the target re-checks the dependent through the cascade.
    password.set_value("battery staple");
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(validator.field("password").unwrap().last_validity());
    assert!(!validator.field("confirm").unwrap().last_validity());
    assert!(!validator.valid());

    validator.ignore_all_fields();
    confirm.set_value("battery staple");
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!validator.field("confirm").unwrap().last_validity());

    assert!(validator.check_validity().await);
}

#[tokio::test(start_paused = true)]
async fn fields_added_while_watching_are_watched() {
    let (form, _password, _confirm) = registration_form();
    let validator = FormValidator::new(form.clone());
    validator.watch_all_fields();

    let nickname = Control::new("text", "nickname")
        .with_attribute(attr::VALIDATE, "")
        .with_attribute(attr::REQUIRED, "");
    form.add(nickname.clone());

    let field = validator.field("nickname").unwrap();
    assert!(field.is_watching());

    nickname.set_value("ada");
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(field.last_validity());
}

#[tokio::test(start_paused = true)]
async fn async_uniqueness_check_runs_last() {
    let form = Form::new();
    let username = Control::new("text", "username")
        .with_attribute(attr::VALIDATE, "")
        .with_attribute(attr::REQUIRED, "")
        .with_attribute(attr::DISPLAY_NAME, "Username");
    form.add(username.clone());

    let validator = FormValidator::new(form);
    let field = validator.field("username").unwrap();
    field.add_invalidator(
        |value: String, invalidate: Invalidate| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if value == "admin" {
                invalidate.invalidate("This username is in use");
            }
        },
        InvalidatorOptions::new()
            .with_name("unique")
            .with_phase(Phase::AfterOthers)
            .with_debounce(Duration::from_millis(200)),
    );

    assert_field_errors!(field, ["Username is required"]);

    username.set_value("admin");
    assert_field_errors!(field, ["This username is in use"]);

    username.set_value("grace");
    assert_valid!(field);
}
