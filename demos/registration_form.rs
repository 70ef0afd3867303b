//! A registration form with a debounced remote uniqueness check
//!
//! Run with: cargo run --example registration_form

use std::time::Duration;

use formcheck::prelude::*;

const TAKEN: [&str; 3] = ["admin", "root", "ada"];

async fn username_is_taken(username: &str) -> bool {
    // Stand-in for a round trip to the server.
    tokio::time::sleep(Duration::from_millis(150)).await;
    TAKEN.contains(&username)
}

fn build_form() -> (Form, Control, Control, Control, Control) {
    let form = Form::new();

    let username = Control::new("text", "username")
        .with_attribute(attr::VALIDATE, "")
        .with_attribute(attr::REQUIRED, "")
        .with_attribute(attr::DISPLAY_NAME, "Username")
        .with_attribute(attr::MIN_LENGTH, "3")
        .with_attribute(attr::MAX_LENGTH, "20");
    let email = Control::new("email", "email")
        .with_attribute(attr::VALIDATE, "")
        .with_attribute(attr::REQUIRED, "")
        .with_attribute(attr::DISPLAY_NAME, "Email")
        .with_attribute(attr::PATTERN_PRESET, "email");
    let password = Control::new("password", "password")
        .with_attribute(attr::VALIDATE, "")
        .with_attribute(attr::REQUIRED, "")
        .with_attribute(attr::DISPLAY_NAME, "Password")
        .with_attribute(attr::MIN_LENGTH, "8");
    let confirm = Control::new("password", "confirm-password")
        .with_attribute(attr::VALIDATE, "")
        .with_attribute(attr::DISPLAY_NAME, "Confirmation")
        .with_attribute(attr::MATCH, "password");

    for control in [&username, &email, &password, &confirm] {
        form.add(control.clone());
    }
    (form, username, email, password, confirm)
}

/// Give background re-checks of dependent fields a moment to finish.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

fn print_errors(validator: &FormValidator) {
    for field in validator.fields() {
        let errors = field.errors();
        if errors.is_empty() {
            println!("  ✓ {}", field.name());
        } else {
            for error in errors {
                println!("  ✗ {}: {}", field.name(), error);
            }
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let (form, username, email, password, confirm) = build_form();
    let validator = FormValidator::new(form);

    if let Some(field) = validator.field("username") {
        field.add_invalidator(
            |value: String, invalidate: Invalidate| async move {
                if username_is_taken(&value).await {
                    invalidate.invalidate("This username is in use");
                }
            },
            InvalidatorOptions::new()
                .with_name("unique-username")
                .with_phase(Phase::AfterOthers)
                .with_debounce(Duration::from_millis(300)),
        );
    }

    println!("=== Empty form ===");
    validator.check_validity().await;
    settle().await;
    print_errors(&validator);

    println!("\n=== Taken username, short password, mismatched confirmation ===");
    username.set_value("admin");
    email.set_value("ada@example");
    password.set_value("hunter2");
    confirm.set_value("hunter3");
    validator.check_validity().await;
    settle().await;
    print_errors(&validator);

    println!("\n=== Typing into a watched form ===");
    validator.watch_all_fields();
    for partial in ["g", "gr", "gra", "grac", "grace"] {
        username.set_value(partial);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    email.set_value("grace@example.com");
    password.set_value("correct horse");
    confirm.set_value("correct horse");
    // Only the last keystroke outlives the debounce.
    tokio::time::sleep(Duration::from_millis(600)).await;
    print_errors(&validator);
    println!("form valid: {}", validator.valid());

    validator.ignore_all_fields();

    for diagnostic in validator.diagnostics() {
        println!("{diagnostic}");
    }
}

/* Expected output (log lines omitted):

=== Empty form ===
  ✗ username: Username is required
  ✗ email: Email is required
  ✗ password: Password is required
  ✗ confirm-password: Confirmation does not match Password

=== Taken username, short password, mismatched confirmation ===
  ✗ username: This username is in use
  ✗ email: Email is not a valid email address
  ✗ password: Password must have at least 8 characters
  ✗ confirm-password: Confirmation does not match Password

=== Typing into a watched form ===
  ✓ username
  ✓ email
  ✓ password
  ✓ confirm-password
form valid: true

*/
