//! Testing utilities for code that validates forms with formcheck.
//!
//! The assertion macros run a field's check and panic with the field's name
//! and errors when the outcome is not the expected one. They must be used
//! inside an async context.
//!
//! # Examples
//!
//! ```rust
//! use formcheck::control::{attr, Control};
//! use formcheck::field::Field;
//! use formcheck::{assert_field_errors, assert_invalid, assert_valid};
//!
//! # tokio_test::block_on(async {
//! let control = Control::new("text", "nickname")
//!     .with_attribute(attr::VALIDATE, "")
//!     .with_attribute(attr::REQUIRED, "");
//! let field = Field::from_control(control.clone()).unwrap();
//!
//! assert_invalid!(field);
//! assert_field_errors!(field, ["This is required"]);
//!
//! control.set_value("ada");
//! assert_valid!(field);
//! # });
//! ```

/// Assert that checking a field yields valid.
///
/// # Example
///
/// ```rust
/// use formcheck::control::{attr, Control};
/// use formcheck::field::Field;
/// use formcheck::assert_valid;
///
/// # tokio_test::block_on(async {
/// let control = Control::new("text", "bio").with_attribute(attr::VALIDATE, "");
/// let field = Field::from_control(control).unwrap();
/// assert_valid!(field);
/// # });
/// ```
#[macro_export]
macro_rules! assert_valid {
    ($field:expr) => {{
        let field: &$crate::field::Field = &$field;
        if !field.check_validity().await {
            panic!(
                "Expected field `{}` to be valid, got errors: {:?}",
                field.name(),
                field.errors()
            );
        }
    }};
}

/// Assert that checking a field yields invalid.
///
/// # Example
///
/// ```rust
/// use formcheck::control::{attr, Control};
/// use formcheck::field::Field;
/// use formcheck::assert_invalid;
///
/// # tokio_test::block_on(async {
/// let control = Control::new("number", "age")
///     .with_attribute(attr::VALIDATE, "")
///     .with_attribute(attr::MIN, "18")
///     .with_value("12");
/// assert_invalid!(Field::from_control(control).unwrap());
/// # });
/// ```
#[macro_export]
macro_rules! assert_invalid {
    ($field:expr) => {{
        let field: &$crate::field::Field = &$field;
        if field.check_validity().await {
            panic!("Expected field `{}` to be invalid, got valid", field.name());
        }
    }};
}

/// Assert that checking a field yields exactly the given errors, in order.
///
/// # Example
///
/// ```rust
/// use formcheck::control::{attr, Control};
/// use formcheck::field::Field;
/// use formcheck::assert_field_errors;
///
/// # tokio_test::block_on(async {
/// let control = Control::new("text", "code")
///     .with_attribute(attr::VALIDATE, "")
///     .with_attribute(attr::MAX_LENGTH, "2")
///     .with_value("abc");
/// let field = Field::from_control(control).unwrap();
/// assert_field_errors!(field, ["This must have at most 2 characters"]);
/// # });
/// ```
#[macro_export]
macro_rules! assert_field_errors {
    ($field:expr, $expected:expr) => {{
        let field: &$crate::field::Field = &$field;
        let valid = field.check_validity().await;
        let errors = field.errors();
        let expected: Vec<String> = $expected.iter().map(|e| e.to_string()).collect();
        if valid && !expected.is_empty() {
            panic!(
                "Expected field `{}` to fail with {:?}, got valid",
                field.name(),
                expected
            );
        }
        assert_eq!(errors, expected, "errors of field `{}`", field.name());
    }};
}

#[cfg(test)]
mod tests {
    use crate::control::{attr, Control};
    use crate::field::Field;

    fn required(value: &str) -> Field {
        let control = Control::new("text", "name")
            .with_attribute(attr::VALIDATE, "")
            .with_attribute(attr::REQUIRED, "")
            .with_attribute(attr::DISPLAY_NAME, "Name")
            .with_value(value);
        Field::from_control(control).unwrap()
    }

    #[tokio::test]
    async fn assert_valid_macro() {
        assert_valid!(required("ada"));
    }

    #[tokio::test]
    async fn assert_invalid_macro() {
        assert_invalid!(required(""));
    }

    #[tokio::test]
    async fn assert_field_errors_macro() {
        assert_field_errors!(required(""), ["Name is required"]);
        assert_field_errors!(required("ada"), Vec::<String>::new());
    }

    #[tokio::test]
    #[should_panic(expected = "Expected field `name` to be valid")]
    async fn assert_valid_panics_on_invalid() {
        assert_valid!(required(""));
    }

    #[tokio::test]
    #[should_panic(expected = "Expected field `name` to be invalid")]
    async fn assert_invalid_panics_on_valid() {
        assert_invalid!(required("ada"));
    }

    #[tokio::test]
    #[should_panic(expected = "to fail with")]
    async fn assert_field_errors_panics_on_valid() {
        assert_field_errors!(required("ada"), ["Name is required"]);
    }
}
