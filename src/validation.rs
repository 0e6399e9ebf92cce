//! Form validation policy
//!
//! Shared by the server (registration and login handlers) and the client
//! adapter, which runs it before any request leaves the process. Every rule
//! reports against a single camelCase field name.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum password length accepted on login
pub const LOGIN_PASSWORD_MIN: usize = 6;

/// Minimum password length accepted on registration
pub const REGISTER_PASSWORD_MIN: usize = 8;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// Field name to message, one message per field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error; the first message for a field wins
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when empty, otherwise the errors
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// First message, for single-line display
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().next().map(String::as_str)
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined: Vec<String> = self.0.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        f.write_str(&joined.join("; "))
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Checked the way the server normalizes it: surrounding whitespace ignored
fn check_email(errors: &mut FieldErrors, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !is_valid_email(email) {
        errors.add("email", "Please enter a valid email address");
    }
}

/// Login form rules
pub fn validate_login(email: &str, password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, email);

    if password.is_empty() {
        errors.add("password", "Password is required");
    } else if password.chars().count() < LOGIN_PASSWORD_MIN {
        errors.add(
            "password",
            format!("Password must be at least {} characters", LOGIN_PASSWORD_MIN),
        );
    }
    errors
}

/// Registration form rules
pub fn validate_registration(
    email: &str,
    password: &str,
    confirm_password: &str,
    full_name: &str,
) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, email);

    if password.chars().count() < REGISTER_PASSWORD_MIN {
        errors.add(
            "password",
            format!("Password must be at least {} characters", REGISTER_PASSWORD_MIN),
        );
    } else if !password.chars().any(|c| c.is_uppercase())
        || !password.chars().any(|c| c.is_lowercase())
        || !password.chars().any(|c| c.is_ascii_digit())
    {
        errors.add(
            "password",
            "Password must contain an uppercase letter, a lowercase letter and a number",
        );
    }

    if confirm_password != password {
        errors.add("confirmPassword", "Passwords do not match");
    }

    if full_name.trim().is_empty() {
        errors.add("fullName", "Full name is required");
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("@c.de"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_password_complexity() {
        let lower_only = validate_registration("a@b.co", "abc12345", "abc12345", "Ann");
        assert_eq!(lower_only.len(), 1);
        assert!(lower_only.contains("password"));

        let ok = validate_registration("a@b.co", "Abc12345", "Abc12345", "Ann");
        assert!(ok.is_empty());

        let short = validate_registration("a@b.co", "Ab1", "Ab1", "Ann");
        assert!(short.get("password").unwrap().contains("at least 8"));
    }

    #[test]
    fn test_blank_name_and_mismatch() {
        let errors = validate_registration("a@b.co", "Abc12345", "Abc12346", "   ");
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(fields, vec!["confirmPassword", "fullName"]);
    }

    #[test]
    fn test_login_rules() {
        assert!(validate_login("a@b.co", "123456").is_empty());
        assert!(validate_login("a@b.co", "12345").contains("password"));
        assert!(validate_login("nope", "123456").contains("email"));
        assert_eq!(validate_login("", "").len(), 2);
    }

    #[test]
    fn test_email_surrounding_whitespace_is_ignored() {
        assert!(validate_login(" Ada@Example.com ", "123456").is_empty());
        assert!(validate_registration("a@b.co\n", "Abc12345", "Abc12345", "Ann").is_empty());
        assert!(validate_login("   ", "123456").get("email").unwrap().contains("required"));
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let errors = validate_login("bad", "123456");
        let json = serde_json::to_value(&errors).unwrap();
        assert!(json["email"].is_string());
        assert!(errors.clone().into_result().is_err());
        assert!(FieldErrors::new().into_result().is_ok());
    }

    fn valid_email() -> impl Strategy<Value = String> {
        ("[a-z0-9]{1,12}", "[a-z]{1,10}", "[a-z]{2,5}")
            .prop_map(|(local, domain, tld)| format!("{}@{}.{}", local, domain, tld))
    }

    fn valid_password() -> impl Strategy<Value = String> {
        ("[A-Z]{1,3}", "[a-z]{1,5}", "[0-9]{1,3}", "[a-zA-Z0-9]{5,10}")
            .prop_map(|(u, l, d, rest)| format!("{}{}{}{}", u, l, d, rest))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn valid_pairs_produce_no_errors(email in valid_email(), password in valid_password()) {
            prop_assert!(validate_login(&email, &password).is_empty());
            prop_assert!(validate_registration(&email, &password, &password, "Jo").is_empty());
        }

        #[test]
        fn one_broken_rule_reports_one_field(
            email in valid_email(),
            password in valid_password(),
            which in 0usize..4,
        ) {
            let (e, p, c, n, field) = match which {
                0 => (format!("{}@", email), password.clone(), password.clone(), "Jo", "email"),
                1 => (email.clone(), password.to_lowercase(), password.to_lowercase(), "Jo", "password"),
                2 => (email.clone(), password.clone(), format!("{}x", password), "Jo", "confirmPassword"),
                _ => (email.clone(), password.clone(), password.clone(), " ", "fullName"),
            };
            let errors = validate_registration(&e, &p, &c, n);
            prop_assert_eq!(errors.len(), 1);
            prop_assert!(errors.contains(field));
        }

        #[test]
        fn mismatch_always_flags_confirmation(password in ".{0,20}", other in ".{0,20}") {
            prop_assume!(password != other);
            let errors = validate_registration("a@b.co", &password, &other, "Jo");
            prop_assert!(errors.contains("confirmPassword"));
        }
    }
}
