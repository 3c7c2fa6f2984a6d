use crate::types::ValidationError;
use regex::Regex;

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"(?i)\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).unwrap()
    };
}

pub fn validate_email_re(email: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(email) {
        Err(ValidationError::from(
            "email",
            format!("Invalid email: {}", email),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_username_re(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        Err(ValidationError::from("username", "can't be blank"))
    } else {
        Ok(())
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        Err(ValidationError::from("password", "can't be blank"))
    } else {
        Ok(())
    }
}

/// Pulls the token out of an `Authorization` header. Both `Bearer` and the
/// older `Token` scheme are accepted; an empty token is no token.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("Token "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_authorization_schemes_are_accepted() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Token abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Token    "), None);
    }

    #[test]
    fn emails_are_checked_against_the_pattern() {
        assert!(validate_email_re("a@test.com").is_ok());
        assert!(validate_email_re("Alice@Example.org").is_ok());
        assert!(validate_email_re("not-an-email").is_err());
    }

    #[test]
    fn blank_usernames_and_passwords_are_rejected() {
        assert!(validate_username_re("   ").is_err());
        assert!(validate_username_re("bob").is_ok());
        assert!(validate_password("").is_err());
        assert!(validate_password("pw").is_ok());
    }
}
