//! Input checks shared by the services.

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;
const MAX_NAME_LEN: usize = 100;
const MAX_TEXT_LEN: usize = 20_000;

/// Parse and lowercase an email, requiring the institution's domain suffix.
pub fn normalize_email(email: &str, required_suffix: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| AppError::InvalidEmail("Email address is malformed".to_string()))?;

    let well_formed = !local.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
        && domain.contains('.')
        && email.len() <= 254
        && !email.chars().any(char::is_whitespace);
    if !well_formed {
        return Err(AppError::InvalidEmail("Email address is malformed".to_string()));
    }

    // "x@edu.tr" would satisfy a naive suffix check but is not an institution host.
    if !domain.ends_with(required_suffix) || domain.len() <= required_suffix.len() {
        return Err(AppError::InvalidEmail(format!(
            "Email must belong to a {} domain",
            required_suffix
        )));
    }

    Ok(email)
}

/// At least eight characters with at least one letter and one digit.
pub fn check_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidPassword(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(AppError::InvalidPassword(format!(
            "Password must be at most {} characters",
            MAX_PASSWORD_LEN
        )));
    }
    if !password.chars().any(char::is_alphabetic) || !password.chars().any(|c| c.is_ascii_digit())
    {
        return Err(AppError::InvalidPassword(
            "Password must contain at least one letter and one digit".to_string(),
        ));
    }
    Ok(())
}

/// Exactly eight ASCII digits.
pub fn check_student_id(student_id: &str) -> Result<(), AppError> {
    if student_id.len() == 8 && student_id.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::InvalidStudentId(
            "Student ID must be exactly 8 digits".to_string(),
        ))
    }
}

/// Trimmed, non-empty, at most 100 characters.
pub fn required_name(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(field, format!("{} is required", field)));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(
            field,
            format!("{} must be at most {} characters", field, MAX_NAME_LEN),
        ));
    }
    Ok(value.to_string())
}

pub fn optional_name(field: &str, value: Option<&str>) -> Result<Option<String>, AppError> {
    value.map(|v| required_name(field, v)).transpose()
}

/// Free text bodies: trimmed length bounded, may be empty.
pub fn bounded_text(field: &str, value: &str) -> Result<String, AppError> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::validation(
            field,
            format!("{} must be at most {} characters", field, MAX_TEXT_LEN),
        ));
    }
    Ok(value.trim().to_string())
}

/// Course codes are stored upper-case without inner whitespace, e.g. `CENG101`.
pub fn course_code(value: &str) -> Result<String, AppError> {
    let code: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if code.is_empty() || code.len() > 20 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::validation(
            "courseCode",
            "Course code must be 1-20 letters or digits",
        ));
    }
    Ok(code)
}

pub fn exam_year(year: i32) -> Result<i32, AppError> {
    if (1950..=2100).contains(&year) {
        Ok(year)
    } else {
        Err(AppError::validation("year", "Year is out of range"))
    }
}
