//! Field rules for patient input. Everything that reaches the repository has
//! passed through here.

use crate::error::ValidationError;

pub const NAME_MAX: usize = 100;
pub const AGE_MIN: i64 = 0;
pub const AGE_MAX: i64 = 120;

/// A patient that satisfies every field rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPatient {
    pub name: String,
    pub age: i64,
    pub symptoms: Vec<String>,
}

/// Validated partial update; `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientChanges {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub symptoms: Option<Vec<String>>,
}

impl PatientChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.symptoms.is_none()
    }
}

pub fn validate_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.chars().count() > NAME_MAX {
        return Err(ValidationError::NameTooLong { max: NAME_MAX });
    }
    Ok(name.to_string())
}

pub fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<i64, ValidationError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}

pub fn validate_age(age: i64) -> Result<i64, ValidationError> {
    check_range("age", age, AGE_MIN, AGE_MAX)
}

/// Trims every entry and drops the ones left empty. Order is kept.
pub fn clean_symptoms(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
