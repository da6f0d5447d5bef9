use serde::{Deserialize, Serialize};

use super::{
    filters::PatientFilter,
    repo_types::Patient,
    validate::{
        check_range, clean_symptoms, validate_age, validate_name, NewPatient, PatientChanges,
        AGE_MAX, AGE_MIN,
    },
};
use crate::error::ValidationError;

pub const LIMIT_MAX: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub age: i64,
    #[serde(default)]
    pub symptoms: Option<Vec<String>>,
}

impl CreatePatientRequest {
    pub fn validate(self) -> Result<NewPatient, ValidationError> {
        Ok(NewPatient {
            name: validate_name(&self.name)?,
            age: validate_age(self.age)?,
            symptoms: clean_symptoms(self.symptoms.unwrap_or_default()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub symptoms: Option<Vec<String>>,
}

impl UpdatePatientRequest {
    pub fn validate(self) -> Result<PatientChanges, ValidationError> {
        Ok(PatientChanges {
            name: self.name.as_deref().map(validate_name).transpose()?,
            age: self.age.map(validate_age).transpose()?,
            symptoms: self.symptoms.map(clean_symptoms),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub name: Option<String>,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub symptom: Option<String>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

impl ListParams {
    /// Checks bounds and splits into the filter and the `(offset, limit)` page.
    pub fn validate(self) -> Result<(PatientFilter, i64, i64), ValidationError> {
        let min_age = self
            .min_age
            .map(|v| check_range("min_age", v, AGE_MIN, AGE_MAX))
            .transpose()?;
        let max_age = self
            .max_age
            .map(|v| check_range("max_age", v, AGE_MIN, AGE_MAX))
            .transpose()?;
        let offset = check_range("offset", self.offset, 0, i64::MAX)?;
        let limit = check_range("limit", self.limit, 1, LIMIT_MAX)?;

        let filter = PatientFilter {
            name: self.name,
            min_age,
            max_age,
            symptom: self.symptom,
        };
        Ok((filter, offset, limit))
    }
}

#[derive(Debug, Serialize)]
pub struct PatientPage {
    pub patients: Vec<Patient>,
    pub total_count: i64,
    pub offset: i64,
    pub limit: i64,
    pub has_more: bool,
}

impl PatientPage {
    pub fn new(patients: Vec<Patient>, total_count: i64, offset: i64, limit: i64) -> Self {
        Self {
            patients,
            total_count,
            offset,
            limit,
            has_more: offset.saturating_add(limit) < total_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_is_normalized() {
        let req = CreatePatientRequest {
            name: "  Bob ".into(),
            age: 40,
            symptoms: Some(vec![" fever".into(), " ".into(), "cough ".into()]),
        };
        let new = req.validate().unwrap();
        assert_eq!(new.name, "Bob");
        assert_eq!(new.symptoms, vec!["fever", "cough"]);
    }

    #[test]
    fn missing_symptoms_become_empty() {
        let req: CreatePatientRequest =
            serde_json::from_str(r#"{"name":"Bob","age":40,"symptoms":null}"#).unwrap();
        assert!(req.validate().unwrap().symptoms.is_empty());
    }

    #[test]
    fn update_validates_only_supplied_fields() {
        let changes = UpdatePatientRequest {
            age: Some(50),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(changes.age, Some(50));
        assert!(changes.name.is_none());

        let bad = UpdatePatientRequest {
            age: Some(150),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn list_params_bounds() {
        let params: ListParams = serde_json::from_str(r#"{}"#).unwrap();
        let (filter, offset, limit) = params.validate().unwrap();
        assert_eq!(filter, PatientFilter::default());
        assert_eq!((offset, limit), (0, 100));

        let params: ListParams = serde_json::from_str(r#"{"limit":0}"#).unwrap();
        assert!(params.validate().is_err());
        let params: ListParams = serde_json::from_str(r#"{"max_age":121}"#).unwrap();
        assert!(params.validate().is_err());
        let params: ListParams = serde_json::from_str(r#"{"offset":-1}"#).unwrap();
        assert!(params.validate().is_err());
    }

    #[test]
    fn has_more_iff_page_ends_before_total() {
        assert!(PatientPage::new(vec![], 5, 0, 2).has_more);
        assert!(!PatientPage::new(vec![], 5, 3, 2).has_more);
        assert!(!PatientPage::new(vec![], 5, 4, 2).has_more);
        assert!(!PatientPage::new(vec![], 0, 0, 100).has_more);
    }
}
