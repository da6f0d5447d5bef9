use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::from_micros;

/// Raw `patients` row; symptoms are a JSON array in a TEXT column.
#[derive(Debug, FromRow)]
pub struct PatientRow {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub symptoms: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub symptoms: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TryFrom<PatientRow> for Patient {
    type Error = anyhow::Error;

    fn try_from(r: PatientRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            name: r.name,
            age: r.age,
            symptoms: serde_json::from_str(&r.symptoms)?,
            created_at: from_micros(r.created_at)?,
            updated_at: from_micros(r.updated_at)?,
        })
    }
}
