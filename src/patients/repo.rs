use sqlx::{Any, AnyConnection};

use super::{
    filters::{bind_filters, PatientFilter},
    repo_types::{Patient, PatientRow},
    validate::{NewPatient, PatientChanges},
};
use crate::db::{from_micros, now_micros, to_micros};

const SELECT_PATIENT: &str =
    "SELECT id, name, age, symptoms, created_at, updated_at FROM patients";
const NEWEST_FIRST: &str = " ORDER BY created_at DESC, id DESC";

fn rows_into(rows: Vec<PatientRow>) -> anyhow::Result<Vec<Patient>> {
    rows.into_iter().map(Patient::try_from).collect()
}

impl Patient {
    pub async fn create(conn: &mut AnyConnection, new: &NewPatient) -> anyhow::Result<Patient> {
        let now = now_micros();
        let row = sqlx::query_as::<_, PatientRow>(
            r#"
            INSERT INTO patients (name, age, symptoms, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, age, symptoms, created_at, updated_at
            "#,
        )
        .bind(new.name.as_str())
        .bind(new.age)
        .bind(serde_json::to_string(&new.symptoms)?)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
        Patient::try_from(row)
    }

    pub async fn find(conn: &mut AnyConnection, id: i64) -> anyhow::Result<Option<Patient>> {
        let row = sqlx::query_as::<_, PatientRow>(
            r#"
            SELECT id, name, age, symptoms, created_at, updated_at
            FROM patients
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(Patient::try_from).transpose()
    }

    /// Applies only the supplied fields. `updated_at` always moves forward,
    /// even when two writes land in the same microsecond.
    pub async fn update(
        conn: &mut AnyConnection,
        id: i64,
        changes: &PatientChanges,
    ) -> anyhow::Result<Option<Patient>> {
        let Some(mut patient) = Self::find(&mut *conn, id).await? else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(patient));
        }

        if let Some(name) = &changes.name {
            patient.name = name.clone();
        }
        if let Some(age) = changes.age {
            patient.age = age;
        }
        if let Some(symptoms) = &changes.symptoms {
            patient.symptoms = symptoms.clone();
        }
        let updated_at = now_micros().max(to_micros(patient.updated_at) + 1);

        sqlx::query(
            r#"
            UPDATE patients
            SET name = $1, age = $2, symptoms = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(patient.name.as_str())
        .bind(patient.age)
        .bind(serde_json::to_string(&patient.symptoms)?)
        .bind(updated_at)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        patient.updated_at = from_micros(updated_at)?;
        Ok(Some(patient))
    }

    pub async fn delete(conn: &mut AnyConnection, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// One page of matching patients, newest first, plus the number of
    /// patients matching the filter overall.
    pub async fn list(
        conn: &mut AnyConnection,
        filter: &PatientFilter,
        offset: i64,
        limit: i64,
    ) -> anyhow::Result<(Vec<Patient>, i64)> {
        let (where_sql, binds) = filter.where_clause();

        let count_sql = format!("SELECT COUNT(*) FROM patients{where_sql}");
        let total = bind_filters!(sqlx::query_scalar::<Any, i64>(&count_sql), &binds)
            .fetch_one(&mut *conn)
            .await?;

        let page_sql = format!(
            "{SELECT_PATIENT}{where_sql}{NEWEST_FIRST} LIMIT ${} OFFSET ${}",
            binds.len() + 1,
            binds.len() + 2
        );
        let rows = bind_filters!(sqlx::query_as::<Any, PatientRow>(&page_sql), &binds)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await?;

        Ok((rows_into(rows)?, total))
    }
}

/// Unpaged lookups for callers working with the store directly; the HTTP
/// layer goes through `list`.
#[cfg_attr(not(test), allow(dead_code))]
impl Patient {
    /// Every patient matching `filter`, newest first.
    pub async fn matching(
        conn: &mut AnyConnection,
        filter: &PatientFilter,
    ) -> anyhow::Result<Vec<Patient>> {
        let (where_sql, binds) = filter.where_clause();
        let sql = format!("{SELECT_PATIENT}{where_sql}{NEWEST_FIRST}");
        let rows = bind_filters!(sqlx::query_as::<Any, PatientRow>(&sql), &binds)
            .fetch_all(&mut *conn)
            .await?;
        rows_into(rows)
    }

    pub async fn by_symptom(conn: &mut AnyConnection, symptom: &str) -> anyhow::Result<Vec<Patient>> {
        let filter = PatientFilter {
            symptom: Some(symptom.to_string()),
            ..Default::default()
        };
        Self::matching(conn, &filter).await
    }

    pub async fn by_age_range(
        conn: &mut AnyConnection,
        min_age: i64,
        max_age: i64,
    ) -> anyhow::Result<Vec<Patient>> {
        let filter = PatientFilter {
            min_age: Some(min_age),
            max_age: Some(max_age),
            ..Default::default()
        };
        Self::matching(conn, &filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_db;

    fn new_patient(name: &str, age: i64, symptoms: &[&str]) -> NewPatient {
        NewPatient {
            name: name.into(),
            age,
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn create_and_find() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();

        let created = Patient::create(&mut conn, &new_patient("Bob", 40, &["fever", "cough"]))
            .await
            .unwrap();
        assert!(created.id > 0);
        assert_eq!(created.symptoms, vec!["fever", "cough"]);
        assert_eq!(created.created_at, created.updated_at);

        let found = Patient::find(&mut conn, created.id).await.unwrap();
        assert_eq!(found, Some(created));
        assert!(Patient::find(&mut conn, 9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields_and_advances_timestamp() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        let created = Patient::create(&mut conn, &new_patient("Ann", 30, &["rash"]))
            .await
            .unwrap();

        let changes = PatientChanges {
            age: Some(31),
            ..Default::default()
        };
        let updated = Patient::update(&mut conn, created.id, &changes)
            .await
            .unwrap()
            .expect("patient exists");
        assert_eq!(updated.age, 31);
        assert_eq!(updated.name, "Ann");
        assert_eq!(updated.symptoms, vec!["rash"]);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);

        let reloaded = Patient::find(&mut conn, created.id).await.unwrap().unwrap();
        assert_eq!(reloaded, updated);

        assert!(Patient::update(&mut conn, 9999, &changes).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_twice_reports_missing() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        let created = Patient::create(&mut conn, &new_patient("Cid", 50, &[]))
            .await
            .unwrap();

        assert!(Patient::delete(&mut conn, created.id).await.unwrap());
        assert!(!Patient::delete(&mut conn, created.id).await.unwrap());
    }

    #[tokio::test]
    async fn list_counts_all_matches_regardless_of_page() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        for (name, age, symptoms) in [
            ("Alice", 25, vec!["fever"]),
            ("alina", 35, vec!["cough", "fever"]),
            ("Bob", 45, vec!["headache"]),
            ("Carl", 70, vec!["fever"]),
        ] {
            Patient::create(&mut conn, &new_patient(name, age, &symptoms))
                .await
                .unwrap();
        }

        let by_name = PatientFilter {
            name: Some("ALI".into()),
            ..Default::default()
        };
        let (page, total) = Patient::list(&mut conn, &by_name, 0, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "alina"); // newest first

        let (page, total) = Patient::list(&mut conn, &by_name, 5, 10).await.unwrap();
        assert_eq!(total, 2);
        assert!(page.is_empty());

        let fever_under_60 = PatientFilter {
            max_age: Some(60),
            symptom: Some("fever".into()),
            ..Default::default()
        };
        let (page, total) = Patient::list(&mut conn, &fever_under_60, 0, 100).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 2);

        let (_, total) = Patient::list(&mut conn, &PatientFilter::default(), 0, 1)
            .await
            .unwrap();
        assert_eq!(total, 4);
    }

    #[tokio::test]
    async fn symptom_and_age_range_queries() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        Patient::create(&mut conn, &new_patient("A", 10, &["fever"])).await.unwrap();
        Patient::create(&mut conn, &new_patient("B", 20, &["cough"])).await.unwrap();
        Patient::create(&mut conn, &new_patient("C", 30, &["fever"])).await.unwrap();

        let fever = Patient::by_symptom(&mut conn, "fever").await.unwrap();
        assert_eq!(fever.len(), 2);

        let teens_and_twenties = Patient::by_age_range(&mut conn, 10, 20).await.unwrap();
        let names: Vec<_> = teens_and_twenties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn timestamps_are_stored_at_full_width() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();

        let before = now_micros();
        let created = Patient::create(&mut conn, &new_patient("Dora", 60, &[]))
            .await
            .unwrap();

        let raw: i64 = sqlx::query_scalar("SELECT created_at FROM patients WHERE id = $1")
            .bind(created.id)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert!(raw >= before, "stored {raw} is earlier than {before}");
        assert_eq!(from_micros(raw).unwrap(), created.created_at);
    }

    #[tokio::test]
    async fn offsets_beyond_32_bits_reach_the_query() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        for name in ["A", "B", "C"] {
            Patient::create(&mut conn, &new_patient(name, 20, &[]))
                .await
                .unwrap();
        }

        let (page, total) = Patient::list(&mut conn, &PatientFilter::default(), 1 << 32, 10)
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn name_search_matches_accented_capitals() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        Patient::create(&mut conn, &new_patient("Ángel", 33, &[]))
            .await
            .unwrap();
        Patient::create(&mut conn, &new_patient("Óscar", 41, &[]))
            .await
            .unwrap();

        for query in ["Ángel", "ngel", "NGEL"] {
            let filter = PatientFilter {
                name: Some(query.into()),
                ..Default::default()
            };
            let (page, total) = Patient::list(&mut conn, &filter, 0, 10).await.unwrap();
            assert_eq!(total, 1, "searching {query}");
            assert_eq!(page[0].name, "Ángel");
        }
    }
}
