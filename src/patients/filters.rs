/// Optional predicates for patient queries. Blank strings are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientFilter {
    pub name: Option<String>,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub symptom: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Bind {
    Text(String),
    Int(i64),
}

/// Binds filter values onto a sqlx query in placeholder order.
macro_rules! bind_filters {
    ($query:expr, $binds:expr) => {{
        let mut query = $query;
        for bind in $binds {
            query = match bind {
                $crate::patients::filters::Bind::Text(s) => query.bind(s.clone()),
                $crate::patients::filters::Bind::Int(i) => query.bind(*i),
            };
        }
        query
    }};
}
pub(crate) use bind_filters;

impl PatientFilter {
    /// Renders ` WHERE ...` (or nothing) with `$1..$n` placeholders, plus the
    /// values to bind in that order.
    pub(crate) fn where_clause(&self) -> (String, Vec<Bind>) {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();

        if let Some(name) = self.name.as_deref().filter(|s| !s.is_empty()) {
            // Both sides go through the store's LOWER so they fold the same way.
            binds.push(Bind::Text(format!("%{name}%")));
            clauses.push(format!("LOWER(name) LIKE LOWER(${})", binds.len()));
        }
        if let Some(min) = self.min_age {
            binds.push(Bind::Int(min));
            clauses.push(format!("age >= ${}", binds.len()));
        }
        if let Some(max) = self.max_age {
            binds.push(Bind::Int(max));
            clauses.push(format!("age <= ${}", binds.len()));
        }
        if let Some(symptom) = self.symptom.as_deref().filter(|s| !s.is_empty()) {
            binds.push(Bind::Text(format!("%{symptom}%")));
            clauses.push(format!("symptoms LIKE ${}", binds.len()));
        }

        if clauses.is_empty() {
            (String::new(), binds)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), binds)
        }
    }
}
