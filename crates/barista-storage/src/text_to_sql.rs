//! Natural-language outlet questions to SQL.
//!
//! [`TemplateSqlGenerator`] turns phrases such as "outlets in Kuala Lumpur"
//! or "how many stores are called Sunway" into a single `SELECT` over the
//! `outlets` table. [`TextToSqlService`] pairs a generator with the outlet
//! repository and refuses to execute anything that is not read-only.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::outlets::{OutletRepository, SqlRow};

/// Maximum rows returned for listing questions.
const LIST_LIMIT: u32 = 20;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OutletQueryError {
    #[error("could not generate SQL: {0}")]
    Generation(String),

    #[error("SQL execution failed: {message}")]
    Execution { sql: String, message: String },
}

impl OutletQueryError {
    /// The statement that was produced before failure, if any.
    pub fn generated_sql(&self) -> Option<&str> {
        match self {
            OutletQueryError::Generation(_) => None,
            OutletQueryError::Execution { sql, .. } => Some(sql),
        }
    }
}

/// Successful lookup: the statement that ran and its rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlAnswer {
    pub generated_sql: String,
    pub rows: Vec<SqlRow>,
}

/// Produces one SQL statement for a question about outlets.
pub trait SqlGenerator: Send + Sync {
    fn generate(&self, question: &str) -> Result<String, OutletQueryError>;
}

// ---- patterns ----

struct QueryPatterns {
    count: Regex,
    quoted_name: Regex,
    named: Regex,
    location: Regex,
    location_stop: Regex,
    time_phrase: Regex,
    outlet_subject: Regex,
}

static PATTERNS: LazyLock<QueryPatterns> = LazyLock::new(|| QueryPatterns {
    count: Regex::new(r"(?i)\b(?:how\s+many|count|number\s+of)\b").expect("Invalid count regex"),
    quoted_name: Regex::new(r#"(?i)['"]([^'"]+)['"]\s+in\s+(?:the|its|their)\s+names?"#)
        .expect("Invalid quoted name regex"),
    named: Regex::new(r#"(?i)\b(?:named|called)\s+['"]?([^'"?.!,;]+)"#)
        .expect("Invalid name regex"),
    location: Regex::new(r"(?i)\b(?:in|at|near|around)\s+([^?.!,;]+)")
        .expect("Invalid location regex"),
    location_stop: Regex::new(
        r"(?i)\s+\b(?:that|which|with|and|open|opens|opening|for|please|today|now)\b.*$",
    )
    .expect("Invalid location stop regex"),
    time_phrase: Regex::new(
        r"(?i)\b(?:at|by|before|after|until|till|from)\s+(?:\d{1,2}(?::\d{2}\s*(?:am|pm)?|\s*(?:am|pm))|noon|midnight|night|the\s+moment)(?:\b|$)|\bin\s+the\s+(?:morning|afternoon|evening)\b",
    )
    .expect("Invalid time phrase regex"),
    outlet_subject: Regex::new(
        r"(?i)\b(?:outlets?|branch(?:es)?|stores?|shops?|locations?|cafes?|kiosks?)\b",
    )
    .expect("Invalid outlet subject regex"),
});

static READ_ONLY_DENY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:insert|update|delete|drop|alter|create|replace|pragma|attach|detach|vacuum|reindex|truncate)\b",
    )
    .expect("Invalid deny regex")
});

static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'(?:[^']|'')*'").expect("Invalid literal regex"));

/// Rule-based generator over the `outlets(id, name, address, opening_hours)` table.
#[derive(Debug, Default, Clone)]
pub struct TemplateSqlGenerator;

impl TemplateSqlGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for TemplateSqlGenerator {
    fn generate(&self, question: &str) -> Result<String, OutletQueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(OutletQueryError::Generation("empty question".to_string()));
        }

        let p = &*PATTERNS;
        let mut filters = Vec::new();
        let mut remaining = question.to_string();

        // Name filters consume their span so "in the name" is not read as a place.
        if let Some(caps) = p.quoted_name.captures(question) {
            if let Some(name) = clean_term(&caps[1]) {
                filters.push(format!("name LIKE '%{}%'", name));
            }
            remaining = remaining.replacen(&caps[0], " ", 1);
        } else if let Some(caps) = p.named.captures(question) {
            if let Some(name) = clean_term(&caps[1]) {
                filters.push(format!("name LIKE '%{}%'", name));
            }
            remaining = remaining.replacen(&caps[0], " ", 1);
        }

        // "open at 9am" names a time, not a place.
        let scrubbed = p.time_phrase.replace_all(&remaining, " ");
        if let Some(caps) = p.location.captures(&scrubbed) {
            let raw = p.location_stop.replace(&caps[1], "");
            let place = strip_article(&raw);
            if !place.starts_with(|c: char| c.is_ascii_digit()) {
                if let Some(place) = clean_term(place) {
                    filters.push(format!("address LIKE '%{}%'", place));
                }
            }
        }

        if filters.is_empty() && !p.outlet_subject.is_match(question) {
            return Err(OutletQueryError::Generation(format!(
                "question does not mention outlets: {question}"
            )));
        }

        let where_clause = if filters.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", filters.join(" AND "))
        };

        let sql = if p.count.is_match(question) {
            format!("SELECT COUNT(*) AS outlet_count FROM outlets{where_clause}")
        } else {
            format!(
                "SELECT id, name, address, opening_hours FROM outlets{where_clause} ORDER BY name LIMIT {LIST_LIMIT}"
            )
        };

        debug!(question, sql = %sql, "Generated outlet SQL");
        Ok(sql)
    }
}

fn strip_article(term: &str) -> &str {
    let trimmed = term.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("the ") {
        trimmed[4..].trim_start()
    } else {
        trimmed
    }
}

/// Make a user-supplied term safe to embed in a LIKE literal.
fn clean_term(term: &str) -> Option<String> {
    let cleaned: String = term
        .trim()
        .chars()
        .filter(|c| *c != '%' && *c != '_')
        .collect::<String>()
        .replace('\'', "''");
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Accept exactly one `SELECT` statement with no write or schema keywords.
pub fn ensure_read_only(sql: &str) -> Result<(), String> {
    let trimmed = sql.trim();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    let unquoted = STRING_LITERAL.replace_all(body, "''");

    if unquoted.contains(';') {
        return Err("multiple statements are not allowed".to_string());
    }
    let starts_with_select = unquoted
        .trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"));
    if !starts_with_select {
        return Err("only SELECT statements are allowed".to_string());
    }
    if let Some(m) = READ_ONLY_DENY.find(&unquoted) {
        return Err(format!("forbidden keyword: {}", m.as_str()));
    }
    Ok(())
}

/// Generates SQL for a question and runs it against the outlet table.
pub struct TextToSqlService {
    generator: Box<dyn SqlGenerator>,
    outlets: Arc<OutletRepository>,
}

impl TextToSqlService {
    pub fn new(generator: Box<dyn SqlGenerator>, outlets: Arc<OutletRepository>) -> Self {
        Self { generator, outlets }
    }

    /// Service backed by [`TemplateSqlGenerator`].
    pub fn with_templates(outlets: Arc<OutletRepository>) -> Self {
        Self::new(Box::new(TemplateSqlGenerator::new()), outlets)
    }

    /// Blocking; callers on an async runtime should use `spawn_blocking`.
    pub fn generate_and_run(&self, question: &str) -> Result<SqlAnswer, OutletQueryError> {
        let sql = self.generator.generate(question)?;

        if let Err(reason) = ensure_read_only(&sql) {
            warn!(sql = %sql, reason = %reason, "Rejected generated SQL");
            return Err(OutletQueryError::Execution {
                sql,
                message: reason,
            });
        }

        match self.outlets.query_rows(&sql) {
            Ok(rows) => {
                debug!(rows = rows.len(), "Outlet query complete");
                Ok(SqlAnswer {
                    generated_sql: sql,
                    rows,
                })
            }
            Err(e) => Err(OutletQueryError::Execution {
                sql,
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::outlets::NewOutlet;

    fn generate(question: &str) -> String {
        TemplateSqlGenerator::new().generate(question).unwrap()
    }

    fn service() -> TextToSqlService {
        let repo = OutletRepository::new(Arc::new(Database::in_memory().unwrap()));
        for (name, address) in [
            ("ZUS Coffee KLCC", "Suria KLCC, Kuala Lumpur"),
            ("ZUS Coffee Bangsar", "Jalan Telawi, Bangsar, Kuala Lumpur"),
            ("ZUS Coffee Sunway Pyramid", "Bandar Sunway, Petaling Jaya, Selangor"),
        ] {
            repo.insert(&NewOutlet {
                name: name.to_string(),
                address: address.to_string(),
                opening_hours: "9am-10pm".to_string(),
            })
            .unwrap();
        }
        TextToSqlService::with_templates(Arc::new(repo))
    }

    // ---- generation ----

    #[test]
    fn test_location_filter_on_address() {
        let sql = generate("outlets in Kuala Lumpur");
        assert!(sql.contains("WHERE address LIKE '%Kuala Lumpur%'"), "{sql}");
        assert!(sql.starts_with("SELECT id, name, address, opening_hours FROM outlets"));
        assert!(sql.ends_with("ORDER BY name LIMIT 20"));
    }

    #[test]
    fn test_location_stops_at_connector() {
        let sql = generate("Which outlets in Petaling Jaya open early?");
        assert!(sql.contains("address LIKE '%Petaling Jaya%'"), "{sql}");
    }

    #[test]
    fn test_location_strips_article() {
        let sql = generate("any stores in the Klang Valley");
        assert!(sql.contains("address LIKE '%Klang Valley%'"), "{sql}");
    }

    #[test]
    fn test_time_is_not_location() {
        for question in [
            "is the outlet open at 9am",
            "which stores are open at 10:30 pm?",
            "any branch open until midnight",
            "outlets open at night",
            "which cafes are open in the morning",
        ] {
            let sql = generate(question);
            assert!(!sql.contains("address LIKE"), "{question}: {sql}");
        }
    }

    #[test]
    fn test_location_after_time() {
        let sql = generate("outlets open at 9pm in Bangsar");
        assert!(sql.contains("address LIKE '%Bangsar%'"), "{sql}");
        assert!(!sql.contains("9pm"), "{sql}");
    }

    #[test]
    fn test_count_question() {
        let sql = generate("How many outlets are there in Selangor?");
        assert_eq!(
            sql,
            "SELECT COUNT(*) AS outlet_count FROM outlets WHERE address LIKE '%Selangor%'"
        );
    }

    #[test]
    fn test_quoted_name_is_not_location() {
        let sql = generate("Find outlets with 'coffee' in the name");
        assert!(sql.contains("name LIKE '%coffee%'"), "{sql}");
        assert!(!sql.contains("address LIKE"), "{sql}");
    }

    #[test]
    fn test_named_filter() {
        let sql = generate("is there a branch called Sunway Pyramid");
        assert!(sql.contains("name LIKE '%Sunway Pyramid%'"), "{sql}");
    }

    #[test]
    fn test_list_all() {
        let sql = generate("Show me all outlets");
        assert_eq!(
            sql,
            "SELECT id, name, address, opening_hours FROM outlets ORDER BY name LIMIT 20"
        );
    }

    #[test]
    fn test_quotes_escaped_and_wildcards_stripped() {
        let sql = generate("outlets in O'Brien%_ Street");
        assert!(sql.contains("'%O''Brien Street%'"), "{sql}");
        assert!(ensure_read_only(&sql).is_ok());
    }

    #[test]
    fn test_unrelated_question_fails() {
        let err = TemplateSqlGenerator::new()
            .generate("tell me a joke")
            .unwrap_err();
        assert!(matches!(err, OutletQueryError::Generation(_)));
        assert!(err.generated_sql().is_none());
    }

    #[test]
    fn test_empty_question_fails() {
        assert!(TemplateSqlGenerator::new().generate("   ").is_err());
    }

    // ---- read-only guard ----

    #[test]
    fn test_read_only_accepts_select() {
        assert!(ensure_read_only("SELECT * FROM outlets;").is_ok());
        assert!(ensure_read_only("select name from outlets where name like '%drop%'").is_ok());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        assert!(ensure_read_only("DELETE FROM outlets").is_err());
        assert!(ensure_read_only("SELECT 1; DROP TABLE outlets").is_err());
        assert!(ensure_read_only("SELECT * FROM outlets WHERE 1 = (DELETE FROM outlets)").is_err());
        assert!(ensure_read_only("PRAGMA table_info(outlets)").is_err());
    }

    // ---- execution ----

    #[test]
    fn test_generate_and_run_kuala_lumpur() {
        let answer = service()
            .generate_and_run("outlets in Kuala Lumpur")
            .unwrap();
        assert!(answer.generated_sql.contains("WHERE address"));
        let names: Vec<&str> = answer
            .rows
            .iter()
            .filter_map(|r| r["name"].as_str())
            .collect();
        assert_eq!(names, vec!["ZUS Coffee Bangsar", "ZUS Coffee KLCC"]);
    }

    #[test]
    fn test_generate_and_run_count() {
        let answer = service()
            .generate_and_run("how many outlets in Selangor")
            .unwrap();
        assert_eq!(answer.rows[0]["outlet_count"], 1);
    }

    struct FixedSql(&'static str);

    impl SqlGenerator for FixedSql {
        fn generate(&self, _question: &str) -> Result<String, OutletQueryError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_execution_failure_keeps_sql() {
        let repo = Arc::new(OutletRepository::new(Arc::new(Database::in_memory().unwrap())));
        let service = TextToSqlService::new(Box::new(FixedSql("SELECT missing FROM outlets")), repo);
        let err = service.generate_and_run("anything").unwrap_err();
        assert_eq!(err.generated_sql(), Some("SELECT missing FROM outlets"));
    }

    #[test]
    fn test_write_statement_never_executes() {
        let repo = Arc::new(OutletRepository::new(Arc::new(Database::in_memory().unwrap())));
        let service = TextToSqlService::new(Box::new(FixedSql("DROP TABLE outlets")), repo.clone());
        let err = service.generate_and_run("anything").unwrap_err();
        assert!(matches!(err, OutletQueryError::Execution { .. }));
        assert_eq!(repo.count().unwrap(), 0);
    }
}
