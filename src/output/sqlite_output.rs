//! SQLite record export
//!
//! One row per record, keyed by source URL, one column per configured field.
//! Re-running against the same database upserts rows instead of duplicating
//! them, and columns for newly configured fields are added in place.

use crate::config::{FieldKind, FieldRule};
use crate::output::traits::{Exporter, OutputResult, RunSummary};
use crate::record::{FieldValue, Record};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Run bookkeeping table, shared by every record table in the database
const RUNS_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    discovered INTEGER NOT NULL,
    fetched INTEGER NOT NULL,
    failed INTEGER NOT NULL,
    cancelled INTEGER NOT NULL,
    error_message TEXT
);
"#;

/// A record column and its declared SQL type
#[derive(Debug, Clone)]
struct Column {
    name: String,
    sql_type: &'static str,
}

/// Writes records into a SQLite table
#[derive(Debug, Clone)]
pub struct SqliteExporter {
    path: PathBuf,
    table: String,
    columns: Vec<Column>,
}

impl SqliteExporter {
    /// Creates an exporter for the given field rules
    ///
    /// `table` must already be validated as a plain identifier.
    pub fn new(path: impl AsRef<Path>, table: impl Into<String>, rules: &[FieldRule]) -> Self {
        let columns = rules
            .iter()
            .map(|rule| Column {
                name: rule.name.clone(),
                sql_type: match rule.kind {
                    FieldKind::Number => "REAL",
                    FieldKind::Text | FieldKind::Url => "TEXT",
                },
            })
            .collect();

        Self {
            path: path.as_ref().to_path_buf(),
            table: table.into(),
            columns,
        }
    }

    fn open(&self) -> OutputResult<Connection> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        Ok(conn)
    }

    /// Creates the record table, adding columns missing from an older schema
    fn initialize_schema(&self, conn: &Connection) -> OutputResult<()> {
        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    url TEXT PRIMARY KEY,\n    \
             scraped_at TEXT NOT NULL",
            self.table
        );
        for column in &self.columns {
            sql.push_str(&format!(",\n    {} {}", quote(&column.name), column.sql_type));
        }
        sql.push_str("\n);");
        conn.execute_batch(&sql)?;

        let existing = self.existing_columns(conn)?;
        for column in self.columns.iter().filter(|c| !existing.contains(&c.name)) {
            tracing::info!("Adding column {} to table {}", column.name, self.table);
            conn.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} {};",
                self.table,
                quote(&column.name),
                column.sql_type
            ))?;
        }

        Ok(())
    }

    fn existing_columns(&self, conn: &Connection) -> OutputResult<HashSet<String>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", self.table))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(names)
    }

    fn upsert_sql(&self) -> String {
        let names: Vec<String> = self.columns.iter().map(|c| quote(&c.name)).collect();
        let placeholders: Vec<String> = (0..names.len() + 2)
            .map(|i| format!("?{}", i + 1))
            .collect();
        let updates: Vec<String> = std::iter::once("scraped_at".to_string())
            .chain(names.iter().cloned())
            .map(|name| format!("{} = excluded.{}", name, name))
            .collect();

        let mut all_columns = vec!["url".to_string(), "scraped_at".to_string()];
        all_columns.extend(names);

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(url) DO UPDATE SET {}",
            self.table,
            all_columns.join(", "),
            placeholders.join(", "),
            updates.join(", ")
        )
    }
}

impl Exporter for SqliteExporter {
    fn export(&self, records: &[Record]) -> OutputResult<usize> {
        let mut conn = self.open()?;
        self.initialize_schema(&conn)?;

        let scraped_at = Utc::now().to_rfc3339();
        let sql = self.upsert_sql();

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                let mut values = vec![
                    Value::Text(record.url().to_string()),
                    Value::Text(scraped_at.clone()),
                ];
                values.extend(
                    self.columns
                        .iter()
                        .map(|column| to_sql_value(record.get(&column.name))),
                );
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        Ok(records.len())
    }

    fn destination(&self) -> String {
        format!("{} (table {})", self.path.display(), self.table)
    }

    /// Appends a row describing the run to `crawl_runs`
    fn record_run(&self, summary: &RunSummary) -> OutputResult<()> {
        let conn = self.open()?;
        conn.execute_batch(RUNS_SCHEMA_SQL)?;
        conn.execute(
            "INSERT INTO crawl_runs (started_at, finished_at, config_hash, status,
                                     discovered, fetched, failed, cancelled, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                summary.started_at.to_rfc3339(),
                summary.finished_at.to_rfc3339(),
                summary.config_hash,
                summary.status.as_str(),
                summary.stats.discovered as i64,
                summary.stats.fetched as i64,
                summary.stats.failed as i64,
                summary.stats.cancelled as i64,
                summary.error,
            ],
        )?;
        Ok(())
    }
}

fn to_sql_value(value: Option<&FieldValue>) -> Value {
    match value {
        Some(FieldValue::Text(text)) => Value::Text(text.clone()),
        Some(FieldValue::Number(n)) => Value::Real(*n),
        None => Value::Null,
    }
}

/// Quotes a column name as an SQL identifier
fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
