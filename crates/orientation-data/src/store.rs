//! SQLite persistence for labeled students.

use crate::error::{DataError, Result};
use crate::record::{FeatureValue, LabeledStudent, Sector, StudentRecord};
use crate::schema::{FeatureKind, FeatureSchema, TARGET_COLUMN};
use chrono::Utc;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};
use std::io::Write;
use std::path::Path;

/// Storage of labeled students.
pub trait StudentStore {
    /// Persist a labeled student and return its identifier.
    fn insert(&self, student: &LabeledStudent) -> Result<i64>;

    /// Fetch a student by identifier.
    fn get(&self, id: i64) -> Result<Option<LabeledStudent>>;

    /// Fetch a student that must exist.
    ///
    /// # Errors
    /// Returns [`DataError::NotFound`] when no student has this identifier.
    fn require(&self, id: i64) -> Result<LabeledStudent> {
        self.get(id)?.ok_or(DataError::NotFound(id))
    }

    /// List students ordered by identifier, skipping `skip` and returning at most `limit`.
    fn list(&self, skip: usize, limit: usize) -> Result<Vec<LabeledStudent>>;

    /// Number of stored students.
    fn count(&self) -> Result<usize>;
}

/// SQLite-backed student store.
///
/// One column per schema feature, named after the feature, plus the sector.
#[derive(Debug)]
pub struct SqliteStudentStore {
    conn: Connection,
    schema: FeatureSchema,
}

impl SqliteStudentStore {
    /// Open (or create) a store.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            schema: FeatureSchema::canonical(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            schema: FeatureSchema::canonical(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        let feature_columns: Vec<String> = self
            .schema
            .features()
            .iter()
            .map(|spec| match spec.kind {
                FeatureKind::Numeric => format!("{} REAL", spec.name),
                FeatureKind::Categorical => format!("{} TEXT", spec.name),
            })
            .collect();

        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS students (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    {},
                    {} TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )",
                feature_columns.join(",\n                    "),
                TARGET_COLUMN
            ),
            [],
        )?;

        self.conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_students_sector ON students({})",
                TARGET_COLUMN
            ),
            [],
        )?;

        Ok(())
    }

    fn select_columns(&self) -> String {
        let mut cols = vec!["id"];
        cols.extend(self.schema.names());
        cols.push(TARGET_COLUMN);
        cols.join(", ")
    }

    fn row_to_student(&self, row: &Row<'_>) -> rusqlite::Result<LabeledStudent> {
        let id: i64 = row.get(0)?;
        let mut record = StudentRecord::default();
        for (i, spec) in self.schema.features().iter().enumerate() {
            let value = match spec.kind {
                FeatureKind::Numeric => row.get::<_, Option<f64>>(i + 1)?.map(FeatureValue::Number),
                FeatureKind::Categorical => {
                    row.get::<_, Option<String>>(i + 1)?.map(FeatureValue::Text)
                }
            };
            // Store columns come from the same schema as the record fields.
            if record.set(spec.name, value).is_err() {
                return Err(rusqlite::Error::InvalidColumnName(spec.name.to_string()));
            }
        }
        let sector: String = row.get(self.schema.len() + 1)?;
        Ok(record.label(Sector::from(sector)).with_id(id))
    }

    /// Write every stored student as CSV (header row, schema order, sector last).
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.schema.columns())?;

        let mut count = 0;
        for student in self.list(0, usize::MAX)? {
            let mut fields: Vec<String> = self
                .schema
                .names()
                .into_iter()
                .map(|name| {
                    student
                        .record
                        .value(name)
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                })
                .collect();
            fields.push(student.sector.into_inner());
            wtr.write_record(&fields)?;
            count += 1;
        }
        wtr.flush()?;
        Ok(count)
    }
}

impl StudentStore for SqliteStudentStore {
    fn insert(&self, student: &LabeledStudent) -> Result<i64> {
        let mut values: Vec<Value> = self
            .schema
            .names()
            .into_iter()
            .map(|name| match student.record.value(name) {
                Some(FeatureValue::Number(n)) => Value::Real(n),
                Some(FeatureValue::Text(s)) => Value::Text(s),
                None => Value::Null,
            })
            .collect();
        values.push(Value::Text(student.sector.as_str().to_string()));
        values.push(Value::Text(Utc::now().to_rfc3339()));

        let mut cols = self.schema.names();
        cols.push(TARGET_COLUMN);
        cols.push("created_at");
        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{}", i)).collect();

        self.conn.execute(
            &format!(
                "INSERT INTO students ({}) VALUES ({})",
                cols.join(", "),
                placeholders.join(", ")
            ),
            params_from_iter(values),
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Stored student {} with sector {}", id, student.sector);
        Ok(id)
    }

    fn get(&self, id: i64) -> Result<Option<LabeledStudent>> {
        let sql = format!("SELECT {} FROM students WHERE id = ?1", self.select_columns());
        let student = self
            .conn
            .query_row(&sql, [id], |row| self.row_to_student(row))
            .optional()?;
        Ok(student)
    }

    fn list(&self, skip: usize, limit: usize) -> Result<Vec<LabeledStudent>> {
        let sql = format!(
            "SELECT {} FROM students ORDER BY id ASC LIMIT ?1 OFFSET ?2",
            self.select_columns()
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let skip = i64::try_from(skip).unwrap_or(i64::MAX);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([limit, skip], |row| self.row_to_student(row))?;

        let mut students = Vec::new();
        for row in rows {
            students.push(row?);
        }
        Ok(students)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
