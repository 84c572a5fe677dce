//! SQLite-backed practice store.
//!
//! Each unit of work runs in a `BEGIN IMMEDIATE` transaction, which takes the database write
//! lock up front. Slot reservation is a single conditional `UPDATE`, so the capacity check and
//! the increment can never be split by another writer.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};

use super::domain::{
    ApplicationId, ApplicationStatus, ApplicationType, Document, DocumentId, DocumentKind,
    DocumentStatus, FinalResult, Internship, InternshipId, PracticeApplication, PracticeTarget,
    StudentId,
};
use super::repository::{PracticeStore, RepositoryError, StoreTransaction};
use super::slots::SlotReservation;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS internships (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    company TEXT NOT NULL,
    total_slots INTEGER NOT NULL CHECK (total_slots >= 1),
    occupied_slots INTEGER NOT NULL DEFAULT 0
        CHECK (occupied_slots >= 0 AND occupied_slots <= total_slots),
    application_deadline TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS practice_applications (
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    application_type TEXT NOT NULL,
    internship_id TEXT REFERENCES internships(id),
    internship_external_id TEXT,
    status TEXT NOT NULL,
    coordinator_comments TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    is_closed INTEGER NOT NULL DEFAULT 0,
    final_average REAL,
    final_result TEXT,
    closed_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK ((internship_id IS NULL) <> (internship_external_id IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_practice_applications_student
    ON practice_applications(student_id);

CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    practice_application_id TEXT NOT NULL
        REFERENCES practice_applications(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    grade REAL,
    weight REAL NOT NULL DEFAULT 0,
    uploaded_by TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_application
    ON documents(practice_application_id);
"#;

const APPLICATION_COLUMNS: &str = "id, student_id, application_type, internship_id, \
    internship_external_id, status, coordinator_comments, metadata, is_closed, final_average, \
    final_result, closed_at, created_at, updated_at";

const DOCUMENT_COLUMNS: &str =
    "id, practice_application_id, kind, status, grade, weight, uploaded_by";

pub struct SqlitePracticeStore {
    conn: Mutex<Connection>,
}

impl SqlitePracticeStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(storage_error)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(storage_error)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, RepositoryError> {
        // Writers on other connections wait for the reserved lock instead of failing fast.
        conn.busy_timeout(BUSY_TIMEOUT).map_err(storage_error)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(storage_error)?;
        conn.execute_batch(SCHEMA).map_err(storage_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl PracticeStore for SqlitePracticeStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
    {
        let mut conn = self.conn.lock().map_err(|_| {
            E::from(RepositoryError::Unavailable(
                "sqlite connection mutex poisoned".to_string(),
            ))
        })?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| E::from(storage_error(err)))?;

        // Dropping `tx` on the error path rolls the whole unit back.
        let value = {
            let mut scope = SqliteTransaction { conn: &tx };
            work(&mut scope)?
        };

        tx.commit().map_err(|err| E::from(storage_error(err)))?;
        Ok(value)
    }
}

struct SqliteTransaction<'a> {
    conn: &'a Connection,
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn internship(&mut self, id: &InternshipId) -> Result<Option<Internship>, RepositoryError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, company, total_slots, occupied_slots, application_deadline \
                 FROM internships WHERE id = ?1",
                params![id.0],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(storage_error)?;

        row.map(|(id, title, company, total_slots, occupied_slots, deadline)| {
            Ok(Internship {
                id: InternshipId(id),
                title,
                company,
                total_slots,
                occupied_slots,
                application_deadline: parse_date(&deadline)?,
            })
        })
        .transpose()
    }

    fn insert_internship(&mut self, internship: Internship) -> Result<(), RepositoryError> {
        self.conn
            .execute(
                "INSERT INTO internships \
                 (id, title, company, total_slots, occupied_slots, application_deadline) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    internship.id.0,
                    internship.title,
                    internship.company,
                    internship.total_slots,
                    internship.occupied_slots,
                    internship.application_deadline.format("%Y-%m-%d").to_string(),
                ],
            )
            .map_err(storage_error)?;
        Ok(())
    }

    fn reserve_slot(&mut self, id: &InternshipId) -> Result<SlotReservation, RepositoryError> {
        let changed = self
            .conn
            .execute(
                "UPDATE internships SET occupied_slots = occupied_slots + 1 \
                 WHERE id = ?1 AND occupied_slots < total_slots",
                params![id.0],
            )
            .map_err(storage_error)?;

        let internship = self.internship(id)?.ok_or(RepositoryError::NotFound)?;
        let (occupied, total) = (internship.occupied_slots, internship.total_slots);
        Ok(if changed == 1 {
            SlotReservation::Granted { occupied, total }
        } else {
            SlotReservation::Denied { occupied, total }
        })
    }

    fn application(
        &mut self,
        id: &ApplicationId,
    ) -> Result<Option<PracticeApplication>, RepositoryError> {
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM practice_applications WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id.0], ApplicationRow::from_row)
            .optional()
            .map_err(storage_error)?;
        row.map(ApplicationRow::into_domain).transpose()
    }

    fn applications_for_student(
        &mut self,
        student_id: &StudentId,
    ) -> Result<Vec<PracticeApplication>, RepositoryError> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM practice_applications \
             WHERE student_id = ?1 ORDER BY created_at, id"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(storage_error)?;
        let rows = stmt
            .query_map(params![student_id.0], ApplicationRow::from_row)
            .map_err(storage_error)?;

        let mut applications = Vec::new();
        for row in rows {
            applications.push(row.map_err(storage_error)?.into_domain()?);
        }
        Ok(applications)
    }

    fn insert_application(
        &mut self,
        application: PracticeApplication,
    ) -> Result<(), RepositoryError> {
        let row = ApplicationRow::from_domain(&application)?;
        let sql = format!(
            "INSERT INTO practice_applications ({APPLICATION_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        );
        self.conn
            .execute(
                &sql,
                params![
                    row.id,
                    row.student_id,
                    row.application_type,
                    row.internship_id,
                    row.internship_external_id,
                    row.status,
                    row.coordinator_comments,
                    row.metadata,
                    row.is_closed,
                    row.final_average,
                    row.final_result,
                    row.closed_at,
                    row.created_at,
                    row.updated_at,
                ],
            )
            .map_err(storage_error)?;
        Ok(())
    }

    fn update_application(
        &mut self,
        application: PracticeApplication,
    ) -> Result<(), RepositoryError> {
        let row = ApplicationRow::from_domain(&application)?;
        let changed = self
            .conn
            .execute(
                "UPDATE practice_applications SET status = ?2, coordinator_comments = ?3, \
                 metadata = ?4, is_closed = ?5, final_average = ?6, final_result = ?7, \
                 closed_at = ?8, updated_at = ?9 WHERE id = ?1",
                params![
                    row.id,
                    row.status,
                    row.coordinator_comments,
                    row.metadata,
                    row.is_closed,
                    row.final_average,
                    row.final_result,
                    row.closed_at,
                    row.updated_at,
                ],
            )
            .map_err(storage_error)?;
        if changed == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn delete_application(&mut self, id: &ApplicationId) -> Result<(), RepositoryError> {
        self.conn
            .execute(
                "DELETE FROM documents WHERE practice_application_id = ?1",
                params![id.0],
            )
            .map_err(storage_error)?;
        let changed = self
            .conn
            .execute(
                "DELETE FROM practice_applications WHERE id = ?1",
                params![id.0],
            )
            .map_err(storage_error)?;
        if changed == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn documents_for_application(
        &mut self,
        id: &ApplicationId,
    ) -> Result<Vec<Document>, RepositoryError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE practice_application_id = ?1 ORDER BY id"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(storage_error)?;
        let rows = stmt
            .query_map(params![id.0], DocumentRow::from_row)
            .map_err(storage_error)?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(row.map_err(storage_error)?.into_domain()?);
        }
        Ok(documents)
    }

    fn document(&mut self, id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id.0], DocumentRow::from_row)
            .optional()
            .map_err(storage_error)?;
        row.map(DocumentRow::into_domain).transpose()
    }

    fn upsert_document(&mut self, document: Document) -> Result<(), RepositoryError> {
        self.conn
            .execute(
                "INSERT INTO documents \
                 (id, practice_application_id, kind, status, grade, weight, uploaded_by) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                 ON CONFLICT(id) DO UPDATE SET \
                 practice_application_id = excluded.practice_application_id, \
                 kind = excluded.kind, status = excluded.status, grade = excluded.grade, \
                 weight = excluded.weight, uploaded_by = excluded.uploaded_by",
                params![
                    document.id.0,
                    document.practice_application_id.0,
                    document.kind.label(),
                    document.status.label(),
                    document.grade,
                    document.weight,
                    document.uploaded_by,
                ],
            )
            .map_err(|err| {
                // The only constraint left after the upsert is the application foreign key.
                if constraint_violation(&err) {
                    RepositoryError::NotFound
                } else {
                    storage_error(err)
                }
            })?;
        Ok(())
    }
}

/// Column-for-column image of a `practice_applications` row.
struct ApplicationRow {
    id: String,
    student_id: String,
    application_type: String,
    internship_id: Option<String>,
    internship_external_id: Option<String>,
    status: String,
    coordinator_comments: Option<String>,
    metadata: String,
    is_closed: bool,
    final_average: Option<f64>,
    final_result: Option<String>,
    closed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ApplicationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            application_type: row.get(2)?,
            internship_id: row.get(3)?,
            internship_external_id: row.get(4)?,
            status: row.get(5)?,
            coordinator_comments: row.get(6)?,
            metadata: row.get(7)?,
            is_closed: row.get(8)?,
            final_average: row.get(9)?,
            final_result: row.get(10)?,
            closed_at: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn from_domain(application: &PracticeApplication) -> Result<Self, RepositoryError> {
        let metadata = serde_json::to_string(&application.metadata)
            .map_err(|err| RepositoryError::Malformed(format!("metadata: {err}")))?;

        Ok(Self {
            id: application.id.0.clone(),
            student_id: application.student_id.0.clone(),
            application_type: application.application_type().label().to_string(),
            internship_id: application.target.internship_id().map(|id| id.0.clone()),
            internship_external_id: application
                .target
                .internship_external_id()
                .map(str::to_string),
            status: application.status.label().to_string(),
            coordinator_comments: application.coordinator_comments.clone(),
            metadata,
            is_closed: application.is_closed,
            final_average: application.final_average,
            final_result: application
                .final_result
                .map(|result| result.label().to_string()),
            closed_at: application.closed_at.map(format_timestamp),
            created_at: format_timestamp(application.created_at),
            updated_at: format_timestamp(application.updated_at),
        })
    }

    fn into_domain(self) -> Result<PracticeApplication, RepositoryError> {
        let target = match (
            ApplicationType::from_label(&self.application_type),
            self.internship_id,
            self.internship_external_id,
        ) {
            (Some(ApplicationType::Existing), Some(internship_id), None) => {
                PracticeTarget::Existing {
                    internship_id: InternshipId(internship_id),
                }
            }
            (Some(ApplicationType::External), None, Some(internship_external_id)) => {
                PracticeTarget::External {
                    internship_external_id,
                }
            }
            _ => {
                return Err(RepositoryError::Malformed(format!(
                    "application {} has an inconsistent target",
                    self.id
                )))
            }
        };

        let status = ApplicationStatus::from_label(&self.status).ok_or_else(|| {
            RepositoryError::Malformed(format!("unknown application status '{}'", self.status))
        })?;

        let final_result = self
            .final_result
            .map(|raw| {
                FinalResult::from_label(&raw).ok_or_else(|| {
                    RepositoryError::Malformed(format!("unknown final result '{raw}'"))
                })
            })
            .transpose()?;

        let metadata: BTreeMap<String, String> = serde_json::from_str(&self.metadata)
            .map_err(|err| RepositoryError::Malformed(format!("metadata: {err}")))?;

        Ok(PracticeApplication {
            id: ApplicationId(self.id),
            student_id: StudentId(self.student_id),
            target,
            status,
            coordinator_comments: self.coordinator_comments,
            metadata,
            is_closed: self.is_closed,
            final_average: self.final_average,
            final_result,
            closed_at: self.closed_at.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct DocumentRow {
    id: String,
    practice_application_id: String,
    kind: String,
    status: String,
    grade: Option<f64>,
    weight: f64,
    uploaded_by: String,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            practice_application_id: row.get(1)?,
            kind: row.get(2)?,
            status: row.get(3)?,
            grade: row.get(4)?,
            weight: row.get(5)?,
            uploaded_by: row.get(6)?,
        })
    }

    fn into_domain(self) -> Result<Document, RepositoryError> {
        let kind = DocumentKind::from_label(&self.kind).ok_or_else(|| {
            RepositoryError::Malformed(format!("unknown document kind '{}'", self.kind))
        })?;
        let status = DocumentStatus::from_label(&self.status).ok_or_else(|| {
            RepositoryError::Malformed(format!("unknown document status '{}'", self.status))
        })?;

        Ok(Document {
            id: DocumentId(self.id),
            practice_application_id: ApplicationId(self.practice_application_id),
            kind,
            status,
            grade: self.grade,
            weight: self.weight,
            uploaded_by: self.uploaded_by,
        })
    }
}

/// Fixed-width UTC form so `ORDER BY created_at` sorts chronologically.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| RepositoryError::Malformed(format!("timestamp '{raw}': {err}")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|err| RepositoryError::Malformed(format!("date '{raw}': {err}")))
}

fn constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}

fn storage_error(err: rusqlite::Error) -> RepositoryError {
    if constraint_violation(&err) {
        return RepositoryError::Conflict;
    }
    RepositoryError::Unavailable(err.to_string())
}
