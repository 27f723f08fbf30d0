//! SQLite-backed job run store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::transform::{TransformJob, TransformReport};

use super::store::{JobError, JobFilter, JobStore};
use super::types::{JobKind, JobRun, JobStatus};

/// SQLite-backed job run store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = Connection::open(path).map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory().map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS job_runs (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                job TEXT NOT NULL,
                report TEXT,
                error TEXT,
                started_at TEXT NOT NULL,
                finished_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_job_runs_kind ON job_runs(kind);
            CREATE INDEX IF NOT EXISTS idx_job_runs_status ON job_runs(status);
            CREATE INDEX IF NOT EXISTS idx_job_runs_started_at ON job_runs(started_at);
            "#,
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(kind) = filter.kind {
            conditions.push("kind = ?");
            params.push(Box::new(kind.as_str().to_string()));
        }

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str().to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<JobRun> {
        let id: String = row.get(0)?;
        let kind_str: String = row.get(1)?;
        let status_str: String = row.get(2)?;
        let job_json: String = row.get(3)?;
        let report_json: Option<String> = row.get(4)?;
        let error: Option<String> = row.get(5)?;
        let started_at_str: String = row.get(6)?;
        let finished_at_str: Option<String> = row.get(7)?;

        let parse_dt = |s: &str| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now())
        };

        let kind = match kind_str.as_str() {
            "aggregate" => JobKind::Aggregate,
            _ => JobKind::Clean,
        };
        let status = match status_str.as_str() {
            "running" => JobStatus::Running,
            "succeeded" => JobStatus::Succeeded,
            "stopped" => JobStatus::Stopped,
            _ => JobStatus::Failed,
        };
        let job: TransformJob = serde_json::from_str(&job_json)
            .unwrap_or_else(|_| TransformJob::new("", ""));
        let report: Option<TransformReport> =
            report_json.and_then(|json| serde_json::from_str(&json).ok());

        Ok(JobRun {
            id,
            kind,
            status,
            job,
            started_at: parse_dt(&started_at_str),
            finished_at: finished_at_str.as_deref().map(parse_dt),
            report,
            error,
        })
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, kind: JobKind, job: TransformJob) -> Result<JobRun, JobError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let job_json =
            serde_json::to_string(&job).map_err(|e| JobError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO job_runs (id, kind, status, job, started_at) VALUES (?, ?, ?, ?, ?)",
            params![
                id,
                kind.as_str(),
                JobStatus::Running.as_str(),
                job_json,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(JobRun {
            id,
            kind,
            status: JobStatus::Running,
            job,
            started_at: now,
            finished_at: None,
            report: None,
            error: None,
        })
    }

    fn get(&self, id: &str) -> Result<Option<JobRun>, JobError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            "SELECT id, kind, status, job, report, error, started_at, finished_at FROM job_runs WHERE id = ?",
            params![id],
            Self::row_to_run,
        );

        match result {
            Ok(run) => Ok(Some(run)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(JobError::Database(e.to_string())),
        }
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<JobRun>, JobError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT id, kind, status, job, report, error, started_at, finished_at FROM job_runs {} ORDER BY started_at DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_run)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut runs = Vec::new();
        for row_result in rows {
            runs.push(row_result.map_err(|e| JobError::Database(e.to_string()))?);
        }

        Ok(runs)
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM job_runs {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| JobError::Database(e.to_string()))
    }

    fn finish(
        &self,
        id: &str,
        status: JobStatus,
        report: Option<TransformReport>,
        error: Option<String>,
    ) -> Result<JobRun, JobError> {
        let report_json = report
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| JobError::Database(e.to_string()))?;

        {
            let conn = self.conn.lock().unwrap();
            let updated = conn
                .execute(
                    "UPDATE job_runs SET status = ?, report = ?, error = ?, finished_at = ? WHERE id = ?",
                    params![
                        status.as_str(),
                        report_json,
                        error,
                        Utc::now().to_rfc3339(),
                        id,
                    ],
                )
                .map_err(|e| JobError::Database(e.to_string()))?;

            if updated == 0 {
                return Err(JobError::NotFound(id.to_string()));
            }
        }

        self.get(id)?
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }
}
