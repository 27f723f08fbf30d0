//! SQLite-backed execution store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::store::{ExecutionError, ExecutionFilter, ExecutionStore};
use super::types::{Execution, ExecutionState};

/// SQLite-backed execution store.
pub struct SqliteExecutionStore {
    conn: Mutex<Connection>,
}

impl SqliteExecutionStore {
    /// Create a new store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, ExecutionError> {
        let conn = Connection::open(path).map_err(|e| ExecutionError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, ExecutionError> {
        let conn =
            Connection::open_in_memory().map_err(|e| ExecutionError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), ExecutionError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_executions_created_at ON executions(created_at);
            "#,
        )
        .map_err(|e| ExecutionError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &ExecutionFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref state) = filter.state {
            // The state type lives inside the state JSON.
            conditions.push("json_extract(state, '$.type') = ?");
            params.push(Box::new(state.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_execution(row: &rusqlite::Row) -> rusqlite::Result<Execution> {
        let id: String = row.get(0)?;
        let state_json: String = row.get(1)?;
        let created_at_str: String = row.get(2)?;
        let updated_at_str: String = row.get(3)?;

        let parse_dt = |s: &str| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now())
        };

        let state: ExecutionState = serde_json::from_str(&state_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Execution {
            id,
            state,
            created_at: parse_dt(&created_at_str),
            updated_at: parse_dt(&updated_at_str),
        })
    }
}

impl ExecutionStore for SqliteExecutionStore {
    fn create(&self) -> Result<Execution, ExecutionError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let state = ExecutionState::initial();

        let state_json =
            serde_json::to_string(&state).map_err(|e| ExecutionError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO executions (id, state, created_at, updated_at) VALUES (?, ?, ?, ?)",
            params![id, state_json, now.to_rfc3339(), now.to_rfc3339()],
        )
        .map_err(|e| ExecutionError::Database(e.to_string()))?;

        Ok(Execution {
            id,
            state,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Execution>, ExecutionError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            "SELECT id, state, created_at, updated_at FROM executions WHERE id = ?",
            params![id],
            Self::row_to_execution,
        );

        match result {
            Ok(execution) => Ok(Some(execution)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ExecutionError::Database(e.to_string())),
        }
    }

    fn list(&self, filter: &ExecutionFilter) -> Result<Vec<Execution>, ExecutionError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT id, state, created_at, updated_at FROM executions {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ExecutionError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_execution)
            .map_err(|e| ExecutionError::Database(e.to_string()))?;

        let mut executions = Vec::new();
        for row_result in rows {
            executions.push(row_result.map_err(|e| ExecutionError::Database(e.to_string()))?);
        }

        Ok(executions)
    }

    fn count(&self, filter: &ExecutionFilter) -> Result<i64, ExecutionError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM executions {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| ExecutionError::Database(e.to_string()))
    }

    fn update_state(
        &self,
        id: &str,
        new_state: ExecutionState,
    ) -> Result<Execution, ExecutionError> {
        let state_json = serde_json::to_string(&new_state)
            .map_err(|e| ExecutionError::Database(e.to_string()))?;

        {
            let conn = self.conn.lock().unwrap();
            let updated = conn
                .execute(
                    "UPDATE executions SET state = ?, updated_at = ? WHERE id = ?",
                    params![state_json, Utc::now().to_rfc3339(), id],
                )
                .map_err(|e| ExecutionError::Database(e.to_string()))?;

            if updated == 0 {
                return Err(ExecutionError::NotFound(id.to_string()));
            }
        }

        self.get(id)?
            .ok_or_else(|| ExecutionError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_starts_in_train_state() {
        let store = SqliteExecutionStore::in_memory().unwrap();

        let execution = store.create().unwrap();
        assert_eq!(execution.state.state_type(), "train");
        assert!(!execution.state.is_terminal());

        let fetched = store.get(&execution.id).unwrap().unwrap();
        assert_eq!(fetched.id, execution.id);
        assert_eq!(fetched.state.state_type(), "train");
    }

    #[test]
    fn test_update_state() {
        let store = SqliteExecutionStore::in_memory().unwrap();

        let execution = store.create().unwrap();
        let updated = store
            .update_state(
                &execution.id,
                ExecutionState::RegisterModel {
                    artifact_location: "model-artifacts/x/".to_string(),
                },
            )
            .unwrap();

        assert_eq!(updated.state.state_type(), "register_model");
        assert!(updated.updated_at >= execution.updated_at);
    }

    #[test]
    fn test_update_missing_execution() {
        let store = SqliteExecutionStore::in_memory().unwrap();
        let result = store.update_state("nope", ExecutionState::initial());
        assert!(matches!(result, Err(ExecutionError::NotFound(_))));
    }

    #[test]
    fn test_list_filters_by_state_type() {
        let store = SqliteExecutionStore::in_memory().unwrap();

        let first = store.create().unwrap();
        store.create().unwrap();
        store
            .update_state(
                &first.id,
                ExecutionState::Failed {
                    at_step: "train".to_string(),
                    error: "boom".to_string(),
                    failed_at: Utc::now(),
                },
            )
            .unwrap();

        let failed = store
            .list(&ExecutionFilter::new().with_state("failed"))
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, first.id);

        let training = store
            .count(&ExecutionFilter::new().with_state("train"))
            .unwrap();
        assert_eq!(training, 1);
    }
}
