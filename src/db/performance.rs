use crate::db::{format_date, parse_date, Database, DbError};
use crate::db::models::{CreatePerformanceLog, PerformanceLog};

const PERFORMANCE_COLUMNS: &str =
    "p.id, p.user_id, p.task_id, p.accuracy_score, p.progress_percent, p.log_date";

impl Database {
    pub fn create_performance_log(&self, input: &CreatePerformanceLog) -> Result<PerformanceLog, DbError> {
        if let Some(progress) = input.progress_percent {
            if !(0.0..=100.0).contains(&progress) {
                return Err(DbError::Validation("progressPercent must be between 0 and 100".to_string()));
            }
        }
        let log_date = input.log_date.unwrap_or_else(|| chrono::Utc::now().date_naive());

        self.with_conn(|conn| {
            conn.execute(
                r#"INSERT INTO performance_logs (user_id, task_id, accuracy_score, progress_percent, log_date)
                   VALUES (?, ?, ?, ?, ?)"#,
                rusqlite::params![
                    input.user_id,
                    input.task_id,
                    input.accuracy_score,
                    input.progress_percent,
                    format_date(Some(log_date)),
                ],
            )
            .map_err(|e| DbError::constraint(e, "User or task does not exist"))?;

            Ok(PerformanceLog {
                id: conn.last_insert_rowid(),
                user_id: input.user_id,
                task_id: input.task_id,
                accuracy_score: input.accuracy_score,
                progress_percent: input.progress_percent,
                log_date,
            })
        })
    }

    pub fn get_performance_log(&self, log_id: i64) -> Result<PerformanceLog, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM performance_logs p WHERE p.id = ?", PERFORMANCE_COLUMNS),
                [log_id],
                Self::map_performance_row,
            )
            .map_err(|e| DbError::not_found_or(e, format!("Performance log {}", log_id)))
        })
    }

    pub fn get_performance_for_user(&self, user_id: i64) -> Result<Vec<PerformanceLog>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM performance_logs p WHERE p.user_id = ? ORDER BY p.log_date, p.id",
                PERFORMANCE_COLUMNS
            ))?;
            let rows = stmt.query_map([user_id], Self::map_performance_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }

    /// Logs for every task in every sprint of a project.
    pub fn get_performance_for_project(&self, project_id: i64) -> Result<Vec<PerformanceLog>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                r#"SELECT {} FROM performance_logs p
                   JOIN tasks t ON t.id = p.task_id
                   JOIN sprints s ON s.id = t.sprint_id
                   WHERE s.project_id = ?
                   ORDER BY p.log_date, p.id"#,
                PERFORMANCE_COLUMNS
            ))?;
            let rows = stmt.query_map([project_id], Self::map_performance_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }

    fn map_performance_row(row: &rusqlite::Row) -> rusqlite::Result<PerformanceLog> {
        Ok(PerformanceLog {
            id: row.get(0)?,
            user_id: row.get(1)?,
            task_id: row.get(2)?,
            accuracy_score: row.get(3)?,
            progress_percent: row.get(4)?,
            log_date: parse_date(row.get(5)?).unwrap_or_else(|| chrono::Utc::now().date_naive()),
        })
    }
}
