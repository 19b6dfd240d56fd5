//! Task database operations

use rusqlite::Connection;

use crate::db::{next_timestamp, parse_datetime, Database, DbError};
use crate::db::models::{CreateTask, Task, TaskStatus, UpdateTask};

const TASK_COLUMNS: &str =
    "t.id, t.sprint_id, t.assigned_to, t.title, t.description, t.status, t.created_at, t.updated_at";

impl Database {
    /// Create a new task in a sprint
    pub fn create_task(&self, task: &CreateTask) -> Result<Task, DbError> {
        let title = task.title.trim();
        if title.is_empty() {
            return Err(DbError::Validation("Title cannot be empty".to_string()));
        }
        let description = task.description.as_deref().map(str::trim).filter(|d| !d.is_empty());

        self.with_conn(|conn| {
            if let Some(assignee) = task.assigned_to {
                Self::check_assignee(conn, task.sprint_id, assignee)?;
            }

            let now = chrono::Utc::now();
            conn.execute(
                r#"INSERT INTO tasks
                   (sprint_id, assigned_to, title, description, status, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?)"#,
                rusqlite::params![
                    task.sprint_id,
                    task.assigned_to,
                    title,
                    description,
                    task.status.as_str(),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| DbError::constraint(e, "Sprint or assignee does not exist"))?;

            let id = conn.last_insert_rowid();
            tracing::info!("Created task {} in sprint {}", id, task.sprint_id);

            Ok(Task {
                id,
                sprint_id: task.sprint_id,
                assigned_to: task.assigned_to,
                title: title.to_string(),
                description: description.map(String::from),
                status: task.status,
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Get a task by ID
    pub fn get_task(&self, task_id: i64) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM tasks t WHERE t.id = ?", TASK_COLUMNS),
                [task_id],
                Self::map_task_row,
            )
            .map_err(|e| DbError::not_found_or(e, format!("Task {}", task_id)))
        })
    }

    /// Get all tasks for a sprint, ordered by id
    pub fn get_tasks_for_sprint(&self, sprint_id: i64) -> Result<Vec<Task>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks t WHERE t.sprint_id = ? ORDER BY t.id",
                TASK_COLUMNS
            ))?;
            let rows = stmt.query_map([sprint_id], Self::map_task_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }

    /// Get tasks across projects. `None` means every project.
    pub fn get_tasks(&self, project_ids: Option<&[i64]>) -> Result<Vec<Task>, DbError> {
        self.with_conn(|conn| match project_ids {
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tasks t ORDER BY t.id",
                    TASK_COLUMNS
                ))?;
                let rows = stmt.query_map([], Self::map_task_row)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
            }
            Some([]) => Ok(Vec::new()),
            Some(ids) => {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {} FROM tasks t
                       JOIN sprints s ON s.id = t.sprint_id
                       WHERE s.project_id IN ({})
                       ORDER BY t.id"#,
                    TASK_COLUMNS, placeholders
                ))?;
                let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), Self::map_task_row)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
            }
        })
    }

    /// Update task content (title, description, assignee). Status is not touched here.
    pub fn update_task(&self, task_id: i64, updates: &UpdateTask) -> Result<Task, DbError> {
        if let Some(title) = &updates.title {
            if title.trim().is_empty() {
                return Err(DbError::Validation("Title cannot be empty".to_string()));
            }
        }

        let existing = self.get_task(task_id)?;
        let updated = Task {
            title: updates.title.as_deref().map(str::trim).map(String::from).unwrap_or(existing.title.clone()),
            description: match &updates.description {
                Some(d) if d.trim().is_empty() => None,
                Some(d) => Some(d.trim().to_string()),
                None => existing.description.clone(),
            },
            assigned_to: updates.assigned_to.or(existing.assigned_to),
            updated_at: next_timestamp(existing.updated_at),
            ..existing
        };

        self.with_conn(|conn| {
            if let Some(assignee) = updates.assigned_to {
                Self::check_assignee(conn, existing.sprint_id, assignee)?;
            }

            conn.execute(
                r#"UPDATE tasks
                   SET title = ?, description = ?, assigned_to = ?, updated_at = ?
                   WHERE id = ?"#,
                rusqlite::params![
                    updated.title,
                    updated.description,
                    updated.assigned_to,
                    updated.updated_at.to_rfc3339(),
                    task_id,
                ],
            )
            .map_err(|e| DbError::constraint(e, "Assignee does not exist"))?;
            Ok(updated)
        })
    }

    /// Write a task's status together with its `updated_at` bump in one statement.
    ///
    /// The connection lock is held across the write and the re-read, so callers never observe a
    /// status without its matching timestamp. Concurrent writers are last-writer-wins.
    pub fn set_task_status(&self, task_id: i64, status: TaskStatus) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            let now = chrono::Utc::now().to_rfc3339();
            let affected = conn.execute(
                "UPDATE tasks SET status = ?, updated_at = MAX(updated_at, ?) WHERE id = ?",
                rusqlite::params![status.as_str(), now, task_id],
            )?;

            if affected == 0 {
                return Err(DbError::NotFound(format!("Task {}", task_id)));
            }

            conn.query_row(
                &format!("SELECT {} FROM tasks t WHERE t.id = ?", TASK_COLUMNS),
                [task_id],
                Self::map_task_row,
            )
            .map_err(DbError::Sqlite)
        })
    }

    /// Delete a task
    pub fn delete_task(&self, task_id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM tasks WHERE id = ?", [task_id])?;

            if affected == 0 {
                return Err(DbError::NotFound(format!("Task {}", task_id)));
            }
            Ok(())
        })
    }

    /// An assignee must be an EMPLOYEE assigned to the sprint's project.
    fn check_assignee(conn: &Connection, sprint_id: i64, assignee: i64) -> Result<(), DbError> {
        let eligible: bool = conn.query_row(
            r#"SELECT EXISTS(
                   SELECT 1 FROM sprints s
                   JOIN project_assignments a ON a.project_id = s.project_id
                   JOIN users u ON u.id = a.employee_id
                   WHERE s.id = ? AND u.id = ? AND u.role = 'EMPLOYEE'
               )"#,
            rusqlite::params![sprint_id, assignee],
            |row| row.get(0),
        )?;

        if !eligible {
            return Err(DbError::Validation(format!(
                "User {} is not an employee assigned to this task's project",
                assignee
            )));
        }
        Ok(())
    }

    fn map_task_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let status_str: String = row.get(5)?;
        let status = TaskStatus::parse(&status_str).unwrap_or_default();

        Ok(Task {
            id: row.get(0)?,
            sprint_id: row.get(1)?,
            assigned_to: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            status,
            created_at: parse_datetime(row.get(6)?),
            updated_at: parse_datetime(row.get(7)?),
        })
    }
}
