use crate::db::{format_date, parse_date, parse_datetime, Database, DbError};
use crate::db::models::{CreateSprint, Sprint, SprintStatus, UpdateSprint};

const SPRINT_COLUMNS: &str = "id, project_id, name, start_date, end_date, status, created_at";

impl Database {
    pub fn create_sprint(&self, input: &CreateSprint) -> Result<Sprint, DbError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DbError::Validation("Sprint name cannot be empty".to_string()));
        }

        self.with_conn(|conn| {
            let now = chrono::Utc::now();
            conn.execute(
                r#"INSERT INTO sprints (project_id, name, start_date, end_date, status, created_at)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
                rusqlite::params![
                    input.project_id,
                    name,
                    format_date(input.start_date),
                    format_date(input.end_date),
                    input.status.as_str(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| DbError::constraint(e, "Project does not exist"))?;

            let id = conn.last_insert_rowid();
            tracing::info!("Created sprint {} in project {}", id, input.project_id);

            Ok(Sprint {
                id,
                project_id: input.project_id,
                name: name.to_string(),
                start_date: input.start_date,
                end_date: input.end_date,
                status: input.status,
                created_at: now,
            })
        })
    }

    pub fn get_sprints(&self, project_id: i64) -> Result<Vec<Sprint>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM sprints WHERE project_id = ? ORDER BY id",
                SPRINT_COLUMNS
            ))?;
            let rows = stmt.query_map([project_id], Self::map_sprint_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }

    pub fn get_sprint(&self, sprint_id: i64) -> Result<Sprint, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM sprints WHERE id = ?", SPRINT_COLUMNS),
                [sprint_id],
                Self::map_sprint_row,
            )
            .map_err(|e| DbError::not_found_or(e, format!("Sprint {}", sprint_id)))
        })
    }

    /// Edit a sprint. Any status may follow any other.
    pub fn update_sprint(&self, sprint_id: i64, input: &UpdateSprint) -> Result<Sprint, DbError> {
        if let Some(name) = &input.name {
            if name.trim().is_empty() {
                return Err(DbError::Validation("Sprint name cannot be empty".to_string()));
            }
        }

        let existing = self.get_sprint(sprint_id)?;
        let updated = Sprint {
            name: input.name.as_deref().map(str::trim).map(String::from).unwrap_or(existing.name.clone()),
            start_date: input.start_date.or(existing.start_date),
            end_date: input.end_date.or(existing.end_date),
            status: input.status.unwrap_or(existing.status),
            ..existing
        };

        self.with_conn(|conn| {
            conn.execute(
                "UPDATE sprints SET name = ?, start_date = ?, end_date = ?, status = ? WHERE id = ?",
                rusqlite::params![
                    updated.name,
                    format_date(updated.start_date),
                    format_date(updated.end_date),
                    updated.status.as_str(),
                    sprint_id,
                ],
            )?;
            Ok(updated)
        })
    }

    pub fn delete_sprint(&self, sprint_id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM sprints WHERE id = ?", [sprint_id])?;
            if affected == 0 {
                return Err(DbError::NotFound(format!("Sprint {}", sprint_id)));
            }
            tracing::info!("Deleted sprint {}", sprint_id);
            Ok(())
        })
    }

    fn map_sprint_row(row: &rusqlite::Row) -> rusqlite::Result<Sprint> {
        let status_str: String = row.get(5)?;
        Ok(Sprint {
            id: row.get(0)?,
            project_id: row.get(1)?,
            name: row.get(2)?,
            start_date: parse_date(row.get(3)?),
            end_date: parse_date(row.get(4)?),
            status: SprintStatus::parse(&status_str).unwrap_or_default(),
            created_at: parse_datetime(row.get(6)?),
        })
    }
}
