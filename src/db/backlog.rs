use crate::db::{parse_datetime, Database, DbError};
use crate::db::models::{BacklogItem, CreateBacklogItem, UpdateBacklogItem};

const BACKLOG_COLUMNS: &str = "id, project_id, title, description, priority, created_at";

impl Database {
    pub fn create_backlog_item(&self, input: &CreateBacklogItem) -> Result<BacklogItem, DbError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(DbError::Validation("Title cannot be empty".to_string()));
        }
        let description = input.description.as_deref().map(str::trim).filter(|d| !d.is_empty());

        self.with_conn(|conn| {
            let now = chrono::Utc::now();
            conn.execute(
                r#"INSERT INTO backlog_items (project_id, title, description, priority, created_at)
                   VALUES (?, ?, ?, ?, ?)"#,
                rusqlite::params![input.project_id, title, description, input.priority, now.to_rfc3339()],
            )
            .map_err(|e| DbError::constraint(e, "Project does not exist"))?;

            Ok(BacklogItem {
                id: conn.last_insert_rowid(),
                project_id: input.project_id,
                title: title.to_string(),
                description: description.map(String::from),
                priority: input.priority,
                created_at: now,
            })
        })
    }

    /// Backlog of a project, lowest priority value first.
    pub fn get_backlog(&self, project_id: i64) -> Result<Vec<BacklogItem>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM backlog_items WHERE project_id = ? ORDER BY priority, id",
                BACKLOG_COLUMNS
            ))?;
            let rows = stmt.query_map([project_id], Self::map_backlog_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }

    pub fn get_backlog_item(&self, item_id: i64) -> Result<BacklogItem, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM backlog_items WHERE id = ?", BACKLOG_COLUMNS),
                [item_id],
                Self::map_backlog_row,
            )
            .map_err(|e| DbError::not_found_or(e, format!("Backlog item {}", item_id)))
        })
    }

    pub fn update_backlog_item(&self, item_id: i64, input: &UpdateBacklogItem) -> Result<BacklogItem, DbError> {
        if let Some(title) = &input.title {
            if title.trim().is_empty() {
                return Err(DbError::Validation("Title cannot be empty".to_string()));
            }
        }

        let existing = self.get_backlog_item(item_id)?;
        let updated = BacklogItem {
            title: input.title.as_deref().map(str::trim).map(String::from).unwrap_or(existing.title.clone()),
            description: match &input.description {
                Some(d) if d.trim().is_empty() => None,
                Some(d) => Some(d.trim().to_string()),
                None => existing.description.clone(),
            },
            priority: input.priority.unwrap_or(existing.priority),
            ..existing
        };

        self.with_conn(|conn| {
            conn.execute(
                "UPDATE backlog_items SET title = ?, description = ?, priority = ? WHERE id = ?",
                rusqlite::params![updated.title, updated.description, updated.priority, item_id],
            )?;
            Ok(updated)
        })
    }

    pub fn delete_backlog_item(&self, item_id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM backlog_items WHERE id = ?", [item_id])?;
            if affected == 0 {
                return Err(DbError::NotFound(format!("Backlog item {}", item_id)));
            }
            Ok(())
        })
    }

    fn map_backlog_row(row: &rusqlite::Row) -> rusqlite::Result<BacklogItem> {
        Ok(BacklogItem {
            id: row.get(0)?,
            project_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            priority: row.get(4)?,
            created_at: parse_datetime(row.get(5)?),
        })
    }
}
