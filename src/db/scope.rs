//! Ownership lookups used by access resolution.
//!
//! Each query reads current rows, so a revoked assignment is visible to the next request.

use rusqlite::OptionalExtension;

use crate::db::{Database, DbError};

/// Where a task sits: its project (via the sprint) and its assignee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskScope {
    pub task_id: i64,
    pub project_id: i64,
    pub assigned_to: Option<i64>,
}

impl Database {
    pub fn is_assigned(&self, project_id: i64, user_id: i64) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM project_assignments WHERE project_id = ? AND employee_id = ?",
                    [project_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn assigned_project_ids(&self, user_id: i64) -> Result<Vec<i64>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT project_id FROM project_assignments WHERE employee_id = ? ORDER BY project_id",
            )?;
            let rows = stmt.query_map([user_id], |row| row.get(0))?;
            rows.collect::<Result<Vec<i64>, _>>().map_err(DbError::from)
        })
    }

    pub fn project_exists(&self, project_id: i64) -> Result<bool, DbError> {
        self.row_exists("SELECT 1 FROM projects WHERE id = ?", project_id)
    }

    pub fn user_exists(&self, user_id: i64) -> Result<bool, DbError> {
        self.row_exists("SELECT 1 FROM users WHERE id = ?", user_id)
    }

    pub fn backlog_item_project(&self, item_id: i64) -> Result<Option<i64>, DbError> {
        self.single_id("SELECT project_id FROM backlog_items WHERE id = ?", item_id)
    }

    pub fn sprint_project(&self, sprint_id: i64) -> Result<Option<i64>, DbError> {
        self.single_id("SELECT project_id FROM sprints WHERE id = ?", sprint_id)
    }

    pub fn chat_log_project(&self, log_id: i64) -> Result<Option<i64>, DbError> {
        self.single_id("SELECT project_id FROM chat_logs WHERE id = ?", log_id)
    }

    pub fn performance_log_owner(&self, log_id: i64) -> Result<Option<i64>, DbError> {
        self.single_id("SELECT user_id FROM performance_logs WHERE id = ?", log_id)
    }

    pub fn task_scope(&self, task_id: i64) -> Result<Option<TaskScope>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                r#"SELECT t.id, s.project_id, t.assigned_to
                   FROM tasks t JOIN sprints s ON s.id = t.sprint_id
                   WHERE t.id = ?"#,
                [task_id],
                |row| {
                    Ok(TaskScope {
                        task_id: row.get(0)?,
                        project_id: row.get(1)?,
                        assigned_to: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(DbError::from)
        })
    }

    fn row_exists(&self, sql: &str, id: i64) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn.query_row(sql, [id], |row| row.get(0)).optional()?;
            Ok(found.is_some())
        })
    }

    fn single_id(&self, sql: &str, id: i64) -> Result<Option<i64>, DbError> {
        self.with_conn(|conn| conn.query_row(sql, [id], |row| row.get(0)).optional().map_err(DbError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::db::test_support::*;

    #[test]
    fn task_scope_follows_sprint_to_project() {
        let db = create_test_db();
        let admin = create_user(&db, "admin@example.com", Role::Admin);
        let employee = create_user(&db, "emp@example.com", Role::Employee);
        let project = create_project(&db, "Alpha", admin.id);
        db.assign_employee(project.id, employee.id).unwrap();
        let sprint = create_sprint(&db, project.id, "S1");
        let task = create_task(&db, sprint.id, "Fix bug", Some(employee.id));

        let scope = db.task_scope(task.id).unwrap().unwrap();
        assert_eq!(scope.project_id, project.id);
        assert_eq!(scope.assigned_to, Some(employee.id));
        assert_eq!(db.sprint_project(sprint.id).unwrap(), Some(project.id));
        assert!(db.task_scope(999).unwrap().is_none());
    }

    #[test]
    fn assignment_lookups_reflect_removal() {
        let db = create_test_db();
        let admin = create_user(&db, "admin@example.com", Role::Admin);
        let employee = create_user(&db, "emp@example.com", Role::Employee);
        let alpha = create_project(&db, "Alpha", admin.id);
        let beta = create_project(&db, "Beta", admin.id);

        db.assign_employee(alpha.id, employee.id).unwrap();
        db.assign_employee(beta.id, employee.id).unwrap();
        assert!(db.is_assigned(alpha.id, employee.id).unwrap());
        assert_eq!(db.assigned_project_ids(employee.id).unwrap(), vec![alpha.id, beta.id]);

        db.remove_member(alpha.id, employee.id).unwrap();
        assert!(!db.is_assigned(alpha.id, employee.id).unwrap());
        assert_eq!(db.assigned_project_ids(employee.id).unwrap(), vec![beta.id]);
    }

    #[test]
    fn existence_checks() {
        let db = create_test_db();
        let admin = create_user(&db, "admin@example.com", Role::Admin);
        let project = create_project(&db, "Alpha", admin.id);

        assert!(db.project_exists(project.id).unwrap());
        assert!(!db.project_exists(project.id + 1).unwrap());
        assert!(db.user_exists(admin.id).unwrap());
        assert_eq!(db.backlog_item_project(1).unwrap(), None);
        assert_eq!(db.performance_log_owner(1).unwrap(), None);
        assert_eq!(db.chat_log_project(1).unwrap(), None);
    }
}
