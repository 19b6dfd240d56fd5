use crate::db::{format_date, next_timestamp, parse_date, parse_datetime, Database, DbError};
use crate::db::models::{
    BulkAssignment, CreateProject, Project, ProjectAssignment, ProjectMember, Role, UpdateProject, User,
};

const PROJECT_COLUMNS: &str =
    "id, name, description, created_by, start_date, end_date, created_at, updated_at";

impl Database {
    pub fn create_project(&self, input: &CreateProject) -> Result<Project, DbError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DbError::Validation("Project name cannot be empty".to_string()));
        }
        let description = input.description.as_deref().map(str::trim).filter(|d| !d.is_empty());

        self.with_conn(|conn| {
            let now = chrono::Utc::now();
            conn.execute(
                r#"INSERT INTO projects
                   (name, description, created_by, start_date, end_date, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?)"#,
                rusqlite::params![
                    name,
                    description,
                    input.created_by,
                    format_date(input.start_date),
                    format_date(input.end_date),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| DbError::constraint(e, "Project creator does not exist"))?;

            let id = conn.last_insert_rowid();
            tracing::info!("Created project {} ({})", id, name);

            Ok(Project {
                id,
                name: name.to_string(),
                description: description.map(String::from),
                created_by: input.created_by,
                start_date: input.start_date,
                end_date: input.end_date,
                created_at: now,
                updated_at: now,
            })
        })
    }

    pub fn get_projects(&self) -> Result<Vec<Project>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM projects ORDER BY id", PROJECT_COLUMNS))?;
            let rows = stmt.query_map([], Self::map_project_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }

    pub fn get_project(&self, project_id: i64) -> Result<Project, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS),
                [project_id],
                Self::map_project_row,
            )
            .map_err(|e| DbError::not_found_or(e, format!("Project {}", project_id)))
        })
    }

    pub fn update_project(&self, project_id: i64, input: &UpdateProject) -> Result<Project, DbError> {
        if let Some(name) = &input.name {
            if name.trim().is_empty() {
                return Err(DbError::Validation("Project name cannot be empty".to_string()));
            }
        }

        let existing = self.get_project(project_id)?;
        let updated = Project {
            name: input.name.as_deref().map(str::trim).map(String::from).unwrap_or(existing.name.clone()),
            description: match &input.description {
                Some(d) if d.trim().is_empty() => None,
                Some(d) => Some(d.trim().to_string()),
                None => existing.description.clone(),
            },
            start_date: input.start_date.or(existing.start_date),
            end_date: input.end_date.or(existing.end_date),
            updated_at: next_timestamp(existing.updated_at),
            ..existing
        };

        self.with_conn(|conn| {
            conn.execute(
                r#"UPDATE projects
                   SET name = ?, description = ?, start_date = ?, end_date = ?, updated_at = ?
                   WHERE id = ?"#,
                rusqlite::params![
                    updated.name,
                    updated.description,
                    format_date(updated.start_date),
                    format_date(updated.end_date),
                    updated.updated_at.to_rfc3339(),
                    project_id,
                ],
            )?;
            Ok(updated)
        })
    }

    /// Delete a project; sprints, tasks, backlog, assignments and chat cascade.
    pub fn delete_project(&self, project_id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM projects WHERE id = ?", [project_id])?;
            if affected == 0 {
                return Err(DbError::NotFound(format!("Project {}", project_id)));
            }
            tracing::info!("Deleted project {}", project_id);
            Ok(())
        })
    }

    /// Grant an employee visibility into a project.
    pub fn assign_employee(&self, project_id: i64, employee_id: i64) -> Result<ProjectAssignment, DbError> {
        let employee = self.get_user(employee_id)?;
        if employee.role != Role::Employee {
            return Err(DbError::Validation(format!(
                "User {} is not an employee",
                employee_id
            )));
        }

        self.with_conn(|conn| {
            let now = chrono::Utc::now();
            conn.execute(
                "INSERT INTO project_assignments (project_id, employee_id, created_at) VALUES (?, ?, ?)",
                rusqlite::params![project_id, employee_id, now.to_rfc3339()],
            )
            .map_err(|e| {
                if DbError::is_foreign_key_violation(&e) {
                    DbError::NotFound(format!("Project {}", project_id))
                } else {
                    DbError::constraint(e, "Employee is already assigned to this project")
                }
            })?;

            let id = conn.last_insert_rowid();
            tracing::info!("Assigned employee {} to project {}", employee_id, project_id);

            Ok(ProjectAssignment {
                id,
                project_id,
                employee_id,
                created_at: now,
            })
        })
    }

    /// Assign several employees at once.
    ///
    /// Ids that are already assigned, missing, or not employees are skipped with a reason. The
    /// call fails only when none of them could be assigned.
    pub fn assign_employees(&self, project_id: i64, employee_ids: &[i64]) -> Result<BulkAssignment, DbError> {
        if employee_ids.is_empty() {
            return Err(DbError::Validation("employeeIds must not be empty".to_string()));
        }
        self.get_project(project_id)?;

        let mut result = BulkAssignment::default();
        for &employee_id in employee_ids {
            match self.assign_employee(project_id, employee_id) {
                Ok(assignment) => result.assignments.push(assignment),
                Err(e @ (DbError::NotFound(_) | DbError::Validation(_) | DbError::Conflict(_))) => {
                    result.skipped.push(format!("Employee {}: {}", employee_id, e));
                }
                Err(e) => return Err(e),
            }
        }

        if result.assignments.is_empty() {
            return Err(DbError::Validation(result.skipped.join("; ")));
        }
        Ok(result)
    }

    /// Revoke an assignment. Takes effect on the next access check.
    pub fn remove_member(&self, project_id: i64, employee_id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM project_assignments WHERE project_id = ? AND employee_id = ?",
                rusqlite::params![project_id, employee_id],
            )?;
            if affected == 0 {
                return Err(DbError::NotFound("Assignment".to_string()));
            }
            tracing::info!("Removed employee {} from project {}", employee_id, project_id);
            Ok(())
        })
    }

    pub fn get_members(&self, project_id: i64) -> Result<Vec<ProjectMember>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT a.id, a.project_id, u.id, u.full_name, u.email, u.role, u.created_at, u.updated_at
                   FROM project_assignments a
                   JOIN users u ON u.id = a.employee_id
                   WHERE a.project_id = ?
                   ORDER BY a.id"#,
            )?;

            let rows = stmt.query_map([project_id], |row| {
                let role_str: String = row.get(5)?;
                Ok(ProjectMember {
                    assignment_id: row.get(0)?,
                    project_id: row.get(1)?,
                    user: User {
                        id: row.get(2)?,
                        full_name: row.get(3)?,
                        email: row.get(4)?,
                        role: Role::parse(&role_str).unwrap_or(Role::Employee),
                        created_at: parse_datetime(row.get(6)?),
                        updated_at: parse_datetime(row.get(7)?),
                    },
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }

    fn map_project_row(row: &rusqlite::Row) -> rusqlite::Result<Project> {
        Ok(Project {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            created_by: row.get(3)?,
            start_date: parse_date(row.get(4)?),
            end_date: parse_date(row.get(5)?),
            created_at: parse_datetime(row.get(6)?),
            updated_at: parse_datetime(row.get(7)?),
        })
    }
}
