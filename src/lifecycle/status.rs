//! Task status changes.

use crate::access::{require, Capability, Identity, ResourceKind, ResourceRef};
use crate::db::{Database, Task, TaskStatus};
use crate::error::{Error, Result};

use super::rules::can_transition;

/// Parse client input into a status. Accepts any case and `-` or spaces for `_`.
pub fn parse_status(input: &str) -> Result<TaskStatus> {
    TaskStatus::from_input(input).ok_or_else(|| {
        Error::Validation(format!(
            "Invalid status '{}'. Expected one of TODO, IN_PROGRESS, DONE",
            input.trim()
        ))
    })
}

/// Set a task's status on behalf of `identity`.
///
/// Checks run in order: the status value, then the caller's right to change this task's
/// status, then the write. The status and `updated_at` change in a single statement.
pub fn set_status(db: &Database, identity: &Identity, task_id: i64, new_status: &str) -> Result<Task> {
    let status = parse_status(new_status)?;
    apply_status(db, identity, task_id, status)
}

/// [`set_status`] for an already-typed status.
pub fn apply_status(db: &Database, identity: &Identity, task_id: i64, status: TaskStatus) -> Result<Task> {
    require(
        db,
        identity,
        ResourceKind::Task,
        Some(ResourceRef::Item(task_id)),
        Capability::UpdateStatus,
    )?;

    let current = db.get_task(task_id)?;
    if !can_transition(current.status, status) {
        return Err(Error::Validation(format!(
            "Task {} cannot move from {} to {}",
            task_id, current.status, status
        )));
    }

    let task = db.set_task_status(task_id, status)?;
    tracing::info!(
        "Task {} moved {} -> {} by user {}",
        task_id,
        current.status,
        task.status,
        identity.user_id
    );
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;
    use crate::db::Role;

    fn setup() -> (Database, Identity, Identity, Task) {
        let db = create_test_db();
        let admin = create_user(&db, "admin@example.com", Role::Admin);
        let employee = create_user(&db, "emp@example.com", Role::Employee);
        let project = create_project(&db, "Alpha", admin.id);
        db.assign_employee(project.id, employee.id).unwrap();
        let sprint = create_sprint(&db, project.id, "S1");
        let task = create_task(&db, sprint.id, "Fix bug", Some(employee.id));
        (
            db,
            Identity::new(admin.id, Role::Admin),
            Identity::new(employee.id, Role::Employee),
            task,
        )
    }

    #[test]
    fn assignee_moves_own_task() {
        let (db, _, employee, task) = setup();
        let updated = set_status(&db, &employee, task.id, "in-progress").unwrap();
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert_eq!(db.get_task(task.id).unwrap().status, TaskStatus::InProgress);
    }

    #[test]
    fn any_state_reaches_any_other() {
        let (db, admin, _, task) = setup();
        for status in ["DONE", "TODO", "IN_PROGRESS", "TODO", "DONE"] {
            let updated = set_status(&db, &admin, task.id, status).unwrap();
            assert_eq!(updated.status.as_str(), status);
        }
    }

    #[test]
    fn done_twice_is_idempotent() {
        let (db, _, employee, task) = setup();
        let first = set_status(&db, &employee, task.id, "DONE").unwrap();
        let second = set_status(&db, &employee, task.id, "DONE").unwrap();
        assert_eq!(first.status, TaskStatus::Done);
        assert_eq!(second.status, TaskStatus::Done);
    }

    #[test]
    fn non_assignee_can_read_but_not_move() {
        let (db, admin, _, task) = setup();
        let colleague = create_user(&db, "colleague@example.com", Role::Employee);
        let project_id = db.task_scope(task.id).unwrap().unwrap().project_id;
        db.assign_employee(project_id, colleague.id).unwrap();
        let colleague = Identity::new(colleague.id, Role::Employee);

        assert!(require(&db, &colleague, ResourceKind::Task, Some(ResourceRef::Item(task.id)), Capability::Read).is_ok());
        let result = set_status(&db, &colleague, task.id, "DONE");
        assert!(matches!(result, Err(Error::Forbidden(_))));
        assert_eq!(db.get_task(task.id).unwrap().status, TaskStatus::Todo);

        set_status(&db, &admin, task.id, "DONE").unwrap();
    }

    #[test]
    fn invalid_status_is_validation_before_lookup() {
        let (db, _, employee, _) = setup();
        let result = set_status(&db, &employee, 9999, "blocked");
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn missing_task_is_not_found() {
        let (db, admin, _, _) = setup();
        let result = set_status(&db, &admin, 9999, "DONE");
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
