use serde::Serialize;

use crate::access::{require, Capability, Identity, ResourceKind, ResourceRef};
use crate::db::{ChatLog, CreateChatLog, Database, SenderType, Task, TaskStatus};
use crate::error::{Error, Result};
use crate::lifecycle::apply_status;

use super::parser::{parse, ChatSignal, Intent};

pub const DEFAULT_CHAT_LIMIT: usize = 100;
pub const MAX_CHAT_LIMIT: usize = 500;

/// What a chat turn did to the task it mentioned, if anything.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ChatOutcome {
    Applied { task: Task, previous: TaskStatus },
    Acknowledged { task_id: i64, signal: ChatSignal },
    Unauthorized { task_id: i64, status: TaskStatus },
    Failed { task_id: Option<i64>, reason: String },
    NoIntent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatExchange {
    pub user_entry: ChatLog,
    pub bot_entry: ChatLog,
    pub outcome: ChatOutcome,
}

/// Handle one chat message posted to a project.
///
/// Access is checked before anything is written. Once the user's message is stored, problems
/// with the intent or the transition are described in the bot's reply instead of being
/// returned, and the user's entry is never removed.
pub fn handle_incoming(
    db: &Database,
    identity: &Identity,
    project_id: i64,
    message: &str,
) -> Result<ChatExchange> {
    require(
        db,
        identity,
        ResourceKind::ChatLog,
        Some(ResourceRef::InProject(project_id)),
        Capability::Append,
    )?;

    let message = message.trim();
    if message.is_empty() {
        return Err(Error::Validation("message is required".to_string()));
    }

    let user_entry = db.append_chat_log(&CreateChatLog {
        user_id: identity.user_id,
        project_id,
        sender_type: SenderType::User,
        message: message.to_string(),
    })?;

    let outcome = match parse(message, project_id, db) {
        Ok(intent) => act_on(db, identity, intent),
        Err(err) => {
            tracing::warn!("Could not read intent of chat message {}: {}", user_entry.id, err);
            ChatOutcome::Failed { task_id: None, reason: err.to_string() }
        }
    };

    let bot_entry = db.append_chat_log(&CreateChatLog {
        user_id: identity.user_id,
        project_id,
        sender_type: SenderType::AiBot,
        message: compose_reply(&outcome),
    })?;

    Ok(ChatExchange { user_entry, bot_entry, outcome })
}

fn act_on(db: &Database, identity: &Identity, intent: Intent) -> ChatOutcome {
    match intent {
        Intent::NoMatch => ChatOutcome::NoIntent,
        Intent::Acknowledged { task_id, signal } => {
            tracing::info!("User {} reported task {} as {:?}", identity.user_id, task_id, signal);
            ChatOutcome::Acknowledged { task_id, signal }
        }
        Intent::StatusTransition { task_id, status } => {
            let previous = db.get_task(task_id).map(|t| t.status).unwrap_or_default();
            match apply_status(db, identity, task_id, status) {
                Ok(task) => ChatOutcome::Applied { task, previous },
                Err(Error::Forbidden(_)) => ChatOutcome::Unauthorized { task_id, status },
                Err(err) => {
                    tracing::warn!("Chat transition of task {} to {} failed: {}", task_id, status, err);
                    ChatOutcome::Failed { task_id: Some(task_id), reason: err.to_string() }
                }
            }
        }
    }
}

/// Deterministic bot reply for an outcome.
pub fn compose_reply(outcome: &ChatOutcome) -> String {
    match outcome {
        ChatOutcome::Applied { task, .. } if task.status == TaskStatus::Done => format!(
            "Great work! Task {} \"{}\" is now marked as DONE.",
            task.id, task.title
        ),
        ChatOutcome::Applied { task, .. } => format!(
            "Got it. Task {} \"{}\" is now {}.",
            task.id, task.title, task.status
        ),
        ChatOutcome::Acknowledged { task_id, .. } => format!(
            "I've noted that task {} is blocked. Its status is unchanged; raise it with your project admin if you need help.",
            task_id
        ),
        ChatOutcome::Unauthorized { task_id, status } => format!(
            "I can't move task {} to {}: only its assignee, while a member of this project, can change its status. Its status is unchanged.",
            task_id, status
        ),
        ChatOutcome::Failed { task_id: Some(task_id), reason } => {
            format!("I couldn't update task {}: {}", task_id, reason)
        }
        ChatOutcome::Failed { task_id: None, reason } => {
            format!("I couldn't process that message: {}", reason)
        }
        ChatOutcome::NoIntent => "Thanks for the update. You can say 'task 5 is done' or 'I started task 5' and I'll update the task for you.".to_string(),
    }
}

/// A project's chat history, oldest first. `limit` defaults to 100 and is capped at 500.
pub fn list_chat(
    db: &Database,
    identity: &Identity,
    project_id: i64,
    limit: Option<usize>,
) -> Result<Vec<ChatLog>> {
    require(
        db,
        identity,
        ResourceKind::ChatLog,
        Some(ResourceRef::InProject(project_id)),
        Capability::Read,
    )?;

    let limit = match limit {
        None | Some(0) => DEFAULT_CHAT_LIMIT,
        Some(n) => n.min(MAX_CHAT_LIMIT),
    };
    Ok(db.get_chat_logs(project_id, limit)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;
    use crate::db::Role;

    struct Setup {
        db: Database,
        admin: Identity,
        employee: Identity,
        project_id: i64,
        task: Task,
    }

    /// Alpha with sprint S1 and task "Fix bug" assigned to an employee on the project.
    fn setup() -> Setup {
        let db = create_test_db();
        let admin = create_user(&db, "admin@example.com", Role::Admin);
        let employee = create_user(&db, "emp@example.com", Role::Employee);
        let project = create_project(&db, "Alpha", admin.id);
        db.assign_employee(project.id, employee.id).unwrap();
        let sprint = create_sprint(&db, project.id, "S1");
        let task = create_task(&db, sprint.id, "Fix bug", Some(employee.id));

        Setup {
            db,
            admin: Identity::new(admin.id, Role::Admin),
            employee: Identity::new(employee.id, Role::Employee),
            project_id: project.id,
            task,
        }
    }

    fn senders(db: &Database, project_id: i64) -> Vec<SenderType> {
        db.get_chat_logs(project_id, MAX_CHAT_LIMIT)
            .unwrap()
            .into_iter()
            .map(|log| log.sender_type)
            .collect()
    }

    #[test]
    fn chat_marks_own_task_done() {
        let s = setup();
        let text = format!("task {} done", s.task.id);

        let exchange = handle_incoming(&s.db, &s.employee, s.project_id, &text).unwrap();

        assert_eq!(s.db.get_task(s.task.id).unwrap().status, TaskStatus::Done);
        assert!(matches!(exchange.outcome, ChatOutcome::Applied { previous: TaskStatus::Todo, .. }));
        assert_eq!(exchange.user_entry.sender_type, SenderType::User);
        assert_eq!(exchange.user_entry.message, text);
        assert_eq!(exchange.bot_entry.sender_type, SenderType::AiBot);
        assert!(exchange.bot_entry.message.contains("Fix bug"));
        assert!(exchange.bot_entry.message.contains("DONE"));

        let logs = s.db.get_chat_logs(s.project_id, MAX_CHAT_LIMIT).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].id, exchange.user_entry.id);
        assert_eq!(logs[1].id, exchange.bot_entry.id);
    }

    #[test]
    fn unassigned_employee_is_forbidden_and_nothing_is_written() {
        let s = setup();
        s.db.remove_member(s.project_id, s.employee.user_id).unwrap();

        let result = handle_incoming(&s.db, &s.employee, s.project_id, &format!("task {} done", s.task.id));

        assert!(matches!(result, Err(Error::Forbidden(_))));
        assert!(senders(&s.db, s.project_id).is_empty());
        assert_eq!(s.db.get_task(s.task.id).unwrap().status, TaskStatus::Todo);
    }

    #[test]
    fn every_turn_writes_one_user_and_one_bot_entry() {
        let s = setup();
        let colleague = create_user(&s.db, "colleague@example.com", Role::Employee);
        s.db.assign_employee(s.project_id, colleague.id).unwrap();
        let colleague = Identity::new(colleague.id, Role::Employee);

        let turns = [
            (s.employee, "hello there".to_string()),
            (s.employee, format!("task {} is blocked", s.task.id)),
            (colleague, format!("task {} done", s.task.id)),
            (s.admin, format!("started task {}", s.task.id)),
        ];
        for (who, text) in &turns {
            handle_incoming(&s.db, who, s.project_id, text).unwrap();
        }

        let expected: Vec<_> = turns.iter().flat_map(|_| [SenderType::User, SenderType::AiBot]).collect();
        assert_eq!(senders(&s.db, s.project_id), expected);
    }

    #[test]
    fn chat_grants_no_extra_privilege() {
        let s = setup();
        let colleague = create_user(&s.db, "colleague@example.com", Role::Employee);
        s.db.assign_employee(s.project_id, colleague.id).unwrap();
        let colleague = Identity::new(colleague.id, Role::Employee);

        let exchange = handle_incoming(&s.db, &colleague, s.project_id, &format!("task {} done", s.task.id)).unwrap();

        assert!(matches!(exchange.outcome, ChatOutcome::Unauthorized { .. }));
        assert!(exchange.bot_entry.message.contains("only its assignee"));
        assert_eq!(s.db.get_task(s.task.id).unwrap().status, TaskStatus::Todo);
    }

    #[test]
    fn unauthorized_reply_covers_assignee_and_membership() {
        let reply = compose_reply(&ChatOutcome::Unauthorized { task_id: 4, status: TaskStatus::Done });
        assert!(reply.contains("task 4"));
        assert!(reply.contains("assignee"));
        assert!(reply.contains("member of this project"));
    }

    #[test]
    fn concurrent_turns_keep_both_audit_pairs() {
        let s = setup();
        let texts = [
            format!("task {} done", s.task.id),
            format!("started task {}", s.task.id),
        ];

        std::thread::scope(|scope| {
            for text in &texts {
                let db = s.db.clone();
                let employee = s.employee;
                let project_id = s.project_id;
                scope.spawn(move || handle_incoming(&db, &employee, project_id, text).unwrap());
            }
        });

        let mut senders = senders(&s.db, s.project_id);
        assert_eq!(senders.len(), 4);
        senders.sort_by_key(|sender| sender.as_str());
        assert_eq!(senders, vec![SenderType::AiBot, SenderType::AiBot, SenderType::User, SenderType::User]);

        let status = s.db.get_task(s.task.id).unwrap().status;
        assert!(matches!(status, TaskStatus::Done | TaskStatus::InProgress));
    }

    #[test]
    fn chat_author_cannot_be_deleted() {
        let s = setup();
        handle_incoming(&s.db, &s.employee, s.project_id, &format!("task {} done", s.task.id)).unwrap();

        let result = s.db.delete_user(s.employee.user_id);
        assert!(matches!(result, Err(crate::db::DbError::Conflict(_))));
        assert_eq!(senders(&s.db, s.project_id), vec![SenderType::User, SenderType::AiBot]);
        assert_eq!(s.db.get_task(s.task.id).unwrap().status, TaskStatus::Done);
    }

    #[test]
    fn blocked_is_acknowledged_without_transition() {
        let s = setup();
        let exchange = handle_incoming(&s.db, &s.employee, s.project_id, &format!("stuck on task {}", s.task.id)).unwrap();

        assert!(matches!(exchange.outcome, ChatOutcome::Acknowledged { signal: ChatSignal::Blocked, .. }));
        assert_eq!(s.db.get_task(s.task.id).unwrap().status, TaskStatus::Todo);
    }

    #[test]
    fn empty_message_is_rejected_before_writing() {
        let s = setup();
        let result = handle_incoming(&s.db, &s.employee, s.project_id, "   ");
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(senders(&s.db, s.project_id).is_empty());
    }

    #[test]
    fn missing_project_is_not_found() {
        let s = setup();
        let result = handle_incoming(&s.db, &s.admin, s.project_id + 100, "task 1 done");
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn list_chat_limits() {
        let s = setup();
        for i in 0..3 {
            handle_incoming(&s.db, &s.employee, s.project_id, &format!("update {}", i)).unwrap();
        }

        assert_eq!(list_chat(&s.db, &s.employee, s.project_id, None).unwrap().len(), 6);
        assert_eq!(list_chat(&s.db, &s.employee, s.project_id, Some(2)).unwrap().len(), 2);

        let outsider = create_user(&s.db, "out@example.com", Role::Employee);
        let outsider = Identity::new(outsider.id, Role::Employee);
        assert!(matches!(
            list_chat(&s.db, &outsider, s.project_id, None),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let json = serde_json::to_value(ChatOutcome::Unauthorized { task_id: 3, status: TaskStatus::Done }).unwrap();
        assert_eq!(json["kind"], "UNAUTHORIZED");
        assert_eq!(json["taskId"], 3);
        assert_eq!(json["status"], "DONE");
    }
}
