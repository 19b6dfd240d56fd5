use crate::db::{parse_datetime, Database, DbError};
use crate::db::models::{ChatLog, CreateChatLog, SenderType};

impl Database {
    /// Append a chat entry. Chat logs are never updated or deleted.
    pub fn append_chat_log(&self, entry: &CreateChatLog) -> Result<ChatLog, DbError> {
        self.with_conn(|conn| {
            let now = chrono::Utc::now();
            conn.execute(
                r#"INSERT INTO chat_logs (user_id, project_id, sender_type, message, created_at)
                   VALUES (?, ?, ?, ?, ?)"#,
                rusqlite::params![
                    entry.user_id,
                    entry.project_id,
                    entry.sender_type.as_str(),
                    entry.message,
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| DbError::constraint(e, "Chat author or project does not exist"))?;

            Ok(ChatLog {
                id: conn.last_insert_rowid(),
                user_id: entry.user_id,
                project_id: entry.project_id,
                sender_type: entry.sender_type,
                message: entry.message.clone(),
                created_at: now,
            })
        })
    }

    /// A project's chat in insertion order, oldest first.
    pub fn get_chat_logs(&self, project_id: i64, limit: usize) -> Result<Vec<ChatLog>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT id, user_id, project_id, sender_type, message, created_at
                   FROM chat_logs WHERE project_id = ? ORDER BY id LIMIT ?"#,
            )?;

            let logs = stmt
                .query_map(rusqlite::params![project_id, limit as i64], |row| {
                    let sender_str: String = row.get(3)?;
                    Ok(ChatLog {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        project_id: row.get(2)?,
                        sender_type: SenderType::parse(&sender_str).unwrap_or(SenderType::User),
                        message: row.get(4)?,
                        created_at: parse_datetime(row.get(5)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(logs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::db::test_support::*;

    #[test]
    fn append_and_list_in_order() {
        let db = create_test_db();
        let admin = create_user(&db, "admin@example.com", Role::Admin);
        let project = create_project(&db, "Alpha", admin.id);

        for (sender, text) in [(SenderType::User, "hello"), (SenderType::AiBot, "hi there")] {
            db.append_chat_log(&CreateChatLog {
                user_id: admin.id,
                project_id: project.id,
                sender_type: sender,
                message: text.to_string(),
            }).unwrap();
        }

        let logs = db.get_chat_logs(project.id, 100).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].sender_type, SenderType::User);
        assert_eq!(logs[1].sender_type, SenderType::AiBot);
        assert_eq!(logs[1].message, "hi there");

        assert_eq!(db.get_chat_logs(project.id, 1).unwrap().len(), 1);
    }

    #[test]
    fn chat_log_for_missing_project_is_conflict() {
        let db = create_test_db();
        let admin = create_user(&db, "admin@example.com", Role::Admin);

        let result = db.append_chat_log(&CreateChatLog {
            user_id: admin.id,
            project_id: 404,
            sender_type: SenderType::User,
            message: "anyone?".to_string(),
        });
        assert!(matches!(result, Err(DbError::Conflict(_))));
    }
}
