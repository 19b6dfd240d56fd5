use crate::db::{next_timestamp, parse_datetime, Database, DbError};
use crate::db::models::{CreateUser, Role, UpdateUser, User};

const USER_COLUMNS: &str = "id, full_name, email, role, created_at, updated_at";

impl Database {
    pub fn create_user(&self, input: &CreateUser) -> Result<User, DbError> {
        let email = input.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(DbError::Validation("email is required".to_string()));
        }

        self.with_conn(|conn| {
            let now = chrono::Utc::now();
            conn.execute(
                r#"INSERT INTO users (full_name, email, password_hash, role, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
                rusqlite::params![
                    input.full_name.trim(),
                    email,
                    input.password_hash,
                    input.role.as_str(),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| DbError::constraint(e, "A user with this email already exists"))?;

            let id = conn.last_insert_rowid();
            tracing::info!("Created user {} ({})", id, input.role.as_str());

            Ok(User {
                id,
                full_name: input.full_name.trim().to_string(),
                email,
                role: input.role,
                created_at: now,
                updated_at: now,
            })
        })
    }

    pub fn get_user(&self, user_id: i64) -> Result<User, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
                [user_id],
                Self::map_user_row,
            )
            .map_err(|e| DbError::not_found_or(e, format!("User {}", user_id)))
        })
    }

    pub fn get_users(&self) -> Result<Vec<User>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
            let rows = stmt.query_map([], Self::map_user_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }

    /// Look up a user and their stored password hash by email, for login.
    pub fn get_user_credentials(&self, email: &str) -> Result<Option<(User, String)>, DbError> {
        let email = email.trim().to_lowercase();
        self.with_conn(|conn| {
            let result = conn.query_row(
                &format!("SELECT {}, password_hash FROM users WHERE email = ?", USER_COLUMNS),
                [&email],
                |row| Ok((Self::map_user_row(row)?, row.get::<_, String>(6)?)),
            );
            match result {
                Ok(found) => Ok(Some(found)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(DbError::Sqlite(e)),
            }
        })
    }

    pub fn update_user_role(&self, user_id: i64, role: Role) -> Result<User, DbError> {
        let existing = self.get_user(user_id)?;
        self.with_conn(|conn| {
            let now = next_timestamp(existing.updated_at);
            conn.execute(
                "UPDATE users SET role = ?, updated_at = ? WHERE id = ?",
                rusqlite::params![role.as_str(), now.to_rfc3339(), user_id],
            )?;
            tracing::info!("User {} role changed to {}", user_id, role.as_str());
            Ok(User { role, updated_at: now, ..existing })
        })
    }

    pub fn update_user(&self, user_id: i64, input: &UpdateUser) -> Result<User, DbError> {
        let full_name = input.full_name.as_deref().map(str::trim);
        if full_name == Some("") {
            return Err(DbError::Validation("fullName cannot be empty".to_string()));
        }
        let email = input.email.as_deref().map(|e| e.trim().to_lowercase());
        if email.as_deref() == Some("") {
            return Err(DbError::Validation("email cannot be empty".to_string()));
        }

        let existing = self.get_user(user_id)?;
        let updated = User {
            full_name: full_name.map(String::from).unwrap_or(existing.full_name.clone()),
            email: email.unwrap_or(existing.email.clone()),
            role: input.role.unwrap_or(existing.role),
            updated_at: next_timestamp(existing.updated_at),
            ..existing
        };

        self.with_conn(|conn| {
            conn.execute(
                r#"UPDATE users
                   SET full_name = ?, email = ?, role = ?, password_hash = COALESCE(?, password_hash),
                       updated_at = ?
                   WHERE id = ?"#,
                rusqlite::params![
                    updated.full_name,
                    updated.email,
                    updated.role.as_str(),
                    input.password_hash,
                    updated.updated_at.to_rfc3339(),
                    user_id,
                ],
            )
            .map_err(|e| DbError::constraint(e, "A user with this email already exists"))?;
            tracing::info!("Updated user {}", user_id);
            Ok(updated)
        })
    }

    /// Delete a user. Fails with `Conflict` while the user still owns projects or has chat
    /// history, since chat rows are never removed.
    pub fn delete_user(&self, user_id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let affected = conn
                .execute("DELETE FROM users WHERE id = ?", [user_id])
                .map_err(|e| DbError::constraint(e, "User still owns projects or has chat history"))?;
            if affected == 0 {
                return Err(DbError::NotFound(format!("User {}", user_id)));
            }
            tracing::info!("Deleted user {}", user_id);
            Ok(())
        })
    }

    pub fn count_users(&self) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
        })
    }

    fn map_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let role_str: String = row.get(3)?;
        Ok(User {
            id: row.get(0)?,
            full_name: row.get(1)?,
            email: row.get(2)?,
            role: Role::parse(&role_str).unwrap_or(Role::Employee),
            created_at: parse_datetime(row.get(4)?),
            updated_at: parse_datetime(row.get(5)?),
        })
    }
}
