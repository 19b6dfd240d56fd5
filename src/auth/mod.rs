//! Authentication: JWT bearer tokens and bcrypt password hashes.

pub mod jwt;
pub mod password;

pub use jwt::{decode_jwt, encode_jwt, Claims};
pub use password::{hash_password, verify_password};

use crate::db::{CreateUser, Database, Role, User};
use crate::error::Result;

/// Create the first ADMIN when the users table is empty.
///
/// Returns the created user, or `None` when users already exist.
pub fn ensure_admin(db: &Database, email: &str, password: &str, cost: u32) -> Result<Option<User>> {
    if db.count_users()? > 0 {
        return Ok(None);
    }

    let user = db.create_user(&CreateUser {
        full_name: "Administrator".to_string(),
        email: email.to_string(),
        password_hash: hash_password(password, cost)?,
        role: Role::Admin,
    })?;
    tracing::info!("Seeded admin user {} ({})", user.id, user.email);
    Ok(Some(user))
}
