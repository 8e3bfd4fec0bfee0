use bcrypt::{hash, verify};
use sqlx::SqlitePool;

use crate::db::{begin_write, now_millis};
use crate::error::{is_unique_violation, AppError};
use crate::models::user::{AuthResponse, CreateUserReq, LoginUserReq, Role, UpdateUserReq, User};
use crate::services::token_service::AuthKeys;

// Keeps the sole remaining Admin in place; evaluated inside the writing statement.
const NOT_LAST_ADMIN: &str =
    "(role <> 'Admin' OR (SELECT COUNT(*) FROM users WHERE role = 'Admin') > 1)";

/// bcrypt settings for every credential write and check.
pub struct PasswordHasher {
    cost: u32,
    // verified against when the username is unknown so both paths pay one hash
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, AppError> {
        Ok(Self {
            cost,
            dummy_hash: hash("not-a-real-password", cost)?,
        })
    }

    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        Ok(hash(password, self.cost)?)
    }

    pub fn verify(&self, password: &str, stored: Option<&str>) -> Result<bool, AppError> {
        match stored {
            Some(stored) => Ok(verify(password, stored)?),
            None => {
                verify(password, &self.dummy_hash)?;
                Ok(false)
            }
        }
    }
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::Validation("Password is required".into()));
    }
    Ok(())
}

pub async fn register_user(pool: &SqlitePool, req: CreateUserReq, hasher: &PasswordHasher) -> Result<User, AppError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".into()));
    }
    validate_password(&req.password)?;
    let password_hash = hasher.hash(&req.password)?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (username, password_hash, role, created_at) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(username)
    .bind(&password_hash)
    .bind(req.role.as_str())
    .bind(now_millis())
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::DuplicateUser(username.to_string())
        } else {
            e.into()
        }
    })?;

    find_user(pool, id).await?.ok_or(AppError::UserNotFound)
}

pub async fn verify_user(
    pool: &SqlitePool,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let user_opt = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username.trim())
        .fetch_optional(pool)
        .await?;

    let stored = user_opt.as_ref().map(|u| u.password_hash.as_str());
    if hasher.verify(password, stored)? {
        return Ok(user_opt);
    }
    Ok(None)
}

pub async fn login(
    pool: &SqlitePool,
    keys: &AuthKeys,
    hasher: &PasswordHasher,
    req: &LoginUserReq,
) -> Result<AuthResponse, AppError> {
    let user = verify_user(pool, hasher, &req.username, &req.password)
        .await?
        .ok_or(AppError::InvalidCredentials)?;
    let token = keys.issue(user.id, user.role)?;
    Ok(AuthResponse {
        id: user.id,
        username: user.username,
        role: user.role,
        token,
    })
}

pub async fn find_user(pool: &SqlitePool, id: i64) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(users)
}

pub async fn update_user(pool: &SqlitePool, id: i64, req: UpdateUserReq, hasher: &PasswordHasher) -> Result<User, AppError> {
    let password_hash = match req.password.as_deref() {
        Some(p) if !p.is_empty() => Some(hasher.hash(p)?),
        _ => None,
    };

    let mut tx = begin_write(pool).await?;
    if let Some(role) = req.role {
        let guard = if role == Role::Admin { "1" } else { NOT_LAST_ADMIN };
        let res = sqlx::query(&format!("UPDATE users SET role = ? WHERE id = ? AND {guard}"))
            .bind(role.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(missing_or_last_admin(&mut *tx, id).await?);
        }
    }
    if let Some(password_hash) = password_hash {
        let res = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::UserNotFound);
        }
    }
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::UserNotFound)?;
    tx.commit().await?;
    Ok(user)
}

pub async fn delete_user(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let mut tx = begin_write(pool).await?;
    let res = sqlx::query(&format!("DELETE FROM users WHERE id = ? AND {NOT_LAST_ADMIN}"))
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if res.rows_affected() == 0 {
        return Err(missing_or_last_admin(&mut *tx, id).await?);
    }
    tx.commit().await?;
    Ok(())
}

async fn missing_or_last_admin(conn: &mut sqlx::SqliteConnection, id: i64) -> Result<AppError, AppError> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(if exists.is_some() {
        AppError::LastAdmin
    } else {
        AppError::UserNotFound
    })
}

/// Creates the bootstrap Admin when no user exists yet. Returns whether one was created.
pub async fn ensure_admin(
    pool: &SqlitePool,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(false);
    }
    let req = CreateUserReq {
        username: username.to_string(),
        password: password.to_string(),
        role: Role::Admin,
    };
    register_user(pool, req, hasher).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_account_is_checked_against_the_dummy_hash() {
        let hasher = PasswordHasher::new(4).unwrap();
        let stored = hasher.hash("hunter2").unwrap();
        assert!(hasher.verify("hunter2", Some(&stored)).unwrap());
        assert!(!hasher.verify("hunter3", Some(&stored)).unwrap());
        assert!(!hasher.verify("not-a-real-password", None).unwrap());
        assert!(bcrypt::verify("not-a-real-password", &hasher.dummy_hash).unwrap());
    }
}
