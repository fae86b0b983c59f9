//! Postgres persistence for user records and the invite audit trail.
//!
//! Point credits and list growth are expressed as single `UPDATE`
//! statements (`points = points + $n`, `array_append`) so concurrent
//! requests against the same record do not lose writes. The two-record
//! invite mutations run inside one transaction.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{NewUser, User};
use crate::referral::{normalize_handle, ReferralBinding};

pub async fn find_by_telegram_id(pool: &PgPool, telegram_id: i64) -> Result<Option<User>, ServiceError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE telegram_id = $1")
        .bind(telegram_id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Looks up a user by display handle. Expects an already-normalized handle
/// (no leading `@`).
pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, ServiceError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Resolves a stored invite label to its user record. Labels are written as
/// `@handle` or `@<telegram id>`, so try the handle first and fall back to a
/// numeric id.
pub async fn resolve_label(pool: &PgPool, label: &str) -> Result<Option<User>, ServiceError> {
    let handle = normalize_handle(label);
    if let Some(user) = find_by_username(pool, handle).await? {
        return Ok(Some(user));
    }
    match handle.parse::<i64>() {
        Ok(telegram_id) => find_by_telegram_id(pool, telegram_id).await,
        Err(_) => Ok(None),
    }
}

pub async fn create_user(pool: &PgPool, fields: &NewUser) -> Result<User, ServiceError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (telegram_id, username, first_name, last_name, intro_seen)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(fields.telegram_id)
    .bind(&fields.username)
    .bind(&fields.first_name)
    .bind(&fields.last_name)
    .bind(fields.intro_seen)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

/// Creates a referred user and credits the inviter as one unit: the invitee
/// row, the inviter's label append and award, and the audit row either all
/// land or none do.
pub async fn create_with_referral(
    pool: &PgPool,
    fields: &NewUser,
    inviter_id: i64,
    binding: &ReferralBinding,
) -> Result<User, ServiceError> {
    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (telegram_id, username, first_name, last_name, invited_by, intro_seen)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(fields.telegram_id)
    .bind(&fields.username)
    .bind(&fields.first_name)
    .bind(&fields.last_name)
    .bind(&binding.invited_by)
    .bind(fields.intro_seen)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE users
        SET invited_users = array_append(invited_users, $1),
            points = points + $2
        WHERE telegram_id = $3
        "#,
    )
    .bind(&binding.invitee_label)
    .bind(binding.award)
    .bind(inviter_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO invites (id, inviter_id, invitee_id) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind(inviter_id)
        .bind(user.telegram_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(user)
}

/// Applies an explicit invite confirmation atomically. The `invited_by IS
/// NULL` guard re-checks the one-time-binding precondition inside the
/// transaction, so a concurrent confirmation for the same invitee loses
/// with `AlreadyInvited` instead of double-crediting.
pub async fn apply_invite(
    pool: &PgPool,
    inviter_id: i64,
    invitee_id: i64,
    binding: &ReferralBinding,
) -> Result<(User, User), ServiceError> {
    let mut tx = pool.begin().await?;

    let invitee = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET invited_by = $1
        WHERE telegram_id = $2 AND invited_by IS NULL
        RETURNING *
        "#,
    )
    .bind(&binding.invited_by)
    .bind(invitee_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ServiceError::AlreadyInvited)?;

    let inviter = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET invited_users = array_append(invited_users, $1),
            points = points + $2
        WHERE telegram_id = $3
        RETURNING *
        "#,
    )
    .bind(&binding.invitee_label)
    .bind(binding.award)
    .bind(inviter_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ServiceError::NotFound("inviter"))?;

    sqlx::query("INSERT INTO invites (id, inviter_id, invitee_id) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind(inviter_id)
        .bind(invitee_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok((inviter, invitee))
}

pub async fn increment_points(
    pool: &PgPool,
    telegram_id: i64,
    amount: i64,
) -> Result<Option<User>, ServiceError> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET points = points + $1 WHERE telegram_id = $2 RETURNING *",
    )
    .bind(amount)
    .bind(telegram_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn set_intro_seen(pool: &PgPool, telegram_id: i64) -> Result<User, ServiceError> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET intro_seen = TRUE WHERE telegram_id = $1 RETURNING *",
    )
    .bind(telegram_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ServiceError::NotFound("user"))?;
    Ok(user)
}

pub async fn push_transaction_status(
    pool: &PgPool,
    telegram_id: i64,
    status: &str,
) -> Result<User, ServiceError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET transaction_status = array_append(transaction_status, $1)
        WHERE telegram_id = $2
        RETURNING *
        "#,
    )
    .bind(status)
    .bind(telegram_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ServiceError::NotFound("user"))?;
    Ok(user)
}

/// Writes back a transaction history edited in memory, appending a
/// completed volume to the activity log when one is supplied.
pub async fn replace_transaction_log(
    pool: &PgPool,
    telegram_id: i64,
    log: &[String],
    completed_amount: Option<f64>,
) -> Result<User, ServiceError> {
    let user = match completed_amount {
        Some(amount) => {
            sqlx::query_as::<_, User>(
                r#"
                UPDATE users
                SET transaction_status = $1,
                    activity_log = array_append(activity_log, $2)
                WHERE telegram_id = $3
                RETURNING *
                "#,
            )
            .bind(log)
            .bind(amount)
            .bind(telegram_id)
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, User>(
                "UPDATE users SET transaction_status = $1 WHERE telegram_id = $2 RETURNING *",
            )
            .bind(log)
            .bind(telegram_id)
            .fetch_optional(pool)
            .await?
        }
    }
    .ok_or(ServiceError::NotFound("user"))?;
    Ok(user)
}

pub async fn set_invite_points(
    pool: &PgPool,
    telegram_id: i64,
    invite_points: i64,
) -> Result<User, ServiceError> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET invite_points = $1 WHERE telegram_id = $2 RETURNING *",
    )
    .bind(invite_points)
    .bind(telegram_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ServiceError::NotFound("user"))?;
    Ok(user)
}
