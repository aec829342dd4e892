//! Postgres persistence for users, settings, forced channels, admins and
//! delivery statistics.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::info;

use crate::filename::TagPosition;
use crate::storage::{Stats, UserSettings};

/// A user who has talked to the bot
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub telegram_id: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub visits: i64,
}

#[derive(Debug, FromRow)]
struct SettingsRow {
    telegram_id: i64,
    tag: Option<String>,
    tag_position: String,
    lock_password: Option<String>,
    banner_path: Option<String>,
    delete_delay_secs: i64,
}

impl From<SettingsRow> for UserSettings {
    fn from(row: SettingsRow) -> Self {
        Self {
            telegram_id: row.telegram_id,
            tag: row.tag,
            tag_position: TagPosition::parse(&row.tag_position),
            lock_password: row.lock_password,
            banner_path: row.banner_path,
            delete_delay_secs: row.delete_delay_secs.max(0) as u64,
        }
    }
}

/// Create all tables if they do not exist yet
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            telegram_id BIGINT PRIMARY KEY,
            first_seen TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            last_seen TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            visits BIGINT NOT NULL DEFAULT 1
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_settings (
            telegram_id BIGINT PRIMARY KEY,
            tag TEXT,
            tag_position TEXT NOT NULL DEFAULT 'end',
            lock_password TEXT,
            banner_path TEXT,
            delete_delay_secs BIGINT NOT NULL DEFAULT 300
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create user_settings table")?;

    sqlx::query("CREATE TABLE IF NOT EXISTS forced_channels (name TEXT PRIMARY KEY)")
        .execute(pool)
        .await
        .context("Failed to create forced_channels table")?;

    sqlx::query("CREATE TABLE IF NOT EXISTS admins (telegram_id BIGINT PRIMARY KEY)")
        .execute(pool)
        .await
        .context("Failed to create admins table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS delivery_stats (
            id SMALLINT PRIMARY KEY DEFAULT 1,
            files BIGINT NOT NULL DEFAULT 0,
            storage_bytes BIGINT NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create delivery_stats table")?;

    sqlx::query("INSERT INTO delivery_stats (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
        .execute(pool)
        .await
        .context("Failed to seed delivery_stats")?;

    Ok(())
}

/// Record a visit, creating the user on first contact
pub async fn track_user(pool: &PgPool, telegram_id: i64) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (telegram_id) VALUES ($1)
         ON CONFLICT (telegram_id)
         DO UPDATE SET last_seen = NOW(), visits = users.visits + 1
         RETURNING telegram_id, first_seen, last_seen, visits",
    )
    .bind(telegram_id)
    .fetch_one(pool)
    .await
    .context("Failed to track user")?;

    Ok(user)
}

pub async fn get_user(pool: &PgPool, telegram_id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT telegram_id, first_seen, last_seen, visits FROM users WHERE telegram_id = $1",
    )
    .bind(telegram_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read user")?;

    Ok(user)
}

pub async fn count_users(pool: &PgPool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;
    Ok(count)
}

pub async fn all_user_ids(pool: &PgPool) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT telegram_id FROM users ORDER BY first_seen")
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Load settings; `None` when the user never saved any
pub async fn get_settings(pool: &PgPool, telegram_id: i64) -> Result<Option<UserSettings>> {
    let row = sqlx::query_as::<_, SettingsRow>(
        "SELECT telegram_id, tag, tag_position, lock_password, banner_path, delete_delay_secs
         FROM user_settings WHERE telegram_id = $1",
    )
    .bind(telegram_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read user settings")?;

    Ok(row.map(UserSettings::from))
}

pub async fn save_settings(pool: &PgPool, settings: &UserSettings) -> Result<()> {
    sqlx::query(
        "INSERT INTO user_settings
            (telegram_id, tag, tag_position, lock_password, banner_path, delete_delay_secs)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (telegram_id) DO UPDATE SET
            tag = EXCLUDED.tag,
            tag_position = EXCLUDED.tag_position,
            lock_password = EXCLUDED.lock_password,
            banner_path = EXCLUDED.banner_path,
            delete_delay_secs = EXCLUDED.delete_delay_secs",
    )
    .bind(settings.telegram_id)
    .bind(&settings.tag)
    .bind(settings.tag_position.as_str())
    .bind(&settings.lock_password)
    .bind(&settings.banner_path)
    .bind(settings.delete_delay_secs as i64)
    .execute(pool)
    .await
    .context("Failed to save user settings")?;

    Ok(())
}

pub async fn forced_channels(pool: &PgPool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM forced_channels ORDER BY name")
        .fetch_all(pool)
        .await
        .context("Failed to list forced channels")?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

pub async fn add_forced_channel(pool: &PgPool, name: &str) -> Result<()> {
    sqlx::query("INSERT INTO forced_channels (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
        .bind(name)
        .execute(pool)
        .await
        .context("Failed to add forced channel")?;
    Ok(())
}

pub async fn remove_forced_channel(pool: &PgPool, name: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM forced_channels WHERE name = $1")
        .bind(name)
        .execute(pool)
        .await
        .context("Failed to remove forced channel")?;
    Ok(result.rows_affected() > 0)
}

pub async fn clear_forced_channels(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM forced_channels")
        .execute(pool)
        .await
        .context("Failed to clear forced channels")?;
    Ok(result.rows_affected())
}

pub async fn admin_ids(pool: &PgPool) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT telegram_id FROM admins ORDER BY telegram_id")
        .fetch_all(pool)
        .await
        .context("Failed to list admins")?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn add_admin(pool: &PgPool, telegram_id: i64) -> Result<bool> {
    let result =
        sqlx::query("INSERT INTO admins (telegram_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(telegram_id)
            .execute(pool)
            .await
            .context("Failed to add admin")?;
    Ok(result.rows_affected() > 0)
}

pub async fn remove_admin(pool: &PgPool, telegram_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM admins WHERE telegram_id = $1")
        .bind(telegram_id)
        .execute(pool)
        .await
        .context("Failed to remove admin")?;
    Ok(result.rows_affected() > 0)
}

pub async fn record_delivery(pool: &PgPool, bytes: u64) -> Result<()> {
    sqlx::query(
        "UPDATE delivery_stats SET files = files + 1, storage_bytes = storage_bytes + $1 WHERE id = 1",
    )
    .bind(bytes as i64)
    .execute(pool)
    .await
    .context("Failed to update delivery stats")?;
    Ok(())
}

pub async fn get_stats(pool: &PgPool) -> Result<Stats> {
    let (files, storage_bytes): (i64, i64) =
        sqlx::query_as("SELECT files, storage_bytes FROM delivery_stats WHERE id = 1")
            .fetch_one(pool)
            .await
            .context("Failed to read delivery stats")?;
    Ok(Stats {
        files: files.max(0) as u64,
        storage_bytes: storage_bytes.max(0) as u64,
    })
}
