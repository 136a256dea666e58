use sqlx::SqlitePool;

use crate::db::models::{ChannelRow, UserRow};
use crate::db::queries::channels::release_channel_files;
use crate::media::storage::FileStore;

/// Create a new user and return its ID.
pub async fn create_user(pool: &SqlitePool, username: &str) -> Result<i64, sqlx::Error> {
    let id = sqlx::query("INSERT INTO users (username) VALUES (?)")
        .bind(username)
        .execute(pool)
        .await?
        .last_insert_rowid();
    Ok(id)
}

/// Get a user by ID.
pub async fn get_user(pool: &SqlitePool, user_id: i64) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Find a user by username.
pub async fn get_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
}

/// Delete a user. Owned servers and channels cascade; the files of every
/// cascaded channel are released first. Returns false if no such user.
pub async fn delete_user(
    pool: &SqlitePool,
    store: &dyn FileStore,
    user_id: i64,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let channels = sqlx::query_as::<_, ChannelRow>(
        "SELECT * FROM channels \
         WHERE owner_id = ? OR server_id IN (SELECT id FROM servers WHERE owner_id = ?)",
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;
    release_channel_files(store, &channels).await;

    let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;
    Ok(deleted > 0)
}
