use sqlx::{SqliteConnection, SqlitePool};

use crate::db::models::{ChannelRow, CreateChannelParams};
use crate::media::attachments::{reconcile_on_delete, reconcile_on_save, release_files};
use crate::media::storage::FileStore;

/// Create a new channel in a server and return the stored row.
pub async fn create_channel(
    pool: &SqlitePool,
    params: &CreateChannelParams<'_>,
) -> Result<ChannelRow, sqlx::Error> {
    let id = sqlx::query(
        "INSERT INTO channels (name, owner_id, topic, server_id, banner, icon) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(params.name)
    .bind(params.owner_id)
    .bind(params.topic)
    .bind(params.server_id)
    .bind(params.banner)
    .bind(params.icon)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_channel(pool, id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Get a channel by ID.
pub async fn get_channel(
    pool: &SqlitePool,
    channel_id: i64,
) -> Result<Option<ChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelRow>("SELECT * FROM channels WHERE id = ?")
        .bind(channel_id)
        .fetch_optional(pool)
        .await
}

/// List all channels in a server.
pub async fn list_channels(
    pool: &SqlitePool,
    server_id: i64,
) -> Result<Vec<ChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelRow>("SELECT * FROM channels WHERE server_id = ? ORDER BY id")
        .bind(server_id)
        .fetch_all(pool)
        .await
}

/// List every channel, ordered by ID.
pub async fn list_all_channels(pool: &SqlitePool) -> Result<Vec<ChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelRow>("SELECT * FROM channels ORDER BY id")
        .fetch_all(pool)
        .await
}

/// Persist an updated channel.
///
/// The stored row is compared against `channel` slot by slot; once the update
/// is written, files of replaced or cleared slots are released. `created_at`
/// is never overwritten.
pub async fn save_channel(
    pool: &SqlitePool,
    store: &dyn FileStore,
    channel: &ChannelRow,
) -> Result<(), sqlx::Error> {
    let existing = get_channel(pool, channel.id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    let stale = reconcile_on_save(Some(&existing), channel);

    sqlx::query(
        "UPDATE channels \
         SET name = ?, owner_id = ?, topic = ?, server_id = ?, banner = ?, icon = ? \
         WHERE id = ?",
    )
    .bind(&channel.name)
    .bind(channel.owner_id)
    .bind(&channel.topic)
    .bind(channel.server_id)
    .bind(&channel.banner)
    .bind(&channel.icon)
    .bind(channel.id)
    .execute(pool)
    .await?;

    release_files(store, &stale).await;
    Ok(())
}

/// Delete a channel and release its icon and banner files.
/// Returns false if the channel did not exist.
pub async fn delete_channel(
    pool: &SqlitePool,
    store: &dyn FileStore,
    channel_id: i64,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let channels = sqlx::query_as::<_, ChannelRow>("SELECT * FROM channels WHERE id = ?")
        .bind(channel_id)
        .fetch_all(&mut *tx)
        .await?;
    if channels.is_empty() {
        return Ok(false);
    }
    release_channel_files(store, &channels).await;

    sqlx::query("DELETE FROM channels WHERE id = ?")
        .bind(channel_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(true)
}

/// Channels that a cascading delete of the given servers will remove.
pub(crate) async fn channels_for_servers_in(
    conn: &mut SqliteConnection,
    server_filter: &str,
    bind: i64,
) -> Result<Vec<ChannelRow>, sqlx::Error> {
    let sql = format!("SELECT * FROM channels WHERE server_id IN ({server_filter})");
    sqlx::query_as::<_, ChannelRow>(&sql)
        .bind(bind)
        .fetch_all(conn)
        .await
}

/// Release the attachment files of channels about to be removed.
pub(crate) async fn release_channel_files(store: &dyn FileStore, channels: &[ChannelRow]) {
    for channel in channels {
        release_files(store, &reconcile_on_delete(channel)).await;
    }
}
