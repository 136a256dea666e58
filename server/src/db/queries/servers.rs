use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::db::models::{ChannelRow, ServerMemberRow, ServerRow};
use crate::db::queries::channels::{channels_for_servers_in, release_channel_files};
use crate::engine::server_listing::ServerRecord;
use crate::media::storage::FileStore;

/// Create a new server and return its ID. The owner is not added as a member.
pub async fn create_server(
    pool: &SqlitePool,
    name: &str,
    owner_id: i64,
    category_id: i64,
    description: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let id = sqlx::query(
        "INSERT INTO servers (name, owner_id, category_id, description) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(owner_id)
    .bind(category_id)
    .bind(description)
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Get a server by ID.
pub async fn get_server(
    pool: &SqlitePool,
    server_id: i64,
) -> Result<Option<ServerRow>, sqlx::Error> {
    sqlx::query_as::<_, ServerRow>("SELECT * FROM servers WHERE id = ?")
        .bind(server_id)
        .fetch_optional(pool)
        .await
}

/// Add a user to a server. Adding an existing member is a no-op.
pub async fn add_server_member(
    pool: &SqlitePool,
    server_id: i64,
    user_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO server_members (server_id, user_id) VALUES (?, ?)")
        .bind(server_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove a user from a server.
pub async fn remove_server_member(
    pool: &SqlitePool,
    server_id: i64,
    user_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM server_members WHERE server_id = ? AND user_id = ?")
        .bind(server_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Get all members of a server.
pub async fn get_server_members(
    pool: &SqlitePool,
    server_id: i64,
) -> Result<Vec<ServerMemberRow>, sqlx::Error> {
    sqlx::query_as::<_, ServerMemberRow>(
        "SELECT * FROM server_members WHERE server_id = ? ORDER BY user_id",
    )
    .bind(server_id)
    .fetch_all(pool)
    .await
}

/// Get the member count for a server.
pub async fn get_member_count(pool: &SqlitePool, server_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM server_members WHERE server_id = ?")
        .bind(server_id)
        .fetch_one(pool)
        .await
}

/// Delete a server. Its channels cascade and their files are released
/// before the rows are removed. Returns false if no such server.
pub async fn delete_server(
    pool: &SqlitePool,
    store: &dyn FileStore,
    server_id: i64,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let channels = channels_for_servers_in(&mut *tx, "?", server_id).await?;
    release_channel_files(store, &channels).await;

    let deleted = sqlx::query("DELETE FROM servers WHERE id = ?")
        .bind(server_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;
    Ok(deleted > 0)
}

/// Load every server with its category name, member set and channels,
/// ordered by server ID. This is the unfiltered base of a server listing.
pub async fn load_listing_base(pool: &SqlitePool) -> Result<Vec<ServerRecord>, sqlx::Error> {
    let servers = sqlx::query_as::<_, (i64, String, i64, i64, Option<String>, String)>(
        "SELECT s.id, s.name, s.owner_id, s.category_id, s.description, c.name \
         FROM servers s JOIN categories c ON s.category_id = c.id \
         ORDER BY s.id",
    )
    .fetch_all(pool)
    .await?;

    let memberships = sqlx::query_as::<_, (i64, i64)>(
        "SELECT server_id, user_id FROM server_members ORDER BY server_id, user_id",
    )
    .fetch_all(pool)
    .await?;
    let mut members: HashMap<i64, Vec<i64>> = HashMap::new();
    for (server_id, user_id) in memberships {
        members.entry(server_id).or_default().push(user_id);
    }

    let all_channels =
        sqlx::query_as::<_, ChannelRow>("SELECT * FROM channels ORDER BY server_id, id")
            .fetch_all(pool)
            .await?;
    let mut channels: HashMap<i64, Vec<ChannelRow>> = HashMap::new();
    for channel in all_channels {
        channels.entry(channel.server_id).or_default().push(channel);
    }

    Ok(servers
        .into_iter()
        .map(
            |(id, name, owner_id, category_id, description, category_name)| ServerRecord {
                server: ServerRow {
                    id,
                    name,
                    owner_id,
                    category_id,
                    description,
                },
                category_name,
                member_ids: members.remove(&id).unwrap_or_default(),
                channels: channels.remove(&id).unwrap_or_default(),
            },
        )
        .collect())
}
