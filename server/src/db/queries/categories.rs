use sqlx::SqlitePool;

use crate::db::models::CategoryRow;
use crate::db::queries::channels::{channels_for_servers_in, release_channel_files};
use crate::media::attachments::{reconcile_on_delete, reconcile_on_save, release_files};
use crate::media::storage::FileStore;

/// Create a new category and return the stored row.
pub async fn create_category(
    pool: &SqlitePool,
    name: &str,
    description: Option<&str>,
    icon: Option<&str>,
) -> Result<CategoryRow, sqlx::Error> {
    let id = sqlx::query("INSERT INTO categories (name, description, icon) VALUES (?, ?, ?)")
        .bind(name)
        .bind(description)
        .bind(icon)
        .execute(pool)
        .await?
        .last_insert_rowid();

    get_category(pool, id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Get a category by ID.
pub async fn get_category(
    pool: &SqlitePool,
    category_id: i64,
) -> Result<Option<CategoryRow>, sqlx::Error> {
    sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = ?")
        .bind(category_id)
        .fetch_optional(pool)
        .await
}

/// List all categories, ordered by name.
pub async fn list_categories(pool: &SqlitePool) -> Result<Vec<CategoryRow>, sqlx::Error> {
    sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories ORDER BY name")
        .fetch_all(pool)
        .await
}

/// Persist an updated category, releasing the old icon if it was replaced
/// or cleared.
pub async fn save_category(
    pool: &SqlitePool,
    store: &dyn FileStore,
    category: &CategoryRow,
) -> Result<(), sqlx::Error> {
    let existing = get_category(pool, category.id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    let stale = reconcile_on_save(Some(&existing), category);

    sqlx::query("UPDATE categories SET name = ?, description = ?, icon = ? WHERE id = ?")
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.icon)
        .bind(category.id)
        .execute(pool)
        .await?;

    release_files(store, &stale).await;
    Ok(())
}

/// Delete a category. Its servers, and their channels, cascade.
///
/// The category icon and every cascaded channel's icon and banner are
/// released before the rows are removed. Returns false if no such category.
pub async fn delete_category(
    pool: &SqlitePool,
    store: &dyn FileStore,
    category_id: i64,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let Some(category) =
        sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = ?")
            .bind(category_id)
            .fetch_optional(&mut *tx)
            .await?
    else {
        return Ok(false);
    };

    let channels = channels_for_servers_in(
        &mut *tx,
        "SELECT id FROM servers WHERE category_id = ?",
        category_id,
    )
    .await?;

    release_files(store, &reconcile_on_delete(&category)).await;
    release_channel_files(store, &channels).await;

    sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(category_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(true)
}
