use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;

#[derive(Debug, Clone, FromRow)]
pub struct Recipe {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub description: Option<String>,
    pub link: Option<String>,
    pub image_key: Option<String>,
    pub created_at: OffsetDateTime,
}

const COLUMNS: &str =
    "id, user_id, title, time_minutes, price, description, link, image_key, created_at";

/// Owner's recipes, most recent first (ids are monotonically assigned).
pub async fn list_for_owner(
    db: &PgPool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Recipe>> {
    let recipes = sqlx::query_as::<_, Recipe>(&format!(
        "SELECT {COLUMNS} FROM recipes \
         WHERE user_id = $1 ORDER BY id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(recipes)
}

pub async fn count_for_owner(db: &PgPool, user_id: i64) -> anyhow::Result<i64> {
    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM recipes WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await?;
    Ok(total)
}

pub async fn find_for_owner(
    db: &PgPool,
    user_id: i64,
    id: i64,
) -> anyhow::Result<Option<Recipe>> {
    let recipe = sqlx::query_as::<_, Recipe>(&format!(
        "SELECT {COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(recipe)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    title: &str,
    time_minutes: i32,
    price: Decimal,
    description: Option<&str>,
    link: Option<&str>,
) -> anyhow::Result<Recipe> {
    let recipe = sqlx::query_as::<_, Recipe>(&format!(
        "INSERT INTO recipes (user_id, title, time_minutes, price, description, link) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(title)
    .bind(time_minutes)
    .bind(price)
    .bind(description)
    .bind(link)
    .fetch_one(&mut **tx)
    .await?;
    Ok(recipe)
}

/// Rewrite every mutable column of an owned recipe. The owner column never
/// changes. None when the id is unknown or owned by someone else.
#[allow(clippy::too_many_arguments)]
pub async fn update_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    id: i64,
    title: &str,
    time_minutes: i32,
    price: Decimal,
    description: Option<&str>,
    link: Option<&str>,
) -> anyhow::Result<Option<Recipe>> {
    let recipe = sqlx::query_as::<_, Recipe>(&format!(
        "UPDATE recipes SET title = $3, time_minutes = $4, price = $5, \
         description = $6, link = $7 \
         WHERE id = $1 AND user_id = $2 RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .bind(title)
    .bind(time_minutes)
    .bind(price)
    .bind(description)
    .bind(link)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(recipe)
}

/// Replace the recipe's tag set within the enclosing transaction.
pub async fn set_tags_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    tag_ids: &[i64],
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;
    for tag_id in tag_ids {
        sqlx::query(
            "INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(recipe_id)
        .bind(tag_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Delete an owned recipe, handing back its image key (if any) so the
/// caller can release the stored object.
pub async fn delete(
    db: &PgPool,
    user_id: i64,
    id: i64,
) -> anyhow::Result<Option<Option<String>>> {
    let image_key = sqlx::query_scalar::<_, Option<String>>(
        "DELETE FROM recipes WHERE id = $1 AND user_id = $2 RETURNING image_key",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(image_key)
}

pub async fn set_image_key(
    db: &PgPool,
    user_id: i64,
    id: i64,
    image_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "UPDATE recipes SET image_key = $3 WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .bind(image_key)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}
