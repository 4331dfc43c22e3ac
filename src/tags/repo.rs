use sqlx::{FromRow, PgPool, Postgres, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Tag {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
}

pub async fn list_for_owner(
    db: &PgPool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Tag>> {
    let tags = sqlx::query_as::<_, Tag>(
        "SELECT id, user_id, name FROM tags \
         WHERE user_id = $1 ORDER BY name DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(tags)
}

pub async fn count_for_owner(db: &PgPool, user_id: i64) -> anyhow::Result<i64> {
    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tags WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await?;
    Ok(total)
}

pub async fn find_for_owner(db: &PgPool, user_id: i64, id: i64) -> anyhow::Result<Option<Tag>> {
    let tag = sqlx::query_as::<_, Tag>(
        "SELECT id, user_id, name FROM tags WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(tag)
}

/// Insert a tag for the owner; None when the owner already has the name.
pub async fn insert(db: &PgPool, user_id: i64, name: &str) -> anyhow::Result<Option<Tag>> {
    let tag = sqlx::query_as::<_, Tag>(
        "INSERT INTO tags (user_id, name) VALUES ($1, $2) \
         ON CONFLICT (user_id, name) DO NOTHING \
         RETURNING id, user_id, name",
    )
    .bind(user_id)
    .bind(name)
    .fetch_optional(db)
    .await?;
    Ok(tag)
}

pub async fn name_taken(
    db: &PgPool,
    user_id: i64,
    name: &str,
    exclude_id: i64,
) -> anyhow::Result<bool> {
    let taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM tags WHERE user_id = $1 AND name = $2 AND id <> $3)",
    )
    .bind(user_id)
    .bind(name)
    .bind(exclude_id)
    .fetch_one(db)
    .await?;
    Ok(taken)
}

pub async fn rename(
    db: &PgPool,
    user_id: i64,
    id: i64,
    name: &str,
) -> anyhow::Result<Option<Tag>> {
    let tag = sqlx::query_as::<_, Tag>(
        "UPDATE tags SET name = $3 WHERE id = $1 AND user_id = $2 \
         RETURNING id, user_id, name",
    )
    .bind(id)
    .bind(user_id)
    .bind(name)
    .fetch_optional(db)
    .await?;
    Ok(tag)
}

pub async fn delete(db: &PgPool, user_id: i64, id: i64) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM tags WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Resolve payload names against the owner's tags inside a transaction:
/// reuse an existing row on exact name match, create one otherwise. The
/// conflict-update form returns the surviving row either way.
pub async fn resolve_for_owner_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    names: &[String],
) -> anyhow::Result<Vec<Tag>> {
    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let tag = sqlx::query_as::<_, Tag>(
            "INSERT INTO tags (user_id, name) VALUES ($1, $2) \
             ON CONFLICT (user_id, name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id, user_id, name",
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    Ok(tags)
}

pub async fn for_recipe(db: &PgPool, recipe_id: i64) -> anyhow::Result<Vec<Tag>> {
    let tags = sqlx::query_as::<_, Tag>(
        "SELECT t.id, t.user_id, t.name FROM tags t \
         JOIN recipe_tags rt ON rt.tag_id = t.id \
         WHERE rt.recipe_id = $1 ORDER BY t.name DESC",
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await?;
    Ok(tags)
}
