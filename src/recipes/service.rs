use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, FieldErrors},
    state::AppState,
    tags::{dto::TagOut, repo as tags_repo},
};

use super::dto::{RecipeDetail, RecipePatch, RecipeWrite};
use super::repo::{self, Recipe};

fn validate_write(body: &RecipeWrite) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    if body.title.trim().is_empty() {
        errors.add("title", "This field may not be blank.");
    }
    if body.tags.iter().any(|t| t.name.trim().is_empty()) {
        errors.add("tags", "Tag names may not be blank.");
    }
    errors.into_result()
}

/// Insert the recipe and resolve-and-attach its tags as one unit: a failure
/// anywhere rolls the whole creation back.
pub async fn create(
    state: &AppState,
    user_id: i64,
    body: RecipeWrite,
) -> Result<RecipeDetail, ApiError> {
    validate_write(&body)?;

    let mut tx = state.db.begin().await.context("begin tx")?;
    let recipe = repo::insert_tx(
        &mut tx,
        user_id,
        &body.title,
        body.time_minutes,
        body.price,
        body.description.as_deref(),
        body.link.as_deref(),
    )
    .await?;
    let names: Vec<String> = body.tags.into_iter().map(|t| t.name).collect();
    let tags = tags_repo::resolve_for_owner_tx(&mut tx, user_id, &names).await?;
    let tag_ids: Vec<i64> = tags.iter().map(|t| t.id).collect();
    repo::set_tags_tx(&mut tx, recipe.id, &tag_ids).await?;
    tx.commit().await.context("commit tx")?;

    info!(recipe_id = recipe.id, "recipe created");
    detail(state, user_id, recipe.id).await
}

/// Full update: every mutable field is rewritten; optional fields the body
/// left out reset to their defaults, and the tag set is replaced.
pub async fn replace(
    state: &AppState,
    user_id: i64,
    id: i64,
    body: RecipeWrite,
) -> Result<RecipeDetail, ApiError> {
    validate_write(&body)?;

    let mut tx = state.db.begin().await.context("begin tx")?;
    let recipe = repo::update_tx(
        &mut tx,
        user_id,
        id,
        &body.title,
        body.time_minutes,
        body.price,
        body.description.as_deref(),
        body.link.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Recipe"))?;
    let names: Vec<String> = body.tags.into_iter().map(|t| t.name).collect();
    let tags = tags_repo::resolve_for_owner_tx(&mut tx, user_id, &names).await?;
    let tag_ids: Vec<i64> = tags.iter().map(|t| t.id).collect();
    repo::set_tags_tx(&mut tx, recipe.id, &tag_ids).await?;
    tx.commit().await.context("commit tx")?;

    detail(state, user_id, recipe.id).await
}

/// Partial update: only supplied fields change. A client-supplied owner (or
/// any unknown field) is ignored at deserialization.
pub async fn patch(
    state: &AppState,
    user_id: i64,
    id: i64,
    body: RecipePatch,
) -> Result<RecipeDetail, ApiError> {
    let existing = repo::find_for_owner(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe"))?;

    let title = body.title.unwrap_or(existing.title);
    if title.trim().is_empty() {
        return Err(ApiError::Validation(FieldErrors::single(
            "title",
            "This field may not be blank.",
        )));
    }
    let time_minutes = body.time_minutes.unwrap_or(existing.time_minutes);
    let price = body.price.unwrap_or(existing.price);
    let description = match body.description {
        Some(value) => value,
        None => existing.description,
    };
    let link = match body.link {
        Some(value) => value,
        None => existing.link,
    };

    let mut tx = state.db.begin().await.context("begin tx")?;
    let recipe = repo::update_tx(
        &mut tx,
        user_id,
        id,
        &title,
        time_minutes,
        price,
        description.as_deref(),
        link.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Recipe"))?;
    if let Some(tag_payloads) = body.tags {
        if tag_payloads.iter().any(|t| t.name.trim().is_empty()) {
            return Err(ApiError::Validation(FieldErrors::single(
                "tags",
                "Tag names may not be blank.",
            )));
        }
        let names: Vec<String> = tag_payloads.into_iter().map(|t| t.name).collect();
        let tags = tags_repo::resolve_for_owner_tx(&mut tx, user_id, &names).await?;
        let tag_ids: Vec<i64> = tags.iter().map(|t| t.id).collect();
        repo::set_tags_tx(&mut tx, recipe.id, &tag_ids).await?;
    }
    tx.commit().await.context("commit tx")?;

    detail(state, user_id, id).await
}

/// Delete an owned recipe and release its stored image, if any.
pub async fn remove(state: &AppState, user_id: i64, id: i64) -> Result<(), ApiError> {
    let image_key = repo::delete(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe"))?;
    if let Some(key) = image_key {
        // Row is already gone; log and continue.
        if let Err(err) = state.media.delete_object(&key).await {
            warn!(error = %err, key = %key, "failed to release recipe image");
        }
    }
    info!(recipe_id = id, "recipe deleted");
    Ok(())
}

/// Store a new image object, point the recipe at it and drop the previous
/// object. Non-image payloads are rejected before anything is stored.
pub async fn attach_image(
    state: &AppState,
    user_id: i64,
    id: i64,
    content_type: &str,
    data: Bytes,
) -> Result<RecipeDetail, ApiError> {
    let recipe = repo::find_for_owner(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe"))?;

    let ext = ext_from_mime(content_type).ok_or_else(|| {
        ApiError::Validation(FieldErrors::single(
            "image",
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        ))
    })?;

    let key = image_object_key(user_id, id, ext);
    state
        .media
        .put_object(&key, data, content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;
    repo::set_image_key(&state.db, user_id, id, &key).await?;

    if let Some(old_key) = recipe.image_key {
        if let Err(err) = state.media.delete_object(&old_key).await {
            warn!(error = %err, key = %old_key, "failed to delete replaced recipe image");
        }
    }

    info!(recipe_id = id, "recipe image uploaded");
    detail(state, user_id, id).await
}

pub async fn detail(state: &AppState, user_id: i64, id: i64) -> Result<RecipeDetail, ApiError> {
    let recipe = repo::find_for_owner(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe"))?;
    let tags = tags_repo::for_recipe(&state.db, recipe.id)
        .await?
        .into_iter()
        .map(TagOut::from)
        .collect();
    to_detail(state, recipe, tags).await
}

async fn to_detail(
    state: &AppState,
    recipe: Recipe,
    tags: Vec<TagOut>,
) -> Result<RecipeDetail, ApiError> {
    let image = match &recipe.image_key {
        Some(key) => Some(
            state
                .media
                .presign_get(key, state.config.media.presign_ttl_seconds)
                .await
                .with_context(|| format!("presign {key}"))?,
        ),
        None => None,
    };
    Ok(RecipeDetail {
        id: recipe.id,
        title: recipe.title,
        time_minutes: recipe.time_minutes,
        price: recipe.price,
        link: recipe.link,
        description: recipe.description,
        tags,
        image,
    })
}

fn image_object_key(user_id: i64, recipe_id: i64, ext: &str) -> String {
    format!("recipes/{user_id}/{recipe_id}-{}.{ext}", Uuid::new_v4())
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::dto::TagPayload;

    #[test]
    fn ext_from_mime_allowlist() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/pdf"), None);
        assert_eq!(ext_from_mime("text/plain"), None);
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn image_object_keys_are_scoped_and_unique() {
        let a = image_object_key(1, 2, "jpg");
        let b = image_object_key(1, 2, "jpg");
        assert!(a.starts_with("recipes/1/2-"));
        assert!(a.ends_with(".jpg"));
        assert_ne!(a, b);
    }

    #[test]
    fn write_validation_rejects_blank_title_and_tags() {
        let body = RecipeWrite {
            title: "   ".into(),
            time_minutes: 5,
            price: "1.00".parse().unwrap(),
            description: None,
            link: None,
            tags: vec![TagPayload { name: "".into() }],
        };
        let err = validate_write(&body).unwrap_err();
        match err {
            ApiError::Validation(fields) => {
                let value = serde_json::to_value(&fields).unwrap();
                assert!(value.get("title").is_some());
                assert!(value.get("tags").is_some());
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn write_validation_accepts_a_minimal_recipe() {
        let body = RecipeWrite {
            title: "X".into(),
            time_minutes: 5,
            price: "1.00".parse().unwrap(),
            description: None,
            link: None,
            tags: vec![],
        };
        assert!(validate_write(&body).is_ok());
    }
}
