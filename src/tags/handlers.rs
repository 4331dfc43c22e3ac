use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::jwt::AuthUser,
    error::{ApiError, FieldErrors},
    pagination::{Page, Pagination},
    state::AppState,
};

use super::dto::{PatchTagRequest, TagOut, WriteTagRequest};
use super::repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route(
            "/tags/:id",
            get(get_tag)
                .put(replace_tag)
                .patch(patch_tag)
                .delete(delete_tag),
        )
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation(FieldErrors::single(
            "name",
            "This field may not be blank.",
        )));
    }
    Ok(())
}

fn duplicate_name() -> ApiError {
    ApiError::Validation(FieldErrors::single(
        "name",
        "tag with this name already exists.",
    ))
}

#[instrument(skip(state))]
pub async fn list_tags(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(page): Query<Pagination>,
) -> Result<Json<Page<TagOut>>, ApiError> {
    let total = repo::count_for_owner(&state.db, user_id).await?;
    let tags = repo::list_for_owner(&state.db, user_id, page.limit, page.offset).await?;
    Ok(Json(Page {
        total,
        results: tags.into_iter().map(TagOut::from).collect(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn create_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<WriteTagRequest>,
) -> Result<(StatusCode, Json<TagOut>), ApiError> {
    validate_name(&payload.name)?;
    let tag = repo::insert(&state.db, user_id, &payload.name)
        .await?
        .ok_or_else(duplicate_name)?;
    info!(tag_id = tag.id, "tag created");
    Ok((StatusCode::CREATED, Json(TagOut::from(tag))))
}

#[instrument(skip(state))]
pub async fn get_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<TagOut>, ApiError> {
    let tag = repo::find_for_owner(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tag"))?;
    Ok(Json(TagOut::from(tag)))
}

#[instrument(skip(state, payload))]
pub async fn replace_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<WriteTagRequest>,
) -> Result<Json<TagOut>, ApiError> {
    rename(&state, user_id, id, &payload.name).await
}

#[instrument(skip(state, payload))]
pub async fn patch_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<PatchTagRequest>,
) -> Result<Json<TagOut>, ApiError> {
    match payload.name {
        Some(name) => rename(&state, user_id, id, &name).await,
        None => {
            let tag = repo::find_for_owner(&state.db, user_id, id)
                .await?
                .ok_or_else(|| ApiError::not_found("Tag"))?;
            Ok(Json(TagOut::from(tag)))
        }
    }
}

async fn rename(
    state: &AppState,
    user_id: i64,
    id: i64,
    name: &str,
) -> Result<Json<TagOut>, ApiError> {
    validate_name(name)?;
    if repo::name_taken(&state.db, user_id, name, id).await? {
        return Err(duplicate_name());
    }
    let tag = repo::rename(&state.db, user_id, id, name)
        .await?
        .ok_or_else(|| ApiError::not_found("Tag"))?;
    Ok(Json(TagOut::from(tag)))
}

#[instrument(skip(state))]
pub async fn delete_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if repo::delete(&state.db, user_id, id).await? {
        info!(tag_id = id, "tag deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Tag"))
    }
}
