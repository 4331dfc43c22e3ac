use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    error::{ApiError, FieldErrors},
    pagination::{Page, Pagination},
    state::AppState,
};

use super::dto::{RecipeDetail, RecipeListItem, RecipePatch, RecipeWrite};
use super::{repo, service};

const UPLOAD_LIMIT_BYTES: usize = 10 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe)
                .put(replace_recipe)
                .patch(patch_recipe)
                .delete(delete_recipe),
        )
        .route(
            "/recipes/:id/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(page): Query<Pagination>,
) -> Result<Json<Page<RecipeListItem>>, ApiError> {
    let total = repo::count_for_owner(&state.db, user_id).await?;
    let recipes = repo::list_for_owner(&state.db, user_id, page.limit, page.offset).await?;
    Ok(Json(Page {
        total,
        results: recipes.into_iter().map(RecipeListItem::from).collect(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<RecipeWrite>,
) -> Result<(StatusCode, HeaderMap, Json<RecipeDetail>), ApiError> {
    let detail = service::create(&state, user_id, payload).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/v1/recipes/{}", detail.id).parse() {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(detail)))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<RecipeDetail>, ApiError> {
    Ok(Json(service::detail(&state, user_id, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn replace_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<RecipeWrite>,
) -> Result<Json<RecipeDetail>, ApiError> {
    Ok(Json(service::replace(&state, user_id, id, payload).await?))
}

#[instrument(skip(state, payload))]
pub async fn patch_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<RecipePatch>,
) -> Result<Json<RecipeDetail>, ApiError> {
    Ok(Json(service::patch(&state, user_id, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    service::remove(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /recipes/{id}/upload-image, multipart with a single `image` part.
#[instrument(skip(state, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<RecipeDetail>, ApiError> {
    let mut image: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| invalid_multipart())?
    {
        if field.name() == Some("image") {
            let content_type = field
                .content_type()
                .map(|ct| ct.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field.bytes().await.map_err(|_| invalid_multipart())?;
            image = Some((content_type, data));
        }
    }

    let (content_type, data) = image.ok_or_else(|| {
        ApiError::Validation(FieldErrors::single("image", "No file was submitted."))
    })?;
    let detail = service::attach_image(&state, user_id, id, &content_type, data).await?;
    Ok(Json(detail))
}

fn invalid_multipart() -> ApiError {
    ApiError::Validation(FieldErrors::single(
        "image",
        "The submitted data was not a file.",
    ))
}
