use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        jwt::{AuthUser, JwtKeys},
        password,
        policy::{self, Requester, UserAction},
    },
    error::{ApiError, FieldErrors},
    pagination::{Page, Pagination},
    state::AppState,
};

use super::dto::{
    CreateUserRequest, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, TokenPair,
    UpdateUserRequest, UserOut, VerifyRequest,
};
use super::repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(register))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/users/login-user", post(login))
        .route("/users/token/refresh", post(refresh_token))
        .route("/users/token/verify", post(verify_token))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserOut>), ApiError> {
    policy::authorize(UserAction::Register, None)?;

    let email = repo::normalize_email(&payload.email);
    let mut errors = FieldErrors::new();
    if email.is_empty() {
        errors.add("email", "This field may not be blank.");
    } else if !is_valid_email(&email) {
        errors.add("email", "Enter a valid email address.");
    }
    if payload.password.chars().count() < 5 {
        errors.add("password", "Ensure this field has at least 5 characters.");
    }
    errors.into_result()?;

    if repo::email_taken(&state.db, &email).await? {
        warn!("email already registered");
        return Err(ApiError::Validation(FieldErrors::single(
            "email",
            "user with this email already exists.",
        )));
    }

    let hash = password::hash_password(&payload.password)?;
    let user = repo::create(&state.db, &email, &payload.name, &hash).await?;
    info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(UserOut::from(user))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    policy::authorize(UserAction::Login, None)?;

    let mut errors = FieldErrors::new();
    if payload.email.trim().is_empty() {
        errors.add("email", "This field may not be blank.");
    }
    if payload.password.chars().count() < 8 {
        errors.add("password", "Ensure this field has at least 8 characters.");
    }
    errors.into_result()?;

    // One failure shape for unknown email and bad password.
    let user = match repo::find_by_email(&state.db, payload.email.trim()).await? {
        Some(user) => user,
        None => {
            warn!("login unknown email");
            return Err(ApiError::auth_failed());
        }
    };

    if !password::verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::auth_failed());
    }

    let keys = JwtKeys::from_ref(&state);
    let token = TokenPair {
        access: keys.sign_access(user.id)?,
        refresh: keys.sign_refresh(user.id)?,
    };
    info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse {
        message: "login successful".into(),
        token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;
    Ok(Json(RefreshResponse {
        access: keys.sign_access(claims.sub)?,
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_token(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    keys.verify(&payload.token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;
    Ok(Json(serde_json::json!({})))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(page): Query<Pagination>,
) -> Result<Json<Page<UserOut>>, ApiError> {
    policy::authorize(UserAction::List, Some(&Requester::member(user_id)))?;
    let total = repo::count(&state.db).await?;
    let users = repo::list(&state.db, page.limit, page.offset).await?;
    Ok(Json(Page {
        total,
        results: users.into_iter().map(UserOut::from).collect(),
    }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<UserOut>, ApiError> {
    policy::authorize(UserAction::Retrieve, Some(&Requester::member(user_id)))?;
    let user = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(UserOut::from(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserOut>, ApiError> {
    policy::authorize(UserAction::PartialUpdate, Some(&Requester::member(user_id)))?;

    if let Some(new_password) = &payload.password {
        if new_password.chars().count() < 5 {
            return Err(ApiError::Validation(FieldErrors::single(
                "password",
                "Ensure this field has at least 5 characters.",
            )));
        }
    }

    let password_hash = match &payload.password {
        Some(plain) => Some(password::hash_password(plain)?),
        None => None,
    };
    let user = repo::update(
        &state.db,
        id,
        payload.name.as_deref(),
        password_hash.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;
    info!(user_id = user.id, "user profile updated");
    Ok(Json(UserOut::from(user)))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let requester = repo::requester(&state.db, user_id)
        .await?
        .ok_or_else(ApiError::auth_failed)?;
    policy::authorize(UserAction::Destroy, Some(&requester))?;

    if repo::delete(&state.db, id).await? {
        info!(target_id = id, "user deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("User"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("missing@tld"));
    }
}
