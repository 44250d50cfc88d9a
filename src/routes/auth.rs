use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{password, AuthenticatedUser, ROLE_RECRUITER, ROLE_STUDENT},
    error::{AppError, AppResult},
    models::{NewUser, User},
    schema::users::dsl,
    state::AppState,
};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let username = payload.username.trim().to_lowercase();
    if username.is_empty() {
        return Err(AppError::bad_request("username is required"));
    }
    if payload.password.len() < 8 {
        return Err(AppError::bad_request(
            "password must be at least 8 characters",
        ));
    }
    let full_name = payload.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(AppError::bad_request("full name is required"));
    }

    // Students self-register; recruiter accounts are created with an explicit
    // role. Admin accounts are provisioned out of band.
    let role = match payload.role.as_deref() {
        None => ROLE_STUDENT.to_string(),
        Some(role) if role == ROLE_STUDENT || role == ROLE_RECRUITER => role.to_string(),
        Some(other) => {
            return Err(AppError::bad_request(format!("unknown role: {other}")));
        }
    };

    let password_hash = password::hash_password(&payload.password)?;
    let mut conn = state.db()?;

    let existing = dsl::users
        .filter(dsl::username.eq(&username))
        .first::<User>(&mut conn)
        .optional()?;
    if existing.is_some() {
        return Err(AppError::conflict("username is already taken"));
    }

    let new_user = NewUser {
        id: Uuid::new_v4(),
        username: username.clone(),
        password_hash,
        role,
        full_name,
    };

    diesel::insert_into(dsl::users)
        .values(&new_user)
        .execute(&mut conn)?;

    let user: User = dsl::users.find(new_user.id).first(&mut conn)?;
    info!(user_id = %user.id, username = %user.username, role = %user.role, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            role: user.role,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let username = payload.username.trim().to_lowercase();
    let mut conn = state.db()?;

    let user = dsl::users
        .filter(dsl::username.eq(&username))
        .first::<User>(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    if !password::verify_password(&payload.password, &user.password_hash) {
        return Err(AppError::unauthorized());
    }

    let access_token = state
        .jwt
        .generate_token(user.id, &user.username, &user.role)
        .map_err(AppError::from)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt_expiry_minutes * 60,
    }))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}
