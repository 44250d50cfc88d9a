use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Cv, JobApplication, JobPost, NewJobApplication, NewJobPost};
use crate::schema::{cvs, job_applications, job_posts};
use crate::state::AppState;

pub const APPLICATION_SUBMITTED: &str = "submitted";

const APPLICATION_STATUSES: &[&str] = &["submitted", "reviewed", "accepted", "rejected"];

#[derive(Deserialize)]
pub struct CreateJobPostRequest {
    pub title: String,
    pub description: String,
    pub required_skills: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
}

#[derive(Deserialize, AsChangeset)]
#[diesel(table_name = job_posts)]
pub struct UpdateJobPostRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub required_skills: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct ApplicationStatusRequest {
    pub status: String,
}

#[derive(Serialize)]
pub struct JobPostResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub required_skills: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct JobApplicationResponse {
    pub id: Uuid,
    pub job_post_id: Uuid,
    pub user_id: Uuid,
    pub cv_id: Option<Uuid>,
    pub status: String,
    pub applied_at: String,
}

pub async fn list_job_posts(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<Vec<JobPostResponse>>> {
    let mut conn = state.db()?;
    let posts = job_posts::table
        .filter(job_posts::is_active.eq(true))
        .order(job_posts::created_at.desc())
        .load::<JobPost>(&mut conn)?;

    Ok(Json(posts.into_iter().map(job_post_response).collect()))
}

pub async fn create_job_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateJobPostRequest>,
) -> AppResult<(StatusCode, Json<JobPostResponse>)> {
    if !user.is_recruiter() {
        return Err(AppError::forbidden());
    }

    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::bad_request("title is required"));
    }
    if payload.description.trim().is_empty() {
        return Err(AppError::bad_request("description is required"));
    }

    let new_post = NewJobPost {
        id: Uuid::new_v4(),
        recruiter_id: user.user_id,
        title,
        description: payload.description,
        required_skills: payload.required_skills,
        location: payload.location,
        job_type: payload.job_type,
    };

    let mut conn = state.db()?;
    diesel::insert_into(job_posts::table)
        .values(&new_post)
        .execute(&mut conn)?;
    let post: JobPost = job_posts::table.find(new_post.id).first(&mut conn)?;

    info!(job_post_id = %post.id, recruiter_id = %user.user_id, "job post created");
    Ok((StatusCode::CREATED, Json(job_post_response(post))))
}

pub async fn update_job_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(job_post_id): Path<Uuid>,
    Json(mut payload): Json<UpdateJobPostRequest>,
) -> AppResult<Json<JobPostResponse>> {
    if let Some(title) = payload.title.take() {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::bad_request("title must not be empty"));
        }
        payload.title = Some(title);
    }
    if let Some(description) = payload.description.as_ref() {
        if description.trim().is_empty() {
            return Err(AppError::bad_request("description must not be empty"));
        }
    }

    let mut conn = state.db()?;
    let post = owned_job_post(&mut conn, job_post_id, &user)?;

    diesel::update(job_posts::table.find(post.id))
        .set((&payload, job_posts::updated_at.eq(Utc::now().naive_utc())))
        .execute(&mut conn)?;
    let post: JobPost = job_posts::table.find(post.id).first(&mut conn)?;

    info!(job_post_id = %post.id, recruiter_id = %user.user_id, "job post updated");
    Ok(Json(job_post_response(post)))
}

pub async fn deactivate_job_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(job_post_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let post = owned_job_post(&mut conn, job_post_id, &user)?;

    // Applications keep their history; the posting just stops accepting
    // new ones and drops out of the listing.
    diesel::update(job_posts::table.find(post.id))
        .set((
            job_posts::is_active.eq(false),
            job_posts::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    info!(job_post_id = %post.id, recruiter_id = %user.user_id, "job post deactivated");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn apply_to_job(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(job_post_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<JobApplicationResponse>)> {
    let mut conn = state.db()?;

    let post = job_posts::table
        .find(job_post_id)
        .filter(job_posts::is_active.eq(true))
        .first::<JobPost>(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let existing = job_applications::table
        .filter(job_applications::job_post_id.eq(post.id))
        .filter(job_applications::user_id.eq(user.user_id))
        .first::<JobApplication>(&mut conn)
        .optional()?;
    if existing.is_some() {
        return Err(AppError::conflict("you have already applied to this job"));
    }

    // The application snapshots whichever CV is active at apply time.
    let active_cv = cvs::table
        .filter(cvs::user_id.eq(user.user_id))
        .filter(cvs::is_active.eq(true))
        .first::<Cv>(&mut conn)
        .optional()?;

    let new_application = NewJobApplication {
        id: Uuid::new_v4(),
        job_post_id: post.id,
        user_id: user.user_id,
        cv_id: active_cv.map(|cv| cv.id),
        status: APPLICATION_SUBMITTED.to_string(),
    };

    diesel::insert_into(job_applications::table)
        .values(&new_application)
        .execute(&mut conn)?;
    let application: JobApplication = job_applications::table
        .find(new_application.id)
        .first(&mut conn)?;

    info!(
        application_id = %application.id,
        job_post_id = %post.id,
        user_id = %user.user_id,
        "job application submitted"
    );
    Ok((
        StatusCode::CREATED,
        Json(application_response(application)),
    ))
}

pub async fn list_applications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(job_post_id): Path<Uuid>,
) -> AppResult<Json<Vec<JobApplicationResponse>>> {
    let mut conn = state.db()?;
    let post = owned_job_post(&mut conn, job_post_id, &user)?;

    let applications = job_applications::table
        .filter(job_applications::job_post_id.eq(post.id))
        .order(job_applications::applied_at.desc())
        .load::<JobApplication>(&mut conn)?;

    Ok(Json(
        applications.into_iter().map(application_response).collect(),
    ))
}

pub async fn update_application_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((job_post_id, application_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ApplicationStatusRequest>,
) -> AppResult<Json<JobApplicationResponse>> {
    let status = payload.status.trim().to_ascii_lowercase();
    if !APPLICATION_STATUSES.contains(&status.as_str()) {
        return Err(AppError::bad_request(format!(
            "status must be one of: {}",
            APPLICATION_STATUSES.join(", ")
        )));
    }

    let mut conn = state.db()?;
    let post = owned_job_post(&mut conn, job_post_id, &user)?;

    let application = job_applications::table
        .find(application_id)
        .filter(job_applications::job_post_id.eq(post.id))
        .first::<JobApplication>(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    diesel::update(job_applications::table.find(application.id))
        .set(job_applications::status.eq(&status))
        .execute(&mut conn)?;
    let application: JobApplication = job_applications::table
        .find(application.id)
        .first(&mut conn)?;

    info!(
        application_id = %application.id,
        job_post_id = %post.id,
        status = %application.status,
        "application status updated"
    );
    Ok(Json(application_response(application)))
}

/// The caller's own applications, newest first.
pub async fn my_applications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<JobApplicationResponse>>> {
    let mut conn = state.db()?;
    let applications = job_applications::table
        .filter(job_applications::user_id.eq(user.user_id))
        .order(job_applications::applied_at.desc())
        .load::<JobApplication>(&mut conn)?;

    Ok(Json(
        applications.into_iter().map(application_response).collect(),
    ))
}

// Only the recruiter who owns the posting may manage it or see applicants.
fn owned_job_post(
    conn: &mut diesel::pg::PgConnection,
    job_post_id: Uuid,
    user: &AuthenticatedUser,
) -> AppResult<JobPost> {
    let post = job_posts::table
        .find(job_post_id)
        .first::<JobPost>(conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if !user.is_recruiter() || post.recruiter_id != user.user_id {
        return Err(AppError::forbidden());
    }
    Ok(post)
}

fn job_post_response(post: JobPost) -> JobPostResponse {
    JobPostResponse {
        id: post.id,
        title: post.title,
        description: post.description,
        required_skills: post.required_skills,
        location: post.location,
        job_type: post.job_type,
        is_active: post.is_active,
        created_at: post.created_at.and_utc().to_rfc3339(),
    }
}

fn application_response(application: JobApplication) -> JobApplicationResponse {
    JobApplicationResponse {
        id: application.id,
        job_post_id: application.job_post_id,
        user_id: application.user_id,
        cv_id: application.cv_id,
        status: application.status,
        applied_at: application.applied_at.and_utc().to_rfc3339(),
    }
}
