use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Cv, CvExtraction, CvFeedback, NewCv, NewCvExtraction};
use crate::pipeline::{self, EXTRACTION_COMPLETED, EXTRACTION_PROCESSING};
use crate::schema::{cv_extractions, cv_feedback, cvs};
use crate::state::AppState;

const PRESIGNED_URL_EXPIRY_SECONDS: u64 = 300;

const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];

#[derive(Serialize)]
pub struct CvResponse {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub uploaded_at: String,
    pub is_active: bool,
    pub status: String,
}

#[derive(Serialize)]
pub struct CvFeedbackResponse {
    pub cv_id: Uuid,
    pub feedback_text: String,
    pub quality_score: f64,
    pub structure_issues: Option<String>,
    pub grammar_issues: Option<String>,
    pub missing_fields: Option<String>,
    pub recommendations: Option<String>,
    pub is_approved: bool,
    pub created_at: String,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum FeedbackReply {
    Processing { status: String, message: String },
    Ready(CvFeedbackResponse),
}

#[derive(Serialize)]
pub struct CvAnalysisResponse {
    pub cv_id: Uuid,
    pub status: String,
    pub extracted_skills: Option<String>,
    pub extracted_experience: Option<String>,
    pub extracted_education: Option<String>,
    pub extracted_contact: Option<String>,
    pub confidence: f64,
    pub processed_at: Option<String>,
}

#[derive(Serialize)]
pub struct CvDownloadResponse {
    pub url: String,
    pub expires_in: u64,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
}

pub async fn upload_cv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<CvResponse>)> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|name| name.to_string());
            content_type = field.content_type().map(|mime| mime.to_string());
            let data = field.bytes().await.map_err(|err| {
                error!(error = %err, "failed to read file bytes");
                AppError::bad_request(format!("failed to read file bytes: {err}"))
            })?;
            file_bytes = Some(data.to_vec());
        }
    }

    let file_bytes = file_bytes.ok_or_else(|| AppError::bad_request("file field is required"))?;
    if file_bytes.is_empty() {
        return Err(AppError::bad_request("file field must not be empty"));
    }
    if file_bytes.len() > state.config.max_upload_bytes {
        return Err(AppError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!(
                "file exceeds the {} byte upload limit",
                state.config.max_upload_bytes
            ),
        ));
    }
    let file_name = file_name.ok_or_else(|| AppError::bad_request("filename is required"))?;
    validate_cv_file(&file_name, content_type.as_deref())?;

    let content_type = content_type.or_else(|| {
        mime_guess::from_path(&file_name)
            .first()
            .map(|mime| mime.to_string())
    });

    let cv_id = Uuid::new_v4();
    let s3_key = format!("cvs/{}/{}/{}", user.user_id, cv_id, file_name);

    state
        .storage
        .put_object(
            &s3_key,
            file_bytes.clone(),
            content_type.clone(),
            inline_content_disposition(&file_name),
        )
        .await?;

    let new_cv = NewCv {
        id: cv_id,
        user_id: user.user_id,
        file_name: file_name.clone(),
        content_type: content_type.clone(),
        size_bytes: file_bytes.len() as i64,
        s3_key,
    };

    let cv: Cv = {
        let mut conn = state.db()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            // Only one active CV per user; the new upload supersedes it.
            diesel::update(
                cvs::table
                    .filter(cvs::user_id.eq(user.user_id))
                    .filter(cvs::is_active.eq(true)),
            )
            .set((
                cvs::is_active.eq(false),
                cvs::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

            diesel::insert_into(cvs::table).values(&new_cv).execute(conn)?;

            // Seed a processing marker so the feedback endpoint can report
            // an in-flight state before the pipeline finishes.
            let marker = NewCvExtraction {
                id: Uuid::new_v4(),
                cv_id,
                extracted_text: None,
                extracted_skills: None,
                extracted_experience: None,
                extracted_education: None,
                extracted_contact: None,
                confidence: 0.0,
                status: EXTRACTION_PROCESSING.to_string(),
                processed_at: None,
            };
            diesel::insert_into(cv_extractions::table)
                .values(&marker)
                .execute(conn)?;

            cvs::table.find(cv_id).first(conn)
        })?
    };

    info!(cv_id = %cv.id, user_id = %user.user_id, file_name = %cv.file_name, "CV uploaded");

    let pipeline_state = state.clone();
    tokio::spawn(async move {
        pipeline::queue_and_process(&pipeline_state, cv_id).await;
    });

    let response = cv_response(cv, EXTRACTION_PROCESSING.to_string());
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn current_cv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<CvResponse>> {
    let mut conn = state.db()?;
    let cv = cvs::table
        .filter(cvs::user_id.eq(user.user_id))
        .filter(cvs::is_active.eq(true))
        .first::<Cv>(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let status = latest_extraction_status(&mut conn, cv.id)?;
    Ok(Json(cv_response(cv, status)))
}

pub async fn cv_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<CvResponse>>> {
    let mut conn = state.db()?;
    let history = cvs::table
        .filter(cvs::user_id.eq(user.user_id))
        .order(cvs::uploaded_at.desc())
        .load::<Cv>(&mut conn)?;

    let mut responses = Vec::with_capacity(history.len());
    for cv in history {
        let status = latest_extraction_status(&mut conn, cv.id)?;
        responses.push(cv_response(cv, status));
    }
    Ok(Json(responses))
}

pub async fn get_feedback(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(cv_id): Path<Uuid>,
) -> AppResult<Json<FeedbackReply>> {
    let mut conn = state.db()?;
    let cv = owned_cv(&mut conn, cv_id, user.user_id)?;

    let feedback = cv_feedback::table
        .filter(cv_feedback::cv_id.eq(cv.id))
        .order(cv_feedback::created_at.desc())
        .first::<CvFeedback>(&mut conn)
        .optional()?;

    match feedback {
        Some(feedback) => Ok(Json(FeedbackReply::Ready(feedback_response(feedback)))),
        None => Ok(Json(FeedbackReply::Processing {
            status: "processing".to_string(),
            message: "Your CV is being analyzed. Check back shortly.".to_string(),
        })),
    }
}

pub async fn get_analysis(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(cv_id): Path<Uuid>,
) -> AppResult<Json<CvAnalysisResponse>> {
    let mut conn = state.db()?;
    let cv = owned_cv(&mut conn, cv_id, user.user_id)?;

    // Prefer the newest completed run; otherwise report whatever the newest
    // attempt looked like (processing marker or failure).
    let extraction = cv_extractions::table
        .filter(cv_extractions::cv_id.eq(cv.id))
        .filter(cv_extractions::status.eq(EXTRACTION_COMPLETED))
        .order(cv_extractions::created_at.desc())
        .first::<CvExtraction>(&mut conn)
        .optional()?;
    let extraction = match extraction {
        Some(extraction) => extraction,
        None => cv_extractions::table
            .filter(cv_extractions::cv_id.eq(cv.id))
            .order(cv_extractions::created_at.desc())
            .first::<CvExtraction>(&mut conn)
            .optional()?
            .ok_or_else(AppError::not_found)?,
    };

    Ok(Json(CvAnalysisResponse {
        cv_id: cv.id,
        status: extraction.status,
        extracted_skills: extraction.extracted_skills,
        extracted_experience: extraction.extracted_experience,
        extracted_education: extraction.extracted_education,
        extracted_contact: extraction.extracted_contact,
        confidence: extraction.confidence,
        processed_at: extraction
            .processed_at
            .map(|at| at.and_utc().to_rfc3339()),
    }))
}

pub async fn download_cv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(cv_id): Path<Uuid>,
) -> AppResult<Json<CvDownloadResponse>> {
    let cv = {
        let mut conn = state.db()?;
        owned_cv(&mut conn, cv_id, user.user_id)?
    };

    let url = state
        .storage
        .presign_get_object(&cv.s3_key, Duration::from_secs(PRESIGNED_URL_EXPIRY_SECONDS))
        .await?;

    Ok(Json(CvDownloadResponse {
        url,
        expires_in: PRESIGNED_URL_EXPIRY_SECONDS,
        file_name: cv.file_name,
        content_type: cv.content_type,
        size_bytes: cv.size_bytes,
    }))
}

pub async fn reprocess_cv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(cv_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    {
        let mut conn = state.db()?;
        owned_cv(&mut conn, cv_id, user.user_id)?;
    }

    // Re-queue and let the idempotency guard decide: a version that already
    // has a completed run stays untouched, a failed one gets another attempt.
    info!(%cv_id, user_id = %user.user_id, "CV reprocess requested");
    let pipeline_state = state.clone();
    tokio::spawn(async move {
        pipeline::queue_and_process(&pipeline_state, cv_id).await;
    });

    Ok(StatusCode::ACCEPTED)
}

pub async fn delete_cv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(cv_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let cv = {
        let mut conn = state.db()?;
        let cv = owned_cv(&mut conn, cv_id, user.user_id)?;

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::delete(cvs::table.find(cv.id)).execute(conn)?;

            // Promote the newest remaining upload so the user keeps an
            // active CV when one exists.
            if cv.is_active {
                let replacement = cvs::table
                    .filter(cvs::user_id.eq(user.user_id))
                    .order(cvs::uploaded_at.desc())
                    .first::<Cv>(conn)
                    .optional()?;
                if let Some(replacement) = replacement {
                    diesel::update(cvs::table.find(replacement.id))
                        .set((
                            cvs::is_active.eq(true),
                            cvs::updated_at.eq(Utc::now().naive_utc()),
                        ))
                        .execute(conn)?;
                }
            }
            Ok(())
        })?;

        cv
    };

    if let Err(err) = state.storage.delete_object(&cv.s3_key).await {
        warn!(cv_id = %cv.id, error = %err, "failed to delete CV object from storage");
    }

    info!(cv_id = %cv.id, user_id = %user.user_id, "CV deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn inline_content_disposition(file_name: &str) -> Option<String> {
    if file_name.is_empty() {
        return None;
    }

    let sanitized: String = file_name
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    ))
}

fn validate_cv_file(file_name: &str, content_type: Option<&str>) -> AppResult<()> {
    if let Some(content_type) = content_type {
        if ALLOWED_CONTENT_TYPES
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(content_type))
        {
            return Ok(());
        }
    }

    let extension = file_name
        .rsplit('.')
        .next()
        .map(|ext| ext.to_ascii_lowercase());
    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(AppError::bad_request(
            "only PDF and Word documents are accepted",
        )),
    }
}

pub(super) fn owned_cv(
    conn: &mut diesel::pg::PgConnection,
    cv_id: Uuid,
    user_id: Uuid,
) -> AppResult<Cv> {
    cvs::table
        .find(cv_id)
        .filter(cvs::user_id.eq(user_id))
        .first::<Cv>(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}

fn latest_extraction_status(
    conn: &mut diesel::pg::PgConnection,
    cv_id: Uuid,
) -> AppResult<String> {
    let status = cv_extractions::table
        .filter(cv_extractions::cv_id.eq(cv_id))
        .order(cv_extractions::created_at.desc())
        .select(cv_extractions::status)
        .first::<String>(conn)
        .optional()?;
    Ok(status.unwrap_or_else(|| pipeline::EXTRACTION_PENDING.to_string()))
}

fn cv_response(cv: Cv, status: String) -> CvResponse {
    CvResponse {
        id: cv.id,
        file_name: cv.file_name,
        content_type: cv.content_type,
        size_bytes: cv.size_bytes,
        uploaded_at: cv.uploaded_at.and_utc().to_rfc3339(),
        is_active: cv.is_active,
        status,
    }
}

fn feedback_response(feedback: CvFeedback) -> CvFeedbackResponse {
    CvFeedbackResponse {
        cv_id: feedback.cv_id,
        feedback_text: feedback.feedback_text,
        quality_score: feedback.quality_score,
        structure_issues: feedback.structure_issues,
        grammar_issues: feedback.grammar_issues,
        missing_fields: feedback.missing_fields,
        recommendations: feedback.recommendations,
        is_approved: feedback.is_approved,
        created_at: feedback.created_at.and_utc().to_rfc3339(),
    }
}
