use axum::extract::{Path, State};
use axum::Json;
use diesel::prelude::*;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::ai::{ImprovementAction, InteractiveAnalysis, QualityAnalysis};
use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{CvFeedback, CvInteractiveFeedback, CvProgress};
use crate::pipeline::{self, progress, reconcile};
use crate::schema::{cv_feedback, cv_interactive_feedback, cv_progress};
use crate::state::AppState;

use super::cvs::owned_cv;

#[derive(Serialize)]
pub struct SectionReply {
    pub feedback: Option<String>,
    pub score: f64,
}

#[derive(Serialize)]
pub struct InteractiveFeedbackResponse {
    pub cv_id: Uuid,
    pub overall_score: f64,
    pub is_approved: bool,
    pub contact: SectionReply,
    pub summary: SectionReply,
    pub experience: SectionReply,
    pub education: SectionReply,
    pub skills: SectionReply,
    pub improvement_actions: Vec<ImprovementAction>,
    pub next_steps: Option<String>,
    pub improvement_from_previous: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum InteractiveReply {
    Processing { status: String, message: String },
    Ready(Box<InteractiveFeedbackResponse>),
}

#[derive(Serialize)]
pub struct ActionCompletionResponse {
    pub cv_id: Uuid,
    pub completed_actions: usize,
    pub total_actions: usize,
    pub improvement_actions: Vec<ImprovementAction>,
}

#[derive(Serialize)]
pub struct ProgressResponse {
    pub total_uploads: i32,
    pub initial_score: f64,
    pub current_score: f64,
    pub improvement_percentage: f64,
    pub completed_actions: i32,
    pub total_actions: i32,
    pub first_upload_at: String,
    pub last_update_at: String,
}

pub async fn get_interactive_feedback(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(cv_id): Path<Uuid>,
) -> AppResult<Json<InteractiveReply>> {
    let (feedback, quality) = {
        let mut conn = state.db()?;
        let cv = owned_cv(&mut conn, cv_id, user.user_id)?;

        let feedback = cv_interactive_feedback::table
            .filter(cv_interactive_feedback::cv_id.eq(cv.id))
            .order(cv_interactive_feedback::created_at.desc())
            .first::<CvInteractiveFeedback>(&mut conn)
            .optional()?;

        let quality = if feedback.is_none() {
            cv_feedback::table
                .filter(cv_feedback::cv_id.eq(cv.id))
                .order(cv_feedback::created_at.desc())
                .first::<CvFeedback>(&mut conn)
                .optional()?
        } else {
            None
        };

        (feedback, quality)
    };

    match (feedback, quality) {
        (Some(feedback), _) => Ok(Json(InteractiveReply::Ready(Box::new(
            interactive_response(feedback)?,
        )))),
        // Only a quality row exists (the run's interactive half never
        // landed): serve a synthesized view without persisting it.
        (None, Some(quality_row)) => {
            let created_at = quality_row.created_at;
            let quality = quality_analysis_from_row(&quality_row);
            let synthesized = reconcile::reconcile(&quality, InteractiveAnalysis::default());
            Ok(Json(InteractiveReply::Ready(Box::new(
                synthesized_response(cv_id, synthesized, created_at),
            ))))
        }
        (None, None) => {
            // Kick the pipeline in case the upload-time run was lost; the
            // idempotency guard makes a duplicate kick harmless.
            let pipeline_state = state.clone();
            tokio::spawn(async move {
                pipeline::process_cv(&pipeline_state, cv_id).await;
            });

            Ok(Json(InteractiveReply::Processing {
                status: "processing".to_string(),
                message: "Interactive feedback is being prepared. Check back shortly.".to_string(),
            }))
        }
    }
}

pub async fn complete_action(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((cv_id, action_index)): Path<(Uuid, usize)>,
) -> AppResult<Json<ActionCompletionResponse>> {
    let mut conn = state.db()?;
    owned_cv(&mut conn, cv_id, user.user_id)?;

    let actions = progress::complete_action(&mut conn, user.user_id, cv_id, action_index)?;
    let completed = actions.iter().filter(|action| action.completed).count();

    info!(%cv_id, user_id = %user.user_id, action_index, "improvement action completed");

    Ok(Json(ActionCompletionResponse {
        cv_id,
        completed_actions: completed,
        total_actions: actions.len(),
        improvement_actions: actions,
    }))
}

pub async fn get_progress(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ProgressResponse>> {
    let mut conn = state.db()?;
    let progress = cv_progress::table
        .filter(cv_progress::user_id.eq(user.user_id))
        .first::<CvProgress>(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(ProgressResponse {
        total_uploads: progress.total_uploads,
        initial_score: progress.initial_score,
        current_score: progress.current_score,
        improvement_percentage: progress.improvement_percentage,
        completed_actions: progress.completed_actions,
        total_actions: progress.total_actions,
        first_upload_at: progress.first_upload_at.and_utc().to_rfc3339(),
        last_update_at: progress.last_update_at.and_utc().to_rfc3339(),
    }))
}

fn quality_analysis_from_row(row: &CvFeedback) -> QualityAnalysis {
    QualityAnalysis {
        quality_score: row.quality_score,
        structure_issues: row.structure_issues.clone().unwrap_or_default(),
        grammar_issues: row.grammar_issues.clone().unwrap_or_default(),
        missing_fields: row.missing_fields.clone().unwrap_or_default(),
        recommendations: row.recommendations.clone().unwrap_or_default(),
        is_approved: row.is_approved,
        overall_feedback: row.feedback_text.clone(),
    }
}

fn synthesized_response(
    cv_id: Uuid,
    interactive: InteractiveAnalysis,
    created_at: chrono::NaiveDateTime,
) -> InteractiveFeedbackResponse {
    InteractiveFeedbackResponse {
        cv_id,
        overall_score: interactive.overall_score,
        is_approved: interactive.is_approved,
        contact: SectionReply {
            feedback: Some(interactive.contact.feedback),
            score: interactive.contact.score,
        },
        summary: SectionReply {
            feedback: Some(interactive.summary.feedback),
            score: interactive.summary.score,
        },
        experience: SectionReply {
            feedback: Some(interactive.experience.feedback),
            score: interactive.experience.score,
        },
        education: SectionReply {
            feedback: Some(interactive.education.feedback),
            score: interactive.education.score,
        },
        skills: SectionReply {
            feedback: Some(interactive.skills.feedback),
            score: interactive.skills.score,
        },
        improvement_actions: interactive.actions,
        next_steps: Some(interactive.next_steps),
        improvement_from_previous: interactive.improvement_from_previous,
        created_at: created_at.and_utc().to_rfc3339(),
    }
}

fn interactive_response(
    feedback: CvInteractiveFeedback,
) -> AppResult<InteractiveFeedbackResponse> {
    let actions: Vec<ImprovementAction> =
        serde_json::from_value(feedback.improvement_actions).map_err(|err| {
            AppError::internal(format!("stored improvement actions are malformed: {err}"))
        })?;

    Ok(InteractiveFeedbackResponse {
        cv_id: feedback.cv_id,
        overall_score: feedback.overall_score,
        is_approved: feedback.is_approved,
        contact: SectionReply {
            feedback: feedback.contact_feedback,
            score: feedback.contact_score,
        },
        summary: SectionReply {
            feedback: feedback.summary_feedback,
            score: feedback.summary_score,
        },
        experience: SectionReply {
            feedback: feedback.experience_feedback,
            score: feedback.experience_score,
        },
        education: SectionReply {
            feedback: feedback.education_feedback,
            score: feedback.education_score,
        },
        skills: SectionReply {
            feedback: feedback.skills_feedback,
            score: feedback.skills_score,
        },
        improvement_actions: actions,
        next_steps: feedback.next_steps,
        improvement_from_previous: feedback.improvement_from_previous,
        created_at: feedback.created_at.and_utc().to_rfc3339(),
    })
}
