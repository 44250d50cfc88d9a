//! CV processing pipeline: download, extract, analyze, persist.
//!
//! `process_cv` is the single entry point. It is idempotent per CV version
//! and never propagates an error to its caller: any failure after the CV has
//! been located is converted into a `failed` extraction record plus a
//! placeholder feedback row so the student always sees a terminal state.

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ai::{InteractiveAnalysis, QualityAnalysis};
use crate::extract::ExtractedCv;
use crate::jobs::{self, JOB_PROCESS_CV};
use crate::models::{Cv, CvExtraction, NewCvExtraction, NewCvFeedback, NewCvInteractiveFeedback};
use crate::schema::{cv_extractions, cv_feedback, cv_interactive_feedback, cvs};
use crate::state::AppState;

pub mod progress;
pub mod reconcile;

pub const EXTRACTION_PENDING: &str = "pending";
pub const EXTRACTION_PROCESSING: &str = "processing";
pub const EXTRACTION_COMPLETED: &str = "completed";
pub const EXTRACTION_FAILED: &str = "failed";

pub const FAILURE_FEEDBACK_TEXT: &str =
    "We couldn't complete AI analysis at this time. Try re-uploading later.";
pub const FAILURE_QUALITY_SCORE: f64 = 0.5;
pub const FAILURE_RECOMMENDATIONS: &str =
    "Ensure the CV is clear and concise. Include key projects and achievements.";

/// Enqueues a `process-cv` job for the worker and then runs the pipeline
/// inline. The enqueue is best effort: the synchronous run is what the
/// uploader waits on, and the queued job becomes a no-op via the idempotency
/// guard when the inline run already succeeded.
pub async fn queue_and_process(state: &AppState, cv_id: Uuid) {
    match state.db() {
        Ok(mut conn) => {
            if let Err(err) =
                jobs::enqueue_job(&mut conn, JOB_PROCESS_CV, json!({ "cv_id": cv_id }), None)
            {
                warn!(%cv_id, error = %err, "failed to enqueue process-cv job");
            }
        }
        Err(err) => warn!(%cv_id, error = %err, "no database connection to enqueue job"),
    }

    process_cv(state, cv_id).await;
}

/// Runs the full pipeline for one CV. Safe to call repeatedly and from
/// concurrent workers; a CV whose newest completed extraction postdates its
/// upload is skipped.
pub async fn process_cv(state: &AppState, cv_id: Uuid) {
    let cv = {
        let mut conn = match state.db() {
            Ok(conn) => conn,
            Err(err) => {
                error!(%cv_id, error = %err, "pipeline could not reach the database");
                return;
            }
        };

        let cv = match load_cv(&mut conn, cv_id) {
            Ok(Some(cv)) => cv,
            Ok(None) => {
                warn!(%cv_id, "pipeline invoked for unknown CV, skipping");
                return;
            }
            Err(err) => {
                error!(%cv_id, error = %err, "failed to load CV");
                return;
            }
        };

        match already_processed(&mut conn, &cv) {
            Ok(true) => {
                info!(%cv_id, "CV already processed for this version, skipping");
                return;
            }
            Ok(false) => {}
            Err(err) => {
                error!(%cv_id, error = %err, "idempotency check failed");
                return;
            }
        }

        cv
        // Connection drops here; no pool slot is held across storage or AI calls.
    };

    match analyze_and_persist(state, &cv).await {
        Ok(outcome) => {
            info!(
                %cv_id,
                score = outcome.overall_score,
                approved = outcome.is_approved,
                "CV processing completed"
            );
        }
        Err(err) => {
            error!(%cv_id, error = %err, "CV processing failed, recording placeholder feedback");
            record_failure(state, cv_id);
        }
    }
}

struct PipelineOutcome {
    overall_score: f64,
    is_approved: bool,
}

async fn analyze_and_persist(state: &AppState, cv: &Cv) -> anyhow::Result<PipelineOutcome> {
    let bytes = state.storage.get_object(&cv.s3_key).await?;
    let extracted = state
        .extractor
        .extract(bytes, cv.content_type.as_deref())
        .await?;

    let previous_text = {
        let mut conn = state.db().map_err(|err| anyhow::anyhow!("{err}"))?;
        previous_cv_text(&mut conn, cv)?
    };

    let quality = state.analyzer.analyze_quality(&extracted.full_text).await?;

    // An interactive failure is not fatal: the reconciler can rebuild a
    // usable result from the quality analysis alone.
    let interactive = match state
        .analyzer
        .analyze_interactive(&extracted.full_text, previous_text.as_deref())
        .await
    {
        Ok(interactive) => interactive,
        Err(err) => {
            warn!(cv_id = %cv.id, error = %err, "interactive analysis failed, falling back to quality-derived feedback");
            InteractiveAnalysis::default()
        }
    };
    let interactive = reconcile::reconcile(&quality, interactive);

    let skills = match state.analyzer.extract_skills(&extracted.full_text).await {
        Ok(skills) => skills,
        Err(err) => {
            warn!(cv_id = %cv.id, error = %err, "skill extraction failed, keeping heuristic hints");
            Vec::new()
        }
    };

    let outcome = PipelineOutcome {
        overall_score: interactive.overall_score,
        is_approved: interactive.is_approved,
    };

    let mut conn = state.db().map_err(|err| anyhow::anyhow!("{err}"))?;
    persist_results(&mut conn, cv, &extracted, &skills, &quality, &interactive)?;

    Ok(outcome)
}

/// Writes the completed extraction, both feedback rows, and the progress
/// update in one transaction, so readers never observe a half-processed CV.
fn persist_results(
    conn: &mut PgConnection,
    cv: &Cv,
    extracted: &ExtractedCv,
    skills: &[String],
    quality: &QualityAnalysis,
    interactive: &InteractiveAnalysis,
) -> anyhow::Result<()> {
    let now = Utc::now().naive_utc();

    let extracted_skills = if skills.is_empty() {
        extracted.skills.clone()
    } else {
        Some(skills.join(", "))
    };

    let extraction = NewCvExtraction {
        id: Uuid::new_v4(),
        cv_id: cv.id,
        extracted_text: Some(extracted.full_text.clone()),
        extracted_skills,
        extracted_experience: extracted.experience.clone(),
        extracted_education: extracted.education.clone(),
        extracted_contact: extracted.contact.clone(),
        confidence: interactive.overall_score,
        status: EXTRACTION_COMPLETED.to_string(),
        processed_at: Some(now),
    };

    let feedback = NewCvFeedback {
        id: Uuid::new_v4(),
        cv_id: cv.id,
        user_id: cv.user_id,
        feedback_text: quality.overall_feedback.clone(),
        quality_score: quality.quality_score,
        structure_issues: some_if_present(&quality.structure_issues),
        grammar_issues: some_if_present(&quality.grammar_issues),
        missing_fields: some_if_present(&quality.missing_fields),
        recommendations: some_if_present(&quality.recommendations),
        is_approved: quality.is_approved,
    };

    let interactive_row = NewCvInteractiveFeedback {
        id: Uuid::new_v4(),
        cv_id: cv.id,
        user_id: cv.user_id,
        overall_score: interactive.overall_score,
        is_approved: interactive.is_approved,
        contact_feedback: some_if_present(&interactive.contact.feedback),
        contact_score: interactive.contact.score,
        summary_feedback: some_if_present(&interactive.summary.feedback),
        summary_score: interactive.summary.score,
        experience_feedback: some_if_present(&interactive.experience.feedback),
        experience_score: interactive.experience.score,
        education_feedback: some_if_present(&interactive.education.feedback),
        education_score: interactive.education.score,
        skills_feedback: some_if_present(&interactive.skills.feedback),
        skills_score: interactive.skills.score,
        improvement_actions: serde_json::to_value(&interactive.actions)?,
        next_steps: some_if_present(&interactive.next_steps),
        improvement_from_previous: interactive.improvement_from_previous.clone(),
    };

    let total_actions = interactive.actions.len() as i32;
    let overall_score = interactive.overall_score;

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::insert_into(cv_extractions::table)
            .values(&extraction)
            .execute(conn)?;
        diesel::insert_into(cv_feedback::table)
            .values(&feedback)
            .execute(conn)?;
        diesel::insert_into(cv_interactive_feedback::table)
            .values(&interactive_row)
            .execute(conn)?;
        progress::upsert_progress(conn, cv.user_id, overall_score, total_actions)?;
        Ok(())
    })?;

    Ok(())
}

/// Terminal failure path: a `failed` extraction row plus placeholder quality
/// feedback, written in their own transaction. Skipped entirely when the CV
/// row is gone (deleted mid-flight).
fn record_failure(state: &AppState, cv_id: Uuid) {
    let mut conn = match state.db() {
        Ok(conn) => conn,
        Err(err) => {
            error!(%cv_id, error = %err, "cannot record pipeline failure");
            return;
        }
    };

    let cv = match load_cv(&mut conn, cv_id) {
        Ok(Some(cv)) => cv,
        Ok(None) => {
            warn!(%cv_id, "CV disappeared before failure could be recorded");
            return;
        }
        Err(err) => {
            error!(%cv_id, error = %err, "failed to reload CV for failure record");
            return;
        }
    };

    let extraction = NewCvExtraction {
        id: Uuid::new_v4(),
        cv_id: cv.id,
        extracted_text: None,
        extracted_skills: None,
        extracted_experience: None,
        extracted_education: None,
        extracted_contact: None,
        confidence: 0.0,
        status: EXTRACTION_FAILED.to_string(),
        processed_at: Some(Utc::now().naive_utc()),
    };

    let feedback = NewCvFeedback {
        id: Uuid::new_v4(),
        cv_id: cv.id,
        user_id: cv.user_id,
        feedback_text: FAILURE_FEEDBACK_TEXT.to_string(),
        quality_score: FAILURE_QUALITY_SCORE,
        structure_issues: None,
        grammar_issues: None,
        missing_fields: None,
        recommendations: Some(FAILURE_RECOMMENDATIONS.to_string()),
        is_approved: false,
    };

    let written = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::insert_into(cv_extractions::table)
            .values(&extraction)
            .execute(conn)?;
        diesel::insert_into(cv_feedback::table)
            .values(&feedback)
            .execute(conn)?;
        Ok(())
    });

    if let Err(err) = written {
        error!(%cv_id, error = %err, "failed to persist failure record");
    }
}

fn load_cv(conn: &mut PgConnection, cv_id: Uuid) -> QueryResult<Option<Cv>> {
    cvs::table.find(cv_id).first::<Cv>(conn).optional()
}

/// A CV counts as processed when its newest completed extraction was
/// produced at or after the current upload timestamp. Re-uploading bumps
/// `uploaded_at`, which reopens the CV for processing.
fn already_processed(conn: &mut PgConnection, cv: &Cv) -> QueryResult<bool> {
    let latest = latest_completed_extraction(conn, cv.id)?;
    Ok(matches!(
        latest.and_then(|extraction| extraction.processed_at),
        Some(processed_at) if processed_at >= cv.uploaded_at
    ))
}

pub fn latest_completed_extraction(
    conn: &mut PgConnection,
    cv_id: Uuid,
) -> QueryResult<Option<CvExtraction>> {
    cv_extractions::table
        .filter(cv_extractions::cv_id.eq(cv_id))
        .filter(cv_extractions::status.eq(EXTRACTION_COMPLETED))
        .order(cv_extractions::created_at.desc())
        .first::<CvExtraction>(conn)
        .optional()
}

/// Text of the user's most recent earlier CV, if it was ever successfully
/// extracted. Feeds the "improvement from previous" comparison.
fn previous_cv_text(conn: &mut PgConnection, cv: &Cv) -> QueryResult<Option<String>> {
    let previous = cvs::table
        .filter(cvs::user_id.eq(cv.user_id))
        .filter(cvs::id.ne(cv.id))
        .filter(cvs::uploaded_at.lt(cv.uploaded_at))
        .order(cvs::uploaded_at.desc())
        .first::<Cv>(conn)
        .optional()?;

    let Some(previous) = previous else {
        return Ok(None);
    };

    let extraction = latest_completed_extraction(conn, previous.id)?;
    Ok(extraction.and_then(|extraction| extraction.extracted_text))
}

fn some_if_present(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
