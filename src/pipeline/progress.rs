//! Per-user progress tracking across CV versions.

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::ai::ImprovementAction;
use crate::error::{AppError, AppResult};
use crate::models::{CvInteractiveFeedback, CvProgress, NewCvProgress};
use crate::schema::{cv_interactive_feedback, cv_progress};

/// Relative improvement of `current` over `initial`, in percent, rounded to
/// two decimals so scores like 0.4 -> 0.6 report exactly 50.0. An initial
/// score of zero yields 0.0 rather than a division by zero.
pub fn improvement_percentage(initial: f64, current: f64) -> f64 {
    if initial > 0.0 {
        let raw = (current - initial) / initial * 100.0;
        (raw * 100.0).round() / 100.0
    } else {
        0.0
    }
}

/// Creates or updates the user's progress row after a successful analysis.
///
/// The first run seeds `initial_score`, which is never rewritten afterwards.
/// `completed_actions` is preserved across runs; `total_actions` always
/// reflects the newest action list. Intended to run inside the caller's
/// transaction so the progress row and the feedback rows commit together.
pub fn upsert_progress(
    conn: &mut PgConnection,
    user_id: Uuid,
    current_score: f64,
    total_actions: i32,
) -> QueryResult<CvProgress> {
    let now = Utc::now().naive_utc();

    let existing = cv_progress::table
        .filter(cv_progress::user_id.eq(user_id))
        .for_update()
        .first::<CvProgress>(conn)
        .optional()?;

    match existing {
        None => {
            let row = NewCvProgress {
                id: Uuid::new_v4(),
                user_id,
                total_uploads: 1,
                initial_score: current_score,
                current_score,
                improvement_percentage: 0.0,
                completed_actions: 0,
                total_actions,
            };
            diesel::insert_into(cv_progress::table)
                .values(&row)
                .execute(conn)?;
            cv_progress::table.find(row.id).first(conn)
        }
        Some(progress) => {
            let improvement = improvement_percentage(progress.initial_score, current_score);
            diesel::update(cv_progress::table.find(progress.id))
                .set((
                    cv_progress::total_uploads.eq(progress.total_uploads + 1),
                    cv_progress::current_score.eq(current_score),
                    cv_progress::improvement_percentage.eq(improvement),
                    cv_progress::total_actions.eq(total_actions),
                    cv_progress::last_update_at.eq(now),
                ))
                .execute(conn)?;
            cv_progress::table.find(progress.id).first(conn)
        }
    }
}

/// Marks one improvement action as completed on the newest interactive
/// feedback row for the given CV and bumps the user's completed counter.
pub fn complete_action(
    conn: &mut PgConnection,
    user_id: Uuid,
    cv_id: Uuid,
    action_index: usize,
) -> AppResult<Vec<ImprovementAction>> {
    conn.transaction(|conn| {
        let feedback = cv_interactive_feedback::table
            .filter(cv_interactive_feedback::cv_id.eq(cv_id))
            .filter(cv_interactive_feedback::user_id.eq(user_id))
            .order(cv_interactive_feedback::created_at.desc())
            .for_update()
            .first::<CvInteractiveFeedback>(conn)
            .optional()?
            .ok_or_else(AppError::not_found)?;

        let mut actions: Vec<ImprovementAction> =
            serde_json::from_value(feedback.improvement_actions.clone()).map_err(|err| {
                AppError::internal(format!("stored improvement actions are malformed: {err}"))
            })?;

        let total = actions.len();
        let action = actions.get_mut(action_index).ok_or_else(|| {
            AppError::invalid(format!(
                "action index {action_index} is out of range (have {total})"
            ))
        })?;
        let was_completed = action.completed;
        action.completed = true;

        diesel::update(cv_interactive_feedback::table.find(feedback.id))
            .set(cv_interactive_feedback::improvement_actions.eq(serde_json::to_value(&actions)?))
            .execute(conn)?;

        if !was_completed {
            let now = Utc::now().naive_utc();
            diesel::update(cv_progress::table.filter(cv_progress::user_id.eq(user_id)))
                .set((
                    cv_progress::completed_actions.eq(cv_progress::completed_actions + 1),
                    cv_progress::last_update_at.eq(now),
                ))
                .execute(conn)?;
        }

        Ok(actions)
    })
}
