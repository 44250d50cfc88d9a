use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub full_name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub full_name: String,
}

/// One uploaded CV file version. Exactly one row per user carries
/// `is_active = true`; uploading a new CV flips prior actives off in the
/// same transaction that inserts the new row.
#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = cvs)]
#[diesel(belongs_to(User))]
pub struct Cv {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub s3_key: String,
    pub uploaded_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
    pub is_active: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cvs)]
pub struct NewCv {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub s3_key: String,
}

/// Output of one extraction run for a CV. The newest row with status
/// `completed` is the authoritative one; its `processed_at` is compared
/// against the CV's `uploaded_at` by the pipeline's idempotency guard.
#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = cv_extractions)]
#[diesel(belongs_to(Cv))]
pub struct CvExtraction {
    pub id: Uuid,
    pub cv_id: Uuid,
    pub extracted_text: Option<String>,
    pub extracted_skills: Option<String>,
    pub extracted_experience: Option<String>,
    pub extracted_education: Option<String>,
    pub extracted_contact: Option<String>,
    pub confidence: f64,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub processed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cv_extractions)]
pub struct NewCvExtraction {
    pub id: Uuid,
    pub cv_id: Uuid,
    pub extracted_text: Option<String>,
    pub extracted_skills: Option<String>,
    pub extracted_experience: Option<String>,
    pub extracted_education: Option<String>,
    pub extracted_contact: Option<String>,
    pub confidence: f64,
    pub status: String,
    pub processed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = cv_feedback)]
#[diesel(belongs_to(Cv))]
pub struct CvFeedback {
    pub id: Uuid,
    pub cv_id: Uuid,
    pub user_id: Uuid,
    pub feedback_text: String,
    pub quality_score: f64,
    pub structure_issues: Option<String>,
    pub grammar_issues: Option<String>,
    pub missing_fields: Option<String>,
    pub recommendations: Option<String>,
    pub is_approved: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cv_feedback)]
pub struct NewCvFeedback {
    pub id: Uuid,
    pub cv_id: Uuid,
    pub user_id: Uuid,
    pub feedback_text: String,
    pub quality_score: f64,
    pub structure_issues: Option<String>,
    pub grammar_issues: Option<String>,
    pub missing_fields: Option<String>,
    pub recommendations: Option<String>,
    pub is_approved: bool,
}

/// Section-by-section feedback. `improvement_actions` holds a JSON array of
/// `ImprovementAction` values (see `ai` module).
#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = cv_interactive_feedback)]
#[diesel(belongs_to(Cv))]
pub struct CvInteractiveFeedback {
    pub id: Uuid,
    pub cv_id: Uuid,
    pub user_id: Uuid,
    pub overall_score: f64,
    pub is_approved: bool,
    pub contact_feedback: Option<String>,
    pub contact_score: f64,
    pub summary_feedback: Option<String>,
    pub summary_score: f64,
    pub experience_feedback: Option<String>,
    pub experience_score: f64,
    pub education_feedback: Option<String>,
    pub education_score: f64,
    pub skills_feedback: Option<String>,
    pub skills_score: f64,
    pub improvement_actions: serde_json::Value,
    pub next_steps: Option<String>,
    pub improvement_from_previous: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cv_interactive_feedback)]
pub struct NewCvInteractiveFeedback {
    pub id: Uuid,
    pub cv_id: Uuid,
    pub user_id: Uuid,
    pub overall_score: f64,
    pub is_approved: bool,
    pub contact_feedback: Option<String>,
    pub contact_score: f64,
    pub summary_feedback: Option<String>,
    pub summary_score: f64,
    pub experience_feedback: Option<String>,
    pub experience_score: f64,
    pub education_feedback: Option<String>,
    pub education_score: f64,
    pub skills_feedback: Option<String>,
    pub skills_score: f64,
    pub improvement_actions: serde_json::Value,
    pub next_steps: Option<String>,
    pub improvement_from_previous: Option<String>,
}

/// One row per user. `initial_score` is written once on the first
/// successful run and never changes afterwards.
#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = cv_progress)]
#[diesel(belongs_to(User))]
pub struct CvProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_uploads: i32,
    pub initial_score: f64,
    pub current_score: f64,
    pub improvement_percentage: f64,
    pub completed_actions: i32,
    pub total_actions: i32,
    pub first_upload_at: NaiveDateTime,
    pub last_update_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cv_progress)]
pub struct NewCvProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_uploads: i32,
    pub initial_score: f64,
    pub current_score: f64,
    pub improvement_percentage: f64,
    pub completed_actions: i32,
    pub total_actions: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = job_posts)]
pub struct JobPost {
    pub id: Uuid,
    pub recruiter_id: Uuid,
    pub title: String,
    pub description: String,
    pub required_skills: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_posts)]
pub struct NewJobPost {
    pub id: Uuid,
    pub recruiter_id: Uuid,
    pub title: String,
    pub description: String,
    pub required_skills: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = job_applications)]
#[diesel(belongs_to(JobPost))]
pub struct JobApplication {
    pub id: Uuid,
    pub job_post_id: Uuid,
    pub user_id: Uuid,
    pub cv_id: Option<Uuid>,
    pub status: String,
    pub applied_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_applications)]
pub struct NewJobApplication {
    pub id: Uuid,
    pub job_post_id: Uuid,
    pub user_id: Uuid,
    pub cv_id: Option<Uuid>,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub run_after: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub run_after: NaiveDateTime,
}
