use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::{jobs::JOB_PROCESS_CV, models::Job, pipeline, state::AppState};

use super::{JobExecution, JobHandler};

#[derive(Debug, Deserialize)]
struct ProcessCvPayload {
    cv_id: Uuid,
}

/// Runs the CV pipeline for a queued upload. The pipeline swallows its own
/// failures into `failed` extraction records, so the job itself only fails
/// on a malformed payload.
pub struct ProcessCvJob;

impl ProcessCvJob {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProcessCvJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for ProcessCvJob {
    fn job_type(&self) -> &'static str {
        JOB_PROCESS_CV
    }

    async fn handle(&self, state: Arc<AppState>, job: Job) -> JobExecution {
        let payload: ProcessCvPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(payload) => payload,
            Err(err) => {
                return JobExecution::Failed {
                    error: format!("invalid process-cv payload: {err}"),
                }
            }
        };

        pipeline::process_cv(&state, payload.cv_id).await;
        JobExecution::Success
    }
}
