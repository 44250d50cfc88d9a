use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod openai;

/// Coarse quality verdict for a whole CV: one score plus flat issue lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityAnalysis {
    pub quality_score: f64,
    pub structure_issues: String,
    pub grammar_issues: String,
    pub missing_fields: String,
    pub recommendations: String,
    pub is_approved: bool,
    pub overall_feedback: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// One concrete improvement step from the interactive analysis. Stored as a
/// JSON array on the interactive feedback row; `completed` is flipped by the
/// action-completion endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImprovementAction {
    pub section: String,
    pub priority: Priority,
    pub action: String,
    pub reason: String,
    pub example: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionFeedback {
    pub feedback: String,
    pub score: f64,
}

/// Per-section feedback for the five canonical CV sections, an ordered
/// improvement list, and an optional narrative comparing against the
/// previous upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InteractiveAnalysis {
    pub overall_score: f64,
    pub is_approved: bool,
    pub contact: SectionFeedback,
    pub summary: SectionFeedback,
    pub experience: SectionFeedback,
    pub education: SectionFeedback,
    pub skills: SectionFeedback,
    pub actions: Vec<ImprovementAction>,
    pub next_steps: String,
    pub improvement_from_previous: Option<String>,
}

impl InteractiveAnalysis {
    pub fn section_feedbacks(&self) -> [&SectionFeedback; 5] {
        [
            &self.contact,
            &self.summary,
            &self.experience,
            &self.education,
            &self.skills,
        ]
    }
}

/// AI collaborator contract. Implementations are opaque external services;
/// the pipeline only relies on these three calls.
#[async_trait]
pub trait CvAnalyzer: Send + Sync + 'static {
    async fn analyze_quality(&self, cv_text: &str) -> Result<QualityAnalysis>;

    async fn analyze_interactive(
        &self,
        cv_text: &str,
        previous_text: Option<&str>,
    ) -> Result<InteractiveAnalysis>;

    async fn extract_skills(&self, cv_text: &str) -> Result<Vec<String>>;
}
