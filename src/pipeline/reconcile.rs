//! Substitutes a usable interactive-shaped result when the section-by-section
//! analysis comes back empty. Pure and deterministic: the fallback text is a
//! fixed lookup table, so the same inputs always produce the same output.

use crate::ai::{
    ImprovementAction, InteractiveAnalysis, Priority, QualityAnalysis, SectionFeedback,
};

pub const CONTACT_FALLBACK: &str = "Provide clear contact details (email, phone).";
pub const SUMMARY_FALLBACK: &str =
    "Add a concise professional summary with your value proposition.";
pub const EXPERIENCE_FALLBACK: &str = "Use bullet points with measurable achievements.";
pub const EDUCATION_FALLBACK: &str =
    "List relevant courses, GPA if strong, and certifications.";
pub const SKILLS_FALLBACK: &str =
    "Group technical and soft skills; keep to the most relevant.";
pub const NEXT_STEPS_FALLBACK: &str =
    "Implement the top 2 actions, then upload an improved version.";

/// An interactive result is degenerate iff the overall score is exactly zero,
/// all five section feedback strings are blank, and the action list is empty.
/// A zero score alone is a legitimate (terrible) CV, not a degenerate result.
pub fn is_degenerate(interactive: &InteractiveAnalysis) -> bool {
    interactive.overall_score == 0.0
        && interactive
            .section_feedbacks()
            .iter()
            .all(|section| section.feedback.trim().is_empty())
        && interactive.actions.is_empty()
}

/// Returns the interactive analysis unchanged when it is usable; otherwise
/// synthesizes an interactive-shaped result from the quality analysis.
pub fn reconcile(
    quality: &QualityAnalysis,
    interactive: InteractiveAnalysis,
) -> InteractiveAnalysis {
    if is_degenerate(&interactive) {
        synthesize_from_quality(quality)
    } else {
        interactive
    }
}

fn section(source: &str, fallback: &str, score: f64) -> SectionFeedback {
    let feedback = if source.trim().is_empty() {
        fallback.to_string()
    } else {
        source.to_string()
    };
    SectionFeedback { feedback, score }
}

fn synthesize_from_quality(quality: &QualityAnalysis) -> InteractiveAnalysis {
    let score = quality.quality_score;
    let next_steps = if quality.recommendations.trim().is_empty() {
        NEXT_STEPS_FALLBACK.to_string()
    } else {
        quality.recommendations.clone()
    };

    InteractiveAnalysis {
        overall_score: score,
        is_approved: quality.is_approved,
        contact: section(&quality.missing_fields, CONTACT_FALLBACK, score),
        summary: section(&quality.overall_feedback, SUMMARY_FALLBACK, score),
        experience: section(&quality.structure_issues, EXPERIENCE_FALLBACK, score),
        education: section(&quality.recommendations, EDUCATION_FALLBACK, score),
        skills: section(&quality.grammar_issues, SKILLS_FALLBACK, score),
        actions: fallback_actions(),
        next_steps,
        improvement_from_previous: None,
    }
}

fn fallback_actions() -> Vec<ImprovementAction> {
    vec![
        ImprovementAction {
            section: "Summary".to_string(),
            priority: Priority::High,
            action: "Write a 2-3 sentence summary emphasizing outcomes".to_string(),
            reason: "Improves first impression".to_string(),
            example: String::new(),
            completed: false,
        },
        ImprovementAction {
            section: "Experience".to_string(),
            priority: Priority::High,
            action: "Add 2-3 measurable achievements per role".to_string(),
            reason: "Shows impact".to_string(),
            example: String::new(),
            completed: false,
        },
        ImprovementAction {
            section: "Skills".to_string(),
            priority: Priority::Medium,
            action: "Group and prioritize skills relevant to target roles".to_string(),
            reason: "Improves readability".to_string(),
            example: String::new(),
            completed: false,
        },
    ]
}
