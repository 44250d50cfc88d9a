use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::AppConfig;

use super::{CvAnalyzer, ImprovementAction, InteractiveAnalysis, QualityAnalysis, SectionFeedback};

/// Chat-completions client against an OpenAI-compatible endpoint. The model
/// is asked for strict JSON, but responses are sliced defensively because
/// completions routinely wrap the payload in prose or code fences.
pub struct OpenAiAnalyzer {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiAnalyzer {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let endpoint = config
            .openai_endpoint
            .clone()
            .context("OPENAI_ENDPOINT must be set")?;
        let api_key = config
            .openai_api_key
            .clone()
            .context("OPENAI_API_KEY must be set")?;

        Ok(Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: config.openai_model.clone(),
        })
    }

    async fn chat(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("chat completion failed with status {status}: {body}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("failed to decode chat completion response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat completion returned no choices"))
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl CvAnalyzer for OpenAiAnalyzer {
    async fn analyze_quality(&self, cv_text: &str) -> Result<QualityAnalysis> {
        let prompt = format!(
            "Analyze this CV and provide detailed feedback in JSON format:\n\n\
             CV Text:\n{cv_text}\n\n\
             Evaluate the CV and return a JSON object with these exact fields:\n\
             {{\n\
               \"qualityScore\": <0.0 to 1.0>,\n\
               \"structureIssues\": \"<list of structural problems>\",\n\
               \"grammarIssues\": \"<list of grammar and spelling errors>\",\n\
               \"missingFields\": \"<list of important missing sections>\",\n\
               \"recommendations\": \"<specific actionable recommendations>\",\n\
               \"isApproved\": <true/false>,\n\
               \"overallFeedback\": \"<2-3 sentence summary>\"\n\
             }}\n\n\
             Be constructive and specific in your feedback."
        );

        let content = self
            .chat(
                "You are an expert CV reviewer and career counselor. \
                 Analyze CVs and provide constructive feedback.",
                &prompt,
            )
            .await?;

        let slice = json_object_slice(&content)
            .ok_or_else(|| anyhow!("quality analysis response contained no JSON object"))?;
        let analysis: QualityAnalysis =
            serde_json::from_str(slice).context("failed to parse quality analysis JSON")?;

        info!(score = analysis.quality_score, "quality analysis completed");
        Ok(analysis)
    }

    async fn analyze_interactive(
        &self,
        cv_text: &str,
        previous_text: Option<&str>,
    ) -> Result<InteractiveAnalysis> {
        let comparison = match previous_text {
            Some(previous) => format!(
                "\n\nPREVIOUS CV VERSION (for comparison):\n{previous}\n\n\
                 Please also provide 'improvementFromPrevious' explaining what improved."
            ),
            None => String::new(),
        };

        let prompt = format!(
            "Analyze this CV section-by-section and provide detailed, actionable \
             feedback with specific examples.\n\nCURRENT CV:\n{cv_text}{comparison}\n\
             Return a JSON object with this structure:\n\
             {{\n\
               \"overallScore\": 0.0-1.0,\n\
               \"isApproved\": true/false,\n\
               \"contactSectionFeedback\": \"...\", \"contactSectionScore\": 0.0-1.0,\n\
               \"summarySectionFeedback\": \"...\", \"summarySectionScore\": 0.0-1.0,\n\
               \"experienceSectionFeedback\": \"...\", \"experienceSectionScore\": 0.0-1.0,\n\
               \"educationSectionFeedback\": \"...\", \"educationSectionScore\": 0.0-1.0,\n\
               \"skillsSectionFeedback\": \"...\", \"skillsSectionScore\": 0.0-1.0,\n\
               \"improvementPriorities\": [\n\
                 {{ \"section\": \"...\", \"priority\": \"High/Medium/Low\", \
                    \"action\": \"...\", \"reason\": \"...\", \"example\": \"...\", \
                    \"completed\": false }}\n\
               ],\n\
               \"nextSteps\": \"...\",\n\
               \"improvementFromPrevious\": \"... (if applicable)\"\n\
             }}\n\n\
             IMPORTANT: for each improvement action provide a concrete before/after \
             example showing exactly how to improve."
        );

        let content = self
            .chat(
                "You are an expert CV coach. Provide detailed, actionable feedback \
                 with specific examples. For every suggestion include a before/after \
                 example showing exactly what to change.",
                &prompt,
            )
            .await?;

        let slice = json_object_slice(&content)
            .ok_or_else(|| anyhow!("interactive analysis response contained no JSON object"))?;
        let wire: InteractiveWire =
            serde_json::from_str(slice).context("failed to parse interactive analysis JSON")?;

        info!(score = wire.overall_score, "interactive analysis completed");
        Ok(wire.into())
    }

    async fn extract_skills(&self, cv_text: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Extract all technical and professional skills from this CV.\n\
             Return ONLY a JSON array of skills.\n\nCV Text:\n{cv_text}"
        );

        let content = self
            .chat(
                "You are a skill extraction expert. Extract skills from CVs.",
                &prompt,
            )
            .await?;

        let slice = json_array_slice(&content)
            .ok_or_else(|| anyhow!("skill extraction response contained no JSON array"))?;
        let skills: Vec<String> =
            serde_json::from_str(slice).context("failed to parse skills JSON")?;

        info!(count = skills.len(), "extracted skills from CV");
        Ok(skills)
    }
}

/// Flat wire format the model is prompted to emit; converted into the
/// structured [`InteractiveAnalysis`] used everywhere else.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct InteractiveWire {
    overall_score: f64,
    is_approved: bool,
    contact_section_feedback: String,
    contact_section_score: f64,
    summary_section_feedback: String,
    summary_section_score: f64,
    experience_section_feedback: String,
    experience_section_score: f64,
    education_section_feedback: String,
    education_section_score: f64,
    skills_section_feedback: String,
    skills_section_score: f64,
    improvement_priorities: Vec<ImprovementAction>,
    next_steps: String,
    improvement_from_previous: Option<String>,
}

impl From<InteractiveWire> for InteractiveAnalysis {
    fn from(wire: InteractiveWire) -> Self {
        InteractiveAnalysis {
            overall_score: wire.overall_score,
            is_approved: wire.is_approved,
            contact: SectionFeedback {
                feedback: wire.contact_section_feedback,
                score: wire.contact_section_score,
            },
            summary: SectionFeedback {
                feedback: wire.summary_section_feedback,
                score: wire.summary_section_score,
            },
            experience: SectionFeedback {
                feedback: wire.experience_section_feedback,
                score: wire.experience_section_score,
            },
            education: SectionFeedback {
                feedback: wire.education_section_feedback,
                score: wire.education_section_score,
            },
            skills: SectionFeedback {
                feedback: wire.skills_section_feedback,
                score: wire.skills_section_score,
            },
            actions: wire.improvement_priorities,
            next_steps: wire.next_steps,
            improvement_from_previous: wire.improvement_from_previous,
        }
    }
}

fn json_object_slice(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end >= start).then(|| &content[start..=end])
}

fn json_array_slice(content: &str) -> Option<&str> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    (end >= start).then(|| &content[start..=end])
}
