use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use tokio::task;
use tracing::info;

/// Plain text plus best-effort structured hints pulled from one CV file.
/// Every hint is optional; extraction only fails when no text at all can be
/// recovered from the document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedCv {
    pub full_text: String,
    pub contact: Option<String>,
    pub skills: Option<String>,
    pub education: Option<String>,
    pub experience: Option<String>,
}

#[async_trait]
pub trait DocumentExtractor: Send + Sync + 'static {
    async fn extract(&self, bytes: Vec<u8>, content_type: Option<&str>) -> Result<ExtractedCv>;
}

/// PDF text extraction via pdfium. Word documents are accepted at upload but
/// only PDFs can be extracted locally; anything else fails the run, which the
/// pipeline converts into a terminal `failed` extraction record.
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract(&self, bytes: Vec<u8>, content_type: Option<&str>) -> Result<ExtractedCv> {
        if let Some(content_type) = content_type {
            if !content_type.eq_ignore_ascii_case("application/pdf")
                && !bytes.starts_with(b"%PDF")
            {
                bail!("unsupported content type for extraction: {content_type}");
            }
        }

        let text = task::spawn_blocking(move || extract_pdf_text(&bytes))
            .await
            .context("pdf extraction task panicked")??;

        if text.trim().is_empty() {
            bail!("no text could be extracted from document");
        }

        info!(chars = text.len(), "extracted text from CV document");
        Ok(derive_hints(text))
    }
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|err| anyhow::anyhow!("failed to load pdf: {err}"))?;

    let mut combined = String::new();
    let pages = document.pages();
    for page_index in 0..pages.len() {
        let page = pages
            .get(page_index)
            .map_err(|err| anyhow::anyhow!("failed to load page {page_index}: {err}"))?;
        let page_text = match page.text() {
            Ok(text) => text,
            Err(_) => continue,
        };
        for segment in page_text.segments().iter() {
            combined.push_str(&segment.text());
            combined.push('\n');
        }
    }

    Ok(combined)
}

/// Line-based heuristics over the extracted text. Contact is any line
/// carrying an email address or phone-like digit run; section hints collect
/// the lines following a matching header until the next header.
pub fn derive_hints(full_text: String) -> ExtractedCv {
    let mut contact_lines: Vec<&str> = Vec::new();

    for line in full_text.lines().take(20) {
        let trimmed = line.trim();
        if trimmed.contains('@') || digit_run_length(trimmed) >= 7 {
            contact_lines.push(trimmed);
        }
    }

    let skills = collect_section(&full_text, &["skills", "technologies", "tech stack"]);
    let education = collect_section(&full_text, &["education", "academic"]);
    let experience = collect_section(&full_text, &["experience", "employment", "work history"]);

    let contact = if contact_lines.is_empty() {
        None
    } else {
        Some(contact_lines.join(" "))
    };

    ExtractedCv {
        full_text,
        contact,
        skills,
        education,
        experience,
    }
}

fn digit_run_length(line: &str) -> usize {
    let mut best = 0;
    let mut current = 0;
    for ch in line.chars() {
        if ch.is_ascii_digit() {
            current += 1;
            best = best.max(current);
        } else if !matches!(ch, ' ' | '-' | '(' | ')' | '+') {
            current = 0;
        }
    }
    best
}

fn collect_section(text: &str, headers: &[&str]) -> Option<String> {
    let mut collected: Vec<&str> = Vec::new();
    let mut in_section = false;

    for line in text.lines() {
        let trimmed = line.trim();
        let lowered = trimmed.to_lowercase();

        if is_section_header(&lowered) {
            in_section = headers.iter().any(|header| lowered.contains(header));
            continue;
        }

        if in_section && !trimmed.is_empty() {
            collected.push(trimmed);
        }
    }

    if collected.is_empty() {
        None
    } else {
        Some(collected.join("\n"))
    }
}

// Short lines without sentence punctuation are treated as headers.
fn is_section_header(lowered: &str) -> bool {
    const HEADERS: &[&str] = &[
        "skills",
        "technologies",
        "tech stack",
        "education",
        "academic",
        "experience",
        "employment",
        "work history",
        "summary",
        "profile",
        "projects",
        "certifications",
        "contact",
    ];

    lowered.len() < 40
        && !lowered.contains('.')
        && HEADERS.iter().any(|header| lowered.contains(header))
}

#[cfg(test)]
mod tests {
    use super::derive_hints;

    const SAMPLE: &str = "John Doe\njohn.doe@example.com | +44 7700 900123\n\n\
Summary\nBackend engineer with five years of experience.\n\n\
Experience\nAcme Corp - built billing pipelines.\nInitech - ran the platform team.\n\n\
Education\nBSc Computer Science, University of Somewhere.\n\n\
Skills\nRust, PostgreSQL, AWS\n";

    #[test]
    fn finds_contact_line() {
        let extracted = derive_hints(SAMPLE.to_string());
        let contact = extracted.contact.expect("contact hint");
        assert!(contact.contains("john.doe@example.com"));
        assert!(contact.contains("7700"));
    }

    #[test]
    fn collects_named_sections() {
        let extracted = derive_hints(SAMPLE.to_string());
        assert!(extracted.skills.expect("skills").contains("Rust"));
        assert!(extracted.education.expect("education").contains("BSc"));
        let experience = extracted.experience.expect("experience");
        assert!(experience.contains("Acme Corp"));
        assert!(experience.contains("Initech"));
    }

    #[test]
    fn missing_sections_stay_none() {
        let extracted = derive_hints("just a single line of text".to_string());
        assert!(extracted.skills.is_none());
        assert!(extracted.education.is_none());
        assert!(extracted.experience.is_none());
        assert!(extracted.contact.is_none());
    }
}
