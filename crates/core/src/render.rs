//! Report document rendering.
//!
//! Rendering is a seam: [`DocumentRenderer`] turns report data into bytes, and the materializer
//! treats any failure here as non-fatal. The shipped renderer produces Markdown.

use crate::constants::{MARKDOWN_MEDIA_TYPE, REPORT_DISCLAIMER, REPORT_TITLE};
use crate::guidance::{preventive_measures, Guidance};
use crate::model::Disease;
use crate::CoreResult;
use chrono::{DateTime, Utc};
use riskcare_types::Probability;
use std::fmt::Write as _;

/// Everything a renderer needs to produce a report document.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportData {
    /// Patient display name; `None` renders as `N/A`.
    pub patient_name: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub disease: Disease,
    pub prediction: String,
    pub probability: Probability,
}

impl ReportData {
    pub fn guidance(&self) -> Guidance {
        preventive_measures(self.disease, self.probability)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

pub trait DocumentRenderer: Send + Sync {
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Render`] when the document cannot be produced.
    fn render(&self, data: &ReportData) -> CoreResult<RenderedDocument>;
}

/// Renders the risk report as a Markdown document.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownReportRenderer;

impl MarkdownReportRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentRenderer for MarkdownReportRenderer {
    fn render(&self, data: &ReportData) -> CoreResult<RenderedDocument> {
        let guidance = data.guidance();
        let patient = data
            .patient_name
            .as_deref()
            .map(escape_text)
            .unwrap_or_else(|| "N/A".to_string());

        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "# {}\n", REPORT_TITLE);
        let _ = writeln!(out, "**Patient Report for:** {}  ", patient);
        let _ = writeln!(
            out,
            "**Date:** {}\n",
            data.generated_at.format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(out, "---\n");
        let _ = writeln!(out, "## Prediction Result\n");
        let _ = writeln!(out, "- **Condition:** {}", data.disease);
        let _ = writeln!(out, "- **Prediction:** {}", escape_text(&data.prediction));
        let _ = writeln!(
            out,
            "- **Probability:** {}%\n",
            data.probability.as_percentage()
        );
        let _ = writeln!(out, "## Risk Guidance\n");
        let _ = writeln!(out, "**Risk level:** {}\n", guidance.risk_level);
        for (heading, items) in [
            ("Lifestyle", &guidance.lifestyle),
            ("Diet", &guidance.diet),
            ("Exercise", &guidance.exercise),
            ("Screening", &guidance.screening),
        ] {
            let _ = writeln!(out, "### {}\n", heading);
            for item in items {
                let _ = writeln!(out, "- {}", item);
            }
            out.push('\n');
        }
        let _ = writeln!(out, "**Recommended action:** {}\n", guidance.consult);
        let _ = writeln!(out, "---\n");
        let _ = writeln!(out, "_{}_", REPORT_DISCLAIMER);

        Ok(RenderedDocument {
            file_name: format!(
                "risk_report_{}.md",
                data.generated_at.format("%Y%m%d%H%M%S")
            ),
            media_type: MARKDOWN_MEDIA_TYPE.to_string(),
            bytes: out.into_bytes(),
        })
    }
}

/// Escapes Markdown structure in caller-supplied text so it renders literally.
///
/// Leading `#` (headings), standalone horizontal rules and code fences are escaped.
fn escape_text(text: &str) -> String {
    text.lines()
        .map(|line| {
            let trimmed = line.trim();
            if line.trim_start().starts_with('#') {
                line.replacen('#', r"\#", 1)
            } else if trimmed == "---" || trimmed == "***" || trimmed == "___" {
                format!(r"\{}", trimmed)
            } else {
                line.replace("```", r"\`\`\`")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn data(name: Option<&str>) -> ReportData {
        ReportData {
            patient_name: name.map(str::to_string),
            generated_at: Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
            disease: Disease::HeartDisease,
            prediction: "High Risk".to_string(),
            probability: Probability::new(0.8234).unwrap(),
        }
    }

    #[test]
    fn test_markdown_report_contents() {
        let doc = MarkdownReportRenderer::new().render(&data(Some("alice"))).unwrap();
        let text = String::from_utf8(doc.bytes).unwrap();

        assert!(text.starts_with("# Smart Healthcare Early Risk System"));
        assert!(text.contains("**Patient Report for:** alice"));
        assert!(text.contains("**Date:** 2026-03-04 05:06:07"));
        assert!(text.contains("- **Condition:** Heart Disease"));
        assert!(text.contains("- **Prediction:** High Risk"));
        assert!(text.contains("- **Probability:** 82.34%"));
        assert!(text.contains("**Risk level:** High"));
        assert!(text.contains("- ECG & Echo immediately"));
        assert!(text.contains(REPORT_DISCLAIMER));
        assert_eq!(doc.file_name, "risk_report_20260304050607.md");
        assert_eq!(doc.media_type, MARKDOWN_MEDIA_TYPE);
    }

    #[test]
    fn test_missing_patient_name_renders_na() {
        let doc = MarkdownReportRenderer::new().render(&data(None)).unwrap();
        let text = String::from_utf8(doc.bytes).unwrap();
        assert!(text.contains("**Patient Report for:** N/A"));
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("# not a heading"), r"\# not a heading");
        assert_eq!(escape_text("---"), r"\---");
        assert_eq!(escape_text("a ```fence```"), r"a \`\`\`fence\`\`\`");
        assert_eq!(escape_text("plain"), "plain");
    }
}
