//! Plain-text rendering of a [`Decision`] for terminals and logs.

use crate::config::CascadeConfig;
use crate::models::{Decision, GuardScores, VegetationReport, VisualClass};

const INVALID_IMAGE: &str = "Invalid image";

/// Headline, detail line and diagnostic block, in display order
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub headline: String,
    pub detail: String,
    pub style: VisualClass,
    pub diagnostics: Vec<String>,
}

impl Rendered {
    pub fn to_text(&self) -> String {
        let mut output = format!("[{}] {}\n{}\n", style_tag(self.style), self.headline, self.detail);
        if !self.diagnostics.is_empty() {
            output.push('\n');
            for line in &self.diagnostics {
                output.push_str(line);
                output.push('\n');
            }
        }
        output
    }
}

fn style_tag(style: VisualClass) -> &'static str {
    match style {
        VisualClass::Ok => "OK",
        VisualClass::Alert => "ALERT",
    }
}

pub fn render(decision: &Decision, config: &CascadeConfig) -> Rendered {
    let mut diagnostics = vegetation_lines(decision.vegetation());
    if let Some(scores) = decision.guard_scores() {
        diagnostics.extend(guard_lines(scores, &config.guard_labels));
    }

    match decision {
        Decision::RejectedByColorFilter { .. } => Rendered {
            headline: INVALID_IMAGE.to_string(),
            detail: "The image does not appear to contain vegetation.".to_string(),
            style: VisualClass::Alert,
            diagnostics,
        },
        Decision::RejectedByGuard { .. } => Rendered {
            headline: INVALID_IMAGE.to_string(),
            detail: "This does not look like a potato leaf (another object or crop was detected)."
                .to_string(),
            style: VisualClass::Alert,
            diagnostics,
        },
        Decision::Classified {
            prediction, visual, ..
        } => {
            for (i, score) in prediction.all_scores.as_slice().iter().enumerate() {
                let label = config
                    .disease_labels
                    .get(i)
                    .map(String::as_str)
                    .unwrap_or("?");
                diagnostics.push(format!("  {}: {:.2}%", label, score * 100.0));
            }
            Rendered {
                headline: prediction.label.clone(),
                detail: format!("Approximate confidence: {:.2} %", prediction.confidence * 100.0),
                style: *visual,
                diagnostics,
            }
        }
    }
}

fn vegetation_lines(report: &VegetationReport) -> Vec<String> {
    let [r, g, b] = report.means;
    let mut lines = vec![format!(
        "Color filter: {} (mean RGB {:.1}, {:.1}, {:.1}, green ratio {:.2})",
        if report.accepted { "passed" } else { "rejected" },
        r,
        g,
        b,
        report.green_ratio
    )];
    if let Some(fraction) = report.green_fraction {
        lines.push(format!("  green-dominant pixels: {:.1}%", fraction * 100.0));
    }
    lines
}

fn guard_lines(scores: &GuardScores, labels: &[String]) -> Vec<String> {
    let mut lines = vec![format!("Guard ({}):", labels.join(", "))];
    for (label, score) in labels.iter().zip(scores.scores().as_slice()) {
        lines.push(format!("  {}: {:.1}%", label, score * 100.0));
    }
    lines
}
