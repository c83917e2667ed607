use crate::pipeline::classifier::ClassificationResult;
use crate::pipeline::taxonomy::WasteCategory;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Accent color role used to tint a result card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccentRole {
    Success,
    Primary,
    Muted,
    Warning,
    Destructive,
    Info,
}

#[derive(Debug, Clone, Copy)]
struct Presentation {
    icon: &'static str,
    accent: AccentRole,
}

const FALLBACK: WasteCategory = WasteCategory::NonRecyclable;

fn presentation(category: WasteCategory) -> Presentation {
    match category {
        WasteCategory::Biodegradable => Presentation {
            icon: "🌱",
            accent: AccentRole::Success,
        },
        WasteCategory::Recyclable => Presentation {
            icon: "♻️",
            accent: AccentRole::Primary,
        },
        WasteCategory::NonRecyclable => Presentation {
            icon: "🗑️",
            accent: AccentRole::Muted,
        },
        WasteCategory::Hazardous => Presentation {
            icon: "☣️",
            accent: AccentRole::Warning,
        },
        WasteCategory::Biomedical => Presentation {
            icon: "💉",
            accent: AccentRole::Destructive,
        },
        WasteCategory::EWaste => Presentation {
            icon: "🔌",
            accent: AccentRole::Info,
        },
    }
}

/// Formats a 0–1 confidence as a percentage with one decimal place.
pub fn format_confidence(confidence: f64) -> String {
    // Round half away from zero on tenths of a percent; `{:.1}` alone rounds ties to even.
    let tenths = (confidence * 1000.0).round();
    format!("{:.1}%", tenths / 10.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayConfig {
    pub category: WasteCategory,
    pub number: u8,
    pub label: &'static str,
    pub stream: String,
    pub icon: &'static str,
    pub accent: AccentRole,
    pub confidence: String,
    pub reasoning: String,
    pub disposal_method: &'static str,
    /// Set when the returned label matched no known category.
    pub fallback: bool,
}

pub fn present(result: &ClassificationResult) -> DisplayConfig {
    let (category, fallback) = match result.category() {
        Some(category) => (category, false),
        None => {
            warn!(
                "Presenting unknown label {:?} as {}",
                result.waste_type,
                FALLBACK.label()
            );
            (FALLBACK, true)
        }
    };
    let presentation = presentation(category);
    DisplayConfig {
        category,
        number: category.ordinal(),
        label: category.label(),
        stream: format!("Stream {} - {}", category.ordinal(), category.label()),
        icon: presentation.icon,
        accent: presentation.accent,
        confidence: format_confidence(result.confidence),
        reasoning: result.reasoning.clone(),
        disposal_method: category.disposal_method(),
        fallback,
    }
}

impl fmt::Display for DisplayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} #{} {}", self.icon, self.number, self.label)?;
        writeln!(f, "  Stream:     {}", self.stream)?;
        writeln!(f, "  Confidence: {}", self.confidence)?;
        writeln!(f, "  Disposal:   {}", self.disposal_method)?;
        write!(f, "  Reasoning:  {}", self.reasoning)?;
        if self.fallback {
            write!(f, "\n  (unrecognized category, shown as {})", self.label)?;
        }
        Ok(())
    }
}
