//! Table output formatting for session status using comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::domain::models::{AxisScore, Insight, InsightKind, ScoreTier};

use super::truncate;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    pub const fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Per-axis scores with weights.
    pub fn format_axes(&self, axes: &[AxisScore]) -> String {
        let mut table = create_base_table();
        table.set_header(vec![
            Cell::new("Axis").add_attribute(Attribute::Bold),
            Cell::new("Score").add_attribute(Attribute::Bold),
            Cell::new("Weight").add_attribute(Attribute::Bold),
            Cell::new("Note").add_attribute(Attribute::Bold),
        ]);

        for axis in axes {
            let score_cell = if self.use_colors {
                Cell::new(axis.score).fg(tier_color(ScoreTier::for_score(axis.score)))
            } else {
                Cell::new(axis.score)
            };
            let note = if axis.insufficient_data { "insufficient data" } else { "" };
            table.add_row(vec![
                Cell::new(axis.axis.label()),
                score_cell,
                Cell::new(format!("{:.2}", axis.weight)),
                Cell::new(note),
            ]);
        }

        table.to_string()
    }

    /// Insights with their fix status.
    pub fn format_insights(&self, insights: &[Insight], applied: &[String]) -> String {
        let mut table = create_base_table();
        table.set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Kind").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Fix").add_attribute(Attribute::Bold),
        ]);

        for insight in insights {
            let fix = if applied.contains(&insight.id) {
                "applied"
            } else if insight.kind == InsightKind::Weakness && insight.is_actionable() {
                "available"
            } else {
                "-"
            };
            let kind = match insight.kind {
                InsightKind::Strength => "strength",
                InsightKind::Weakness => "weakness",
                InsightKind::Opportunity => "opportunity",
            };
            let kind_cell = if self.use_colors {
                Cell::new(kind).fg(kind_color(insight.kind))
            } else {
                Cell::new(kind)
            };
            table.add_row(vec![
                Cell::new(&insight.id),
                kind_cell,
                Cell::new(truncate(&insight.title, 48)),
                Cell::new(fix),
            ]);
        }

        table.to_string()
    }
}

fn create_base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

const fn tier_color(tier: ScoreTier) -> Color {
    match tier {
        ScoreTier::MarketReady => Color::Green,
        ScoreTier::StrongPotential => Color::Yellow,
        ScoreTier::NeedsRefinement => Color::Red,
    }
}

const fn kind_color(kind: InsightKind) -> Color {
    match kind {
        InsightKind::Strength => Color::Green,
        InsightKind::Weakness => Color::Red,
        InsightKind::Opportunity => Color::Cyan,
    }
}

fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Axis;

    #[test]
    fn test_axis_table_contains_labels_and_flags() {
        let axes = vec![
            AxisScore {
                axis: Axis::Pacing,
                score: 64,
                weight: 0.2,
                insufficient_data: false,
            },
            AxisScore {
                axis: Axis::Originality,
                score: 0,
                weight: 0.2,
                insufficient_data: true,
            },
        ];
        let rendered = TableFormatter::with_colors(false).format_axes(&axes);
        assert!(rendered.contains(Axis::Pacing.label()));
        assert!(rendered.contains("64"));
        assert!(rendered.contains("insufficient data"));
    }

    #[test]
    fn test_insight_table_marks_applied_fixes() {
        let insight = Insight {
            id: "i-1".to_string(),
            kind: InsightKind::Weakness,
            title: "Flat antagonist".to_string(),
            text: String::new(),
            axis_id: None,
            checkpoint_id: None,
            fix_suggestion: Some("Give them a motive".to_string()),
            fix_section: Some("characters".to_string()),
        };
        let rendered = TableFormatter::with_colors(false).format_insights(&[insight], &["i-1".to_string()]);
        assert!(rendered.contains("applied"));
    }
}
