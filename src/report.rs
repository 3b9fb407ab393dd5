//! report.rs — Presentation model for a completed screening call.
//!
//! This is the shape the dashboard renders: verdict badge, cleaned summary,
//! candidate profile rows, the seven radar metrics, categorized insight
//! lists, and session metadata. Every field degrades independently to
//! "absent": the upstream payload's shape is not under our control, so
//! nothing here is mandatory except the verdict (which falls back to
//! `Pending`).

use serde::{Deserialize, Serialize};

/// Screening verdict. Ternary, not boolean: the upstream decision field
/// may be absent, and absence must never be mistaken for a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualification {
    Qualified,
    NotQualified,
    Pending,
}

impl Qualification {
    /// Badge label shown in the dashboard header.
    pub fn label(&self) -> &'static str {
        match self {
            Qualification::Qualified => "Qualified",
            Qualification::NotQualified => "Not Qualified",
            Qualification::Pending => "Pending Decision",
        }
    }
}

/// The seven fixed radar metrics, in render order: `(key, label)`.
pub const COMPETENCY_METRICS: [(&str, &str); 7] = [
    ("confidence", "Confidence"),
    ("knowledgeSkills", "Knowledge & Skills"),
    ("communication", "Communication"),
    ("behaviour", "Behaviour"),
    ("problemSolving", "Problem Solving"),
    ("adaptability", "Adaptability"),
    ("cultureFit", "Culture Fit"),
];

/// One radar metric. `value` is `None` when the payload carried nothing
/// usable for it; 0.0 is a real score and serializes as 0, not as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub key: String,
    pub label: String,
    pub value: Option<f64>,
}

impl MetricScore {
    pub fn new(key: impl Into<String>, label: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            value,
        }
    }
}

/// One `(label, value)` row of the candidate details card. Rows are only
/// emitted when a value was actually found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    pub label: String,
    pub value: String,
}

impl DetailRow {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A named insight category ("Strengths", "Watch-outs", ...) with its
/// ordered items. Empty categories are dropped before they get here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightGroup {
    pub title: String,
    pub items: Vec<String>,
}

impl InsightGroup {
    pub fn new(title: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            title: title.into(),
            items,
        }
    }
}

/// Session metadata card: start/end rendered for display, duration already
/// humanized ("4.5 mins", "45 secs").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl SessionMeta {
    pub fn is_empty(&self) -> bool {
        self.started_at.is_none() && self.ended_at.is_none() && self.duration.is_none()
    }
}

/// The candidate's most recent project, when the interview surfaced one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentProject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tech_stack: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confidence_signals: Vec<String>,
}

impl RecentProject {
    pub fn has_data(&self) -> bool {
        self.name.is_some()
            || self.description.is_some()
            || !self.tech_stack.is_empty()
            || !self.confidence_signals.is_empty()
    }
}

/// The complete, display-ready report derived from one call result.
///
/// Built fresh on every request by [`crate::normalize::build_report`];
/// never cached, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub qualification: Qualification,
    /// Badge text matching `qualification`; kept alongside it so the UI
    /// does not re-derive labels.
    pub qualification_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualification_reason: Option<String>,
    pub summary_text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidate_details: Vec<DetailRow>,
    /// Always exactly seven entries, in `COMPETENCY_METRICS` order.
    pub competency_scores: Vec<MetricScore>,
    /// True when at least one metric resolved; the radar is hidden otherwise.
    pub has_score_data: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insight_groups: Vec<InsightGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub education: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub programming_languages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_project: Option<RecentProject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_meta: Option<SessionMeta>,
}
