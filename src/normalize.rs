//! # Result Normalizer
//! Pure, testable logic that maps the loosely-shaped upstream call payload
//! to a display-ready [`Report`]. No I/O, suitable for unit tests and
//! offline evaluation.
//!
//! The upstream analysis is produced by an external AI service and its
//! shape is not guaranteed: field names drift between producers
//! (`knowledge_skills`, `Knowledge & Skills`, `knowledgeSkills`), values
//! arrive as numbers or numeric strings, lists arrive as arrays or
//! bullet-delimited text. Every lookup here is a priority-ordered fallback
//! chain and every coercion degrades to "absent"; this module is total
//! and never fails.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::report::{
    DetailRow, InsightGroup, MetricScore, Qualification, RecentProject, Report, SessionMeta,
    COMPETENCY_METRICS,
};

/// Collapse a candidate key to its canonical form: lowercase, alphanumerics
/// only. `"Knowledge & Skills"`, `"knowledge_skills"` and `"knowledgeSkills"`
/// all map to `"knowledgeskills"`.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// "Nothing useful here" test shared with the poller: null, empty string,
/// or empty array. Empty objects are kept: `{}` is a present (if useless)
/// analysis, and the poll terminal condition depends on that.
pub(crate) fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Walk a dotted path through nested objects. Returns `None` for missing
/// segments, non-objects along the way, and blank leaves.
fn probe<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = root;
    for seg in path.split('.') {
        cur = cur.get(seg)?;
    }
    if is_blank(cur) {
        None
    } else {
        Some(cur)
    }
}

/// First non-blank value among `paths`, probed in order.
fn first_of<'a>(root: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|p| probe(root, p))
}

/// Render a scalar for display. Strings are trimmed (empty → absent);
/// numbers and booleans print as-is; composites are not renderable.
fn render_scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A string found at the first matching path, trimmed.
fn string_at(root: &Value, paths: &[&str]) -> Option<String> {
    first_of(root, paths).and_then(render_scalar)
}

/// Canonical-key → value map of one score source object.
fn build_lookup(source: &Value) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    if let Value::Object(map) = source {
        for (key, value) in map {
            if value.is_null() {
                continue;
            }
            out.insert(normalize_key(key), value.clone());
        }
    }
    out
}

/// Merge score sources in priority order; earlier sources win on key
/// collision. Later, more deeply nested fallbacks only fill gaps.
fn merge_score_sources(sources: &[Option<&Value>]) -> HashMap<String, Value> {
    let mut merged: HashMap<String, Value> = HashMap::new();
    for source in sources.iter().flatten() {
        for (key, value) in build_lookup(source) {
            merged.entry(key).or_insert(value);
        }
    }
    merged
}

/// Coerce a raw score to a number in `[0, 100]`. Anything that is not a
/// finite number (after numeric-string parsing) is absent, never zero,
/// because 0 is a real score and must stay distinguishable from missing.
pub fn coerce_score(value: Option<&Value>) -> Option<f64> {
    let num = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !num.is_finite() {
        return None;
    }
    Some(num.clamp(0.0, 100.0))
}

/// Normalize a maybe-list into an ordered list of non-empty strings.
///
/// Arrays keep entry order (string entries trimmed, composites dropped);
/// a bare string splits on bullet characters and newlines; any other
/// scalar becomes a one-element list; null/absent is empty.
pub fn to_array(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(render_scalar).collect(),
        Some(Value::String(s)) => s
            .split(['\u{2022}', '\n'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
        Some(other) => render_scalar(other).into_iter().collect(),
    }
}

/// Candidate display name: explicit full name wins, else first/middle/last
/// parts (any key spelling) joined by single spaces.
pub fn derive_name(profile: &Value) -> String {
    let lookup = build_lookup(profile);
    for key in ["fullname", "name"] {
        if let Some(found) = lookup.get(key).and_then(render_scalar) {
            return found;
        }
    }
    ["firstname", "middlename", "lastname"]
        .iter()
        .filter_map(|key| lookup.get(*key).and_then(render_scalar))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Qualification verdict. Explicit boolean fields win; otherwise a
/// free-text status string is classified by substring. Negative markers
/// are checked first so "Not Qualified" never reads as qualified. Absence
/// of both yields `Pending`, never a guess.
pub fn derive_qualification(analysis: &Value, structured: &Value) -> Qualification {
    let direct = first_of(structured, &["is_qualified", "isQualified"])
        .or_else(|| first_of(structured, &["decision.isQualified", "decision.qualified"]))
        .or_else(|| first_of(analysis, &["decision.isQualified", "decision.qualified"]))
        .or_else(|| {
            first_of(
                analysis,
                &["structuredData.is_qualified", "structuredData.isQualified"],
            )
        });
    if let Some(Value::Bool(b)) = direct {
        return if *b {
            Qualification::Qualified
        } else {
            Qualification::NotQualified
        };
    }

    let status = string_at(structured, &["decision.status", "status", "decisionStatus"])
        .or_else(|| string_at(analysis, &["decision.status"]));
    if let Some(status) = status {
        let lowered = status.to_lowercase();
        if lowered.contains("not") || lowered.contains("reject") {
            return Qualification::NotQualified;
        }
        if lowered.contains("qual") {
            return Qualification::Qualified;
        }
    }
    Qualification::Pending
}

static RE_PREAMBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*here'?s a summary of[^:]*:").expect("preamble regex"));
static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold regex"));
static RE_MISC_MARKDOWN: Lazy<Regex> = Lazy::new(|| Regex::new("[_`~]").expect("markdown regex"));
static RE_BULLET_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{2022}]").expect("bullet regex"));
static RE_ASTERISK_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\*\s*").expect("asterisk regex"));
static RE_DASH_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s-\s|\s\u{2014}\s").expect("dash regex"));
static RE_MULTI_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("whitespace regex"));
static RE_PUNCT_SPACING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*([.;,])\s*").expect("punctuation regex"));

/// Strip the markdown the summary model tends to emit. Pass order matters:
/// whitespace collapse must run after the bullet/marker passes, and the
/// punctuation pass operates on collapsed text.
pub fn strip_markup(text: &str) -> String {
    let cleaned = RE_PREAMBLE.replace(text, "");
    let cleaned = RE_BOLD.replace_all(&cleaned, "$1");
    let cleaned = RE_MISC_MARKDOWN.replace_all(&cleaned, "");
    let cleaned = RE_BULLET_CHARS.replace_all(&cleaned, " ");
    let cleaned = RE_ASTERISK_BULLET.replace_all(&cleaned, " ");
    let cleaned = RE_DASH_BULLET.replace_all(&cleaned, " ");
    let cleaned = RE_MULTI_WS.replace_all(&cleaned, " ");
    let cleaned = RE_PUNCT_SPACING.replace_all(&cleaned, "$1 ");
    cleaned.trim().to_string()
}

/// Humanize a duration value. Numbers are seconds: >= 60 renders as
/// minutes (integer once past 10 minutes, one decimal below), < 60 as
/// whole seconds with a display floor of 1. Text passes through verbatim.
pub fn format_duration(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => {
            let secs = n.as_f64()?;
            if secs >= 60.0 {
                let mins = secs / 60.0;
                if mins >= 10.0 {
                    Some(format!("{} mins", mins.round() as i64))
                } else {
                    Some(format!("{mins:.1} mins"))
                }
            } else {
                Some(format!("{} secs", (secs.round() as i64).max(1)))
            }
        }
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Render an RFC 3339 timestamp for display; anything unparseable passes
/// through as provided.
fn format_timestamp(value: Option<&Value>) -> Option<String> {
    let raw = value.and_then(render_scalar)?;
    match chrono::DateTime::parse_from_rfc3339(&raw) {
        Ok(dt) => Some(dt.format("%b %-d, %Y %H:%M").to_string()),
        Err(_) => Some(raw),
    }
}

const SUMMARY_FALLBACK: &str = "Summary not available yet.";

/// Build the complete report from one call result. Total: any input shape
/// (including non-objects) produces a renderable report.
pub fn build_report(result: &Value) -> Report {
    let analysis = result.get("analysis").cloned().unwrap_or(Value::Null);
    let structured = first_of(result, &["structuredData"])
        .or_else(|| first_of(&analysis, &["structuredData", "structured_data"]))
        .cloned()
        .unwrap_or(Value::Null);

    let summary_raw = string_at(result, &["summary"])
        .or_else(|| string_at(&analysis, &["summary", "text"]))
        .unwrap_or_else(|| SUMMARY_FALLBACK.to_string());

    let profile = first_of(
        &structured,
        &[
            "candidateProfile",
            "candidate",
            "personalInformation",
            "personal_info",
        ],
    )
    .cloned()
    .unwrap_or(Value::Null);
    let contact = first_of(&structured, &["contact"])
        .or_else(|| first_of(&analysis, &["contact"]))
        .cloned()
        .unwrap_or(Value::Null);
    let takeaways = first_of(&structured, &["takeaways", "feedback"])
        .or_else(|| first_of(&analysis, &["takeaways"]))
        .cloned()
        .unwrap_or(Value::Null);
    let insights = first_of(result, &["insights"])
        .or_else(|| first_of(&analysis, &["insights"]))
        .cloned()
        .unwrap_or(Value::Null);

    let qualification = derive_qualification(&analysis, &structured);
    let qualification_reason = string_at(&structured, &["decision.reason", "decisionReason"])
        .or_else(|| string_at(&analysis, &["decision.reason"]));

    // Score sources in priority order; earlier entries win on collision.
    let merged = merge_score_sources(&[
        probe(&structured, "evaluation.scores"),
        probe(&structured, "evaluation.metrics"),
        probe(&structured, "scores"),
        probe(&structured, "metrics"),
        probe(&structured, "skillScores"),
        probe(&analysis, "structuredData.evaluation.scores"),
        probe(&analysis, "scores"),
    ]);

    let competency_scores: Vec<MetricScore> = COMPETENCY_METRICS
        .iter()
        .map(|(key, label)| {
            let raw = merged
                .get(&normalize_key(key))
                .or_else(|| merged.get(&normalize_key(label)))
                .or_else(|| merged.get(*label))
                .or_else(|| merged.get(*key));
            MetricScore::new(*key, *label, coerce_score(raw))
        })
        .collect();
    let has_score_data = competency_scores.iter().any(|m| m.value.is_some());

    let mut candidate_details = Vec::new();
    let name = derive_name(&profile);
    if !name.is_empty() {
        candidate_details.push(DetailRow::new("Name", name));
    }
    let detail_probes: [(&str, Option<String>); 4] = [
        (
            "Email",
            string_at(&profile, &["email"])
                .or_else(|| string_at(&contact, &["email"]))
                .or_else(|| string_at(&structured, &["email"])),
        ),
        (
            "Phone",
            string_at(&profile, &["phone"])
                .or_else(|| string_at(&contact, &["phone"]))
                .or_else(|| string_at(&structured, &["phone"])),
        ),
        (
            "Citizenship",
            string_at(&profile, &["citizenship", "nationality"]),
        ),
        (
            "Location",
            string_at(&profile, &["location", "city", "state"])
                .or_else(|| string_at(&structured, &["location"])),
        ),
    ];
    for (label, value) in detail_probes {
        if let Some(value) = value {
            candidate_details.push(DetailRow::new(label, value));
        }
    }

    let education = to_array(
        first_of(&structured, &["education"])
            .or_else(|| first_of(&profile, &["education", "qualifications"])),
    );
    let programming_languages = to_array(
        first_of(&structured, &["programmingLanguages", "skills.programming"]).or_else(|| {
            first_of(
                &profile,
                &[
                    "programmingLanguages",
                    "programming_languages",
                    "languagesOfProgramming",
                ],
            )
        }),
    );

    let recent_project = probe(&structured, "recentProject").map(|project| RecentProject {
        name: string_at(project, &["name"]),
        description: string_at(project, &["description"]),
        tech_stack: to_array(project.get("techStack")),
        confidence_signals: to_array(project.get("confidenceSignals")),
    });
    let recent_project = recent_project.filter(RecentProject::has_data);

    let group_specs: [(&str, Vec<String>); 6] = [
        (
            "Strengths",
            to_array(
                first_of(&takeaways, &["strengths", "highlights"])
                    .or_else(|| first_of(&structured, &["strengths"]))
                    .or_else(|| first_of(&analysis, &["highlights"])),
            ),
        ),
        (
            "Improvements",
            to_array(
                first_of(
                    &takeaways,
                    &["improvements", "developmentAreas", "recommendations"],
                )
                .or_else(|| first_of(&structured, &["improvements", "recommendations"])),
            ),
        ),
        (
            "Watch-outs",
            to_array(
                first_of(&takeaways, &["watchouts", "risks", "concerns"])
                    .or_else(|| first_of(&structured, &["concerns"])),
            ),
        ),
        (
            "Candidate Questions",
            to_array(
                first_of(&takeaways, &["candidateQuestions"])
                    .or_else(|| first_of(&structured, &["candidateQuestions"]))
                    .or_else(|| first_of(&analysis, &["candidateQuestions"])),
            ),
        ),
        (
            "Suggested Follow-ups",
            to_array(probe(&insights, "followUpActions")),
        ),
        ("Notable Quotes", to_array(probe(&insights, "notableQuotes"))),
    ];
    let insight_groups = group_specs
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .map(|(title, items)| InsightGroup::new(title, items))
        .collect();

    let call = result.get("call").cloned().unwrap_or(Value::Null);
    let session_meta = SessionMeta {
        started_at: format_timestamp(call.get("startedAt")),
        ended_at: format_timestamp(call.get("endedAt")),
        duration: format_duration(call.get("duration")),
    };
    let session_meta = if session_meta.is_empty() {
        None
    } else {
        Some(session_meta)
    };

    Report {
        qualification,
        qualification_label: qualification.label().to_string(),
        qualification_reason,
        summary_text: strip_markup(&summary_raw),
        candidate_details,
        competency_scores,
        has_score_data,
        insight_groups,
        education,
        programming_languages,
        recent_project,
        session_meta,
    }
}
