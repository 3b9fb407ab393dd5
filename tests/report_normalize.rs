// tests/report_normalize.rs
//
// End-to-end normalization of a realistic upstream payload: the assembled
// call-details body through build_report, checked field by field.

use serde_json::json;

use prequal_screener::assistant::assemble_call_result;
use prequal_screener::normalize::build_report;
use prequal_screener::report::Qualification;

#[test]
fn full_payload_normalizes_into_complete_report() {
    // Shape modeled on what the voice platform actually returns: summary
    // at the top, structured data nested inside analysis, snake_case and
    // camelCase mixed.
    let upstream = json!({
        "id": "call-42",
        "assistantId": "asst-9",
        "startedAt": "2025-11-03T10:00:00Z",
        "endedAt": "2025-11-03T10:07:30Z",
        "duration": 450,
        "summary": "Here's a summary of the screening call: **Confident** communicator - broad backend exposure.",
        "analysis": {
            "structured_data": {
                "candidateProfile": {
                    "firstName": "Aarav",
                    "lastName": "Patel",
                    "email": "aarav.patel@example.com",
                    "phone": "+91 99887 66554",
                    "nationality": "Indian",
                    "city": "Pune"
                },
                "evaluation": {
                    "scores": {
                        "confidence": 74,
                        "knowledge_skills": 68,
                        "Communication": 81,
                        "behaviour": "77",
                        "problemSolving": 64,
                        "adaptability": 130,
                        "cultureFit": 0
                    }
                },
                "decision": { "status": "Qualified", "reason": "Meets the bar for round two." },
                "education": "B.Tech CSE \u{2022} M.Tech AI",
                "programmingLanguages": ["Rust", "Python"],
                "recentProject": {
                    "name": "Telemetry pipeline",
                    "techStack": "Kafka \u{2022} ClickHouse",
                    "confidenceSignals": ["owned the rollout"]
                },
                "takeaways": {
                    "strengths": ["clear articulation", "systems thinking"],
                    "improvements": "needs deeper SQL \u{2022} more infra exposure",
                    "watchouts": ["tends to over-scope"]
                }
            },
            "insights": {
                "notableQuotes": ["I profile before I optimize."],
                "followUpActions": ["schedule systems round"]
            }
        }
    });

    let body = assemble_call_result(&upstream, "call-42");
    let report = build_report(&body);

    assert_eq!(report.qualification, Qualification::Qualified);
    assert_eq!(
        report.qualification_reason.as_deref(),
        Some("Meets the bar for round two.")
    );
    assert_eq!(
        report.summary_text,
        "Confident communicator broad backend exposure."
    );

    // Profile rows in fixed label order, only for present values.
    let rows: Vec<(&str, &str)> = report
        .candidate_details
        .iter()
        .map(|r| (r.label.as_str(), r.value.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("Name", "Aarav Patel"),
            ("Email", "aarav.patel@example.com"),
            ("Phone", "+91 99887 66554"),
            ("Citizenship", "Indian"),
            ("Location", "Pune"),
        ]
    );

    // All seven metrics resolve despite mixed key spellings; the string
    // "77" coerces, 130 clamps, and 0 stays a real score.
    let values: Vec<Option<f64>> = report.competency_scores.iter().map(|m| m.value).collect();
    assert_eq!(
        values,
        vec![
            Some(74.0),
            Some(68.0),
            Some(81.0),
            Some(77.0),
            Some(64.0),
            Some(100.0),
            Some(0.0),
        ]
    );
    assert!(report.has_score_data);

    assert_eq!(report.education, vec!["B.Tech CSE", "M.Tech AI"]);
    assert_eq!(report.programming_languages, vec!["Rust", "Python"]);

    let project = report.recent_project.expect("recent project");
    assert_eq!(project.name.as_deref(), Some("Telemetry pipeline"));
    assert_eq!(project.tech_stack, vec!["Kafka", "ClickHouse"]);

    let titles: Vec<&str> = report
        .insight_groups
        .iter()
        .map(|g| g.title.as_str())
        .collect();
    assert_eq!(
        titles,
        vec![
            "Strengths",
            "Improvements",
            "Watch-outs",
            "Suggested Follow-ups",
            "Notable Quotes",
        ]
    );
    assert_eq!(
        report.insight_groups[1].items,
        vec!["needs deeper SQL", "more infra exposure"]
    );

    let meta = report.session_meta.expect("session meta");
    assert_eq!(meta.started_at.as_deref(), Some("Nov 3, 2025 10:00"));
    assert_eq!(meta.ended_at.as_deref(), Some("Nov 3, 2025 10:07"));
    assert_eq!(meta.duration.as_deref(), Some("7.5 mins"));
}

#[test]
fn sparse_payload_degrades_field_by_field() {
    let body = assemble_call_result(&json!({ "summary": "short call" }), "call-43");
    let report = build_report(&body);

    assert_eq!(report.qualification, Qualification::Pending);
    assert_eq!(report.summary_text, "short call");
    assert!(report.candidate_details.is_empty());
    assert!(!report.has_score_data);
    assert_eq!(report.competency_scores.len(), 7);
    assert!(report.insight_groups.is_empty());
    assert!(report.recent_project.is_none());
    assert!(report.session_meta.is_none());
}
