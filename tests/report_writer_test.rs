use chrono::Utc;
use image_batch_analyzer::models::{ConsolidatedReport, FailedBatch, ReportStatus};
use image_batch_analyzer::services::{render_text, ReportFormat, ReportWriter};
use serde_json::Value;
use tempfile::tempdir;
use uuid::Uuid;

fn report() -> ConsolidatedReport {
    let now = Utc::now();
    ConsolidatedReport {
        id: Uuid::new_v4(),
        total_images: 45,
        total_batches: 3,
        completed_batches: 2,
        failed_batches: 1,
        overall_findings: "Analysis of 45 images across 3 batches.\n\nA\n\n---\n\nB".to_string(),
        recommendations: vec!["repeat scan".to_string(), "specialist review".to_string()],
        confidence: "Standard".to_string(),
        failed: vec![FailedBatch {
            batch_id: "batch-2".to_string(),
            error: "HTTP 400: invalid image".to_string(),
        }],
        started_at: now,
        completed_at: now,
        status: ReportStatus::Completed,
    }
}

#[tokio::test]
async fn test_write_both_formats() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("reports");
    let writer = ReportWriter::new(&out);
    let report = report();

    let written = writer.write(&report, ReportFormat::Both).await.unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0], out.join(format!("report-{}.json", report.id)));
    assert_eq!(written[1], out.join(format!("report-{}.txt", report.id)));

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
    assert_eq!(json["status"], "COMPLETED");
    assert_eq!(json["total_images"], 45);
    assert_eq!(json["failed"][0]["batch_id"], "batch-2");

    let text = std::fs::read_to_string(&written[1]).unwrap();
    assert!(text.contains("FINDINGS"));
}

#[tokio::test]
async fn test_write_json_only() {
    let dir = tempdir().unwrap();
    let writer = ReportWriter::new(dir.path());
    let written = writer.write(&report(), ReportFormat::Json).await.unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].extension().and_then(|e| e.to_str()), Some("json"));
}

#[test]
fn test_render_text_sections() {
    let text = render_text(&report());
    assert!(text.contains("Status:      COMPLETED"));
    assert!(text.contains("Batches:     3 total, 2 completed, 1 failed"));
    assert!(text.contains("1. repeat scan"));
    assert!(text.contains("2. specialist review"));
    assert!(text.contains("FAILED BATCHES"));
    assert!(text.contains("- batch-2: HTTP 400: invalid image"));
}

#[test]
fn test_render_text_without_recommendations() {
    let mut report = report();
    report.recommendations.clear();
    report.failed.clear();
    let text = render_text(&report);
    assert!(text.contains("(none)"));
    assert!(!text.contains("FAILED BATCHES"));
}

#[test]
fn test_render_text_layout() {
    let report = report();
    let text = render_text(&report);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "=".repeat(60));
    assert_eq!(lines[1], "Consolidated Analysis Report");
    assert_eq!(lines[3], format!("Report ID:   {}", report.id));
    assert_eq!(lines[9], "Confidence:  Standard");
    assert_eq!(lines[10], "");
    assert_eq!(lines[11], "FINDINGS");
    assert!(text.ends_with("- batch-2: HTTP 400: invalid image\n"));
}
