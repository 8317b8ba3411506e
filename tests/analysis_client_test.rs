mod common;

use common::{batch, ScriptedBackend, Script, INSTRUCTION};
use image_batch_analyzer::error::{AnalysisError, ValidationError};
use image_batch_analyzer::services::{AnalysisClient, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;

fn client(backend: Arc<ScriptedBackend>) -> AnalysisClient {
    AnalysisClient::new(backend, RetryPolicy::default(), 20)
}

fn unavailable() -> Script {
    Script::Fail(AnalysisError::HttpStatus {
        status: 503,
        message: "Service Unavailable".to_string(),
    })
}

#[tokio::test(start_paused = true)]
async fn test_success_is_parsed() {
    let backend = Arc::new(ScriptedBackend::new(Duration::from_millis(200)));
    let result = client(backend.clone())
        .submit(&batch("batch-1", 3), INSTRUCTION)
        .await
        .unwrap();

    assert_eq!(result.batch_id, "batch-1");
    assert_eq!(result.image_count, 3);
    assert_eq!(result.findings, "findings for batch-1");
    assert_eq!(result.recommendations, "follow up on batch-1");
    assert_eq!(result.confidence, "High");
    assert_eq!(result.technical_notes.as_deref(), Some("good quality"));
    assert_eq!(result.processing_time, Duration::from_millis(200));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_with_exponential_backoff() {
    let backend = Arc::new(
        ScriptedBackend::new(Duration::ZERO).script("batch-1", vec![unavailable(); 4]),
    );
    let err = client(backend.clone())
        .submit(&batch("batch-1", 2), INSTRUCTION)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AnalysisError::RetriesExhausted {
            attempts: 4,
            last: Box::new(AnalysisError::HttpStatus {
                status: 503,
                message: "Service Unavailable".to_string(),
            }),
        }
    );
    assert_eq!(backend.calls(), 4);

    let times = backend.call_times();
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_then_success() {
    let backend = Arc::new(ScriptedBackend::new(Duration::ZERO).script(
        "batch-1",
        vec![
            Script::Fail(AnalysisError::HttpStatus {
                status: 429,
                message: "Rate limit reached".to_string(),
            }),
            Script::Fail(AnalysisError::Transport("connection reset".to_string())),
        ],
    ));
    let result = client(backend.clone())
        .submit(&batch("batch-1", 1), INSTRUCTION)
        .await
        .unwrap();

    assert_eq!(backend.calls(), 3);
    assert_eq!(result.findings, "findings for batch-1");
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_not_retried() {
    let backend = Arc::new(ScriptedBackend::new(Duration::ZERO).script("batch-1", vec![Script::Hang]));
    let err = client(backend.clone())
        .submit(&batch("batch-1", 1), INSTRUCTION)
        .await
        .unwrap_err();

    assert_eq!(err, AnalysisError::Timeout { secs: 300 });
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_client_error_is_terminal() {
    let backend = Arc::new(ScriptedBackend::new(Duration::ZERO).script(
        "batch-1",
        vec![Script::Fail(AnalysisError::HttpStatus {
            status: 404,
            message: "model not found".to_string(),
        })],
    ));
    let err = client(backend.clone())
        .submit(&batch("batch-1", 1), INSTRUCTION)
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::HttpStatus { status: 404, .. }));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_blank_reply_is_empty_content() {
    let backend = Arc::new(
        ScriptedBackend::new(Duration::ZERO).script("batch-1", vec![Script::Reply("  \n ".to_string())]),
    );
    let err = client(backend.clone())
        .submit(&batch("batch-1", 1), INSTRUCTION)
        .await
        .unwrap_err();

    assert_eq!(err, AnalysisError::EmptyContent);
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unstructured_reply_falls_back() {
    let backend = Arc::new(ScriptedBackend::new(Duration::ZERO).script(
        "batch-1",
        vec![Script::Reply("The images look unremarkable.".to_string())],
    ));
    let result = client(backend)
        .submit(&batch("batch-1", 1), INSTRUCTION)
        .await
        .unwrap();

    assert_eq!(result.findings, "The images look unremarkable....");
    assert_eq!(result.confidence, "Moderate");
    assert!(result.technical_notes.is_none());
}

#[tokio::test]
async fn test_oversized_batch_is_rejected_locally() {
    let backend = Arc::new(ScriptedBackend::new(Duration::ZERO));
    let err = client(backend.clone())
        .submit(&batch("batch-1", 21), INSTRUCTION)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AnalysisError::Invalid(ValidationError::BatchTooLarge {
            batch_id: "batch-1".to_string(),
            size: 21,
            max: 20,
        })
    );
    assert_eq!(backend.calls(), 0);
}
