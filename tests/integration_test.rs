//! Integration tests for the upload and query endpoints.
//!
//! Most tests drive the router with a scripted runner so no interpreter is
//! needed; the end-to-end test at the bottom runs real `sh` scripts.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use pdf_rag::api;
use pdf_rag::config::Config;
use pdf_rag::process::{ProcessRunner, ScriptedRunner};
use pdf_rag::state::AppState;

const BOUNDARY: &str = "pdf-rag-test-boundary";

fn test_config(base: &Path) -> Config {
    Config {
        base_dir: base.to_path_buf(),
        ..Config::default()
    }
}

fn app_with(config: Config, runner: Arc<dyn ProcessRunner>) -> Router {
    std::fs::create_dir_all(config.scripts_dir()).unwrap();
    api::router(AppState::new(config, runner).unwrap())
}

fn query_request(body: &str) -> Request<Body> {
    Request::post("/query")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a multipart body with one part per `(field, filename, content)`.
fn upload_request(parts: &[(&str, &str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (field, filename, content) in parts {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::post("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_query_without_question_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::new());

    for body in ["{}", r#"{"question":""}"#, r#"{"question":"   "}"#, "not json", r#"{"question":42}"#] {
        let app = app_with(test_config(dir.path()), runner.clone());
        let (status, json) = send(app, query_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(json, json!({"error": "Question is required."}));
    }
    assert_eq!(runner.launch_count(), 0);
}

#[tokio::test]
async fn test_query_ingests_missing_index_then_answers() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let runner = Arc::new(ScriptedRunner::new());
    runner.creates("embedding", config.artifact_path());
    runner.succeed_with(
        "query",
        &[
            "loading index...",
            r#"{"answer":"30 days","sources":["doc1.pdf"]}"#,
        ],
    );

    let app = app_with(config.clone(), runner.clone());
    let (status, json) = send(
        app,
        query_request(r#"{"question":"What is the refund policy?"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"answer": "30 days", "sources": ["doc1.pdf"]}));
    assert_eq!(
        runner.launched_units(),
        ["extraction", "preprocessing", "embedding", "query"]
    );
    assert!(config.artifact_path().exists());
}

#[tokio::test]
async fn test_query_unit_failure_is_server_error_with_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let runner = Arc::new(ScriptedRunner::new());
    let app = app_with(config.clone(), runner.clone());
    std::fs::write(config.artifact_path(), b"idx").unwrap();
    runner.fail_with("query", 1, "index corrupted");

    let (status, json) = send(app, query_request(r#"{"question":"anything"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("index corrupted"));
    assert_eq!(runner.launched_units(), ["query"]);
}

#[tokio::test]
async fn test_redacted_diagnostics_hide_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        expose_diagnostics: false,
        ..test_config(dir.path())
    };
    let runner = Arc::new(ScriptedRunner::new());
    let app = app_with(config.clone(), runner.clone());
    std::fs::write(config.artifact_path(), b"idx").unwrap();
    runner.fail_with("query", 1, "Traceback: /home/svc/secret.py");

    let (status, json) = send(app, query_request(r#"{"question":"anything"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = json["error"].as_str().unwrap();
    assert!(!error.contains("secret"));
}

#[tokio::test]
async fn test_query_output_without_json_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let runner = Arc::new(ScriptedRunner::new());
    let app = app_with(config.clone(), runner.clone());
    std::fs::write(config.artifact_path(), b"idx").unwrap();
    runner.succeed_with("query", &["Query received: anything", "no answer today"]);

    let (status, json) = send(app, query_request(r#"{"question":"anything"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("JSON"));
}

#[tokio::test]
async fn test_upload_stores_files_and_runs_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let runner = Arc::new(ScriptedRunner::new());
    let app = app_with(config.clone(), runner.clone());

    let (status, json) = send(
        app,
        upload_request(&[
            ("pdfs", "policy.pdf", "%PDF-1.4 policy"),
            ("pdfs", "../faq.pdf", "%PDF-1.4 faq"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({"message": "File processed, you may now ask queries."})
    );
    assert_eq!(
        std::fs::read_to_string(config.pdf_dir().join("policy.pdf")).unwrap(),
        "%PDF-1.4 policy"
    );
    assert!(config.pdf_dir().join("faq.pdf").exists());
    assert_eq!(
        runner.launched_units(),
        ["extraction", "preprocessing", "embedding"]
    );
}

#[tokio::test]
async fn test_upload_ingestion_failure_names_failing_unit() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::new());
    runner.fail_with("preprocessing", 1, "OSError: can't find model 'en_core_web_sm'");
    let app = app_with(test_config(dir.path()), runner.clone());

    let (status, json) = send(app, upload_request(&[("pdfs", "a.pdf", "x")])).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = json["error"].as_str().unwrap();
    assert!(error.contains("preprocessing"));
    assert!(error.contains("en_core_web_sm"));
    assert_eq!(runner.launched_units(), ["extraction", "preprocessing"]);
}

#[tokio::test]
async fn test_upload_storage_failure_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let runner = Arc::new(ScriptedRunner::new());
    let app = app_with(config.clone(), runner.clone());
    // The upload directory is replaced by a plain file, so creating
    // anything inside it fails.
    std::fs::remove_dir_all(config.pdf_dir()).unwrap();
    std::fs::write(config.pdf_dir(), b"not a directory").unwrap();

    let (status, json) = send(app, upload_request(&[("pdfs", "a.pdf", "x")])).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to store uploaded file."));
    assert_eq!(runner.launch_count(), 0);
}

#[tokio::test]
async fn test_huge_upload_limit_does_not_overflow() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        max_upload_mb: usize::MAX,
        ..test_config(dir.path())
    };
    let runner = Arc::new(ScriptedRunner::new());
    let app = app_with(config, runner);

    let (status, _) = send(app, upload_request(&[("pdfs", "a.pdf", "x")])).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_upload_rejects_unexpected_field_and_too_many_files() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::new());

    let app = app_with(test_config(dir.path()), runner.clone());
    let (status, _) = send(app, upload_request(&[("docs", "a.pdf", "x")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let names: Vec<String> = (0..11).map(|i| format!("doc{i}.pdf")).collect();
    let parts: Vec<(&str, &str, &str)> = names.iter().map(|n| ("pdfs", n.as_str(), "x")).collect();
    let app = app_with(test_config(dir.path()), runner.clone());
    let (status, json) = send(app, upload_request(&parts)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("10"));

    assert_eq!(runner.launch_count(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_end_to_end_with_shell_scripts() {
    use pdf_rag::process::CommandRunner;
    use std::time::Duration;

    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        interpreter: "sh".to_string(),
        ..test_config(dir.path())
    };
    let scripts = config.scripts_dir();
    std::fs::create_dir_all(&scripts).unwrap();
    std::fs::write(
        scripts.join("pdf_to_text.py"),
        "ls ../pdfs > extracted_text.json\necho 'pdf_to_text started'\n",
    )
    .unwrap();
    std::fs::write(
        scripts.join("preprocess_text.py"),
        "cp extracted_text.json processed_chunks.json\n",
    )
    .unwrap();
    std::fs::write(
        scripts.join("create_embeddings.py"),
        "cp processed_chunks.json faiss_index.index\n",
    )
    .unwrap();
    std::fs::write(
        scripts.join("query_engine.py"),
        "echo \"Query received: $1\"\necho '{\"debug\":true}'\necho\nprintf '{\"answer\":\"%s\"}\\n' \"$(cat faiss_index.index)\"\necho 'bye'\n",
    )
    .unwrap();

    let runner = Arc::new(CommandRunner::new(Some(Duration::from_secs(30))));
    let app = app_with(config.clone(), runner);
    let (status, _) = send(app.clone(), upload_request(&[("pdfs", "manual.pdf", "x")])).await;
    assert_eq!(status, StatusCode::OK);
    assert!(config.artifact_path().exists());

    let (status, json) = send(app, query_request(r#"{"question":"Where is the manual?"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"answer": "manual.pdf"}));
}
