//! Shared fixtures for integration tests

use phoenix_engine::data::DatabaseService;
use phoenix_engine::data::spans::{
    NewSpan, NewSpanAnnotation, NewTrace, insert_project, insert_span, insert_span_annotation,
    insert_trace,
};
use serde_json::json;

pub const SECOND: i64 = 1_000_000;

/// In-memory store with a `chatbot` project holding one RAG trace:
/// `query` (CHAIN) -> `search` (RETRIEVER, two documents) -> `answer` (LLM).
/// `answer` carries a `Relevance` evaluation scored 0.25.
pub async fn rag_store() -> DatabaseService {
    let db = DatabaseService::sqlite_in_memory()
        .await
        .unwrap_or_else(|e| panic!("Failed to open store: {}", e));
    let project = insert_project(&db, "chatbot", None).await.unwrap();
    let trace = insert_trace(
        &db,
        &NewTrace {
            trace_id: "rag-1".into(),
            project_rowid: project,
            start_time: 10 * SECOND,
            end_time: 20 * SECOND,
        },
    )
    .await
    .unwrap();

    insert_span(
        &db,
        &NewSpan::new("query", trace, "query", "CHAIN", 10 * SECOND, 20 * SECOND)
            .with_attributes(json!({
                "input": {"value": "What is Arize?"},
                "output": {"value": "An observability company."}
            })),
    )
    .await
    .unwrap();
    insert_span(
        &db,
        &NewSpan::new("search", trace, "search", "RETRIEVER", 11 * SECOND, 12 * SECOND)
            .with_parent("query")
            .with_flat_attributes([
                ("retrieval.documents.0.document.id", json!("doc-1")),
                ("retrieval.documents.0.document.content", json!("Arize builds Phoenix")),
                ("retrieval.documents.0.document.score", json!(0.9)),
                ("retrieval.documents.1.document.id", json!("doc-2")),
                ("retrieval.documents.1.document.content", json!("Phoenix traces LLMs")),
                ("retrieval.documents.1.document.score", json!(0.4)),
            ]),
    )
    .await
    .unwrap();
    let answer = insert_span(
        &db,
        &NewSpan::new("answer", trace, "answer", "LLM", 12 * SECOND, 19 * SECOND)
            .with_parent("query")
            .with_status("ERROR", "rate limited")
            .with_token_counts(120, 30),
    )
    .await
    .unwrap();
    insert_span_annotation(
        &db,
        &NewSpanAnnotation::new(answer, "Relevance")
            .with_label("irrelevant")
            .with_score(0.25),
    )
    .await
    .unwrap();
    db
}
